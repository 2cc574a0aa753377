//! Score bookkeeping around every write to the working solution.
//!
//! Writers announce each change with a `before_*`/`after_*` pair and finish
//! with [`ScoreDirector::trigger_variable_listeners`], which rebuilds the
//! shadow links and rescores only the routes that were touched. The search
//! moves [`ScoreDirector::insert_after`] and [`ScoreDirector::detach`] keep
//! the shadow links current themselves and skip the full rebuild.

use fxhash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::domain::{LocationId, VehicleId};
use crate::error::SolverError;
use crate::solution::{PlanningVisit, Score, Standstill, WorkingSolution};

pub struct ScoreDirector {
    solution: WorkingSolution,
    route_scores: FxHashMap<VehicleId, Score>,
    score: Score,
    dirty_vehicles: FxHashSet<VehicleId>,
    touched_visits: FxHashSet<LocationId>,
    open_notifications: usize,
}

impl ScoreDirector {
    pub fn new(mut solution: WorkingSolution) -> Result<Self, SolverError> {
        solution.rebuild_shadows()?;
        let route_scores = solution
            .vehicle_ids()
            .iter()
            .map(|&vehicle| -> Result<_, SolverError> { Ok((vehicle, solution.route_score(vehicle)?)) })
            .collect::<Result<FxHashMap<_, _>, SolverError>>()?;
        let score = route_scores.values().copied().sum();

        Ok(Self {
            solution,
            route_scores,
            score,
            dirty_vehicles: FxHashSet::default(),
            touched_visits: FxHashSet::default(),
            open_notifications: 0,
        })
    }

    pub fn working_solution(&self) -> &WorkingSolution {
        &self.solution
    }

    pub fn into_working_solution(self) -> WorkingSolution {
        self.solution
    }

    /// Score as of the last [`Self::trigger_variable_listeners`].
    pub fn score(&self) -> Score {
        self.score
    }

    /// Resolves `id` against the working copy.
    pub fn lookup_vehicle(&self, id: VehicleId) -> Result<VehicleId, SolverError> {
        self.solution
            .vehicle(id)
            .map(|vehicle| vehicle.id())
            .ok_or_else(|| SolverError::invariant(format!("working solution has no vehicle {}", id)))
    }

    /// Resolves `id` against the working copy.
    pub fn lookup_visit(&self, id: LocationId) -> Result<&PlanningVisit, SolverError> {
        self.solution
            .visit(id)
            .ok_or_else(|| SolverError::invariant(format!("working solution has no visit {}", id)))
    }

    pub fn before_entity_added(&mut self, entity: Standstill) {
        self.open_notifications += 1;
        trace!(?entity, "before entity added");
    }

    pub fn after_entity_added(&mut self, entity: Standstill) {
        self.close_notification();
        self.touch(entity);
    }

    pub fn before_entity_removed(&mut self, entity: Standstill) {
        self.open_notifications += 1;
        self.touch(entity);
    }

    pub fn after_entity_removed(&mut self, entity: Standstill) {
        self.close_notification();
        if let Standstill::Visit(id) = entity {
            self.touched_visits.remove(&id);
        }
    }

    pub fn before_variable_changed(&mut self, visit: LocationId) {
        self.open_notifications += 1;
        self.touch(Standstill::Visit(visit));
    }

    pub fn after_variable_changed(&mut self, visit: LocationId) {
        self.close_notification();
        self.touched_visits.insert(visit);
    }

    pub fn before_problem_property_changed(&mut self, vehicle: VehicleId) {
        self.open_notifications += 1;
        self.dirty_vehicles.insert(vehicle);
    }

    pub fn after_problem_property_changed(&mut self, vehicle: VehicleId) {
        self.close_notification();
        self.dirty_vehicles.insert(vehicle);
    }

    /// Links the unassigned `visit` right after `after`, ahead of whatever
    /// followed `after` before. Only the touched chain is relinked and
    /// rescored.
    pub fn insert_after(&mut self, visit: LocationId, after: Standstill) -> Result<(), SolverError> {
        if self.lookup_visit(visit)?.is_assigned() {
            return Err(SolverError::invariant(format!("visit {} is already assigned", visit)));
        }
        if !self.solution.contains(after) {
            return Err(SolverError::invariant(format!(
                "cannot insert visit {} after {:?} which is not in the working solution",
                visit, after
            )));
        }
        let next = self.solution.next_of(after);

        self.before_variable_changed(visit);
        if let Some(next) = next {
            self.before_variable_changed(next);
        }
        let linked = self.solution.link_after(visit, after);
        if let Some(next) = next {
            self.after_variable_changed(next);
        }
        self.after_variable_changed(visit);
        linked?;

        self.rescore()
    }

    /// Unlinks `visit` from its chain, joining its predecessor to its
    /// successor. The visit stays in the solution, unassigned.
    pub fn detach(&mut self, visit: LocationId) -> Result<(), SolverError> {
        let next = self.lookup_visit(visit)?.next_visit();

        if let Some(next) = next {
            self.before_variable_changed(next);
        }
        self.before_variable_changed(visit);
        let unlinked = self.solution.unlink(visit);
        self.after_variable_changed(visit);
        if let Some(next) = next {
            self.after_variable_changed(next);
        }
        unlinked?;

        self.rescore()
    }

    /// Rebuilds shadow variables and brings the score up to date.
    pub fn trigger_variable_listeners(&mut self) -> Result<(), SolverError> {
        self.ensure_notifications_closed()?;
        self.solution.rebuild_shadows()?;
        self.rescore()
    }

    /// Rescores the routes touched since the last rescore. The shadow links
    /// must already be current.
    fn rescore(&mut self) -> Result<(), SolverError> {
        self.ensure_notifications_closed()?;

        for visit in self.touched_visits.drain() {
            if let Some(vehicle) = self.solution.visit(visit).and_then(PlanningVisit::vehicle) {
                self.dirty_vehicles.insert(vehicle);
            }
        }
        for vehicle in self.dirty_vehicles.drain() {
            if self.solution.vehicle(vehicle).is_some() {
                self.route_scores.insert(vehicle, self.solution.route_score(vehicle)?);
            } else {
                self.route_scores.remove(&vehicle);
            }
        }
        self.score = self.route_scores.values().copied().sum();

        Ok(())
    }

    fn ensure_notifications_closed(&self) -> Result<(), SolverError> {
        if self.open_notifications != 0 {
            return Err(SolverError::invariant(format!(
                "{} change notifications were never closed",
                self.open_notifications
            )));
        }
        Ok(())
    }

    pub(crate) fn solution_mut(&mut self) -> &mut WorkingSolution {
        &mut self.solution
    }

    fn touch(&mut self, entity: Standstill) {
        match entity {
            Standstill::Vehicle(vehicle) => {
                self.dirty_vehicles.insert(vehicle);
            }
            Standstill::Visit(visit) => {
                if let Some(vehicle) = self.solution.visit(visit).and_then(PlanningVisit::vehicle) {
                    self.dirty_vehicles.insert(vehicle);
                }
                self.touched_visits.insert(visit);
            }
        }
    }

    fn close_notification(&mut self) {
        self.open_notifications = self.open_notifications.saturating_sub(1);
    }
}
