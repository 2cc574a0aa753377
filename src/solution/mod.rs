//! The solver's working copy of the routing problem.
//!
//! Entities live in id-keyed arenas and chain links are stored as ids, so
//! removing an entity never leaves a dangling reference behind. A visit's
//! `previous` standstill is the genuine planning variable. The `next_visit`
//! links and each visit's anchor vehicle are shadow variables, rebuilt from
//! the `previous` links by [`WorkingSolution::rebuild_shadows`].

mod score;

pub use score::Score;

use std::sync::Arc;

use fxhash::FxHashMap;

use crate::distance::DistanceRow;
use crate::domain::{LocationId, Vehicle, VehicleId, Visit};
use crate::error::{DistanceError, SolverError};
use crate::plan::{ShallowRoute, SolutionSnapshot};

/// Something a visit can follow: a vehicle (start of its chain) or another visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Standstill {
    Vehicle(VehicleId),
    Visit(LocationId),
}

/// A location together with its row of outgoing distances.
#[derive(Debug, Clone)]
pub struct PlanningLocation {
    id: LocationId,
    distances: Arc<DistanceRow>,
}

impl PlanningLocation {
    pub fn new(distances: Arc<DistanceRow>) -> Self {
        Self {
            id: distances.location_id(),
            distances,
        }
    }

    pub fn id(&self) -> LocationId {
        self.id
    }

    pub fn distance_to(&self, to: LocationId) -> Result<u64, DistanceError> {
        self.distances.distance_to(to)
    }
}

#[derive(Debug, Clone)]
pub struct PlanningVehicle {
    id: VehicleId,
    capacity: u32,
    next_visit: Option<LocationId>,
}

impl PlanningVehicle {
    pub fn new(id: VehicleId, capacity: u32) -> Self {
        Self {
            id,
            capacity,
            next_visit: None,
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn next_visit(&self) -> Option<LocationId> {
        self.next_visit
    }
}

impl From<&Vehicle> for PlanningVehicle {
    fn from(vehicle: &Vehicle) -> Self {
        Self::new(vehicle.id(), vehicle.capacity())
    }
}

#[derive(Debug, Clone)]
pub struct PlanningVisit {
    location: PlanningLocation,
    demand: u32,
    previous: Option<Standstill>,
    next_visit: Option<LocationId>,
    vehicle: Option<VehicleId>,
}

impl PlanningVisit {
    /// A new, unassigned visit.
    pub fn new(location: PlanningLocation, demand: u32) -> Self {
        Self {
            location,
            demand,
            previous: None,
            next_visit: None,
            vehicle: None,
        }
    }

    pub fn from_visit(visit: &Visit, distances: Arc<DistanceRow>) -> Self {
        Self::new(PlanningLocation::new(distances), visit.demand())
    }

    pub fn id(&self) -> LocationId {
        self.location.id()
    }

    pub fn location(&self) -> &PlanningLocation {
        &self.location
    }

    pub fn demand(&self) -> u32 {
        self.demand
    }

    pub fn previous(&self) -> Option<Standstill> {
        self.previous
    }

    pub fn next_visit(&self) -> Option<LocationId> {
        self.next_visit
    }

    /// The vehicle whose chain reaches this visit, if any.
    pub fn vehicle(&self) -> Option<VehicleId> {
        self.vehicle
    }

    pub fn is_assigned(&self) -> bool {
        self.previous.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkingSolution {
    depot: Option<PlanningLocation>,
    vehicles: FxHashMap<VehicleId, PlanningVehicle>,
    vehicle_order: Vec<VehicleId>,
    visits: FxHashMap<LocationId, PlanningVisit>,
    visit_order: Vec<LocationId>,
}

impl WorkingSolution {
    pub fn new(
        depot: Option<PlanningLocation>,
        vehicles: impl IntoIterator<Item = PlanningVehicle>,
        visits: impl IntoIterator<Item = PlanningVisit>,
    ) -> Self {
        let mut solution = Self {
            depot,
            ..Self::default()
        };
        for vehicle in vehicles {
            solution.insert_vehicle(vehicle);
        }
        for visit in visits {
            solution.insert_visit(visit);
        }
        solution
    }

    pub fn depot(&self) -> Option<&PlanningLocation> {
        self.depot.as_ref()
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&PlanningVehicle> {
        self.vehicles.get(&id)
    }

    pub fn visit(&self, id: LocationId) -> Option<&PlanningVisit> {
        self.visits.get(&id)
    }

    pub fn vehicle_ids(&self) -> &[VehicleId] {
        &self.vehicle_order
    }

    pub fn visit_ids(&self) -> &[LocationId] {
        &self.visit_order
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &PlanningVehicle> {
        self.vehicle_order.iter().filter_map(|id| self.vehicles.get(id))
    }

    pub fn visits(&self) -> impl Iterator<Item = &PlanningVisit> {
        self.visit_order.iter().filter_map(|id| self.visits.get(id))
    }

    pub fn unassigned(&self) -> Vec<LocationId> {
        self.visits()
            .filter(|visit| !visit.is_assigned())
            .map(PlanningVisit::id)
            .collect()
    }

    /// The visit following `standstill`, from the shadow links.
    pub fn next_of(&self, standstill: Standstill) -> Option<LocationId> {
        match standstill {
            Standstill::Vehicle(id) => self.vehicles.get(&id).and_then(|v| v.next_visit),
            Standstill::Visit(id) => self.visits.get(&id).and_then(|v| v.next_visit),
        }
    }

    /// The location a vehicle leaves from is the depot.
    pub fn location_of(&self, standstill: Standstill) -> Option<&PlanningLocation> {
        match standstill {
            Standstill::Vehicle(_) => self.depot.as_ref(),
            Standstill::Visit(id) => self.visits.get(&id).map(PlanningVisit::location),
        }
    }

    pub fn contains(&self, standstill: Standstill) -> bool {
        match standstill {
            Standstill::Vehicle(id) => self.vehicles.contains_key(&id),
            Standstill::Visit(id) => self.visits.contains_key(&id),
        }
    }

    /// Visits of `vehicle` in driving order.
    ///
    /// The walk is bounded by the number of visits in the solution; a longer
    /// walk can only mean a cycle.
    pub fn chain(&self, vehicle: VehicleId) -> Result<Vec<LocationId>, SolverError> {
        let first = self
            .vehicles
            .get(&vehicle)
            .ok_or_else(|| SolverError::invariant(format!("vehicle {} is not in the working solution", vehicle)))?
            .next_visit;

        let limit = self.visits.len();
        let mut chain = Vec::new();
        let mut cursor = first;
        while let Some(id) = cursor {
            if chain.len() >= limit {
                return Err(SolverError::invariant(format!(
                    "chain of vehicle {} is longer than the {} visits in the solution",
                    vehicle, limit
                )));
            }
            chain.push(id);
            cursor = self
                .visits
                .get(&id)
                .ok_or_else(|| {
                    SolverError::invariant(format!("chain of vehicle {} reaches missing visit {}", vehicle, id))
                })?
                .next_visit;
        }

        Ok(chain)
    }

    /// Recomputes `next_visit` links and anchor vehicles from the `previous`
    /// links, verifying that the chains form a forest of simple paths rooted
    /// at vehicles.
    pub fn rebuild_shadows(&mut self) -> Result<(), SolverError> {
        let mut successors: FxHashMap<Standstill, LocationId> = FxHashMap::default();
        for &id in &self.visit_order {
            let Some(previous) = self.visits.get(&id).and_then(|visit| visit.previous) else {
                continue;
            };
            if previous == Standstill::Visit(id) {
                return Err(SolverError::invariant(format!("visit {} follows itself", id)));
            }
            if !self.contains(previous) {
                return Err(SolverError::invariant(format!(
                    "visit {} follows {:?} which is not in the working solution",
                    id, previous
                )));
            }
            if let Some(other) = successors.insert(previous, id) {
                return Err(SolverError::invariant(format!(
                    "visits {} and {} both follow {:?}",
                    other, id, previous
                )));
            }
        }

        for vehicle in self.vehicles.values_mut() {
            vehicle.next_visit = successors.get(&Standstill::Vehicle(vehicle.id)).copied();
        }
        for visit in self.visits.values_mut() {
            visit.next_visit = successors.get(&Standstill::Visit(visit.id())).copied();
            visit.vehicle = None;
        }

        let mut anchored = 0;
        for index in 0..self.vehicle_order.len() {
            let vehicle_id = self.vehicle_order[index];
            for visit_id in self.chain(vehicle_id)? {
                if let Some(visit) = self.visits.get_mut(&visit_id) {
                    visit.vehicle = Some(vehicle_id);
                    anchored += 1;
                }
            }
        }

        if anchored != successors.len() {
            return Err(SolverError::invariant(format!(
                "{} assigned visits are not reachable from any vehicle",
                successors.len() - anchored
            )));
        }

        Ok(())
    }

    /// Distance and load overflow of one vehicle's route. The route starts
    /// and ends at the depot when there is one.
    pub fn route_score(&self, vehicle: VehicleId) -> Result<Score, SolverError> {
        let capacity = self
            .vehicles
            .get(&vehicle)
            .map(PlanningVehicle::capacity)
            .ok_or_else(|| SolverError::invariant(format!("vehicle {} is not in the working solution", vehicle)))?;

        let mut distance = 0;
        let mut load: u64 = 0;
        let mut previous: Option<&PlanningLocation> = self.depot.as_ref();
        for visit_id in self.chain(vehicle)? {
            let visit = self
                .visits
                .get(&visit_id)
                .ok_or_else(|| SolverError::invariant(format!("visit {} is not in the working solution", visit_id)))?;
            if let Some(from) = previous {
                distance += from.distance_to(visit_id)?;
            }
            load += u64::from(visit.demand);
            previous = Some(&visit.location);
        }
        if let (Some(last), Some(depot)) = (previous, self.depot.as_ref()) {
            if last.id() != depot.id() {
                distance += last.distance_to(depot.id())?;
            }
        }

        Ok(Score::of(load.saturating_sub(u64::from(capacity)), distance))
    }

    pub fn score(&self) -> Result<Score, SolverError> {
        self.vehicle_order
            .iter()
            .map(|&vehicle| self.route_score(vehicle))
            .sum()
    }

    /// One id-only route per vehicle. Without a depot there are no routes.
    pub fn shallow_routes(&self) -> Result<Vec<ShallowRoute>, SolverError> {
        let Some(depot) = &self.depot else {
            return Ok(Vec::new());
        };
        self.vehicle_order
            .iter()
            .map(|&vehicle_id| -> Result<ShallowRoute, SolverError> {
                Ok(ShallowRoute {
                    vehicle_id,
                    depot_id: depot.id(),
                    visit_ids: self.chain(vehicle_id)?,
                })
            })
            .collect()
    }

    pub fn snapshot(&self, score: Score) -> Result<SolutionSnapshot, SolverError> {
        Ok(SolutionSnapshot {
            vehicle_ids: self.vehicle_order.clone(),
            depot_id: self.depot.as_ref().map(PlanningLocation::id),
            visit_ids: self.visit_order.clone(),
            routes: self.shallow_routes()?,
            distance: score.distance(),
        })
    }

    pub(crate) fn insert_vehicle(&mut self, vehicle: PlanningVehicle) -> bool {
        if self.vehicles.contains_key(&vehicle.id) {
            return false;
        }
        self.vehicle_order.push(vehicle.id);
        self.vehicles.insert(vehicle.id, vehicle);
        true
    }

    pub(crate) fn take_vehicle(&mut self, id: VehicleId) -> Option<PlanningVehicle> {
        let vehicle = self.vehicles.remove(&id)?;
        self.vehicle_order.retain(|&other| other != id);
        Some(vehicle)
    }

    pub(crate) fn insert_visit(&mut self, visit: PlanningVisit) -> bool {
        let id = visit.id();
        if self.visits.contains_key(&id) {
            return false;
        }
        self.visit_order.push(id);
        self.visits.insert(id, visit);
        true
    }

    pub(crate) fn take_visit(&mut self, id: LocationId) -> Option<PlanningVisit> {
        let visit = self.visits.remove(&id)?;
        self.visit_order.retain(|&other| other != id);
        Some(visit)
    }

    pub(crate) fn set_previous(&mut self, visit: LocationId, previous: Option<Standstill>) -> Result<(), SolverError> {
        self.visits
            .get_mut(&visit)
            .ok_or_else(|| SolverError::invariant(format!("visit {} is not in the working solution", visit)))?
            .previous = previous;
        Ok(())
    }

    /// Links the unassigned `visit` right after `after`, updating the shadow
    /// links of the touched chain only. `after` must already be anchored to
    /// a vehicle.
    pub(crate) fn link_after(&mut self, visit: LocationId, after: Standstill) -> Result<(), SolverError> {
        let anchor = match after {
            Standstill::Vehicle(id) if self.vehicles.contains_key(&id) => Some(id),
            Standstill::Vehicle(_) => None,
            Standstill::Visit(id) => self.visits.get(&id).and_then(|other| other.vehicle),
        };
        let Some(anchor) = anchor else {
            return Err(SolverError::invariant(format!(
                "cannot link visit {} after {:?} which is not on any route",
                visit, after
            )));
        };
        let next = self.next_of(after);

        let planning = self
            .visits
            .get_mut(&visit)
            .ok_or_else(|| SolverError::invariant(format!("visit {} is not in the working solution", visit)))?;
        planning.previous = Some(after);
        planning.next_visit = next;
        planning.vehicle = Some(anchor);

        self.set_next(after, Some(visit));
        if let Some(next) = next {
            self.set_previous(next, Some(Standstill::Visit(visit)))?;
        }
        Ok(())
    }

    /// Unlinks `visit` from its chain, joining its neighbours. Only the
    /// shadow links of that chain are touched.
    pub(crate) fn unlink(&mut self, visit: LocationId) -> Result<(), SolverError> {
        let planning = self
            .visits
            .get_mut(&visit)
            .ok_or_else(|| SolverError::invariant(format!("visit {} is not in the working solution", visit)))?;
        let previous = planning.previous.take();
        let next = planning.next_visit.take();
        planning.vehicle = None;

        if let Some(previous) = previous {
            self.set_next(previous, next);
        }
        if let Some(next) = next {
            self.set_previous(next, previous)?;
        }
        Ok(())
    }

    fn set_next(&mut self, standstill: Standstill, next: Option<LocationId>) {
        match standstill {
            Standstill::Vehicle(id) => {
                if let Some(vehicle) = self.vehicles.get_mut(&id) {
                    vehicle.next_visit = next;
                }
            }
            Standstill::Visit(id) => {
                if let Some(visit) = self.visits.get_mut(&id) {
                    visit.next_visit = next;
                }
            }
        }
    }

    pub(crate) fn set_capacity(&mut self, vehicle: VehicleId, capacity: u32) -> Result<(), SolverError> {
        self.vehicles
            .get_mut(&vehicle)
            .ok_or_else(|| SolverError::invariant(format!("vehicle {} is not in the working solution", vehicle)))?
            .capacity = capacity;
        Ok(())
    }
}
