//! Problem changes: atomic edits of the solver's working solution.
//!
//! A change only carries the values it needs and resolves every entity
//! against the working copy when it is applied. Changes run on the solver
//! thread, strictly between search steps.

use std::fmt;

use tracing::debug;

use crate::domain::{LocationId, Vehicle, VehicleId};
use crate::error::SolverError;
use crate::solution::{PlanningVehicle, PlanningVisit, Standstill};
use crate::solver::ScoreDirector;

#[derive(Debug, Clone)]
pub enum ProblemChange {
    AddVehicle(Vehicle),
    RemoveVehicle(VehicleId),
    /// The visit is inserted unassigned; the search places it.
    AddVisit(PlanningVisit),
    RemoveVisit(LocationId),
    ChangeVehicleCapacity { vehicle: VehicleId, capacity: u32 },
}

impl ProblemChange {
    pub fn apply(&self, director: &mut ScoreDirector) -> Result<(), SolverError> {
        match self {
            ProblemChange::AddVehicle(vehicle) => add_vehicle(director, vehicle)?,
            ProblemChange::RemoveVehicle(id) => remove_vehicle(director, *id)?,
            ProblemChange::AddVisit(visit) => add_visit(director, visit)?,
            ProblemChange::RemoveVisit(id) => remove_visit(director, *id)?,
            ProblemChange::ChangeVehicleCapacity { vehicle, capacity } => {
                change_capacity(director, *vehicle, *capacity)?
            }
        }
        director.trigger_variable_listeners()?;
        debug!(change = %self, score = %director.score(), "applied problem change");
        Ok(())
    }
}

impl fmt::Display for ProblemChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemChange::AddVehicle(vehicle) => write!(f, "add vehicle {}", vehicle.id()),
            ProblemChange::RemoveVehicle(id) => write!(f, "remove vehicle {}", id),
            ProblemChange::AddVisit(visit) => write!(f, "add visit {}", visit.id()),
            ProblemChange::RemoveVisit(id) => write!(f, "remove visit {}", id),
            ProblemChange::ChangeVehicleCapacity { vehicle, capacity } => {
                write!(f, "change capacity of vehicle {} to {}", vehicle, capacity)
            }
        }
    }
}

fn add_vehicle(director: &mut ScoreDirector, vehicle: &Vehicle) -> Result<(), SolverError> {
    let entity = Standstill::Vehicle(vehicle.id());
    director.before_entity_added(entity);
    if !director.solution_mut().insert_vehicle(PlanningVehicle::from(vehicle)) {
        return Err(SolverError::invariant(format!(
            "vehicle {} is already in the working solution",
            vehicle.id()
        )));
    }
    director.after_entity_added(entity);
    Ok(())
}

/// Unassigns every visit on the vehicle's chain, then drops the vehicle.
/// Reassigning the visits is left to the search.
fn remove_vehicle(director: &mut ScoreDirector, id: VehicleId) -> Result<(), SolverError> {
    let vehicle = director.lookup_vehicle(id)?;
    let future_visits = director.working_solution().chain(vehicle)?;
    for visit in future_visits {
        director.before_variable_changed(visit);
        director.solution_mut().set_previous(visit, None)?;
        director.after_variable_changed(visit);
    }

    let entity = Standstill::Vehicle(vehicle);
    director.before_entity_removed(entity);
    director
        .solution_mut()
        .take_vehicle(vehicle)
        .ok_or_else(|| SolverError::invariant(format!("vehicle {} vanished while being removed", vehicle)))?;
    director.after_entity_removed(entity);
    Ok(())
}

fn add_visit(director: &mut ScoreDirector, visit: &PlanningVisit) -> Result<(), SolverError> {
    let entity = Standstill::Visit(visit.id());
    director.before_entity_added(entity);
    let unassigned = PlanningVisit::new(visit.location().clone(), visit.demand());
    if !director.solution_mut().insert_visit(unassigned) {
        return Err(SolverError::invariant(format!(
            "visit {} is already in the working solution",
            visit.id()
        )));
    }
    director.after_entity_added(entity);
    Ok(())
}

/// Splices the visit out of its chain so that its successor follows its
/// predecessor, then drops it.
fn remove_visit(director: &mut ScoreDirector, id: LocationId) -> Result<(), SolverError> {
    let (previous, next) = {
        let visit = director.lookup_visit(id)?;
        (visit.previous(), visit.next_visit())
    };

    if let Some(next) = next {
        director.before_variable_changed(next);
        director.solution_mut().set_previous(next, previous)?;
        director.after_variable_changed(next);
    }

    let entity = Standstill::Visit(id);
    director.before_entity_removed(entity);
    director
        .solution_mut()
        .take_visit(id)
        .ok_or_else(|| SolverError::invariant(format!("visit {} is missing from the working solution", id)))?;
    director.after_entity_removed(entity);
    Ok(())
}

fn change_capacity(director: &mut ScoreDirector, id: VehicleId, capacity: u32) -> Result<(), SolverError> {
    let vehicle = director.lookup_vehicle(id)?;
    director.before_problem_property_changed(vehicle);
    director.solution_mut().set_capacity(vehicle, capacity)?;
    director.after_problem_property_changed(vehicle);
    Ok(())
}
