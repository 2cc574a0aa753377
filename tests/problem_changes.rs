use std::sync::Arc;

use proptest::prelude::*;

use vrp_live_planner::change::ProblemChange;
use vrp_live_planner::distance::DistanceRow;
use vrp_live_planner::solution::{PlanningLocation, PlanningVehicle, PlanningVisit, Standstill, WorkingSolution};
use vrp_live_planner::solver::ScoreDirector;
use vrp_live_planner::{LocationId, Vehicle, VehicleId};

const DEPOT: i64 = 1;
const MAX_LOCATION: i64 = 12;

/// Locations 1..=MAX_LOCATION on a line, 100 apart.
fn location(id: i64) -> PlanningLocation {
    let cells = (1..=MAX_LOCATION).map(|other| (LocationId(other), (id - other).unsigned_abs() * 100));
    PlanningLocation::new(Arc::new(DistanceRow::new(LocationId(id), cells)))
}

fn visit(id: i64) -> PlanningVisit {
    PlanningVisit::new(location(id), 1)
}

fn director(vehicles: &[i64], visits: &[i64]) -> ScoreDirector {
    let solution = WorkingSolution::new(
        Some(location(DEPOT)),
        vehicles.iter().map(|&id| PlanningVehicle::new(VehicleId(id), 10)),
        visits.iter().map(|&id| visit(id)),
    );
    ScoreDirector::new(solution).unwrap()
}

fn chain(director: &mut ScoreDirector, vehicle: i64, visits: &[i64]) {
    let mut after = Standstill::Vehicle(VehicleId(vehicle));
    for &id in visits {
        director.insert_after(LocationId(id), after).unwrap();
        after = Standstill::Visit(LocationId(id));
    }
}

fn ids(raw: &[i64]) -> Vec<LocationId> {
    raw.iter().copied().map(LocationId).collect()
}

#[test]
fn removing_middle_visit_splices_chain() {
    let mut director = director(&[10], &[2, 3, 4]);
    chain(&mut director, 10, &[2, 3, 4]);

    ProblemChange::RemoveVisit(LocationId(3)).apply(&mut director).unwrap();

    let solution = director.working_solution();
    assert_eq!(solution.chain(VehicleId(10)).unwrap(), ids(&[2, 4]));
    assert_eq!(solution.visit(LocationId(2)).unwrap().next_visit(), Some(LocationId(4)));
    assert_eq!(
        solution.visit(LocationId(4)).unwrap().previous(),
        Some(Standstill::Visit(LocationId(2)))
    );
    assert!(solution.visit(LocationId(3)).is_none());
}

#[test]
fn removing_first_visit_reanchors_successor_on_vehicle() {
    let mut director = director(&[10], &[2, 3]);
    chain(&mut director, 10, &[2, 3]);

    ProblemChange::RemoveVisit(LocationId(2)).apply(&mut director).unwrap();

    let solution = director.working_solution();
    assert_eq!(
        solution.visit(LocationId(3)).unwrap().previous(),
        Some(Standstill::Vehicle(VehicleId(10)))
    );
    assert_eq!(solution.vehicle(VehicleId(10)).unwrap().next_visit(), Some(LocationId(3)));
}

#[test]
fn removing_vehicle_unassigns_without_deleting() {
    let mut director = director(&[10, 20], &[2, 3, 4]);
    chain(&mut director, 10, &[2, 3]);
    chain(&mut director, 20, &[4]);

    ProblemChange::RemoveVehicle(VehicleId(10)).apply(&mut director).unwrap();

    let solution = director.working_solution();
    assert_eq!(solution.visit(LocationId(2)).unwrap().previous(), None);
    assert_eq!(solution.visit(LocationId(3)).unwrap().previous(), None);
    assert_eq!(solution.visit_ids(), ids(&[2, 3, 4]).as_slice());
    assert_eq!(solution.chain(VehicleId(20)).unwrap(), ids(&[4]));
    assert_eq!(director.score(), solution.score().unwrap());
}

#[test]
fn added_vehicle_starts_with_empty_chain() {
    let mut director = director(&[10], &[2]);

    ProblemChange::AddVehicle(Vehicle::new(VehicleId(20), "Truck 20", 5))
        .apply(&mut director)
        .unwrap();

    let solution = director.working_solution();
    assert_eq!(solution.vehicle(VehicleId(20)).unwrap().capacity(), 5);
    assert!(solution.chain(VehicleId(20)).unwrap().is_empty());
}

#[test]
fn capacity_change_applies_in_place() {
    let mut director = director(&[10], &[2, 3, 4]);
    chain(&mut director, 10, &[2, 3, 4]);
    let chain_before = director.working_solution().chain(VehicleId(10)).unwrap();

    ProblemChange::ChangeVehicleCapacity {
        vehicle: VehicleId(10),
        capacity: 2,
    }
    .apply(&mut director)
    .unwrap();

    assert_eq!(director.working_solution().chain(VehicleId(10)).unwrap(), chain_before);
    assert_eq!(director.score().hard(), -1);
}

#[test]
fn changes_against_missing_entities_are_fatal() {
    let mut director = director(&[10], &[2]);

    let err = ProblemChange::RemoveVisit(LocationId(7)).apply(&mut director).unwrap_err();
    assert!(err.is_invariant_violation());

    let err = ProblemChange::RemoveVehicle(VehicleId(70)).apply(&mut director).unwrap_err();
    assert!(err.is_invariant_violation());
}

#[derive(Debug, Clone)]
enum Op {
    AddVisit(i64),
    RemoveVisit(i64),
    AddVehicle(i64),
    RemoveVehicle(i64),
    Assign { visit: i64, after: i64 },
    Detach(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (2..=MAX_LOCATION).prop_map(Op::AddVisit),
        (2..=MAX_LOCATION).prop_map(Op::RemoveVisit),
        (10..13i64).prop_map(Op::AddVehicle),
        (10..13i64).prop_map(Op::RemoveVehicle),
        ((2..=MAX_LOCATION), (2..=MAX_LOCATION + 3)).prop_map(|(visit, after)| Op::Assign { visit, after }),
        (2..=MAX_LOCATION).prop_map(Op::Detach),
    ]
}

/// Applies `op` only when its preconditions hold, as the service and the
/// search would.
fn apply(director: &mut ScoreDirector, op: &Op) {
    let solution = director.working_solution();
    match *op {
        Op::AddVisit(id) if solution.visit(LocationId(id)).is_none() => {
            ProblemChange::AddVisit(visit(id)).apply(director).unwrap();
        }
        Op::RemoveVisit(id) if solution.visit(LocationId(id)).is_some() => {
            ProblemChange::RemoveVisit(LocationId(id)).apply(director).unwrap();
        }
        Op::AddVehicle(id) if solution.vehicle(VehicleId(id)).is_none() => {
            ProblemChange::AddVehicle(Vehicle::new(VehicleId(id), "Truck", 3))
                .apply(director)
                .unwrap();
        }
        Op::RemoveVehicle(id) if solution.vehicle(VehicleId(id)).is_some() => {
            ProblemChange::RemoveVehicle(VehicleId(id)).apply(director).unwrap();
        }
        Op::Assign { visit, after } => {
            let Some(planning) = solution.visit(LocationId(visit)) else {
                return;
            };
            if planning.is_assigned() {
                return;
            }
            // Targets past the last location stand for vehicles 10..13.
            let after = if after > MAX_LOCATION {
                Standstill::Vehicle(VehicleId(after - MAX_LOCATION + 9))
            } else {
                Standstill::Visit(LocationId(after))
            };
            let usable = match after {
                Standstill::Vehicle(_) => solution.contains(after),
                Standstill::Visit(id) => solution.visit(id).is_some_and(|v| v.is_assigned()),
            };
            if usable {
                director.insert_after(LocationId(visit), after).unwrap();
            }
        }
        Op::Detach(id) if solution.visit(LocationId(id)).is_some() => {
            director.detach(LocationId(id)).unwrap();
        }
        _ => {}
    }
}

fn assert_chains_form_a_forest(director: &ScoreDirector) {
    let solution = director.working_solution();
    let mut seen = std::collections::HashSet::new();
    for &vehicle in solution.vehicle_ids() {
        let mut previous = Standstill::Vehicle(vehicle);
        for visit in solution.chain(vehicle).unwrap() {
            assert!(seen.insert(visit), "visit {} is on two chains", visit);
            let planning = solution.visit(visit).unwrap();
            assert_eq!(planning.previous(), Some(previous));
            assert_eq!(planning.vehicle(), Some(vehicle));
            previous = Standstill::Visit(visit);
        }
    }
    for planning in solution.visits() {
        assert_eq!(planning.is_assigned(), seen.contains(&planning.id()));
    }
    assert_eq!(director.score(), solution.score().unwrap());

    let mut rebuilt = solution.clone();
    rebuilt.rebuild_shadows().unwrap();
    for planning in solution.visits() {
        let expected = rebuilt.visit(planning.id()).unwrap();
        assert_eq!(planning.next_visit(), expected.next_visit());
        assert_eq!(planning.vehicle(), expected.vehicle());
    }
}

proptest! {
    #[test]
    fn chains_stay_a_forest_under_random_changes(ops in prop::collection::vec(op(), 1..60)) {
        let mut director = director(&[10, 11], &[2, 3, 4]);
        chain(&mut director, 10, &[2, 3]);

        for op in &ops {
            apply(&mut director, op);
            assert_chains_form_a_forest(&director);
        }
    }
}
