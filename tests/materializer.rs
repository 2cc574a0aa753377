mod fixtures;

use std::sync::Arc;
use std::sync::mpsc;

use fixtures::{depot_and_stops, wait_for_plan};
use vrp_live_planner::haversine::Haversine;
use vrp_live_planner::materializer::{PlanPublisher, RouteMaterializer};
use vrp_live_planner::repository::{InMemoryLocationRepository, InMemoryVehicleRepository};
use vrp_live_planner::traits::{LocationRepository, VehicleRepository};
use vrp_live_planner::{
    LocationId, MaterializeError, PlanError, Route, RoutingPlan, ShallowRoute, SolutionSnapshot, Vehicle, VehicleId,
};

struct Harness {
    locations: Arc<InMemoryLocationRepository>,
    vehicles: Arc<InMemoryVehicleRepository>,
    materializer: RouteMaterializer,
}

fn harness(stops: usize, vehicles: &[i64]) -> Harness {
    let locations = Arc::new(InMemoryLocationRepository::new());
    for location in depot_and_stops(stops) {
        locations.save(location);
    }
    let vehicle_repository = Arc::new(InMemoryVehicleRepository::new());
    for &id in vehicles {
        vehicle_repository.save(Vehicle::new(VehicleId(id), format!("Truck {}", id), 10));
    }
    let materializer = RouteMaterializer::new(
        locations.clone(),
        vehicle_repository.clone(),
        Arc::new(Haversine::new()),
        Arc::new(PlanPublisher::new()),
    );
    Harness {
        locations,
        vehicles: vehicle_repository,
        materializer,
    }
}

fn snapshot(vehicles: &[i64], visits: &[i64], routes: &[(i64, Vec<i64>)]) -> SolutionSnapshot {
    SolutionSnapshot {
        vehicle_ids: vehicles.iter().copied().map(VehicleId).collect(),
        depot_id: Some(LocationId(1)),
        visit_ids: visits.iter().copied().map(LocationId).collect(),
        routes: routes
            .iter()
            .map(|(vehicle, chain)| ShallowRoute {
                vehicle_id: VehicleId(*vehicle),
                depot_id: LocationId(1),
                visit_ids: chain.iter().copied().map(LocationId).collect(),
            })
            .collect(),
        distance: 1234,
    }
}

#[test]
fn empty_problem_round_trips_to_empty_plan() {
    let harness = harness(0, &[]);
    harness.locations.delete_all();

    let plan = harness.materializer.materialize(&SolutionSnapshot::empty()).unwrap();

    assert_eq!(plan, RoutingPlan::empty());
    assert_eq!(plan.distance(), 0);
    assert!(plan.vehicles().is_empty());
    assert!(plan.depot().is_none());
    assert!(plan.visits().is_empty());
    assert!(plan.routes().is_empty());
}

#[test]
fn depot_and_visits_without_vehicles() {
    let harness = harness(2, &[]);

    let plan = harness.materializer.materialize(&snapshot(&[], &[2, 3], &[])).unwrap();

    assert!(plan.routes().is_empty());
    assert_eq!(plan.depot().unwrap().id(), LocationId(1));
    assert_eq!(plan.visits().len(), 2);
}

#[test]
fn vehicle_without_visits_gets_empty_route() {
    let harness = harness(1, &[10]);

    let plan = harness
        .materializer
        .materialize(&snapshot(&[10], &[2], &[(10, vec![])]))
        .unwrap();

    let route = &plan.routes()[0];
    assert!(route.visits().is_empty());
    assert!(route.track().is_empty());
    assert_eq!(route.vehicle().id(), VehicleId(10));
}

#[test]
fn single_visit_route_has_out_and_back_legs() {
    let harness = harness(1, &[10]);
    let locations = depot_and_stops(1);

    let plan = harness
        .materializer
        .materialize(&snapshot(&[10], &[2], &[(10, vec![2])]))
        .unwrap();

    let route = &plan.routes()[0];
    assert_eq!(route.depot().id(), LocationId(1));
    assert_eq!(route.visits()[0].id(), LocationId(2));
    assert_eq!(route.track().len(), 2);
    assert_eq!(route.track()[0].first(), Some(locations[0].coordinates()));
    assert_eq!(route.track()[0].last(), Some(locations[1].coordinates()));
    assert_eq!(route.track()[1].last(), Some(locations[0].coordinates()));
    assert_eq!(plan.distance(), 1234);
}

#[test]
fn deleted_visit_discards_update_without_error() {
    let harness = harness(2, &[10]);
    let fresh = snapshot(&[10], &[2, 3], &[(10, vec![2, 3])]);
    assert!(harness.materializer.accept(&fresh));
    let published = harness.materializer.publisher().current();

    harness.locations.delete(LocationId(3));
    let stale = snapshot(&[10], &[2, 3], &[(10, vec![3, 2])]);

    assert!(matches!(
        harness.materializer.materialize(&stale),
        Err(MaterializeError::StaleLocation(LocationId(3)))
    ));
    assert!(!harness.materializer.accept(&stale));
    assert_eq!(harness.materializer.publisher().current(), published);
}

#[test]
fn deleted_vehicle_discards_update() {
    let harness = harness(1, &[10, 20]);
    harness.vehicles.delete(VehicleId(20));

    let result = harness
        .materializer
        .materialize(&snapshot(&[10, 20], &[2], &[(10, vec![2]), (20, vec![])]));

    let err = result.unwrap_err();
    assert!(err.is_stale());
    assert!(matches!(err, MaterializeError::StaleVehicle(VehicleId(20))));
}

#[test]
fn plan_with_routes_but_no_depot_is_rejected() {
    let locations = depot_and_stops(0);
    let vehicle = Vehicle::new(VehicleId(10), "Truck 10", 10);
    let route = Route::new(vehicle.clone(), locations[0].clone(), vec![], vec![]);

    let result = RoutingPlan::new(0, vec![vehicle], None, vec![], vec![route]);

    assert_eq!(result, Err(PlanError::RoutesWithoutDepot));
}

#[test]
fn spawned_materializer_publishes_to_subscribers() {
    let harness = harness(1, &[10]);
    let plans = harness.materializer.publisher().subscribe();
    let materializer = Arc::new(harness.materializer);
    let (snapshots, inbox) = mpsc::channel();
    let handle = Arc::clone(&materializer).spawn(inbox).unwrap();

    snapshots.send(snapshot(&[10], &[2], &[(10, vec![2])])).unwrap();

    let plan = wait_for_plan(&plans, |plan| !plan.routes().is_empty()).unwrap();
    assert_eq!(plan.routes()[0].visits()[0].id(), LocationId(2));

    drop(snapshots);
    handle.join().unwrap();
}
