//! Route snapshots leaving the solver and the routing plan built from them.

use fxhash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::domain::{Location, LocationId, Vehicle, VehicleId};
use crate::error::PlanError;
use crate::polyline::Polyline;

/// Id-only copy of one vehicle's chain, taken at a single instant.
///
/// Holds no references into the working solution, so it can cross from the
/// solver thread to any other thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShallowRoute {
    pub vehicle_id: VehicleId,
    pub depot_id: LocationId,
    pub visit_ids: Vec<LocationId>,
}

/// Everything the materializer needs from one best solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionSnapshot {
    pub vehicle_ids: Vec<VehicleId>,
    pub depot_id: Option<LocationId>,
    pub visit_ids: Vec<LocationId>,
    pub routes: Vec<ShallowRoute>,
    pub distance: u64,
}

impl SolutionSnapshot {
    pub fn empty() -> Self {
        Self {
            vehicle_ids: Vec::new(),
            depot_id: None,
            visit_ids: Vec::new(),
            routes: Vec::new(),
            distance: 0,
        }
    }
}

/// A vehicle's route with every id resolved to its entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    vehicle: Vehicle,
    depot: Location,
    visits: Vec<Location>,
    track: Vec<Polyline>,
}

impl Route {
    /// `track` holds one polyline per leg of depot, visits..., depot.
    pub fn new(vehicle: Vehicle, depot: Location, visits: Vec<Location>, track: Vec<Polyline>) -> Self {
        Self {
            vehicle,
            depot,
            visits,
            track,
        }
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub fn depot(&self) -> &Location {
        &self.depot
    }

    pub fn visits(&self) -> &[Location] {
        &self.visits
    }

    pub fn track(&self) -> &[Polyline] {
        &self.track
    }
}

/// The externally published routing plan.
///
/// Always internally consistent: every route's vehicle, depot and visits are
/// present in the plan's own lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingPlan {
    distance: u64,
    vehicles: Vec<Vehicle>,
    depot: Option<Location>,
    visits: Vec<Location>,
    routes: Vec<Route>,
}

impl RoutingPlan {
    pub fn new(
        distance: u64,
        vehicles: Vec<Vehicle>,
        depot: Option<Location>,
        visits: Vec<Location>,
        routes: Vec<Route>,
    ) -> Result<Self, PlanError> {
        let Some(depot_location) = &depot else {
            if routes.is_empty() {
                return Ok(Self {
                    distance,
                    vehicles,
                    depot,
                    visits,
                    routes,
                });
            }
            return Err(PlanError::RoutesWithoutDepot);
        };

        let vehicle_ids: FxHashSet<VehicleId> = vehicles.iter().map(Vehicle::id).collect();
        let visit_ids: FxHashSet<LocationId> = visits.iter().map(Location::id).collect();
        for route in &routes {
            if !vehicle_ids.contains(&route.vehicle.id()) {
                return Err(PlanError::UnknownVehicle(route.vehicle.id()));
            }
            if route.depot.id() != depot_location.id() {
                return Err(PlanError::DepotMismatch(route.depot.id()));
            }
            if let Some(unknown) = route.visits.iter().find(|visit| !visit_ids.contains(&visit.id())) {
                return Err(PlanError::UnknownVisit(unknown.id()));
            }
        }

        Ok(Self {
            distance,
            vehicles,
            depot,
            visits,
            routes,
        })
    }

    pub fn empty() -> Self {
        Self {
            distance: 0,
            vehicles: Vec::new(),
            depot: None,
            visits: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn distance(&self) -> u64 {
        self.distance
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn depot(&self) -> Option<&Location> {
        self.depot.as_ref()
    }

    pub fn visits(&self) -> &[Location] {
        &self.visits
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
