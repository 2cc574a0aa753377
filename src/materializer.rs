//! Turns solver snapshots into published routing plans.
//!
//! Snapshots only carry ids. Each id is resolved against the authoritative
//! repositories, which may have changed since the solver captured the
//! snapshot; a snapshot that no longer resolves is dropped and the previous
//! plan stays current.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::domain::{Location, LocationId, Vehicle, VehicleId};
use crate::error::MaterializeError;
use crate::plan::{Route, RoutingPlan, ShallowRoute, SolutionSnapshot};
use crate::polyline::Polyline;
use crate::traits::{LocationRepository, PathProvider, VehicleRepository};

/// Holds the current plan and pushes every new one to subscribers.
#[derive(Debug)]
pub struct PlanPublisher {
    current: RwLock<Arc<RoutingPlan>>,
    subscribers: Mutex<Vec<Sender<Arc<RoutingPlan>>>>,
}

impl Default for PlanPublisher {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(RoutingPlan::empty())),
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl PlanPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<RoutingPlan> {
        Arc::clone(&self.current.read())
    }

    pub fn subscribe(&self) -> Receiver<Arc<RoutingPlan>> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, plan: RoutingPlan) {
        let plan = Arc::new(plan);
        *self.current.write() = Arc::clone(&plan);
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(Arc::clone(&plan)).is_ok());
    }
}

pub struct RouteMaterializer {
    locations: Arc<dyn LocationRepository>,
    vehicles: Arc<dyn VehicleRepository>,
    paths: Arc<dyn PathProvider>,
    publisher: Arc<PlanPublisher>,
}

impl RouteMaterializer {
    pub fn new(
        locations: Arc<dyn LocationRepository>,
        vehicles: Arc<dyn VehicleRepository>,
        paths: Arc<dyn PathProvider>,
        publisher: Arc<PlanPublisher>,
    ) -> Self {
        Self {
            locations,
            vehicles,
            paths,
            publisher,
        }
    }

    pub fn publisher(&self) -> &Arc<PlanPublisher> {
        &self.publisher
    }

    pub fn materialize(&self, snapshot: &SolutionSnapshot) -> Result<RoutingPlan, MaterializeError> {
        let vehicles = snapshot
            .vehicle_ids
            .iter()
            .map(|&id| self.find_vehicle(id))
            .collect::<Result<Vec<_>, _>>()?;
        let depot = snapshot.depot_id.map(|id| self.find_location(id)).transpose()?;
        let visits = snapshot
            .visit_ids
            .iter()
            .map(|&id| self.find_location(id))
            .collect::<Result<Vec<_>, _>>()?;

        let vehicles_by_id: FxHashMap<VehicleId, &Vehicle> = vehicles.iter().map(|v| (v.id(), v)).collect();
        let mut locations_by_id: FxHashMap<LocationId, &Location> = visits.iter().map(|l| (l.id(), l)).collect();
        if let Some(depot) = &depot {
            locations_by_id.insert(depot.id(), depot);
        }

        let routes = snapshot
            .routes
            .iter()
            .map(|route| self.route(route, &vehicles_by_id, &locations_by_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RoutingPlan::new(snapshot.distance, vehicles, depot, visits, routes)?)
    }

    /// Materializes and publishes `snapshot`. Returns whether a new plan was
    /// published.
    pub fn accept(&self, snapshot: &SolutionSnapshot) -> bool {
        match self.materialize(snapshot) {
            Ok(plan) => {
                debug!(distance = plan.distance(), routes = plan.routes().len(), "publishing routing plan");
                self.publisher.publish(plan);
                true
            }
            Err(err) if err.is_stale() => {
                warn!(error = %err, "discarding best solution that references deleted entities");
                false
            }
            Err(err) => {
                error!(error = %err, "failed to materialize best solution");
                false
            }
        }
    }

    /// Materializes snapshots from `snapshots` on a dedicated thread until
    /// every sender is dropped. Snapshots that queued up behind a slow one are
    /// skipped in favor of the newest.
    pub fn spawn(self: Arc<Self>, snapshots: Receiver<SolutionSnapshot>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("route-materializer".to_string())
            .spawn(move || {
                while let Ok(snapshot) = snapshots.recv() {
                    let latest = snapshots.try_iter().last().unwrap_or(snapshot);
                    self.accept(&latest);
                }
                debug!("route materializer exiting");
            })
    }

    fn route(
        &self,
        route: &ShallowRoute,
        vehicles: &FxHashMap<VehicleId, &Vehicle>,
        locations: &FxHashMap<LocationId, &Location>,
    ) -> Result<Route, MaterializeError> {
        let resolve = |id: LocationId| -> Result<Location, MaterializeError> {
            locations
                .get(&id)
                .map(|&location| location.clone())
                .ok_or(MaterializeError::StaleLocation(id))
        };

        let vehicle = vehicles
            .get(&route.vehicle_id)
            .map(|&vehicle| vehicle.clone())
            .ok_or(MaterializeError::StaleVehicle(route.vehicle_id))?;
        let depot = resolve(route.depot_id)?;
        let visits = route
            .visit_ids
            .iter()
            .map(|&id| resolve(id))
            .collect::<Result<Vec<_>, _>>()?;
        let track = self.track(&depot, &visits)?;

        Ok(Route::new(vehicle, depot, visits, track))
    }

    /// One path per leg of depot, visits..., depot. Empty without visits.
    fn track(&self, depot: &Location, visits: &[Location]) -> Result<Vec<Polyline>, MaterializeError> {
        if visits.is_empty() {
            return Ok(Vec::new());
        }

        let itinerary: Vec<&Location> = std::iter::once(depot)
            .chain(visits)
            .chain(std::iter::once(depot))
            .collect();
        itinerary
            .windows(2)
            .map(|leg| -> Result<Polyline, MaterializeError> {
                Ok(self.paths.path(leg[0].coordinates(), leg[1].coordinates())?)
            })
            .collect()
    }

    fn find_vehicle(&self, id: VehicleId) -> Result<Vehicle, MaterializeError> {
        self.vehicles.find(id).ok_or(MaterializeError::StaleVehicle(id))
    }

    fn find_location(&self, id: LocationId) -> Result<Location, MaterializeError> {
        self.locations.find(id).ok_or(MaterializeError::StaleLocation(id))
    }
}
