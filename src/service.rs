//! User-facing orchestration of repositories, distances, solver and plans.
//!
//! Every mutation follows the same path: the repository first, then the
//! distance cache, then the solver. While the problem has a depot, at least
//! one visit and at least one vehicle the solver runs and receives each
//! change as a problem change. Otherwise the solver is stopped and the
//! service publishes the unsolved problem itself.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::change::ProblemChange;
use crate::config::{PlannerConfig, ProviderKind};
use crate::distance::{DistanceCache, InMemoryDistanceStore};
use crate::domain::{Location, LocationId, Vehicle, VehicleId};
use crate::error::{DistanceError, ServiceError, SolverError};
use crate::events::{ErrorEvent, ErrorNotifier};
use crate::haversine::Haversine;
use crate::materializer::{PlanPublisher, RouteMaterializer};
use crate::osrm::OsrmClient;
use crate::plan::{RoutingPlan, SolutionSnapshot};
use crate::repository::{InMemoryLocationRepository, InMemoryVehicleRepository};
use crate::solution::{PlanningLocation, PlanningVehicle, PlanningVisit, Score, WorkingSolution};
use crate::solver::{CheapestInsertion, Search, SearchFactory, SolverManager, SolverState};
use crate::traits::{CostSource, DistanceStore, LocationRepository, PathProvider, VehicleRepository};

/// Everything the service talks to outside its own process.
#[derive(Clone)]
pub struct Collaborators {
    pub costs: Arc<dyn CostSource>,
    pub paths: Arc<dyn PathProvider>,
    pub store: Arc<dyn DistanceStore>,
    pub locations: Arc<dyn LocationRepository>,
    pub vehicles: Arc<dyn VehicleRepository>,
}

impl Collaborators {
    /// Great-circle distances and in-memory storage.
    pub fn haversine() -> Self {
        let haversine = Arc::new(Haversine::new());
        Self {
            costs: haversine.clone(),
            paths: haversine,
            store: Arc::new(InMemoryDistanceStore::new()),
            locations: Arc::new(InMemoryLocationRepository::new()),
            vehicles: Arc::new(InMemoryVehicleRepository::new()),
        }
    }

    /// The provider and distance store named by `config`, with in-memory
    /// repositories.
    pub fn from_config(config: &PlannerConfig) -> Result<Self, DistanceError> {
        let store = config.distance.open_store()?;
        let (costs, paths): (Arc<dyn CostSource>, Arc<dyn PathProvider>) = match config.provider {
            ProviderKind::Haversine => {
                let haversine = Arc::new(Haversine::new());
                let costs: Arc<dyn CostSource> = haversine.clone();
                let paths: Arc<dyn PathProvider> = haversine;
                (costs, paths)
            }
            ProviderKind::Osrm => {
                let client = Arc::new(OsrmClient::new(config.osrm.clone())?);
                let costs: Arc<dyn CostSource> = client.clone();
                let paths: Arc<dyn PathProvider> = client;
                (costs, paths)
            }
        };

        Ok(Self {
            costs,
            paths,
            store,
            locations: Arc::new(InMemoryLocationRepository::new()),
            vehicles: Arc::new(InMemoryVehicleRepository::new()),
        })
    }
}

/// The service's own view of the problem, mirrored into the solver.
#[derive(Default)]
struct ProblemState {
    depot: Option<PlanningLocation>,
    visits: Vec<PlanningVisit>,
    vehicles: Vec<Vehicle>,
}

impl ProblemState {
    fn should_solve(&self) -> bool {
        self.depot.is_some() && !self.visits.is_empty() && !self.vehicles.is_empty()
    }

    /// The whole problem with every visit unassigned.
    fn working_solution(&self) -> WorkingSolution {
        WorkingSolution::new(
            self.depot.clone(),
            self.vehicles.iter().map(PlanningVehicle::from),
            self.visits
                .iter()
                .map(|visit| PlanningVisit::new(visit.location().clone(), visit.demand())),
        )
    }
}

pub struct RoutingService {
    config: PlannerConfig,
    locations: Arc<dyn LocationRepository>,
    vehicles: Arc<dyn VehicleRepository>,
    distances: DistanceCache,
    solver: SolverManager,
    /// Shares the solver's channel to the materializer, so plans published
    /// here are ordered after every best solution sent before them.
    snapshots: Sender<SolutionSnapshot>,
    publisher: Arc<PlanPublisher>,
    errors: Arc<ErrorNotifier>,
    state: Mutex<ProblemState>,
}

impl RoutingService {
    pub fn new(config: PlannerConfig, collaborators: Collaborators) -> Result<Self, ServiceError> {
        let search: SearchFactory = Arc::new(|| Box::new(CheapestInsertion) as Box<dyn Search>);
        Self::with_search(config, collaborators, search)
    }

    pub fn with_search(
        config: PlannerConfig,
        collaborators: Collaborators,
        search: SearchFactory,
    ) -> Result<Self, ServiceError> {
        let Collaborators {
            costs,
            paths,
            store,
            locations,
            vehicles,
        } = collaborators;

        let publisher = Arc::new(PlanPublisher::new());
        let errors = Arc::new(ErrorNotifier::new());
        let (snapshots, inbox) = mpsc::channel();

        let materializer = Arc::new(RouteMaterializer::new(
            Arc::clone(&locations),
            Arc::clone(&vehicles),
            paths,
            Arc::clone(&publisher),
        ));
        materializer
            .spawn(inbox)
            .map_err(|err| SolverError::Spawn(err.to_string()))?;

        let distances = DistanceCache::new(costs, store).with_parallelism(config.distance.parallel);
        let solver =
            SolverManager::new(config.solver.clone(), snapshots.clone(), Arc::clone(&errors)).with_search(search);

        Ok(Self {
            config,
            locations,
            vehicles,
            distances,
            solver,
            snapshots,
            publisher,
            errors,
            state: Mutex::new(ProblemState::default()),
        })
    }

    /// Adds a location with the configured default demand. The first
    /// location becomes the depot, every later one a visit.
    pub fn add_location(&self, location: Location) -> Result<(), ServiceError> {
        self.add_location_with_demand(location, self.config.default_visit_demand)
    }

    /// If the distances of the new location cannot be computed, the location
    /// is removed again, an error event is emitted and the solver is left
    /// untouched.
    pub fn add_location_with_demand(&self, location: Location, demand: u32) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let id = location.id();
        if !self.locations.save(location.clone()) {
            return Err(ServiceError::DuplicateLocation(id));
        }

        let row = match self.distances.add_location(&location) {
            Ok(row) => row,
            Err(err) => {
                warn!(location_id = %id, error = %err, "rolling back location without distances");
                self.locations.delete(id);
                self.errors.notify(ErrorEvent::distance(&err, format!("add location {}", id)));
                return Err(err.into());
            }
        };

        let location = PlanningLocation::new(row);
        if state.depot.is_none() {
            info!(location_id = %id, "depot added");
            state.depot = Some(location);
            return self.sync_solver(&state, None);
        }

        info!(location_id = %id, demand, "visit added");
        let visit = PlanningVisit::new(location, demand);
        state.visits.push(visit.clone());
        self.sync_solver(&state, Some(ProblemChange::AddVisit(visit)))
    }

    /// The depot can only be removed once there are no visits left.
    pub fn remove_location(&self, id: LocationId) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        if self.locations.find(id).is_none() {
            return Err(ServiceError::UnknownLocation(id));
        }

        let change = if state.depot.as_ref().map(PlanningLocation::id) == Some(id) {
            if !state.visits.is_empty() {
                return Err(ServiceError::DepotWithVisits(id));
            }
            state.depot = None;
            None
        } else {
            let index = state
                .visits
                .iter()
                .position(|visit| visit.id() == id)
                .ok_or(ServiceError::UnknownLocation(id))?;
            state.visits.remove(index);
            Some(ProblemChange::RemoveVisit(id))
        };

        self.locations.delete(id);
        info!(location_id = %id, "location removed");
        let synced = self.sync_solver(&state, change);
        self.distances.remove_location(id)?;
        synced
    }

    pub fn add_vehicle(&self, vehicle: Vehicle) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let id = vehicle.id();
        if !self.vehicles.save(vehicle.clone()) {
            return Err(ServiceError::DuplicateVehicle(id));
        }

        info!(vehicle_id = %id, capacity = vehicle.capacity(), "vehicle added");
        state.vehicles.push(vehicle.clone());
        self.sync_solver(&state, Some(ProblemChange::AddVehicle(vehicle)))
    }

    pub fn remove_vehicle(&self, id: VehicleId) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        self.vehicles.delete(id).ok_or(ServiceError::UnknownVehicle(id))?;

        info!(vehicle_id = %id, "vehicle removed");
        state.vehicles.retain(|vehicle| vehicle.id() != id);
        self.sync_solver(&state, Some(ProblemChange::RemoveVehicle(id)))
    }

    pub fn change_capacity(&self, id: VehicleId, capacity: u32) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        self.vehicles
            .change_capacity(id, capacity)
            .ok_or(ServiceError::UnknownVehicle(id))?;

        info!(vehicle_id = %id, capacity, "vehicle capacity changed");
        if let Some(vehicle) = state.vehicles.iter_mut().find(|vehicle| vehicle.id() == id) {
            vehicle.set_capacity(capacity);
        }
        self.sync_solver(&state, Some(ProblemChange::ChangeVehicleCapacity { vehicle: id, capacity }))
    }

    pub fn remove_all_locations(&self) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        self.locations.delete_all();
        self.distances.clear()?;
        state.depot = None;
        state.visits.clear();
        info!("all locations removed");
        self.sync_solver(&state, None)
    }

    pub fn remove_all_vehicles(&self) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        self.vehicles.delete_all();
        state.vehicles.clear();
        info!("all vehicles removed");
        self.sync_solver(&state, None)
    }

    /// Resets the problem, the repositories and every stored distance.
    pub fn clear(&self) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        self.locations.delete_all();
        self.vehicles.delete_all();
        self.distances.clear()?;
        *state = ProblemState::default();
        info!("problem cleared");
        self.sync_solver(&state, None)
    }

    pub fn current_plan(&self) -> Arc<RoutingPlan> {
        self.publisher.current()
    }

    pub fn subscribe_plans(&self) -> Receiver<Arc<RoutingPlan>> {
        self.publisher.subscribe()
    }

    pub fn subscribe_errors(&self) -> Receiver<ErrorEvent> {
        self.errors.subscribe()
    }

    pub fn solver_state(&self) -> SolverState {
        self.solver.state()
    }

    pub fn distances(&self) -> &DistanceCache {
        &self.distances
    }

    /// Starts, feeds or stops the solver so that it runs exactly while the
    /// problem is solvable.
    fn sync_solver(&self, state: &ProblemState, change: Option<ProblemChange>) -> Result<(), ServiceError> {
        match (self.solver.is_running(), state.should_solve()) {
            (true, true) => {
                if let Some(change) = change {
                    self.solver.submit(change)?;
                }
            }
            (false, true) => self.solver.start_solver(state.working_solution())?,
            (true, false) => {
                let stopped = self.solver.stop_solver();
                self.publish_unsolved(state)?;
                stopped?;
            }
            (false, false) => self.publish_unsolved(state)?,
        }
        Ok(())
    }

    fn publish_unsolved(&self, state: &ProblemState) -> Result<(), ServiceError> {
        let snapshot = state.working_solution().snapshot(Score::ZERO)?;
        if self.snapshots.send(snapshot).is_err() {
            warn!("route materializer is gone");
        }
        Ok(())
    }
}

impl Drop for RoutingService {
    fn drop(&mut self) {
        if let Err(err) = self.solver.stop_solver() {
            warn!(error = %err, "solver failed before shutdown");
        }
    }
}
