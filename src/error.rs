//! Error types for every layer of the planner.

use thiserror::Error;

use crate::domain::{LocationId, VehicleId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("distance store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("distance store is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DistanceError {
    #[error("no route from location {from} to location {to}")]
    NoRoute { from: LocationId, to: LocationId },

    #[error("location {to} is not in the distance row of {from} (known: {known:?})")]
    OutOfRange {
        from: LocationId,
        to: LocationId,
        known: Vec<LocationId>,
    },

    #[error("location {0} is not in the distance cache")]
    UnknownLocation(LocationId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("travel provider failed: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for DistanceError {
    fn from(err: reqwest::Error) -> Self {
        DistanceError::Provider(err.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SolverError {
    #[error("solving has already been requested")]
    AlreadyStarted,

    #[error("solver is not running")]
    NotRunning,

    #[error("daemon solver terminated without being asked to stop")]
    TerminatedUnexpectedly,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("search failed: {0}")]
    Search(String),

    #[error("solver thread panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn solver thread: {0}")]
    Spawn(String),
}

impl SolverError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        SolverError::InvariantViolation(message.into())
    }

    /// Errors that indicate the working copy and the business data diverged.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, SolverError::InvariantViolation(_))
    }
}

// Every location in the working copy carries its distance row, so a failed
// lookup means the two went out of sync.
impl From<DistanceError> for SolverError {
    fn from(err: DistanceError) -> Self {
        SolverError::InvariantViolation(err.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("routes require a depot")]
    RoutesWithoutDepot,

    #[error("route references vehicle {0} missing from the plan")]
    UnknownVehicle(VehicleId),

    #[error("route references visit {0} missing from the plan")]
    UnknownVisit(LocationId),

    #[error("route depot {0} does not match the plan depot")]
    DepotMismatch(LocationId),
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("vehicle {0} no longer exists")]
    StaleVehicle(VehicleId),

    #[error("location {0} no longer exists")]
    StaleLocation(LocationId),

    #[error("failed to compute route track: {0}")]
    Path(#[from] DistanceError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl MaterializeError {
    /// Stale references heal on the next best solution and are not reported.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            MaterializeError::StaleVehicle(_) | MaterializeError::StaleLocation(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Distance(#[from] DistanceError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error("location {0} already exists")]
    DuplicateLocation(LocationId),

    #[error("vehicle {0} already exists")]
    DuplicateVehicle(VehicleId),

    #[error("location {0} does not exist")]
    UnknownLocation(LocationId),

    #[error("vehicle {0} does not exist")]
    UnknownVehicle(VehicleId),

    #[error("depot {0} can only be removed when there are no visits")]
    DepotWithVisits(LocationId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
