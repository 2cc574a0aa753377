//! vrp-live-planner
//!
//! Keeps a continuously re-optimized vehicle routing problem in sync with
//! the business data it is built from: memoized travel distances, problem
//! changes applied between solver steps, and routing plans materialized
//! from the solver's best solutions.

pub mod change;
pub mod config;
pub mod distance;
pub mod domain;
pub mod error;
pub mod events;
pub mod haversine;
pub mod materializer;
pub mod osrm;
pub mod plan;
pub mod polyline;
pub mod repository;
pub mod service;
pub mod solution;
pub mod solver;
pub mod traits;

pub use config::PlannerConfig;
pub use domain::{Coordinates, Location, LocationId, Vehicle, VehicleId, Visit};
pub use error::{DistanceError, MaterializeError, PlanError, ServiceError, SolverError};
pub use plan::{Route, RoutingPlan, ShallowRoute, SolutionSnapshot};
pub use service::{Collaborators, RoutingService};
