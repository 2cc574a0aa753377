//! Seams between the synchronization core and its collaborators.
//!
//! Travel providers, durable storage and the authoritative repositories are
//! all supplied by the embedding application. The core only relies on the
//! contracts below.

use crate::domain::{Coordinates, Location, LocationId, Vehicle, VehicleId};
use crate::error::{DistanceError, StoreError};
use crate::polyline::Polyline;

/// Computes the directed travel cost between two points.
///
/// Returns `Ok(None)` when no route exists between the points. Costs are not
/// assumed to be symmetric.
pub trait CostSource: Send + Sync {
    fn cost(&self, from: Coordinates, to: Coordinates) -> Result<Option<u64>, DistanceError>;
}

/// Produces the travel polyline between two points.
pub trait PathProvider: Send + Sync {
    fn path(&self, from: Coordinates, to: Coordinates) -> Result<Polyline, DistanceError>;
}

/// Durable storage for computed distances, so that a restart reuses them.
pub trait DistanceStore: Send + Sync {
    fn get(&self, from: LocationId, to: LocationId) -> Result<Option<u64>, StoreError>;

    fn put(&self, from: LocationId, to: LocationId, distance: u64) -> Result<(), StoreError>;

    /// Deletes every entry where `id` is either endpoint.
    fn delete_all_involving(&self, id: LocationId) -> Result<(), StoreError>;

    fn delete_all(&self) -> Result<(), StoreError>;
}

/// Authoritative store of locations.
pub trait LocationRepository: Send + Sync {
    /// Returns `false` if a location with the same id already exists.
    fn save(&self, location: Location) -> bool;

    fn find(&self, id: LocationId) -> Option<Location>;

    fn delete(&self, id: LocationId) -> Option<Location>;

    fn all(&self) -> Vec<Location>;

    fn delete_all(&self);
}

/// Authoritative store of vehicles.
pub trait VehicleRepository: Send + Sync {
    /// Returns `false` if a vehicle with the same id already exists.
    fn save(&self, vehicle: Vehicle) -> bool;

    fn find(&self, id: VehicleId) -> Option<Vehicle>;

    fn delete(&self, id: VehicleId) -> Option<Vehicle>;

    fn change_capacity(&self, id: VehicleId, capacity: u32) -> Option<Vehicle>;

    fn all(&self) -> Vec<Vehicle>;

    fn delete_all(&self);
}
