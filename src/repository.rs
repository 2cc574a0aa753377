//! In-memory repositories for locations and vehicles.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::domain::{Location, LocationId, Vehicle, VehicleId};
use crate::traits::{LocationRepository, VehicleRepository};

#[derive(Debug, Default)]
pub struct InMemoryLocationRepository {
    locations: RwLock<BTreeMap<LocationId, Location>>,
}

impl InMemoryLocationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationRepository for InMemoryLocationRepository {
    fn save(&self, location: Location) -> bool {
        let mut locations = self.locations.write();
        if locations.contains_key(&location.id()) {
            return false;
        }
        locations.insert(location.id(), location);
        true
    }

    fn find(&self, id: LocationId) -> Option<Location> {
        self.locations.read().get(&id).cloned()
    }

    fn delete(&self, id: LocationId) -> Option<Location> {
        self.locations.write().remove(&id)
    }

    fn all(&self) -> Vec<Location> {
        self.locations.read().values().cloned().collect()
    }

    fn delete_all(&self) {
        self.locations.write().clear();
    }
}

#[derive(Debug, Default)]
pub struct InMemoryVehicleRepository {
    vehicles: RwLock<BTreeMap<VehicleId, Vehicle>>,
}

impl InMemoryVehicleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VehicleRepository for InMemoryVehicleRepository {
    fn save(&self, vehicle: Vehicle) -> bool {
        let mut vehicles = self.vehicles.write();
        if vehicles.contains_key(&vehicle.id()) {
            return false;
        }
        vehicles.insert(vehicle.id(), vehicle);
        true
    }

    fn find(&self, id: VehicleId) -> Option<Vehicle> {
        self.vehicles.read().get(&id).cloned()
    }

    fn delete(&self, id: VehicleId) -> Option<Vehicle> {
        self.vehicles.write().remove(&id)
    }

    fn change_capacity(&self, id: VehicleId, capacity: u32) -> Option<Vehicle> {
        let mut vehicles = self.vehicles.write();
        let vehicle = vehicles.get_mut(&id)?;
        vehicle.set_capacity(capacity);
        Some(vehicle.clone())
    }

    fn all(&self) -> Vec<Vehicle> {
        self.vehicles.read().values().cloned().collect()
    }

    fn delete_all(&self) {
        self.vehicles.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coordinates;

    #[test]
    fn test_location_save_rejects_duplicates() {
        let repository = InMemoryLocationRepository::new();
        let location = Location::new(LocationId(1), Coordinates::new(36.1, -115.1), "depot");

        assert!(repository.save(location.clone()));
        assert!(!repository.save(location));
        assert_eq!(repository.all().len(), 1);
        assert!(repository.delete(LocationId(1)).is_some());
        assert!(repository.find(LocationId(1)).is_none());
    }

    #[test]
    fn test_vehicle_capacity_change() {
        let repository = InMemoryVehicleRepository::new();
        repository.save(Vehicle::new(VehicleId(1), "Truck 1", 10));

        let changed = repository.change_capacity(VehicleId(1), 25).unwrap();

        assert_eq!(changed.capacity(), 25);
        assert_eq!(repository.find(VehicleId(1)).unwrap().capacity(), 25);
        assert!(repository.change_capacity(VehicleId(2), 5).is_none());
    }
}
