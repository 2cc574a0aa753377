//! Business entities shared by the repositories, the distance cache and the
//! solver's working copy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a [`Location`]. Visits reuse the id of their location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(pub i64);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a [`Vehicle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub i64);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (latitude, longitude) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<(f64, f64)> for Coordinates {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// A point on the map. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    coordinates: Coordinates,
    description: String,
}

impl Location {
    pub fn new(id: LocationId, coordinates: Coordinates, description: impl Into<String>) -> Self {
        Self {
            id,
            coordinates,
            description: description.into(),
        }
    }

    pub fn id(&self) -> LocationId {
        self.id
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A vehicle. The id never changes; the capacity may be edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    id: VehicleId,
    name: String,
    capacity: u32,
}

impl Vehicle {
    pub fn new(id: VehicleId, name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            capacity,
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: u32) {
        self.capacity = capacity;
    }
}

/// A location that has to be visited, together with the quantity delivered there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    location: Location,
    demand: u32,
}

impl Visit {
    pub fn new(location: Location, demand: u32) -> Self {
        Self { location, demand }
    }

    pub fn id(&self) -> LocationId {
        self.location.id()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn demand(&self) -> u32 {
        self.demand
    }
}
