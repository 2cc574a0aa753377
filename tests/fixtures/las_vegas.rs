//! Real Las Vegas / Henderson places for realistic test fixtures.
//!
//! Coordinates sourced from OpenStreetMap.

use vrp_live_planner::{Coordinates, Location, LocationId};

/// A named point on the map.
#[derive(Debug, Clone, Copy)]
pub struct Place {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Place {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    pub fn location(&self, id: i64) -> Location {
        Location::new(LocationId(id), self.coordinates(), self.name)
    }
}

/// Good depot candidates.
pub const CASINOS: &[Place] = &[
    Place::new("Bellagio", 36.1126, -115.1767),
    Place::new("Wynn Las Vegas", 36.1263781, -115.1658180),
    Place::new("MGM Grand", 36.1023654, -115.1688720),
];

/// Spread across the metro area.
pub const STOPS: &[Place] = &[
    Place::new("Rivas Mexican Grill North", 36.1450055, -115.0482587),
    Place::new("Beers and Bets", 36.1428945, -115.1573836),
    Place::new("Bootlegger Bistro", 36.0492047, -115.1715744),
    Place::new("Budget Suites South", 36.0366259, -115.1713361),
    Place::new("Green Valley Ranch Area", 36.0308, -115.0825),
    Place::new("Sunset Station Area", 36.0614, -115.0631),
    Place::new("Longhorn Casino", 36.1070664, -115.0591256),
    Place::new("I Love Sushi Henderson", 35.9916660, -115.1028343),
    Place::new("Islander's Grill", 36.0335058, -114.9856162),
];

/// The depot as location 1 followed by `count` stops numbered from 2.
pub fn depot_and_stops(count: usize) -> Vec<Location> {
    std::iter::once(CASINOS[0].location(1))
        .chain(STOPS.iter().take(count).zip(2..).map(|(place, id)| place.location(id)))
        .collect()
}
