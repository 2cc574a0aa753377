//! Haversine travel provider (fallback when OSRM is unavailable).
//!
//! Uses great-circle distance in meters. Less accurate than OSRM (ignores
//! roads) but always available, and every pair of points is reachable.

use crate::domain::Coordinates;
use crate::error::DistanceError;
use crate::polyline::Polyline;
use crate::traits::{CostSource, PathProvider};

/// Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine-based cost source and path provider.
///
/// Distances are symmetric and tracks are straight segments.
#[derive(Debug, Clone, Default)]
pub struct Haversine;

impl Haversine {
    pub fn new() -> Self {
        Self
    }

    /// Great-circle distance between two points in meters.
    pub fn meters(from: Coordinates, to: Coordinates) -> f64 {
        let lat1_rad = from.lat.to_radians();
        let lat2_rad = to.lat.to_radians();
        let delta_lat = (to.lat - from.lat).to_radians();
        let delta_lng = (to.lng - from.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_M * c
    }
}

impl CostSource for Haversine {
    fn cost(&self, from: Coordinates, to: Coordinates) -> Result<Option<u64>, DistanceError> {
        Ok(Some(Self::meters(from, to).round() as u64))
    }
}

impl PathProvider for Haversine {
    fn path(&self, from: Coordinates, to: Coordinates) -> Result<Polyline, DistanceError> {
        Ok(Polyline::straight(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinates::new(36.1, -115.1);
        assert_eq!(Haversine.cost(point, point).unwrap(), Some(0));
    }

    #[test]
    fn test_haversine_known_distance() {
        // Las Vegas (36.17, -115.14) to Los Angeles (34.05, -118.24)
        // Actual distance ~370 km
        let meters = Haversine::meters(
            Coordinates::new(36.17, -115.14),
            Coordinates::new(34.05, -118.24),
        );
        assert!(
            meters > 350_000.0 && meters < 400_000.0,
            "LV to LA should be ~370km, got {}",
            meters
        );
    }

    #[test]
    fn test_cost_symmetric() {
        let a = Coordinates::new(36.1, -115.1);
        let b = Coordinates::new(36.2, -115.2);
        assert_eq!(Haversine.cost(a, b).unwrap(), Haversine.cost(b, a).unwrap());
    }

    #[test]
    fn test_path_is_straight_segment() {
        let a = Coordinates::new(36.1, -115.1);
        let b = Coordinates::new(36.2, -115.2);
        let path = Haversine.path(a, b).unwrap();
        assert_eq!(path.points(), &[a, b]);
    }
}
