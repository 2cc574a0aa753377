//! OSRM HTTP adapter for travel costs and route tracks.

use serde::Deserialize;
use tracing::debug;

use crate::domain::Coordinates;
use crate::error::DistanceError;
use crate::polyline::Polyline;
use crate::traits::{CostSource, PathProvider};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(&self, from: Coordinates, to: Coordinates, with_geometry: bool) -> String {
        let overview = if with_geometry {
            "overview=full&geometries=geojson"
        } else {
            "overview=false"
        };
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?{}",
            self.config.base_url, self.config.profile, from.lng, from.lat, to.lng, to.lat, overview
        )
    }

    /// Returns `None` when OSRM reports that the points are not connected.
    fn fetch_route(
        &self,
        from: Coordinates,
        to: Coordinates,
        with_geometry: bool,
    ) -> Result<Option<OsrmRoute>, DistanceError> {
        let url = self.route_url(from, to, with_geometry);
        // OSRM answers NoRoute with a 400 and a JSON body, so the status is not checked.
        let body = self.client.get(url).send()?.json::<OsrmRouteResponse>()?;

        match body.code.as_str() {
            "Ok" => body
                .routes
                .into_iter()
                .next()
                .map(Some)
                .ok_or_else(|| DistanceError::Provider("OSRM returned no routes".to_string())),
            "NoRoute" | "NoSegment" => {
                debug!(code = %body.code, "OSRM found no route");
                Ok(None)
            }
            other => Err(DistanceError::Provider(format!(
                "OSRM responded with {}: {}",
                other,
                body.message.unwrap_or_default()
            ))),
        }
    }
}

impl CostSource for OsrmClient {
    fn cost(&self, from: Coordinates, to: Coordinates) -> Result<Option<u64>, DistanceError> {
        Ok(self
            .fetch_route(from, to, false)?
            .map(|route| route.distance.round() as u64))
    }
}

impl PathProvider for OsrmClient {
    fn path(&self, from: Coordinates, to: Coordinates) -> Result<Polyline, DistanceError> {
        let route = self.fetch_route(from, to, true)?.ok_or_else(|| {
            DistanceError::Provider(format!(
                "no path between ({}, {}) and ({}, {})",
                from.lat, from.lng, to.lat, to.lng
            ))
        })?;

        let points = route
            .geometry
            .map(|geometry| geometry.coordinates)
            .unwrap_or_default()
            .into_iter()
            .map(|[lng, lat]| Coordinates::new(lat, lng))
            .collect();

        Ok(Polyline::new(points))
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    geometry: Option<OsrmGeometry>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}
