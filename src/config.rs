//! Planner configuration, loadable from a JSON file.
//!
//! Every field has a default, so `{}` is a valid configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::distance::{InMemoryDistanceStore, JsonFileDistanceStore};
use crate::error::{ConfigError, StoreError};
use crate::osrm::OsrmConfig;
use crate::traits::DistanceStore;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub distance: DistanceConfig,
    pub solver: SolverConfig,
    pub provider: ProviderKind,
    pub osrm: OsrmConfig,
    /// Demand of visits added without an explicit one.
    pub default_visit_demand: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            distance: DistanceConfig::default(),
            solver: SolverConfig::default(),
            provider: ProviderKind::default(),
            osrm: OsrmConfig::default(),
            default_visit_demand: 1,
        }
    }
}

impl PlannerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Compute the pairs of a new location on the rayon pool.
    pub parallel: bool,
    /// Distances persist to this JSON-lines file. In memory when unset.
    pub store_path: Option<PathBuf>,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            store_path: None,
        }
    }
}

impl DistanceConfig {
    pub fn open_store(&self) -> Result<Arc<dyn DistanceStore>, StoreError> {
        match &self.store_path {
            Some(path) => Ok(Arc::new(JsonFileDistanceStore::open(path)?)),
            None => Ok(Arc::new(InMemoryDistanceStore::new())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// How long the solver thread blocks waiting for problem changes once
    /// the search stops improving.
    pub idle_wait_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { idle_wait_ms: 50 }
    }
}

impl SolverConfig {
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

/// Travel provider used for both costs and route tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Haversine,
    Osrm,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = PlannerConfig::from_json_str("{}").unwrap();
        assert!(config.distance.parallel);
        assert!(config.distance.store_path.is_none());
        assert_eq!(config.solver.idle_wait(), Duration::from_millis(50));
        assert_eq!(config.provider, ProviderKind::Haversine);
        assert_eq!(config.osrm.profile, "car");
        assert_eq!(config.default_visit_demand, 1);
    }

    #[test]
    fn test_partial_override() {
        let config = PlannerConfig::from_json_str(
            r#"{"provider":"osrm","osrm":{"base_url":"http://osrm:5000"},"solver":{"idle_wait_ms":5}}"#,
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Osrm);
        assert_eq!(config.osrm.base_url, "http://osrm:5000");
        assert_eq!(config.osrm.timeout_secs, 10);
        assert_eq!(config.solver.idle_wait_ms, 5);
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let err = PlannerConfig::from_json_str("{\"solver\":").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = PlannerConfig::from_json_file("/nonexistent/planner.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
