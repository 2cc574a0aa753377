//! Incremental, memoized travel distances between known locations.

mod cache;
mod store;

pub use cache::{DistanceCache, DistanceRow};
pub use store::{InMemoryDistanceStore, JsonFileDistanceStore};
