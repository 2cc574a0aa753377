//! In-memory distance matrix grown one location at a time.
//!
//! Rows are keyed by the origin location. Reads of an inserted row only take
//! that row's read lock. Inserting a new location is serialized against other
//! inserts and removals, while the pairwise costs it needs are computed in
//! parallel from immutable inputs.
//!
//! Removing a location drops its row but leaves its column in the remaining
//! rows. The solver's working copy holds rows of its own planning locations
//! and may still look up a removed location until its removal has been
//! applied there. The stale cells are overwritten if the id is added again
//! and dropped on [`DistanceCache::clear`].

use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{Coordinates, Location, LocationId};
use crate::error::DistanceError;
use crate::traits::{CostSource, DistanceStore};

/// Distances from one location to every other known location.
#[derive(Debug)]
pub struct DistanceRow {
    from: LocationId,
    cells: RwLock<FxHashMap<LocationId, u64>>,
}

impl DistanceRow {
    pub fn new(from: LocationId, cells: impl IntoIterator<Item = (LocationId, u64)>) -> Self {
        Self {
            from,
            cells: RwLock::new(cells.into_iter().collect()),
        }
    }

    pub fn location_id(&self) -> LocationId {
        self.from
    }

    pub fn distance_to(&self, to: LocationId) -> Result<u64, DistanceError> {
        let cells = self.cells.read();
        cells.get(&to).copied().ok_or_else(|| {
            let mut known: Vec<LocationId> = cells.keys().copied().collect();
            known.sort();
            DistanceError::OutOfRange {
                from: self.from,
                to,
                known,
            }
        })
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }
}

struct CachedLocation {
    coordinates: Coordinates,
    row: Arc<DistanceRow>,
}

/// Memoizing distance cache backed by a cost source and a durable store.
pub struct DistanceCache {
    source: Arc<dyn CostSource>,
    store: Arc<dyn DistanceStore>,
    rows: RwLock<FxHashMap<LocationId, CachedLocation>>,
    write_lock: Mutex<()>,
    parallel: bool,
}

impl DistanceCache {
    pub fn new(source: Arc<dyn CostSource>, store: Arc<dyn DistanceStore>) -> Self {
        Self {
            source,
            store,
            rows: RwLock::new(FxHashMap::default()),
            write_lock: Mutex::new(()),
            parallel: true,
        }
    }

    /// Compute pairs on the calling thread only.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Adds `location` and computes its distances to and from every known
    /// location. Adding a location that is already present returns its
    /// existing row without touching the cost source.
    ///
    /// On failure the cache is left unchanged and the store holds no
    /// distance involving `location`.
    pub fn add_location(&self, location: &Location) -> Result<Arc<DistanceRow>, DistanceError> {
        let _guard = self.write_lock.lock();
        let id = location.id();
        let coordinates = location.coordinates();

        let others: Vec<(LocationId, Coordinates)> = {
            let rows = self.rows.read();
            if let Some(cached) = rows.get(&id) {
                return Ok(Arc::clone(&cached.row));
            }
            rows.iter()
                .map(|(&other_id, cached)| (other_id, cached.coordinates))
                .collect()
        };

        let compute = |&(other_id, other_coordinates): &(LocationId, Coordinates)| {
            let inbound = self.compute_or_restore(other_id, other_coordinates, id, coordinates)?;
            let outbound = self.compute_or_restore(id, coordinates, other_id, other_coordinates)?;
            Ok::<_, DistanceError>((other_id, inbound, outbound))
        };

        let computed = if self.parallel {
            others.par_iter().map(compute).collect::<Result<Vec<_>, _>>()
        } else {
            others.iter().map(compute).collect::<Result<Vec<_>, _>>()
        };
        let pairs = match computed {
            Ok(pairs) => pairs,
            Err(err) => {
                // Pairs computed before the failure were already persisted.
                self.store.delete_all_involving(id)?;
                warn!(location_id = %id, error = %err, "failed to add location to distance cache");
                return Err(err);
            }
        };

        let mut cells = FxHashMap::default();
        cells.insert(id, 0);
        let mut rows = self.rows.write();
        for &(other_id, inbound, outbound) in &pairs {
            cells.insert(other_id, outbound);
            if let Some(other) = rows.get(&other_id) {
                other.row.cells.write().insert(id, inbound);
            }
        }

        let row = Arc::new(DistanceRow::new(id, cells));
        rows.insert(
            id,
            CachedLocation {
                coordinates,
                row: Arc::clone(&row),
            },
        );
        info!(location_id = %id, pairs = pairs.len(), "added location to distance cache");

        Ok(row)
    }

    /// Drops the row of `id` and deletes every persisted distance that
    /// mentions it, in both directions.
    pub fn remove_location(&self, id: LocationId) -> Result<(), DistanceError> {
        let _guard = self.write_lock.lock();
        self.rows.write().remove(&id);
        self.store.delete_all_involving(id)?;
        debug!(location_id = %id, "removed location from distance cache");
        Ok(())
    }

    /// Drops every row and every persisted distance.
    pub fn clear(&self) -> Result<(), DistanceError> {
        let _guard = self.write_lock.lock();
        self.rows.write().clear();
        self.store.delete_all()?;
        info!("cleared distance cache");
        Ok(())
    }

    pub fn distance(&self, from: LocationId, to: LocationId) -> Result<u64, DistanceError> {
        self.rows
            .read()
            .get(&from)
            .ok_or(DistanceError::UnknownLocation(from))?
            .row
            .distance_to(to)
    }

    pub fn row(&self, id: LocationId) -> Option<Arc<DistanceRow>> {
        self.rows.read().get(&id).map(|cached| Arc::clone(&cached.row))
    }

    pub fn contains(&self, id: LocationId) -> bool {
        self.rows.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn compute_or_restore(
        &self,
        from: LocationId,
        from_coordinates: Coordinates,
        to: LocationId,
        to_coordinates: Coordinates,
    ) -> Result<u64, DistanceError> {
        if let Some(distance) = self.store.get(from, to)? {
            return Ok(distance);
        }

        let distance = self
            .source
            .cost(from_coordinates, to_coordinates)?
            .ok_or(DistanceError::NoRoute { from, to })?;
        self.store.put(from, to, distance)?;
        debug!(from = %from, to = %to, distance, "computed distance");

        Ok(distance)
    }
}
