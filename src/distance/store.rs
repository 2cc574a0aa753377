//! Durable distance stores.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::LocationId;
use crate::error::StoreError;
use crate::traits::DistanceStore;

type Entries = FxHashMap<(LocationId, LocationId), u64>;

/// Process-local store. Survives a cache reset but not a restart.
#[derive(Debug, Default)]
pub struct InMemoryDistanceStore {
    entries: RwLock<Entries>,
}

impl InMemoryDistanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl DistanceStore for InMemoryDistanceStore {
    fn get(&self, from: LocationId, to: LocationId) -> Result<Option<u64>, StoreError> {
        Ok(self.entries.read().get(&(from, to)).copied())
    }

    fn put(&self, from: LocationId, to: LocationId, distance: u64) -> Result<(), StoreError> {
        self.entries.write().insert((from, to), distance);
        Ok(())
    }

    fn delete_all_involving(&self, id: LocationId) -> Result<(), StoreError> {
        self.entries
            .write()
            .retain(|(from, to), _| *from != id && *to != id);
        Ok(())
    }

    fn delete_all(&self) -> Result<(), StoreError> {
        self.entries.write().clear();
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DistanceRecord {
    from: LocationId,
    to: LocationId,
    distance: u64,
}

/// Append-only JSON-lines file store.
///
/// Every `put` appends one record. Deletions rewrite the file with the
/// remaining records. The whole file is indexed in memory on open.
#[derive(Debug)]
pub struct JsonFileDistanceStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl JsonFileDistanceStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut entries = Entries::default();

        if path.is_file() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<DistanceRecord>(&line) {
                    Ok(record) => {
                        entries.insert((record.from, record.to), record.distance);
                    }
                    // A torn final line after a crash loses one record, not the file.
                    Err(err) => warn!(path = %path.display(), %err, "skipping unreadable distance record"),
                }
            }
            debug!(path = %path.display(), entries = entries.len(), "restored distance store");
        }

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn rewrite(&self, entries: &Entries) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for (&(from, to), &distance) in entries {
            serde_json::to_writer(&mut writer, &DistanceRecord { from, to, distance })?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

impl DistanceStore for JsonFileDistanceStore {
    fn get(&self, from: LocationId, to: LocationId) -> Result<Option<u64>, StoreError> {
        Ok(self.entries.lock().get(&(from, to)).copied())
    }

    fn put(&self, from: LocationId, to: LocationId, distance: u64) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_vec(&DistanceRecord { from, to, distance })?;
        line.push(b'\n');
        file.write_all(&line)?;
        entries.insert((from, to), distance);
        Ok(())
    }

    fn delete_all_involving(&self, id: LocationId) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.retain(|(from, to), _| *from != id && *to != id);
        self.rewrite(&entries)
    }

    fn delete_all(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.clear();
        self.rewrite(&entries)
    }
}
