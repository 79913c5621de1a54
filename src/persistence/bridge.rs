//! Persistence Bridge
//!
//! Serializes the whole entry map into one versioned snapshot. Failures are
//! logged here and never reach cache callers: the in-memory store stays
//! authoritative when the medium misbehaves.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CacheEntry;
use crate::error::PersistenceError;
use crate::persistence::KeyValueStorage;

/// Snapshot schema version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    entries: Vec<&'a CacheEntry>,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<CacheEntry>,
}

// == Persistence Bridge ==
/// Reads and writes the cache snapshot under a fixed storage key.
#[derive(Debug, Clone)]
pub struct PersistenceBridge {
    storage: Arc<dyn KeyValueStorage>,
    storage_key: String,
}

impl PersistenceBridge {
    pub fn new(storage: Arc<dyn KeyValueStorage>, storage_key: impl Into<String>) -> Self {
        Self {
            storage,
            storage_key: storage_key.into(),
        }
    }

    // == Load ==
    /// Rehydrates the entry map.
    ///
    /// Missing, unreadable, corrupt or foreign-version snapshots all yield an
    /// empty map.
    pub fn load(&self) -> HashMap<String, CacheEntry> {
        let raw = match self.storage.get_item(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!(storage_key = %self.storage_key, "No persisted cache found, starting empty");
                return HashMap::new();
            }
            Err(e) => {
                warn!(storage_key = %self.storage_key, error = %e, "Failed to read persisted cache");
                return HashMap::new();
            }
        };

        let snapshot: Snapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(storage_key = %self.storage_key, error = %e, "Persisted cache is corrupt, discarding");
                return HashMap::new();
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                storage_key = %self.storage_key,
                found = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "Persisted cache has an incompatible version, discarding"
            );
            return HashMap::new();
        }

        let entries: HashMap<String, CacheEntry> = snapshot
            .entries
            .into_iter()
            .map(|entry| (entry.key.clone(), entry))
            .collect();

        info!(entries = entries.len(), "Cache loaded from storage");
        entries
    }

    // == Save ==
    /// Rewrites the full snapshot. Returns false if the medium rejected it.
    pub fn save(&self, entries: &HashMap<String, CacheEntry>) -> bool {
        match self.try_save(entries) {
            Ok(bytes) => {
                debug!(entries = entries.len(), bytes, "Cache persisted");
                true
            }
            Err(e) => {
                warn!(storage_key = %self.storage_key, error = %e, "Failed to persist cache");
                false
            }
        }
    }

    fn try_save(&self, entries: &HashMap<String, CacheEntry>) -> Result<usize, PersistenceError> {
        let mut sorted: Vec<&CacheEntry> = entries.values().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));

        let raw = serde_json::to_string(&SnapshotRef {
            version: SNAPSHOT_VERSION,
            entries: sorted,
        })?;
        self.storage.set_item(&self.storage_key, &raw)?;
        Ok(raw.len())
    }
}
