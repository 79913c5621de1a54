//! Cache Manager
//!
//! The process-wide cache handle. One manager is built at startup and cloned
//! into every consumer; clones share the same store and offline queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::{CacheEntry, CacheStats, CacheStore, Clock, SetOptions, SystemClock};
use crate::config::CacheConfig;
use crate::error::{ReplayError, Result};
use crate::offline::{Connectivity, OfflineAction, OfflineQueue, OfflineQueueItem};
use crate::persistence::{KeyValueStorage, PersistenceBridge};
use crate::tasks::spawn_offline_sync_task;

// == Sync Outcome ==
/// Result of one offline-queue replay pass.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Another pass was in flight; nothing was done
    AlreadyRunning,
    /// The queue was empty
    Empty,
    /// Every queued item was replayed, in order
    Completed { processed: Vec<OfflineQueueItem> },
    /// Replay stopped at a failing item, which stays queued with everything after it
    Halted {
        processed: Vec<OfflineQueueItem>,
        error: ReplayError,
    },
}

impl SyncOutcome {
    /// Items replayed during this pass, in replay order.
    pub fn processed(&self) -> &[OfflineQueueItem] {
        match self {
            SyncOutcome::Completed { processed } | SyncOutcome::Halted { processed, .. } => {
                processed
            }
            _ => &[],
        }
    }
}

/// Clears the in-flight flag when a replay pass ends, however it ends.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// == Cache Manager ==
/// Shared handle to the cache store and its offline queue.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Entry store
    store: Arc<RwLock<CacheStore>>,
    /// Deferred mutations awaiting replay
    queue: Arc<Mutex<OfflineQueue>>,
    /// Set while a replay pass runs
    sync_in_progress: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
    config: Arc<CacheConfig>,
}

impl CacheManager {
    // == Constructors ==
    /// Builds the manager over `storage`, loading any persisted entries.
    pub fn new(config: CacheConfig, storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        Self::with_clock(config, storage, Arc::new(SystemClock))
    }

    /// Same as [`CacheManager::new`] with an explicit time source.
    pub fn with_clock(
        config: CacheConfig,
        storage: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            max_size_bytes = config.max_size_bytes,
            default_ttl_ms = config.default_ttl_ms,
            compression = config.enable_compression,
            encryption = config.enable_encryption,
            offline_sync = config.enable_offline_sync,
            "Initializing cache"
        );

        let bridge = PersistenceBridge::new(storage, config.storage_key.clone());
        let store = CacheStore::new(&config, bridge, clock.clone());

        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            queue: Arc::new(Mutex::new(OfflineQueue::new())),
            sync_in_progress: Arc::new(AtomicBool::new(false)),
            clock,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Cache Operations ==
    /// Stores `value` under `key`. Encoding failures are returned.
    pub async fn set<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        options: SetOptions,
    ) -> Result<()> {
        self.store.write().await.set(key, value, options)
    }

    /// Returns the live value under `key`, or None if absent, expired or
    /// undecodable.
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.store.write().await.get(key)
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    pub async fn clear(&self) {
        self.store.write().await.clear()
    }

    pub async fn has(&self, key: &str) -> bool {
        self.store.write().await.has(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.store.write().await.keys()
    }

    pub async fn size(&self) -> usize {
        self.store.write().await.size()
    }

    /// Statistics over resident entries; does not sweep expired ones.
    pub async fn get_stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    pub async fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        self.store.write().await.invalidate_pattern(pattern)
    }

    pub async fn preload<I, S>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.store.write().await.preload(keys)
    }

    /// Raw stored entry, for diagnostics. No expiry check, no access touch.
    pub async fn inspect_entry(&self, key: &str) -> Option<CacheEntry> {
        self.store.read().await.entry(key).cloned()
    }

    // == Offline Queue ==
    /// Queues an action for replay once connectivity returns.
    /// Returns the queue length after the push.
    pub fn add_to_offline_queue(&self, action: OfflineAction) -> usize {
        let tag = action.tag();
        let queue_size = self.queue.lock().push(action, self.clock.now_ms());
        info!(action = tag, queue_size, "Action added to offline queue");
        queue_size
    }

    pub fn offline_queue_size(&self) -> usize {
        self.queue.lock().len()
    }

    /// Replays queued actions in enqueue order.
    ///
    /// Each item is removed only after it applied successfully. The first
    /// failure halts the pass and leaves that item and all later ones queued.
    /// Concurrent calls while a pass is running return immediately.
    pub async fn sync_offline_queue(&self) -> SyncOutcome {
        if self
            .sync_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Offline sync already in progress");
            return SyncOutcome::AlreadyRunning;
        }
        let _guard = SyncGuard(&self.sync_in_progress);

        let pending = self.offline_queue_size();
        if pending == 0 {
            return SyncOutcome::Empty;
        }
        info!(queue_size = pending, "Offline sync started");

        let mut processed = Vec::new();
        loop {
            let Some(item) = self.queue.lock().front().cloned() else {
                break;
            };

            let result = {
                let mut store = self.store.write().await;
                item.action.apply(&mut store)
            };

            match result {
                Ok(()) => {
                    self.queue.lock().pop_front();
                    debug!(
                        action = item.action.tag(),
                        enqueued_at = item.enqueued_at,
                        "Offline action replayed"
                    );
                    processed.push(item);
                }
                Err(source) => {
                    let error = ReplayError {
                        action: item.action.tag(),
                        enqueued_at: item.enqueued_at,
                        source,
                    };
                    error!(
                        error = %error,
                        replayed = processed.len(),
                        remaining = self.offline_queue_size(),
                        "Offline sync halted"
                    );
                    return SyncOutcome::Halted { processed, error };
                }
            }
        }

        info!(replayed = processed.len(), "Offline sync completed");
        SyncOutcome::Completed { processed }
    }

    /// Spawns the background replay task if offline sync is enabled.
    pub fn start_offline_sync(&self, connectivity: Connectivity) -> Option<JoinHandle<()>> {
        if !self.config.enable_offline_sync {
            info!("Offline sync disabled by configuration");
            return None;
        }
        Some(spawn_offline_sync_task(
            self.clone(),
            connectivity,
            Duration::from_secs(self.config.sync_interval_secs),
        ))
    }
}
