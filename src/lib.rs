//! Offline Cache - A client-side cache engine
//!
//! Stores serializable values with TTL expiry, optional gzip compression and
//! at-rest obfuscation, byte-bounded least-used eviction, write-through
//! persistence into a pluggable key-value medium, and a queue of offline
//! mutations replayed in order when connectivity returns.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod offline;
pub mod persistence;
pub mod tasks;

pub use cache::{CacheEntry, CacheStats, SetOptions};
pub use config::{CacheConfig, EvictionMode};
pub use error::{CacheError, Result};
pub use manager::{CacheManager, SyncOutcome};
pub use offline::{Connectivity, OfflineAction};
pub use persistence::{FileStorage, KeyValueStorage, MemoryStorage};
pub use tasks::spawn_offline_sync_task;
