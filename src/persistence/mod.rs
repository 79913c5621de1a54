//! Persistence Module
//!
//! Mirrors the in-memory store into an external key-value medium and
//! rehydrates it at startup.

mod bridge;
mod storage;

pub use bridge::{PersistenceBridge, SNAPSHOT_VERSION};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
