//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the cache.
//!
//! # Tasks
//! - Offline Sync: Replays the offline queue when connectivity returns and on a periodic poll

mod offline_sync;

pub use offline_sync::spawn_offline_sync_task;
