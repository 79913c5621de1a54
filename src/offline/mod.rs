//! Offline Module
//!
//! Deferred cache mutations recorded while disconnected and the
//! connectivity signal that triggers their replay.

mod connectivity;
mod queue;

pub use connectivity::Connectivity;
pub use queue::{OfflineAction, OfflineQueue, OfflineQueueItem};
