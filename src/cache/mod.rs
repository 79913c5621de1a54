//! Cache Module
//!
//! In-memory cache engine with TTL expiry, frequency-based eviction and a
//! compress/obfuscate transform pipeline.

mod clock;
mod entry;
pub mod eviction;
mod stats;
mod store;
pub mod transform;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use stats::{CacheStats, OperationCounters};
pub use store::{CacheStore, SetOptions};
pub use transform::{Obfuscator, TransformFlags};
