//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors surfaced to callers of the public cache API.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid key or value passed to an operation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Encoding or decoding a value failed
    #[error(transparent)]
    Transform(#[from] TransformError),
}

// == Transform Error Enum ==
/// Failures inside the compress/encrypt pipeline.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Value could not be serialized to JSON
    #[error("Serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Decoded bytes did not deserialize into the requested type
    #[error("Deserialization failed: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// Gzip encoder failed
    #[error("Compression failed: {0}")]
    Compress(#[source] std::io::Error),

    /// Payload is not valid gzip
    #[error("Decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    /// Payload is truncated or its integrity tag does not match
    #[error("Decryption failed: {0}")]
    Decrypt(String),
}

impl TransformError {
    /// True when the stored payload itself is damaged, as opposed to a
    /// mismatch between the payload and the type the caller asked for.
    pub fn is_corruption(&self) -> bool {
        matches!(self, TransformError::Decompress(_) | TransformError::Decrypt(_))
    }
}

// == Persistence Error Enum ==
/// Failures of the external key-value medium.
///
/// These never leave the persistence bridge; they are logged there.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The medium has no room for the value
    #[error("Storage quota exceeded: needed {needed} bytes, capacity {capacity} bytes")]
    QuotaExceeded { needed: usize, capacity: usize },

    /// Underlying I/O failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded
    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// == Replay Error ==
/// A queued offline action failed while being replayed.
#[derive(Error, Debug)]
#[error("Replay of {action} queued at {enqueued_at} failed: {source}")]
pub struct ReplayError {
    /// Action tag (`SET`, `DELETE`, `CLEAR`)
    pub action: &'static str,
    /// Enqueue timestamp (Unix milliseconds)
    pub enqueued_at: u64,
    /// Underlying failure
    #[source]
    pub source: CacheError,
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
