//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access metadata.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// == Cache Entry ==
/// A single stored item: the transformed payload plus the metadata needed
/// to expire it, rank it for eviction and reverse its transforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Entry identity, always equal to its map key
    pub key: String,
    /// Post-transform bytes
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
    /// Time of the last write (Unix milliseconds)
    pub created_at: u64,
    /// Lifetime in milliseconds, counted from `created_at`
    pub ttl_ms: u64,
    /// Length of `payload`
    pub size_bytes: usize,
    /// Payload was gzip-compressed
    pub compressed: bool,
    /// Payload was obfuscated
    pub encrypted: bool,
    /// Successful reads since the last write
    pub access_count: u64,
    /// Time of the last successful read (Unix milliseconds)
    pub last_accessed_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a fresh entry written at `now`.
    pub fn new(
        key: String,
        payload: Vec<u8>,
        ttl_ms: u64,
        compressed: bool,
        encrypted: bool,
        now: u64,
    ) -> Self {
        let size_bytes = payload.len();
        Self {
            key,
            payload,
            created_at: now,
            ttl_ms,
            size_bytes,
            compressed,
            encrypted,
            access_count: 0,
            last_accessed_at: now,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once strictly more than `ttl_ms` has elapsed since
    /// it was written; at exactly `ttl_ms` it is still live.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > self.ttl_ms
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self, now: u64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now;
    }
}

mod payload_base64 {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
