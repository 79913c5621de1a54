//! Cache Statistics Module
//!
//! Aggregate telemetry over resident entries plus lifetime operation counters.

use serde::Serialize;

use crate::cache::CacheEntry;

// == Operation Counters ==
/// Lifetime counters maintained by the store's operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounters {
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that found nothing live or failed to decode
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
}

impl OperationCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}

// == Cache Stats ==
/// Snapshot of the store returned by `get_stats`.
///
/// Computed over every resident entry, stale ones included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of resident entries
    pub total_entries: usize,
    /// Sum of stored payload sizes in bytes
    pub total_size: usize,
    /// Mean access count, 0.0 when empty
    pub average_access_count: f64,
    /// Earliest write timestamp, None when empty
    pub oldest_entry: Option<u64>,
    /// Latest write timestamp, None when empty
    pub newest_entry: Option<u64>,
    /// Fraction of entries stored compressed
    pub compression_ratio: f64,
    /// Fraction of entries stored obfuscated
    pub encryption_ratio: f64,
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that returned nothing
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed on expiry
    pub expirations: u64,
}

impl CacheStats {
    // == Collect ==
    /// Builds statistics from resident entries and the lifetime counters.
    pub fn collect<'a, I>(entries: I, counters: OperationCounters) -> Self
    where
        I: IntoIterator<Item = &'a CacheEntry>,
    {
        let mut stats = Self {
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expirations: counters.expirations,
            ..Self::default()
        };

        let mut access_total: u64 = 0;
        let mut compressed = 0usize;
        let mut encrypted = 0usize;

        for entry in entries {
            stats.total_entries += 1;
            stats.total_size += entry.size_bytes;
            access_total += entry.access_count;
            compressed += usize::from(entry.compressed);
            encrypted += usize::from(entry.encrypted);
            stats.oldest_entry = Some(
                stats
                    .oldest_entry
                    .map_or(entry.created_at, |t| t.min(entry.created_at)),
            );
            stats.newest_entry = Some(
                stats
                    .newest_entry
                    .map_or(entry.created_at, |t| t.max(entry.created_at)),
            );
        }

        if stats.total_entries > 0 {
            let n = stats.total_entries as f64;
            stats.average_access_count = access_total as f64 / n;
            stats.compression_ratio = compressed as f64 / n;
            stats.encryption_ratio = encrypted as f64 / n;
        }

        stats
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
