//! Cache Store Module
//!
//! Main cache engine: owns the entry map, enforces TTL and byte capacity,
//! runs values through the transform pipeline and mirrors every mutation
//! into the persistence bridge.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::cache::eviction;
use crate::cache::transform::{self, Obfuscator, TransformFlags};
use crate::cache::{CacheEntry, CacheStats, Clock, OperationCounters};
use crate::config::{CacheConfig, EvictionMode};
use crate::error::{CacheError, Result};
use crate::persistence::PersistenceBridge;

// == Set Options ==
/// Per-write overrides. `None` falls back to the configuration default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOptions {
    /// Lifetime in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt: Option<bool>,
}

impl SetOptions {
    pub fn ttl(ttl_ms: u64) -> Self {
        Self {
            ttl_ms: Some(ttl_ms),
            ..Self::default()
        }
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    pub fn with_encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = Some(encrypt);
        self
    }
}

// == Cache Store ==
/// Entry map with TTL expiry, byte-bounded eviction and write-through
/// persistence.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-entry storage
    entries: HashMap<String, CacheEntry>,
    /// Lifetime operation counters
    counters: OperationCounters,
    /// Capacity in payload bytes
    max_size_bytes: usize,
    /// TTL for writes without an override
    default_ttl_ms: u64,
    /// Transforms for writes without an override
    default_flags: TransformFlags,
    eviction_mode: EvictionMode,
    obfuscator: Obfuscator,
    bridge: PersistenceBridge,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store from configuration and rehydrates it from the bridge.
    ///
    /// Entries that expired while the process was down are purged.
    pub fn new(config: &CacheConfig, bridge: PersistenceBridge, clock: Arc<dyn Clock>) -> Self {
        let mut store = Self {
            entries: bridge.load(),
            counters: OperationCounters::default(),
            max_size_bytes: config.max_size_bytes,
            default_ttl_ms: config.default_ttl_ms,
            default_flags: TransformFlags {
                compress: config.enable_compression,
                encrypt: config.enable_encryption,
            },
            eviction_mode: config.eviction_mode,
            obfuscator: Obfuscator::new(config.encryption_key.as_deref()),
            bridge,
            clock,
        };

        if store.purge_expired() > 0 {
            store.persist();
        }
        store
    }

    // == Set ==
    /// Stores a value, replacing any previous entry under `key`.
    ///
    /// The value is serialized, compressed and obfuscated according to
    /// `options` and the configured defaults. If the write would exceed the
    /// byte capacity, expired entries are purged and the least-used entries
    /// evicted first. Capacity pressure never fails a write: a value larger
    /// than the whole capacity is stored once eviction has run, leaving the
    /// store over capacity. On error the store is left untouched.
    pub fn set<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        options: SetOptions,
    ) -> Result<()> {
        validate_key(key)?;

        let ttl_ms = options.ttl_ms.unwrap_or(self.default_ttl_ms);
        let flags = TransformFlags {
            compress: options.compress.unwrap_or(self.default_flags.compress),
            encrypt: options.encrypt.unwrap_or(self.default_flags.encrypt),
        };

        let payload = transform::serialize(value)
            .and_then(|bytes| transform::encode(bytes, flags, &self.obfuscator))
            .map_err(|e| {
                error!(key, error = %e, "Failed to encode cache value");
                e
            })?;

        let size = payload.len();
        self.make_room(key, size);

        let now = self.clock.now_ms();
        let entry = CacheEntry::new(
            key.to_string(),
            payload,
            ttl_ms,
            flags.compress,
            flags.encrypt,
            now,
        );
        self.entries.insert(key.to_string(), entry);
        self.persist();

        info!(
            key,
            size,
            compressed = flags.compress,
            encrypted = flags.encrypt,
            "Entry added to cache"
        );
        Ok(())
    }

    // == Get ==
    /// Retrieves and decodes a live value.
    ///
    /// Expired entries are removed. A successful lookup bumps the entry's
    /// access count and last-access time. Decode failures are logged and
    /// reported as a miss; an entry whose payload is damaged is dropped,
    /// while one that merely fails to deserialize as `V` is kept.
    pub fn get<V: DeserializeOwned>(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();

        let decoded = match self.entries.get_mut(key) {
            None => {
                self.counters.record_miss();
                return None;
            }
            Some(entry) if entry.is_expired(now) => None,
            Some(entry) => {
                entry.touch(now);
                let flags = TransformFlags {
                    compress: entry.compressed,
                    encrypt: entry.encrypted,
                };
                Some(
                    transform::decode(&entry.payload, flags, &self.obfuscator)
                        .and_then(|bytes| transform::deserialize::<V>(&bytes)),
                )
            }
        };

        let result = match decoded {
            None => {
                self.expire(key);
                self.counters.record_miss();
                None
            }
            Some(Ok(value)) => {
                self.counters.record_hit();
                Some(value)
            }
            Some(Err(e)) => {
                self.counters.record_miss();
                if e.is_corruption() {
                    self.entries.remove(key);
                    error!(key, error = %e, "Cache entry is corrupt, removed");
                } else {
                    error!(key, error = %e, "Failed to decode cache entry");
                }
                None
            }
        };

        self.persist();
        result
    }

    // == Delete ==
    /// Removes an entry. Returns whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.persist();
            info!(key, "Entry removed from cache");
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Removes every entry and persists the empty store.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
        info!("Cache cleared");
    }

    // == Has ==
    /// Checks for a live entry without decoding it or touching its stats.
    pub fn has(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        match self.entries.get(key) {
            None => false,
            Some(entry) if entry.is_expired(now) => {
                self.expire(key);
                self.persist();
                false
            }
            Some(_) => true,
        }
    }

    // == Keys ==
    /// Sweeps expired entries, then returns the live keys in sorted order.
    pub fn keys(&mut self) -> Vec<String> {
        self.sweep();
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    // == Size ==
    /// Sweeps expired entries, then returns the live entry count.
    pub fn size(&mut self) -> usize {
        self.sweep();
        self.entries.len()
    }

    // == Stats ==
    /// Aggregate statistics over resident entries. No expiry sweep runs.
    pub fn stats(&self) -> CacheStats {
        CacheStats::collect(self.entries.values(), self.counters)
    }

    // == Invalidate Pattern ==
    /// Removes every entry whose key matches `pattern`. Returns the count.
    pub fn invalidate_pattern(&mut self, pattern: &Regex) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !pattern.is_match(key));
        let removed = before - self.entries.len();

        if removed > 0 {
            self.persist();
            info!(pattern = pattern.as_str(), removed, "Entries invalidated by pattern");
        }
        removed
    }

    // == Preload ==
    /// Writes a placeholder for each key without a live entry.
    ///
    /// Returns how many placeholders were written.
    pub fn preload<I, S>(&mut self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut written = 0;
        for key in keys {
            let key = key.as_ref();
            if self.has(key) {
                continue;
            }
            let placeholder = json!({ "preloaded": true, "timestamp": self.clock.now_ms() });
            self.set(key, &placeholder, SetOptions::default())?;
            written += 1;
        }

        info!(written, "Cache preloaded");
        Ok(written)
    }

    // == Inspection ==
    /// Raw entry as stored, without expiry checks or access accounting.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Sum of resident payload sizes in bytes.
    pub fn total_size(&self) -> usize {
        self.entries.values().map(|e| e.size_bytes).sum()
    }

    // == Internals ==
    fn persist(&self) {
        self.bridge.save(&self.entries);
    }

    fn expire(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.counters.record_expirations(1);
            debug!(key, "Expired entry removed");
        }
    }

    fn sweep(&mut self) {
        if self.purge_expired() > 0 {
            self.persist();
        }
    }

    /// Removes every expired entry without persisting.
    fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();

        if removed > 0 {
            self.counters.record_expirations(removed);
            info!(removed, "Expired entries cleaned up");
        }
        removed
    }

    fn fits(&self, key: &str, incoming: usize) -> bool {
        let resident: usize = self
            .entries
            .values()
            .filter(|e| e.key != key)
            .map(|e| e.size_bytes)
            .sum();
        resident + incoming <= self.max_size_bytes
    }

    /// Frees space for an `incoming`-byte write to `key`.
    fn make_room(&mut self, key: &str, incoming: usize) {
        if self.fits(key, incoming) {
            return;
        }

        self.purge_expired();

        let mut evicted = 0;
        while !self.fits(key, incoming) {
            let victims = eviction::select_victims(self.entries.values(), key);
            if victims.is_empty() {
                break;
            }
            for victim in &victims {
                self.entries.remove(victim);
            }
            evicted += victims.len();

            if self.eviction_mode == EvictionMode::SinglePass {
                break;
            }
        }

        if evicted > 0 {
            self.counters.record_evictions(evicted);
            info!(removed = evicted, "Least-used entries evicted");
        }
        if !self.fits(key, incoming) {
            warn!(
                key,
                incoming,
                capacity = self.max_size_bytes,
                "Eviction pass did not free enough space"
            );
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    Ok(())
}
