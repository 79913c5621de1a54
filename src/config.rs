//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::error::{CacheError, Result};

/// How much eviction a single over-capacity write may trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionMode {
    /// Repeat fixed-fraction passes until the incoming entry fits
    #[default]
    UntilFits,
    /// One fixed-fraction pass per write, even if the entry still does not fit
    SinglePass,
}

impl FromStr for EvictionMode {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "until-fits" | "until_fits" => Ok(EvictionMode::UntilFits),
            "single-pass" | "single_pass" => Ok(EvictionMode::SinglePass),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown eviction mode '{}'",
                other
            ))),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum aggregate size of stored payloads in bytes
    pub max_size_bytes: usize,
    /// Default TTL in milliseconds for writes without an explicit TTL
    pub default_ttl_ms: u64,
    /// Compress values unless a write overrides it
    pub enable_compression: bool,
    /// Obfuscate values unless a write overrides it
    pub enable_encryption: bool,
    /// Run the background offline-queue replay task
    pub enable_offline_sync: bool,
    /// Interval in seconds between offline-queue polls
    pub sync_interval_secs: u64,
    /// Eviction behaviour on over-capacity writes
    pub eviction_mode: EvictionMode,
    /// Key under which the snapshot is stored in the persistent medium
    pub storage_key: String,
    /// Passphrase for the obfuscation transform.
    ///
    /// This is not key management: without it a built-in passphrase is used,
    /// and even with it the transform only hides data at rest.
    pub encryption_key: Option<String>,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE_BYTES` - Capacity in bytes (default: 50 MiB)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 24h)
    /// - `CACHE_ENABLE_COMPRESSION` - Compress by default (default: true)
    /// - `CACHE_ENABLE_ENCRYPTION` - Obfuscate by default (default: true)
    /// - `CACHE_ENABLE_OFFLINE_SYNC` - Start the replay task (default: true)
    /// - `CACHE_SYNC_INTERVAL` - Replay poll frequency in seconds (default: 30)
    /// - `CACHE_EVICTION_MODE` - `until-fits` or `single-pass` (default: until-fits)
    /// - `CACHE_STORAGE_KEY` - Snapshot key (default: offline-cache)
    /// - `CACHE_ENCRYPTION_KEY` - Obfuscation passphrase (default: built-in)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_size_bytes: env_parse("CACHE_MAX_SIZE_BYTES", defaults.max_size_bytes),
            default_ttl_ms: env_parse("CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            enable_compression: env_flag("CACHE_ENABLE_COMPRESSION", defaults.enable_compression),
            enable_encryption: env_flag("CACHE_ENABLE_ENCRYPTION", defaults.enable_encryption),
            enable_offline_sync: env_flag(
                "CACHE_ENABLE_OFFLINE_SYNC",
                defaults.enable_offline_sync,
            ),
            sync_interval_secs: env_parse("CACHE_SYNC_INTERVAL", defaults.sync_interval_secs),
            eviction_mode: env_parse("CACHE_EVICTION_MODE", defaults.eviction_mode),
            storage_key: env::var("CACHE_STORAGE_KEY").unwrap_or(defaults.storage_key),
            encryption_key: env::var("CACHE_ENCRYPTION_KEY").ok(),
        }
    }

    /// Rejects configurations the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size_bytes must be greater than zero".to_string(),
            ));
        }
        if self.default_ttl_ms == 0 {
            return Err(CacheError::InvalidConfig(
                "default_ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.sync_interval_secs == 0 {
            return Err(CacheError::InvalidConfig(
                "sync_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(CacheError::InvalidConfig(
                "storage_key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 50 * 1024 * 1024,
            default_ttl_ms: 24 * 60 * 60 * 1000,
            enable_compression: true,
            enable_encryption: true,
            enable_offline_sync: true,
            sync_interval_secs: 30,
            eviction_mode: EvictionMode::UntilFits,
            storage_key: "offline-cache".to_string(),
            encryption_key: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
