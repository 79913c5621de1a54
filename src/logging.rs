//! Logging Module
//!
//! Installs the tracing subscriber used by applications embedding the cache.
//! The cache itself only emits `tracing` events; each carries its module path
//! as target and its context as structured fields.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "offline_cache=info";

/// Initializes a fmt subscriber with an env filter.
///
/// Defaults to [`DEFAULT_FILTER`], can be overridden with the RUST_LOG env
/// var. Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    init_tracing_with(DEFAULT_FILTER)
}

/// Same as [`init_tracing`] with a caller-supplied default filter.
pub fn init_tracing_with(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
