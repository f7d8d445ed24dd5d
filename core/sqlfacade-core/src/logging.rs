//! Logging utilities.
//!
//! Provides helpers for initializing a `tracing` subscriber. The core crate
//! itself only emits `tracing` events — it never configures a subscriber on
//! its own, since a library embedded in someone else's process must not
//! hijack their logging setup. These helpers exist for standalone binaries
//! and tests that want a reasonable default.

#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with default settings.
///
/// # Environment Variables
/// - `RUST_LOG` — log level filter (default: "info")
#[cfg(feature = "logging")]
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific default level.
///
/// `RUST_LOG`, if set, still takes precedence over `level`.
#[cfg(feature = "logging")]
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();
}

/// Initialize logging for tests. Safe to call from multiple test functions;
/// only the first call installs a subscriber.
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(not(feature = "logging"))]
pub fn init() {}

#[cfg(not(feature = "logging"))]
pub fn init_with_level(_level: &str) {}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
