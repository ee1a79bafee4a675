//! Test logging configuration utilities
//!
//! Provides functions to configure tracing/logging for tests
//! to prevent output pollution and enable debugging when needed.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize tracing for tests with a custom log level filter (e.g.
/// "debug", "warn", or a full directive string). `RUST_LOG` overrides the
/// given level.
///
/// The global subscriber can only be installed once per test process;
/// later calls are ignored.
pub fn init_test_logging(level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Suppress all logs for clean test output
///
/// Equivalent to `init_test_logging("error")` but more explicit.
pub fn suppress_logs() {
    init_test_logging("error");
}
