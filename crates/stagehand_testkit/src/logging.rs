//! Log output for tests.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber that writes to the test harness.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Calling this
/// more than once, or from several tests, is harmless.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
