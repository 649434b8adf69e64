//! Tracing subscriber for tests

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber writing to the test harness.
///
/// Honors `RUST_LOG`, defaulting to debug for the feedloop crates. Safe to call from every
/// test: only the first call installs anything.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feedloop_runtime=debug,feedloop_core=debug"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
    if installed.is_ok() {
        tracing::debug!("test tracing installed");
    }
}
