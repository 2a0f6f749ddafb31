//! Shared fixtures for the integration suite.


use tracing_subscriber::EnvFilter;

/// Install a test subscriber once; later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
