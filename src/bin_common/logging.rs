//! Tracing setup shared by binaries

use tracing_subscriber::EnvFilter;

/// Initialise the global `tracing` subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to everything.
/// Safe to call more than once: later calls are ignored.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .try_init();
}
