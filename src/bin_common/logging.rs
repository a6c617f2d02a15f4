//! Logging initialization

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG` when set, otherwise `level`
pub fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize tracing with the configured level
pub fn init_logging_with_level(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level))
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .init();
}
