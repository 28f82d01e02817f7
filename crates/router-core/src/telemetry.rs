//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging at the configured level. `RUST_LOG` takes
/// precedence over the configuration when set. Safe to call once; subsequent
/// calls are ignored.
pub fn init_logging(level: &str) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(level.to_string()));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(true)
		.try_init();
}
