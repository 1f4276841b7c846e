use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn default_filter() -> EnvFilter {
	// The env var takes precedence so operators can turn individual targets up or down.
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes the global tracing subscriber. Must be called at most once per process;
/// subsequent calls are rejected by the registry.
pub fn setup_logging() {
	tracing_subscriber::registry()
		.with(default_filter())
		.with(fmt::layer())
		.init();
}

pub mod testing {
	use once_cell::sync::Lazy;

	use super::*;

	static TRACING: Lazy<()> = Lazy::new(|| {
		// Tests run in one process; ignore the error when another test got here first.
		let _ = tracing_subscriber::registry()
			.with(default_filter())
			.with(fmt::layer().with_test_writer())
			.try_init();
	});

	pub fn setup_test_logging() {
		Lazy::force(&TRACING);
	}
}
