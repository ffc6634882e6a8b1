//! Subscriber setup. Library code only emits through `tracing` macros; the
//! host process calls `init_tracing` once.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "ROLLUP_LOG";

fn build_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Returns false if one was already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> bool {
    let filter = build_filter(config);
    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
            .is_ok()
    }
}

/// Test logging through the libtest capture writer. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .try_init();
}
