//! Process-wide tracing setup.

use tracing_subscriber::EnvFilter;

use crate::error::{MotoError, Result};

/// Build the filter: `RUST_LOG` wins, then `level`, then `info`.
pub fn env_filter(level: &str) -> EnvFilter {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    choose_filter(rust_log.as_deref(), level)
}

fn choose_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global fmt subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .try_init()
        .map_err(|e| MotoError::Config(format!("logging already initialised: {}", e)))
}
