//! Tracing subscriber setup.

use crate::config::LoggingConfig;
use crate::error::{CoreError, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Parse a filter directive such as `info,scout_runner=debug`.
pub fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| CoreError::Logging(format!("invalid log filter '{directive}': {e}")))
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured filter. Returns `Ok(false)` when a
/// subscriber was already installed (e.g. by a test harness).
pub fn init(config: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&config.filter)?,
    };

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_ansi(config.ansi))
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = %config.filter, "tracing initialized");
    }
    Ok(installed)
}
