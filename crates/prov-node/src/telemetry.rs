//! Log subscriber setup for embedders.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::error::{NodeError, NodeResult};

/// Overrides `log.level` when set, using `EnvFilter` directive syntax.
pub const LOG_ENV_VAR: &str = "PROV_LOG";

pub fn build_filter(level: &str) -> NodeResult<EnvFilter> {
    let directives = std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| level.to_string());
    EnvFilter::try_new(&directives)
        .map_err(|e| NodeError::Config(format!("invalid log filter '{directives}': {e}")))
}

/// Install the global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed, which is
/// the normal case when several nodes share a process.
pub fn init(config: &LogConfig) -> NodeResult<bool> {
    let filter = build_filter(&config.level)?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok())
}
