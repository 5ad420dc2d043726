//! Tracing initialisation

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::RuntimeError;

/// Builds the log filter: `RUST_LOG` when set, otherwise `log_level`
pub fn env_filter(log_level: &str) -> Result<EnvFilter, RuntimeError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(log_level).map_err(|e| RuntimeError::LogFilter {
        filter: log_level.to_string(),
        message: e.to_string(),
    })
}

/// Installs the global subscriber with the fmt layer
pub fn init_tracing(log_level: &str) -> Result<(), RuntimeError> {
    tracing_subscriber::registry()
        .with(env_filter(log_level)?)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|_| RuntimeError::TracingInitialised)
}
