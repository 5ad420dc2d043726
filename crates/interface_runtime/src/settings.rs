//! Runtime settings

use serde::Deserialize;

use core_kernel::CoreError;
use domain_processing::DispatcherConfig;
use domain_verification::EngineConfig;

/// Process-level settings read from `RUNTIME_*` variables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ProcessSettings {
    log_level: String,
    demo_claims: usize,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            demo_claims: 3,
        }
    }
}

/// Everything the binary needs to start
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Claims verified by the dry run
    pub demo_claims: usize,
    pub dispatcher: DispatcherConfig,
    pub engine: EngineConfig,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        let process = ProcessSettings::default();
        Self {
            log_level: process.log_level,
            demo_claims: process.demo_claims,
            dispatcher: DispatcherConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl RuntimeSettings {
    /// Loads settings from `RUNTIME_*`, `PIPELINE_*` and `VERIFICATION_*`
    ///
    /// Call `dotenvy::dotenv()` first to pick up a local `.env` file.
    pub fn from_env() -> Result<Self, CoreError> {
        let process: ProcessSettings = config::Config::builder()
            .add_source(config::Environment::with_prefix("RUNTIME").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CoreError::configuration(e.to_string()))?;

        Ok(Self {
            log_level: process.log_level,
            demo_claims: process.demo_claims,
            dispatcher: DispatcherConfig::from_env()?,
            engine: EngineConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.demo_claims, 3);
        assert_eq!(settings.dispatcher.max_concurrent_jobs, 3);
        assert_eq!(settings.engine.min_spatial_confidence, 0.6);
    }
}
