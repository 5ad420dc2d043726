//! Verification engine configuration

use std::time::Duration;

use serde::Deserialize;

use core_kernel::CoreError;

/// Runtime configuration of the verification engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on waiting for a text extraction batch
    pub extraction_timeout: Duration,
    /// Batch status is re-checked this often while waiting for its event
    pub batch_poll_interval: Duration,
    /// Lowest accepted spatial linkage confidence
    pub min_spatial_confidence: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extraction_timeout: Duration::from_secs(600),
            batch_poll_interval: Duration::from_secs(1),
            min_spatial_confidence: 0.6,
        }
    }
}

/// Raw settings as read from the environment
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub extraction_timeout_secs: u64,
    pub batch_poll_interval_ms: u64,
    pub min_spatial_confidence: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            extraction_timeout_secs: config.extraction_timeout.as_secs(),
            batch_poll_interval_ms: config.batch_poll_interval.as_millis() as u64,
            min_spatial_confidence: config.min_spatial_confidence,
        }
    }
}

impl From<EngineSettings> for EngineConfig {
    fn from(settings: EngineSettings) -> Self {
        Self {
            extraction_timeout: Duration::from_secs(settings.extraction_timeout_secs.max(1)),
            batch_poll_interval: Duration::from_millis(settings.batch_poll_interval_ms.max(1)),
            min_spatial_confidence: settings.min_spatial_confidence.clamp(0.0, 1.0),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `VERIFICATION_*` environment variables
    pub fn from_env() -> Result<Self, CoreError> {
        let settings: EngineSettings = config::Config::builder()
            .add_source(config::Environment::with_prefix("VERIFICATION").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CoreError::configuration(e.to_string()))?;
        Ok(settings.into())
    }

    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    pub fn with_batch_poll_interval(mut self, interval: Duration) -> Self {
        self.batch_poll_interval = interval;
        self
    }

    pub fn with_min_spatial_confidence(mut self, confidence: f64) -> Self {
        self.min_spatial_confidence = confidence.clamp(0.0, 1.0);
        self
    }
}
