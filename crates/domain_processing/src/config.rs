//! Dispatcher configuration

use std::time::Duration;

use serde::Deserialize;

use core_kernel::CoreError;

/// Lowest accepted concurrency bound
pub const MIN_CONCURRENT_JOBS: usize = 1;
/// Highest accepted concurrency bound
pub const MAX_CONCURRENT_JOBS: usize = 10;

/// Clamps a requested concurrency bound into the accepted range
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(MIN_CONCURRENT_JOBS, MAX_CONCURRENT_JOBS)
}

/// Runtime configuration of the document pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Maximum requests analysed at the same time
    pub max_concurrent_jobs: usize,
    /// Retries allowed per request before a failure becomes terminal
    pub max_retries: u32,
    /// Fallback wake-up interval of the dispatch loop
    pub poll_interval: Duration,
    /// Upper bound on a single analysis call
    pub job_timeout: Duration,
    /// Delay before a failed request re-enters the queue
    pub retry_delay: Duration,
    /// How long completed batches are kept; `None` keeps them until cleared
    pub batch_retention: Option<Duration>,
    /// Buffered events per subscriber
    pub event_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            max_retries: 3,
            poll_interval: Duration::from_millis(1000),
            job_timeout: Duration::from_secs(300),
            retry_delay: Duration::ZERO,
            batch_retention: None,
            event_capacity: 1024,
        }
    }
}

/// Raw settings as read from the environment
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    pub max_concurrent_jobs: usize,
    pub max_retries: u32,
    pub poll_interval_ms: u64,
    pub job_timeout_secs: u64,
    pub retry_delay_ms: u64,
    pub batch_retention_secs: Option<u64>,
    pub event_capacity: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        let config = DispatcherConfig::default();
        Self {
            max_concurrent_jobs: config.max_concurrent_jobs,
            max_retries: config.max_retries,
            poll_interval_ms: config.poll_interval.as_millis() as u64,
            job_timeout_secs: config.job_timeout.as_secs(),
            retry_delay_ms: 0,
            batch_retention_secs: None,
            event_capacity: config.event_capacity,
        }
    }
}

impl From<DispatcherSettings> for DispatcherConfig {
    fn from(settings: DispatcherSettings) -> Self {
        Self {
            max_concurrent_jobs: clamp_concurrency(settings.max_concurrent_jobs),
            max_retries: settings.max_retries,
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            job_timeout: Duration::from_secs(settings.job_timeout_secs.max(1)),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            batch_retention: settings.batch_retention_secs.map(Duration::from_secs),
            event_capacity: settings.event_capacity.max(1),
        }
    }
}

impl DispatcherConfig {
    /// Loads configuration from `PIPELINE_*` environment variables
    ///
    /// Unset variables keep their defaults; out-of-range concurrency is clamped.
    pub fn from_env() -> Result<Self, CoreError> {
        let settings: DispatcherSettings = config::Config::builder()
            .add_source(config::Environment::with_prefix("PIPELINE").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CoreError::configuration(e.to_string()))?;
        Ok(settings.into())
    }

    pub fn with_max_concurrent_jobs(mut self, n: usize) -> Self {
        self.max_concurrent_jobs = clamp_concurrency(n);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_batch_retention(mut self, retention: Duration) -> Self {
        self.batch_retention = Some(retention);
        self
    }
}
