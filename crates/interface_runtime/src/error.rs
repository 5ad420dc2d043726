//! Runtime error handling

use thiserror::Error;

use core_kernel::CoreError;
use domain_verification::VerificationError;

/// Runtime error types
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] CoreError),

    #[error("Invalid log filter '{filter}': {message}")]
    LogFilter { filter: String, message: String },

    #[error("Tracing already initialised")]
    TracingInitialised,

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("Runtime task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
