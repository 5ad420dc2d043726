//! Processing domain errors

use thiserror::Error;

use core_kernel::{BatchId, PortError};

/// Errors that can occur in the processing domain
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Batch not found: {0}")]
    BatchNotFound(BatchId),

    #[error("Batch must contain at least one document")]
    EmptyBatch,

    #[error("Invalid submission: {field} {message}")]
    InvalidSubmission { field: &'static str, message: String },

    #[error("Pipeline is shut down")]
    ShutDown,

    #[error("Analysis timed out after {0}ms")]
    Timeout(u64),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Analysis task aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl ProcessingError {
    /// Returns true for errors produced by pipeline shutdown rather than by the document
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProcessingError::Cancelled | ProcessingError::ShutDown)
    }
}
