//! Verification domain errors

use std::time::Duration;

use thiserror::Error;

use core_kernel::{ClaimId, PortError};
use domain_processing::ProcessingError;

use crate::claim::ClaimStatus;
use crate::workflow::WorkflowStatus;

/// Errors returned by verification operations
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("No verification workflow for claim {0}")]
    WorkflowNotFound(ClaimId),

    #[error("A verification workflow already exists for claim {0}")]
    WorkflowExists(ClaimId),

    #[error("Workflow for claim {claim_id} is {status:?}")]
    WorkflowClosed { claim_id: ClaimId, status: WorkflowStatus },

    #[error("Claim {claim_id} cannot be verified while {status:?}")]
    ClaimNotEligible { claim_id: ClaimId, status: ClaimStatus },

    #[error("Step '{step}' is required and cannot be skipped")]
    StepNotSkippable { step: String },

    #[error("Invalid claim status transition from {from:?} to {to:?}")]
    InvalidClaimTransition { from: ClaimStatus, to: ClaimStatus },

    #[error("Invalid step catalog: {0}")]
    InvalidCatalog(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

/// Why a single step execution failed
///
/// Step failures put the workflow on hold; their message is stored on the step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{0}")]
    Check(String),

    #[error("step timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl StepError {
    pub fn check(message: impl Into<String>) -> Self {
        Self::Check(message.into())
    }
}
