//! Processing requests and submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, ClaimId, DocumentId, JobId};

use crate::error::ProcessingError;

/// Dispatch priority tier of a processing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    High,
    Normal,
    Low,
}

impl JobPriority {
    /// Sort rank, lower is dispatched first
    pub fn rank(self) -> u8 {
        match self {
            JobPriority::High => 0,
            JobPriority::Normal => 1,
            JobPriority::Low => 2,
        }
    }
}

/// A document handed to the pipeline by a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSubmission {
    /// Document being analysed
    pub document_id: DocumentId,
    /// Claim the document belongs to, if known
    pub claim_id: Option<ClaimId>,
    /// Location of the scanned file
    pub file_path: String,
    /// File type hint for the analyser (e.g. "pdf", "tiff")
    pub file_type: String,
    /// Explicit priority; each submission path applies its own default
    pub priority: Option<JobPriority>,
}

impl DocumentSubmission {
    /// Creates a submission with no claim and the path's default priority
    pub fn new(document_id: DocumentId, file_path: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            document_id,
            claim_id: None,
            file_path: file_path.into(),
            file_type: file_type.into(),
            priority: None,
        }
    }

    /// Attaches the owning claim
    pub fn for_claim(mut self, claim_id: ClaimId) -> Self {
        self.claim_id = Some(claim_id);
        self
    }

    /// Sets an explicit priority
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Checks the fields the analyser cannot work without
    pub fn validate(&self) -> Result<(), ProcessingError> {
        if self.file_path.trim().is_empty() {
            return Err(ProcessingError::InvalidSubmission {
                field: "file_path",
                message: "must not be empty".to_string(),
            });
        }
        if self.file_type.trim().is_empty() {
            return Err(ProcessingError::InvalidSubmission {
                field: "file_type",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// A unit of work waiting in, or dispatched from, the job queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRequest {
    pub id: JobId,
    pub document_id: DocumentId,
    pub claim_id: Option<ClaimId>,
    pub file_path: String,
    pub file_type: String,
    pub priority: JobPriority,
    /// Failed attempts so far
    pub attempts: u32,
    /// Retry ceiling; the failure after this many retries is terminal
    pub max_retries: u32,
    /// Owning batch, if submitted as part of one
    pub batch_id: Option<BatchId>,
    pub enqueued_at: DateTime<Utc>,
}

impl ProcessingRequest {
    /// Builds a request from a submission
    pub fn from_submission(
        submission: DocumentSubmission,
        default_priority: JobPriority,
        max_retries: u32,
        batch_id: Option<BatchId>,
    ) -> Self {
        Self {
            id: JobId::new_v7(),
            document_id: submission.document_id,
            claim_id: submission.claim_id,
            file_path: submission.file_path,
            file_type: submission.file_type,
            priority: submission.priority.unwrap_or(default_priority),
            attempts: 0,
            max_retries,
            batch_id,
            enqueued_at: Utc::now(),
        }
    }
}
