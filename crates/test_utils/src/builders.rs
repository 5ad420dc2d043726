//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults, so
//! tests only spell out the fields they care about.

use core_kernel::{ClaimId, DocumentId, UserId};
use domain_processing::{DocumentSubmission, JobPriority};
use domain_verification::{
    ClaimDocument, ClaimRecord, ClaimStatus, StepCatalog, VerificationWorkflow, WorkflowPriority,
};
use serde_json::json;

use crate::fixtures::DocumentFixtures;

/// Builder for claim records
pub struct ClaimRecordBuilder {
    claimant_name: String,
    status: ClaimStatus,
    documents: Vec<ClaimDocument>,
}

impl Default for ClaimRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimRecordBuilder {
    /// Creates a submitted claim with one document
    pub fn new() -> Self {
        Self {
            claimant_name: "Lakshmi Gond".to_string(),
            status: ClaimStatus::Submitted,
            documents: DocumentFixtures::documents(1),
        }
    }

    pub fn with_claimant(mut self, name: impl Into<String>) -> Self {
        self.claimant_name = name.into();
        self
    }

    pub fn with_status(mut self, status: ClaimStatus) -> Self {
        self.status = status;
        self
    }

    /// Replaces the documents with `count` fixture documents
    pub fn with_documents(mut self, count: usize) -> Self {
        self.documents = DocumentFixtures::documents(count);
        self
    }

    pub fn with_document(mut self, document: ClaimDocument) -> Self {
        self.documents.push(document);
        self
    }

    pub fn without_documents(mut self) -> Self {
        self.documents.clear();
        self
    }

    pub fn build(self) -> ClaimRecord {
        let mut claim = ClaimRecord::new(self.claimant_name);
        claim.status = self.status;
        claim.documents = self.documents;
        claim
    }
}

/// Builder for document submissions
pub struct SubmissionBuilder {
    document_id: DocumentId,
    claim_id: Option<ClaimId>,
    file_path: String,
    file_type: String,
    priority: Option<JobPriority>,
}

impl Default for SubmissionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionBuilder {
    pub fn new() -> Self {
        Self {
            document_id: DocumentId::new_v7(),
            claim_id: None,
            file_path: DocumentFixtures::scan_path(0),
            file_type: "pdf".to_string(),
            priority: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = path.into();
        self
    }

    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn for_claim(mut self, claim_id: ClaimId) -> Self {
        self.claim_id = Some(claim_id);
        self
    }

    pub fn build(self) -> DocumentSubmission {
        let mut submission = DocumentSubmission::new(self.document_id, self.file_path, self.file_type);
        if let Some(claim_id) = self.claim_id {
            submission = submission.for_claim(claim_id);
        }
        if let Some(priority) = self.priority {
            submission = submission.with_priority(priority);
        }
        submission
    }
}

/// Builder for workflows at a given point of the standard catalog
pub struct WorkflowBuilder {
    claim_id: ClaimId,
    priority: WorkflowPriority,
    completed_steps: usize,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            claim_id: ClaimId::new_v7(),
            priority: WorkflowPriority::Medium,
            completed_steps: 0,
        }
    }

    pub fn for_claim(mut self, claim_id: ClaimId) -> Self {
        self.claim_id = claim_id;
        self
    }

    pub fn with_priority(mut self, priority: WorkflowPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Completes the first `n` steps before returning the workflow
    pub fn with_completed_steps(mut self, n: usize) -> Self {
        self.completed_steps = n;
        self
    }

    pub fn build(self) -> VerificationWorkflow {
        let mut workflow = VerificationWorkflow::new(self.claim_id, self.priority, &StepCatalog::standard());
        let actor = UserId::new_v7();
        for _ in 0..self.completed_steps {
            if workflow.begin_current_step().is_err() {
                break;
            }
            workflow.complete_current_step(actor, json!({}));
        }
        workflow
    }
}
