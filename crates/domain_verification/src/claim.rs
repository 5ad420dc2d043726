//! Claim view used by verification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, DocumentId};

use crate::error::VerificationError;
use crate::ports::SpatialLink;

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Filed, verification not started
    Submitted,
    /// A verification workflow is running
    UnderVerification,
    /// All verification steps passed
    Approved,
    /// Rejected by a reviewer
    Rejected,
}

/// A supporting document attached to a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDocument {
    pub document_id: DocumentId,
    pub file_path: String,
    pub file_type: String,
}

impl ClaimDocument {
    pub fn new(file_path: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            document_id: DocumentId::new_v7(),
            file_path: file_path.into(),
            file_type: file_type.into(),
        }
    }
}

/// A land claim as seen by the verification engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Unique identifier
    pub id: ClaimId,
    /// Human-readable claim number
    pub claim_number: String,
    /// Claimant name
    pub claimant_name: String,
    /// Status
    pub status: ClaimStatus,
    /// Supporting documents
    pub documents: Vec<ClaimDocument>,
    /// Village resolved by spatial validation
    pub village: Option<String>,
    /// District resolved by spatial validation
    pub district: Option<String>,
    /// State resolved by spatial validation
    pub state: Option<String>,
    /// Confidence of the recorded spatial link
    pub spatial_confidence: Option<f64>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl ClaimRecord {
    /// Creates a submitted claim without documents
    pub fn new(claimant_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ClaimId::new_v7(),
            claim_number: generate_claim_number(),
            claimant_name: claimant_name.into(),
            status: ClaimStatus::Submitted,
            documents: Vec::new(),
            village: None,
            district: None,
            state: None,
            spatial_confidence: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attaches a supporting document
    pub fn with_document(mut self, document: ClaimDocument) -> Self {
        self.documents.push(document);
        self
    }

    /// Updates the status
    pub fn update_status(&mut self, status: ClaimStatus) -> Result<(), VerificationError> {
        if !self.can_transition_to(status) {
            return Err(VerificationError::InvalidClaimTransition {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Writes a resolved location back onto the claim
    pub fn apply_spatial_link(&mut self, link: &SpatialLink) {
        self.village = link.village.clone();
        self.district = link.district.clone();
        self.state = link.state.clone();
        self.spatial_confidence = Some(link.confidence);
        self.updated_at = Utc::now();
    }

    /// Checks if transition is valid
    fn can_transition_to(&self, target: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self.status, target),
            (Submitted, UnderVerification) |
            (Submitted, Rejected) |
            (UnderVerification, Approved) |
            (UnderVerification, Rejected)
        )
    }
}

fn generate_claim_number() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("FRA-{}", duration.as_millis() % 10_000_000_000)
}
