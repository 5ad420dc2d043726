//! Verification Domain Ports
//!
//! Collaborators the verification engine depends on. Spatial linkage and
//! scheme recommendation are computed by external services; claims and
//! workflows live in whatever store the deployment provides.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, DomainPort, PortError};

use crate::claim::{ClaimRecord, ClaimStatus};
use crate::workflow::VerificationWorkflow;

/// Administrative location matched to a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialLink {
    pub village: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    /// Match confidence in `[0, 1]`
    pub confidence: f64,
}

impl SpatialLink {
    /// True when at least a village or a district was matched
    pub fn is_resolved(&self) -> bool {
        self.village.is_some() || self.district.is_some()
    }
}

/// A welfare scheme the claimant may be eligible for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeRecommendation {
    pub scheme_code: String,
    pub scheme_name: String,
    /// Eligibility score in `[0, 1]`
    pub eligibility_score: f64,
    pub rationale: Option<String>,
}

/// Geographic boundary matching
#[async_trait]
pub trait SpatialLinkagePort: DomainPort {
    async fn link(&self, claim_id: ClaimId) -> Result<SpatialLink, PortError>;
}

/// Scheme eligibility scoring
#[async_trait]
pub trait RecommendationPort: DomainPort {
    async fn recommend(&self, claim_id: ClaimId) -> Result<Vec<SchemeRecommendation>, PortError>;
}

/// Claim storage
#[async_trait]
pub trait ClaimsPort: DomainPort {
    async fn get_claim(&self, claim_id: ClaimId) -> Result<ClaimRecord, PortError>;

    /// Changes the claim status; invalid transitions are `PortError::Conflict`
    async fn update_status(&self, claim_id: ClaimId, status: ClaimStatus) -> Result<ClaimRecord, PortError>;

    async fn record_spatial_link(&self, claim_id: ClaimId, link: &SpatialLink) -> Result<ClaimRecord, PortError>;
}

/// Workflow persistence
#[async_trait]
pub trait WorkflowStorePort: DomainPort {
    /// Inserts or replaces the workflow of its claim
    async fn save_workflow(&self, workflow: &VerificationWorkflow) -> Result<(), PortError>;

    async fn load_workflow(&self, claim_id: ClaimId) -> Result<Option<VerificationWorkflow>, PortError>;
}
