//! In-memory verification adapters

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use core_kernel::{ClaimId, DomainPort, PortError};

use crate::claim::{ClaimRecord, ClaimStatus};
use crate::ports::{
    ClaimsPort, RecommendationPort, SchemeRecommendation, SpatialLink, SpatialLinkagePort,
    WorkflowStorePort,
};
use crate::workflow::VerificationWorkflow;

/// Claim store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryClaims {
    claims: Arc<RwLock<HashMap<ClaimId, ClaimRecord>>>,
}

impl InMemoryClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_claims(claims: Vec<ClaimRecord>) -> Self {
        let store = Self::new();
        for claim in claims {
            store.insert(claim).await;
        }
        store
    }

    pub async fn insert(&self, claim: ClaimRecord) {
        self.claims.write().await.insert(claim.id, claim);
    }
}

impl DomainPort for InMemoryClaims {}

#[async_trait]
impl ClaimsPort for InMemoryClaims {
    async fn get_claim(&self, claim_id: ClaimId) -> Result<ClaimRecord, PortError> {
        self.claims
            .read()
            .await
            .get(&claim_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Claim", claim_id))
    }

    async fn update_status(&self, claim_id: ClaimId, status: ClaimStatus) -> Result<ClaimRecord, PortError> {
        let mut claims = self.claims.write().await;
        let claim = claims
            .get_mut(&claim_id)
            .ok_or_else(|| PortError::not_found("Claim", claim_id))?;
        claim
            .update_status(status)
            .map_err(|e| PortError::conflict(e.to_string()))?;
        Ok(claim.clone())
    }

    async fn record_spatial_link(&self, claim_id: ClaimId, link: &SpatialLink) -> Result<ClaimRecord, PortError> {
        let mut claims = self.claims.write().await;
        let claim = claims
            .get_mut(&claim_id)
            .ok_or_else(|| PortError::not_found("Claim", claim_id))?;
        claim.apply_spatial_link(link);
        Ok(claim.clone())
    }
}

/// Workflow store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: Arc<RwLock<HashMap<ClaimId, VerificationWorkflow>>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl DomainPort for InMemoryWorkflowStore {}

#[async_trait]
impl WorkflowStorePort for InMemoryWorkflowStore {
    async fn save_workflow(&self, workflow: &VerificationWorkflow) -> Result<(), PortError> {
        self.workflows
            .write()
            .await
            .insert(workflow.claim_id, workflow.clone());
        Ok(())
    }

    async fn load_workflow(&self, claim_id: ClaimId) -> Result<Option<VerificationWorkflow>, PortError> {
        Ok(self.workflows.read().await.get(&claim_id).cloned())
    }
}

/// Spatial linkage with preset answers per claim
///
/// Claims without a preset link are reported as not found.
#[derive(Debug, Default)]
pub struct StaticSpatialLinkage {
    links: Arc<RwLock<HashMap<ClaimId, SpatialLink>>>,
    unavailable: Arc<RwLock<HashSet<ClaimId>>>,
}

impl StaticSpatialLinkage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_link(&self, claim_id: ClaimId, link: SpatialLink) {
        self.links.write().await.insert(claim_id, link);
    }

    /// Makes lookups for the claim fail as if the service were down
    pub async fn make_unavailable(&self, claim_id: ClaimId) {
        self.unavailable.write().await.insert(claim_id);
    }
}

impl DomainPort for StaticSpatialLinkage {}

#[async_trait]
impl SpatialLinkagePort for StaticSpatialLinkage {
    async fn link(&self, claim_id: ClaimId) -> Result<SpatialLink, PortError> {
        if self.unavailable.read().await.contains(&claim_id) {
            return Err(PortError::unavailable("spatial linkage"));
        }
        self.links
            .read()
            .await
            .get(&claim_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("SpatialLink", claim_id))
    }
}

/// Recommendation scoring with preset answers per claim
///
/// Claims without presets get no recommendations.
#[derive(Debug, Default)]
pub struct StaticRecommendations {
    recommendations: Arc<RwLock<HashMap<ClaimId, Vec<SchemeRecommendation>>>>,
}

impl StaticRecommendations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_recommendations(&self, claim_id: ClaimId, recommendations: Vec<SchemeRecommendation>) {
        self.recommendations.write().await.insert(claim_id, recommendations);
    }
}

impl DomainPort for StaticRecommendations {}

#[async_trait]
impl RecommendationPort for StaticRecommendations {
    async fn recommend(&self, claim_id: ClaimId) -> Result<Vec<SchemeRecommendation>, PortError> {
        Ok(self
            .recommendations
            .read()
            .await
            .get(&claim_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StepCatalog;
    use crate::workflow::WorkflowPriority;

    #[tokio::test]
    async fn test_claim_status_transition_is_enforced() {
        let claim = ClaimRecord::new("Sita Munda");
        let id = claim.id;
        let claims = InMemoryClaims::with_claims(vec![claim]).await;

        let err = claims.update_status(id, ClaimStatus::Approved).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict { .. }));

        claims.update_status(id, ClaimStatus::UnderVerification).await.unwrap();
        let approved = claims.update_status(id, ClaimStatus::Approved).await.unwrap();
        assert_eq!(approved.status, ClaimStatus::Approved);
    }

    #[tokio::test]
    async fn test_missing_claim_is_not_found() {
        let claims = InMemoryClaims::new();
        assert!(claims.get_claim(ClaimId::new()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_workflow_store_roundtrip() {
        let store = InMemoryWorkflowStore::new();
        let workflow = VerificationWorkflow::new(ClaimId::new(), WorkflowPriority::Low, &StepCatalog::standard());
        store.save_workflow(&workflow).await.unwrap();

        let loaded = store.load_workflow(workflow.claim_id).await.unwrap().unwrap();
        assert_eq!(loaded.id, workflow.id);
        assert!(store.load_workflow(ClaimId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spatial_linkage_presets() {
        let linkage = StaticSpatialLinkage::new();
        let resolved = ClaimId::new();
        let down = ClaimId::new();
        linkage
            .set_link(resolved, SpatialLink {
                village: Some("Barkagaon".to_string()),
                district: None,
                state: None,
                confidence: 0.8,
            })
            .await;
        linkage.make_unavailable(down).await;

        assert!(linkage.link(resolved).await.unwrap().is_resolved());
        assert!(matches!(linkage.link(down).await.unwrap_err(), PortError::ServiceUnavailable { .. }));
        assert!(linkage.link(ClaimId::new()).await.unwrap_err().is_not_found());
    }
}
