//! Step execution
//!
//! Each [`StepKind`] maps to one routine here. A routine returns the
//! structured result stored on the step, or a [`StepError`] that puts the
//! workflow on hold.

use std::sync::Arc;

use serde_json::{json, Value};

use core_kernel::{BatchId, ClaimId, UserId};
use domain_processing::{
    BatchJob, BatchStatus, DocumentPipeline, DocumentStatus, DocumentStorePort, DocumentSubmission,
    EventSubscription, PipelineEvent,
};

use crate::catalog::StepKind;
use crate::config::EngineConfig;
use crate::error::StepError;
use crate::ports::{ClaimsPort, RecommendationPort, SpatialLinkagePort};

/// Runs verification steps against the engine's collaborators
pub struct StepExecutor {
    pipeline: Arc<DocumentPipeline>,
    documents: Arc<dyn DocumentStorePort>,
    spatial: Arc<dyn SpatialLinkagePort>,
    recommendations: Arc<dyn RecommendationPort>,
    claims: Arc<dyn ClaimsPort>,
    config: EngineConfig,
}

impl StepExecutor {
    pub fn new(
        pipeline: Arc<DocumentPipeline>,
        documents: Arc<dyn DocumentStorePort>,
        spatial: Arc<dyn SpatialLinkagePort>,
        recommendations: Arc<dyn RecommendationPort>,
        claims: Arc<dyn ClaimsPort>,
        config: EngineConfig,
    ) -> Self {
        Self { pipeline, documents, spatial, recommendations, claims, config }
    }

    /// Executes one step for a claim
    pub async fn execute(&self, kind: StepKind, claim_id: ClaimId, actor: UserId) -> Result<Value, StepError> {
        match kind {
            StepKind::DocumentIntake => self.document_intake(claim_id).await,
            StepKind::TextExtraction => self.text_extraction(claim_id).await,
            StepKind::EntityExtraction => self.entity_extraction(claim_id).await,
            StepKind::SpatialValidation => self.spatial_validation(claim_id).await,
            StepKind::RecommendationAnalysis => self.recommendation_analysis(claim_id).await,
            StepKind::FieldVerification | StepKind::TechnicalReview | StepKind::FinalApproval => {
                Ok(json!({ "attested_by": actor.to_string() }))
            }
        }
    }

    async fn document_intake(&self, claim_id: ClaimId) -> Result<Value, StepError> {
        let claim = self.claims.get_claim(claim_id).await?;
        if claim.documents.is_empty() {
            return Err(StepError::check("claim has no supporting documents"));
        }
        Ok(json!({
            "claim_number": claim.claim_number,
            "document_count": claim.documents.len(),
        }))
    }

    async fn text_extraction(&self, claim_id: ClaimId) -> Result<Value, StepError> {
        let claim = self.claims.get_claim(claim_id).await?;
        if claim.documents.is_empty() {
            return Err(StepError::check("claim has no supporting documents"));
        }
        let submissions = claim
            .documents
            .iter()
            .map(|d| DocumentSubmission::new(d.document_id, d.file_path.clone(), d.file_type.clone()).for_claim(claim_id))
            .collect();

        // Subscribe first so the completion event cannot be missed
        let mut events = self.pipeline.subscribe();
        let batch_id = self.pipeline.submit_batch(submissions).await?;
        tracing::debug!(claim_id = %claim_id, batch_id = %batch_id, "documents submitted for extraction");

        let batch = tokio::time::timeout(
            self.config.extraction_timeout,
            self.await_batch(&mut events, batch_id),
        )
        .await
        .map_err(|_| StepError::Timeout(self.config.extraction_timeout))??;

        if batch.progress.failed > 0 {
            return Err(StepError::check(format!(
                "{} of {} documents failed analysis",
                batch.progress.failed, batch.progress.total
            )));
        }
        Ok(json!({
            "batch_id": batch_id.to_string(),
            "processed": batch.progress.processed,
        }))
    }

    /// Waits for the batch's completion event, re-checking its status on
    /// every poll tick in case the event was skipped by a lagging subscription
    async fn await_batch(&self, events: &mut EventSubscription, batch_id: BatchId) -> Result<BatchJob, StepError> {
        let mut poll = tokio::time::interval(self.config.batch_poll_interval);
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(PipelineEvent::BatchCompleted { batch, .. }) if batch.id == batch_id => return Ok(batch),
                    Some(_) => {}
                    None => return Err(StepError::check("document pipeline stopped")),
                },
                _ = poll.tick() => match self.pipeline.batch_status(batch_id).await {
                    Some(batch) if batch.status == BatchStatus::Completed => return Ok(batch),
                    Some(batch) if batch.status == BatchStatus::Failed => {
                        return Err(StepError::check("document pipeline shut down before the batch finished"));
                    }
                    Some(_) => {}
                    None => return Err(StepError::check(format!("batch {batch_id} is no longer tracked"))),
                },
            }
        }
    }

    async fn entity_extraction(&self, claim_id: ClaimId) -> Result<Value, StepError> {
        let claim = self.claims.get_claim(claim_id).await?;
        let mut entities = Vec::new();
        for document in &claim.documents {
            let record = self.documents.get_document(document.document_id).await?;
            let result = match (record.status, record.result) {
                (DocumentStatus::Processed, Some(result)) => result,
                (status, _) => {
                    return Err(StepError::check(format!(
                        "document {} has no analysis result ({status:?})",
                        document.document_id
                    )));
                }
            };
            entities.extend(result.entities);
        }
        if entities.is_empty() {
            return Err(StepError::check("no entities extracted from claim documents"));
        }
        let mean_confidence = entities.iter().map(|e| e.confidence).sum::<f64>() / entities.len() as f64;
        Ok(json!({
            "entity_count": entities.len(),
            "mean_confidence": mean_confidence,
            "entities": entities,
        }))
    }

    async fn spatial_validation(&self, claim_id: ClaimId) -> Result<Value, StepError> {
        let link = self.spatial.link(claim_id).await?;
        if !link.is_resolved() {
            return Err(StepError::check("no village or district matched the claim"));
        }
        if link.confidence < self.config.min_spatial_confidence {
            return Err(StepError::check(format!(
                "spatial confidence {:.2} is below the minimum {:.2}",
                link.confidence, self.config.min_spatial_confidence
            )));
        }
        self.claims.record_spatial_link(claim_id, &link).await?;
        Ok(json!({
            "village": link.village,
            "district": link.district,
            "state": link.state,
            "confidence": link.confidence,
        }))
    }

    async fn recommendation_analysis(&self, claim_id: ClaimId) -> Result<Value, StepError> {
        let mut recommendations = self.recommendations.recommend(claim_id).await?;
        recommendations.sort_by(|a, b| b.eligibility_score.total_cmp(&a.eligibility_score));
        Ok(json!({
            "count": recommendations.len(),
            "recommendations": recommendations,
        }))
    }
}
