//! Wired Test Harness
//!
//! Builds a document pipeline and a verification engine over the in-memory
//! adapters, keeping typed handles to every adapter so tests can script
//! failures and inspect state.

use std::sync::Arc;
use std::time::Duration;

use core_kernel::{BatchId, ClaimId, UserId};
use domain_processing::{
    BatchJob, DispatcherConfig, DocumentPipeline, EventSubscription, InMemoryDocumentStore,
    PipelineEvent, ScriptedAnalysis,
};
use domain_verification::{
    ClaimRecord, EngineConfig, EnginePorts, InMemoryAuditLog, InMemoryClaims, InMemoryWorkflowStore,
    StaticRecommendations, StaticSpatialLinkage, VerificationEngine, VerificationError,
    VerificationWorkflow,
};

use crate::builders::ClaimRecordBuilder;
use crate::fixtures::{RecommendationFixtures, SpatialFixtures};

/// Dispatcher settings with short timers for tests
pub fn fast_dispatcher_config() -> DispatcherConfig {
    DispatcherConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_job_timeout(Duration::from_secs(2))
}

/// Engine settings with short timers for tests
pub fn fast_engine_config() -> EngineConfig {
    EngineConfig::default()
        .with_extraction_timeout(Duration::from_secs(10))
        .with_batch_poll_interval(Duration::from_millis(50))
}

/// Waits up to five seconds for a batch's completion event
pub async fn wait_for_batch(events: &mut EventSubscription, batch_id: BatchId) -> Option<BatchJob> {
    let wait = async {
        while let Some(event) = events.recv().await {
            if let PipelineEvent::BatchCompleted { batch, .. } = event {
                if batch.id == batch_id {
                    return Some(batch);
                }
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(5), wait).await.ok().flatten()
}

/// Pipeline, engine and every adapter behind them
pub struct VerificationHarness {
    pub pipeline: Arc<DocumentPipeline>,
    pub analysis: Arc<ScriptedAnalysis>,
    pub documents: Arc<InMemoryDocumentStore>,
    pub claims: Arc<InMemoryClaims>,
    pub spatial: Arc<StaticSpatialLinkage>,
    pub recommendations: Arc<StaticRecommendations>,
    pub audit: Arc<InMemoryAuditLog>,
    pub workflows: Arc<InMemoryWorkflowStore>,
    pub engine: VerificationEngine,
}

impl Default for VerificationHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationHarness {
    /// Harness with fast test timers; must be created inside a tokio runtime
    pub fn new() -> Self {
        Self::with_config(fast_dispatcher_config(), fast_engine_config())
    }

    pub fn with_config(dispatcher: DispatcherConfig, engine: EngineConfig) -> Self {
        let analysis = Arc::new(ScriptedAnalysis::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let pipeline = Arc::new(DocumentPipeline::start(dispatcher, analysis.clone(), documents.clone()));
        let claims = Arc::new(InMemoryClaims::new());
        let spatial = Arc::new(StaticSpatialLinkage::new());
        let recommendations = Arc::new(StaticRecommendations::new());
        let audit = Arc::new(InMemoryAuditLog::new());
        let workflows = Arc::new(InMemoryWorkflowStore::new());

        let engine = VerificationEngine::new(
            engine,
            EnginePorts {
                pipeline: pipeline.clone(),
                documents: documents.clone(),
                spatial: spatial.clone(),
                recommendations: recommendations.clone(),
                claims: claims.clone(),
                audit: audit.clone(),
                workflows: workflows.clone(),
            },
        );

        Self {
            pipeline,
            analysis,
            documents,
            claims,
            spatial,
            recommendations,
            audit,
            workflows,
            engine,
        }
    }

    /// Stores a claim with `documents` scans that passes every automated step
    pub async fn verifiable_claim(&self, documents: usize) -> ClaimRecord {
        let claim = ClaimRecordBuilder::new().with_documents(documents).build();
        self.spatial.set_link(claim.id, SpatialFixtures::resolved()).await;
        self.recommendations
            .set_recommendations(claim.id, RecommendationFixtures::schemes())
            .await;
        self.claims.insert(claim.clone()).await;
        claim
    }

    /// Calls `advance` `times` times, returning the last workflow state
    pub async fn advance_times(
        &self,
        claim_id: ClaimId,
        actor: UserId,
        times: usize,
    ) -> Result<VerificationWorkflow, VerificationError> {
        let mut workflow = self.engine.workflow_status(claim_id).await?;
        for _ in 0..times {
            workflow = self.engine.advance(claim_id, actor).await?;
        }
        Ok(workflow)
    }
}
