//! Service wiring
//!
//! [`ClaimsRuntime`] owns one document pipeline and one verification engine.
//! The in-memory wiring backs the dry-run mode of the binary, where a few
//! seeded claims are verified end to end.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{info, warn};

use core_kernel::{ClaimId, UserId};
use domain_processing::{DocumentPipeline, InMemoryDocumentStore, ScriptedAnalysis};
use domain_verification::{
    ClaimDocument, ClaimRecord, EnginePorts, InMemoryAuditLog, InMemoryClaims, InMemoryWorkflowStore,
    SchemeRecommendation, SpatialLink, StaticRecommendations, StaticSpatialLinkage, VerificationEngine,
    WorkflowPriority, WorkflowStatus,
};

use crate::error::RuntimeError;
use crate::settings::RuntimeSettings;

const DEMO_CLAIMANTS: [&str; 4] = ["Somari Devi", "Birsa Kujur", "Jhuma Tudu", "Mangal Soren"];
const DEMO_ANALYSIS_LATENCY: Duration = Duration::from_millis(50);

/// Outcome of a dry run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoReport {
    pub approved: usize,
    pub on_hold: usize,
    pub audit_entries: usize,
}

/// The pipeline and engine of one process
pub struct ClaimsRuntime {
    pipeline: Arc<DocumentPipeline>,
    engine: Arc<VerificationEngine>,
    claims: Arc<InMemoryClaims>,
    spatial: Arc<StaticSpatialLinkage>,
    recommendations: Arc<StaticRecommendations>,
}

impl ClaimsRuntime {
    /// Wires both services over in-memory adapters
    ///
    /// Must be called inside a tokio runtime.
    pub fn in_memory(settings: &RuntimeSettings) -> Self {
        let analysis = Arc::new(ScriptedAnalysis::new().with_latency(DEMO_ANALYSIS_LATENCY));
        let documents = Arc::new(InMemoryDocumentStore::new());
        let pipeline = Arc::new(DocumentPipeline::start(
            settings.dispatcher.clone(),
            analysis,
            documents.clone(),
        ));
        let claims = Arc::new(InMemoryClaims::new());
        let spatial = Arc::new(StaticSpatialLinkage::new());
        let recommendations = Arc::new(StaticRecommendations::new());

        let engine = Arc::new(VerificationEngine::new(
            settings.engine.clone(),
            EnginePorts {
                pipeline: pipeline.clone(),
                documents,
                spatial: spatial.clone(),
                recommendations: recommendations.clone(),
                claims: claims.clone(),
                audit: Arc::new(InMemoryAuditLog::new()),
                workflows: Arc::new(InMemoryWorkflowStore::new()),
            },
        ));

        Self {
            pipeline,
            engine,
            claims,
            spatial,
            recommendations,
        }
    }

    pub fn pipeline(&self) -> &Arc<DocumentPipeline> {
        &self.pipeline
    }

    pub fn engine(&self) -> &Arc<VerificationEngine> {
        &self.engine
    }

    /// Seeds `count` claims and verifies them concurrently
    pub async fn run_demo(&self, count: usize) -> Result<DemoReport, RuntimeError> {
        let actor = UserId::new_v7();
        let priorities = [
            WorkflowPriority::Medium,
            WorkflowPriority::High,
            WorkflowPriority::Low,
            WorkflowPriority::Urgent,
        ];

        let mut tasks = JoinSet::new();
        let mut claim_ids = Vec::with_capacity(count);
        for n in 0..count {
            let claim_id = self.seed_claim(n).await;
            claim_ids.push(claim_id);
            let engine = self.engine.clone();
            let priority = priorities[n % priorities.len()];
            tasks.spawn(async move { verify(engine, claim_id, actor, priority).await });
        }

        let mut report = DemoReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined?? {
                WorkflowStatus::Completed => report.approved += 1,
                _ => report.on_hold += 1,
            }
        }
        for claim_id in claim_ids {
            report.audit_entries += self.engine.audit_trail(claim_id).await?.len();
        }

        let status = self.pipeline.queue_status().await;
        info!(
            approved = report.approved,
            on_hold = report.on_hold,
            audit_entries = report.audit_entries,
            queued = status.queued,
            "dry run finished"
        );
        Ok(report)
    }

    /// Stops the pipeline; running analyses are cancelled
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }

    async fn seed_claim(&self, n: usize) -> ClaimId {
        let claimant = DEMO_CLAIMANTS[n % DEMO_CLAIMANTS.len()];
        let claim = ClaimRecord::new(claimant)
            .with_document(ClaimDocument::new(format!("/demo/claim-{n}/patta.pdf"), "pdf"))
            .with_document(ClaimDocument::new(format!("/demo/claim-{n}/sketch-map.jpg"), "jpg"));
        let claim_id = claim.id;

        self.spatial
            .set_link(claim_id, SpatialLink {
                village: Some("Kuchai".to_string()),
                district: Some("Seraikela Kharsawan".to_string()),
                state: Some("Jharkhand".to_string()),
                confidence: 0.87,
            })
            .await;
        self.recommendations
            .set_recommendations(claim_id, vec![SchemeRecommendation {
                scheme_code: "PMAY-G".to_string(),
                scheme_name: "Rural Housing".to_string(),
                eligibility_score: 0.82,
                rationale: Some("Recognised forest dweller household".to_string()),
            }])
            .await;
        self.claims.insert(claim).await;
        claim_id
    }
}

/// Advances a claim until it completes or is put on hold
async fn verify(
    engine: Arc<VerificationEngine>,
    claim_id: ClaimId,
    actor: UserId,
    priority: WorkflowPriority,
) -> Result<WorkflowStatus, RuntimeError> {
    engine.initialize_workflow(claim_id, actor, priority).await?;
    loop {
        let workflow = engine.advance(claim_id, actor).await?;
        match workflow.status {
            WorkflowStatus::Completed => return Ok(workflow.status),
            WorkflowStatus::OnHold | WorkflowStatus::Rejected => {
                let error = workflow
                    .current_step()
                    .and_then(|s| s.errors.last().cloned())
                    .unwrap_or_default();
                warn!(claim_id = %claim_id, error = %error, "claim put on hold");
                return Ok(workflow.status);
            }
            WorkflowStatus::Pending | WorkflowStatus::InProgress => {}
        }
    }
}
