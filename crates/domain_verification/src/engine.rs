//! Verification engine
//!
//! Owns the in-memory workflow map and drives workflows through the step
//! catalog. Every mutating operation on a claim runs under that claim's gate,
//! so `advance` calls for one claim never overlap while different claims
//! proceed independently.
//!
//! A transition is prepared on a copy of the workflow, audited, persisted,
//! and only then published to readers. If the audit sink or the workflow store
//! rejects it, the previous state is kept. Claim status changes made on the
//! way are idempotent, so retrying the same operation converges.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError};

use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use core_kernel::{ClaimId, PortError, UserId};
use domain_processing::{DocumentPipeline, DocumentStorePort};

use crate::audit::{AuditAction, AuditEntry, AuditSinkPort};
use crate::catalog::StepCatalog;
use crate::claim::ClaimStatus;
use crate::config::EngineConfig;
use crate::error::{StepError, VerificationError};
use crate::ports::{ClaimsPort, RecommendationPort, SpatialLinkagePort, WorkflowStorePort};
use crate::steps::StepExecutor;
use crate::workflow::{StepStatus, VerificationWorkflow, WorkflowPriority};

/// Collaborators of the engine
pub struct EnginePorts {
    pub pipeline: Arc<DocumentPipeline>,
    pub documents: Arc<dyn DocumentStorePort>,
    pub spatial: Arc<dyn SpatialLinkagePort>,
    pub recommendations: Arc<dyn RecommendationPort>,
    pub claims: Arc<dyn ClaimsPort>,
    pub audit: Arc<dyn AuditSinkPort>,
    pub workflows: Arc<dyn WorkflowStorePort>,
}

struct WorkflowSlot {
    /// Serializes mutations of one claim's workflow
    gate: Mutex<()>,
    /// Last committed state, plus the running step while `advance` executes
    state: RwLock<VerificationWorkflow>,
}

impl WorkflowSlot {
    fn new(workflow: VerificationWorkflow) -> Arc<Self> {
        Arc::new(Self {
            gate: Mutex::new(()),
            state: RwLock::new(workflow),
        })
    }
}

/// Claims whose workflow is being created; held outside the workflow map
type Initializing = std::sync::Mutex<HashSet<ClaimId>>;

/// Exclusive right to create one claim's workflow, released on drop
struct InitReservation<'a> {
    initializing: &'a Initializing,
    claim_id: ClaimId,
}

impl<'a> InitReservation<'a> {
    fn acquire(initializing: &'a Initializing, claim_id: ClaimId) -> Option<Self> {
        let inserted = initializing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(claim_id);
        inserted.then_some(Self { initializing, claim_id })
    }
}

impl Drop for InitReservation<'_> {
    fn drop(&mut self) {
        self.initializing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.claim_id);
    }
}

/// Drives claims through verification
pub struct VerificationEngine {
    catalog: StepCatalog,
    steps: StepExecutor,
    claims: Arc<dyn ClaimsPort>,
    audit: Arc<dyn AuditSinkPort>,
    store: Arc<dyn WorkflowStorePort>,
    workflows: RwLock<HashMap<ClaimId, Arc<WorkflowSlot>>>,
    initializing: Initializing,
}

impl VerificationEngine {
    /// Creates an engine using the standard step catalog
    pub fn new(config: EngineConfig, ports: EnginePorts) -> Self {
        Self::with_catalog(config, StepCatalog::standard(), ports)
    }

    pub fn with_catalog(config: EngineConfig, catalog: StepCatalog, ports: EnginePorts) -> Self {
        let steps = StepExecutor::new(
            ports.pipeline,
            ports.documents,
            ports.spatial,
            ports.recommendations,
            ports.claims.clone(),
            config,
        );
        Self {
            catalog,
            steps,
            claims: ports.claims,
            audit: ports.audit,
            store: ports.workflows,
            workflows: RwLock::new(HashMap::new()),
            initializing: Initializing::default(),
        }
    }

    /// Creates the workflow of a claim
    ///
    /// Fails with `WorkflowExists` if the claim already has one, in memory or
    /// in the workflow store, or if another initialization of it is running.
    /// Collaborator calls run without holding the workflow map.
    #[instrument(skip(self))]
    pub async fn initialize_workflow(
        &self,
        claim_id: ClaimId,
        actor: UserId,
        priority: WorkflowPriority,
    ) -> Result<VerificationWorkflow, VerificationError> {
        if self.workflows.read().await.contains_key(&claim_id) {
            return Err(VerificationError::WorkflowExists(claim_id));
        }
        let _reservation = InitReservation::acquire(&self.initializing, claim_id)
            .ok_or(VerificationError::WorkflowExists(claim_id))?;
        if self.store.load_workflow(claim_id).await?.is_some() {
            return Err(VerificationError::WorkflowExists(claim_id));
        }

        let claim = self.claims.get_claim(claim_id).await?;
        match claim.status {
            ClaimStatus::Submitted => {
                self.claims.update_status(claim_id, ClaimStatus::UnderVerification).await?;
            }
            // Left over from an initialization whose audit or save failed
            ClaimStatus::UnderVerification => {}
            status => return Err(VerificationError::ClaimNotEligible { claim_id, status }),
        }

        let workflow = VerificationWorkflow::new(claim_id, priority, &self.catalog);
        let entry = AuditEntry::new(claim_id, AuditAction::WorkflowInitialized, actor).with_change(
            None,
            Some(json!({
                "workflow_id": workflow.id.to_string(),
                "priority": workflow.priority,
                "estimated_completion": workflow.estimated_completion,
                "steps": workflow.steps.len(),
            })),
        );
        self.persist(entry, &workflow).await?;
        // A concurrent reader may already have loaded the saved workflow
        self.workflows
            .write()
            .await
            .entry(claim_id)
            .or_insert_with(|| WorkflowSlot::new(workflow.clone()));

        info!(
            workflow_id = %workflow.id,
            priority = ?priority,
            estimated_completion = %workflow.estimated_completion,
            "verification workflow initialized"
        );
        Ok(workflow)
    }

    /// Executes the current step
    ///
    /// A step failure is not an error of this call: the returned workflow is
    /// on hold with the failure recorded on the step.
    #[instrument(skip(self))]
    pub async fn advance(&self, claim_id: ClaimId, actor: UserId) -> Result<VerificationWorkflow, VerificationError> {
        let slot = self.slot(claim_id).await?;
        let _gate = slot.gate.lock().await;

        let before = slot.state.read().await.clone();
        let mut next = before.clone();
        let kind = next.begin_current_step()?;
        let index = next.current_step_index;
        let finishes = next.is_on_last_step();
        let previous_status = before.steps.get(index).map(|s| s.status).unwrap_or(StepStatus::Pending);
        *slot.state.write().await = next.clone();
        debug!(step = kind.display_name(), index, "step started");

        let mut outcome = self.steps.execute(kind, claim_id, actor).await;
        if finishes && outcome.is_ok() {
            if let Err(e) = self.settle_claim_status(claim_id, ClaimStatus::Approved).await {
                outcome = Err(StepError::from(e));
            }
        }

        let old_value = json!({ "step": kind, "status": previous_status });
        let entry = match outcome {
            Ok(result) => {
                next.complete_current_step(actor, result.clone());
                info!(step = kind.display_name(), workflow_status = ?next.status, "step completed");
                AuditEntry::new(claim_id, AuditAction::StepCompleted, actor).with_change(
                    Some(old_value),
                    Some(json!({
                        "step": kind,
                        "status": StepStatus::Completed,
                        "result": result,
                        "workflow_status": next.status,
                    })),
                )
            }
            Err(error) => {
                let message = error.to_string();
                warn!(step = kind.display_name(), error = %message, "step failed, workflow on hold");
                next.fail_current_step(actor, message.clone());
                AuditEntry::new(claim_id, AuditAction::StepFailed, actor)
                    .with_change(
                        Some(old_value),
                        Some(json!({
                            "step": kind,
                            "status": StepStatus::Failed,
                            "workflow_status": next.status,
                        })),
                    )
                    .with_note(message)
            }
        };
        self.commit(&slot, before, next, entry).await
    }

    /// Skips the current step if it is optional
    #[instrument(skip(self))]
    pub async fn skip_step(
        &self,
        claim_id: ClaimId,
        actor: UserId,
        reason: &str,
    ) -> Result<VerificationWorkflow, VerificationError> {
        let slot = self.slot(claim_id).await?;
        let _gate = slot.gate.lock().await;

        let before = slot.state.read().await.clone();
        let mut next = before.clone();
        let finishes = next.is_on_last_step();
        let kind = next.skip_current_step(actor, reason)?;
        if finishes {
            self.settle_claim_status(claim_id, ClaimStatus::Approved).await?;
        }

        info!(step = kind.display_name(), "step skipped");
        let entry = AuditEntry::new(claim_id, AuditAction::StepSkipped, actor)
            .with_change(
                Some(json!({ "step": kind, "status": StepStatus::Pending })),
                Some(json!({ "step": kind, "status": StepStatus::Skipped, "workflow_status": next.status })),
            )
            .with_note(reason);
        self.commit(&slot, before, next, entry).await
    }

    /// Sets the reviewer responsible for the workflow
    #[instrument(skip(self))]
    pub async fn assign_workflow(
        &self,
        claim_id: ClaimId,
        actor: UserId,
        assignee: UserId,
    ) -> Result<VerificationWorkflow, VerificationError> {
        let slot = self.slot(claim_id).await?;
        let _gate = slot.gate.lock().await;

        let before = slot.state.read().await.clone();
        let mut next = before.clone();
        let previous = next.assign(assignee)?;

        info!(assignee = %assignee, "workflow assigned");
        let entry = AuditEntry::new(claim_id, AuditAction::WorkflowAssigned, actor).with_change(
            previous.map(|p| json!(p.to_string())),
            Some(json!(assignee.to_string())),
        );
        self.commit(&slot, before, next, entry).await
    }

    /// Raises the priority one tier; at `Urgent` only the audit entry is written
    #[instrument(skip(self))]
    pub async fn escalate_workflow(
        &self,
        claim_id: ClaimId,
        actor: UserId,
        reason: &str,
    ) -> Result<VerificationWorkflow, VerificationError> {
        let slot = self.slot(claim_id).await?;
        let _gate = slot.gate.lock().await;

        let before = slot.state.read().await.clone();
        let mut next = before.clone();
        let (old, new) = next.escalate()?;

        let note = if old == new {
            warn!(priority = ?new, "escalation requested at highest priority");
            format!("{reason} (already at highest priority)")
        } else {
            info!(from = ?old, to = ?new, "workflow escalated");
            reason.to_string()
        };
        let entry = AuditEntry::new(claim_id, AuditAction::WorkflowEscalated, actor)
            .with_change(Some(json!(old)), Some(json!(new)))
            .with_note(note);
        self.commit(&slot, before, next, entry).await
    }

    /// Terminates the workflow and rejects the claim
    #[instrument(skip(self))]
    pub async fn reject_workflow(
        &self,
        claim_id: ClaimId,
        actor: UserId,
        reason: &str,
    ) -> Result<VerificationWorkflow, VerificationError> {
        let slot = self.slot(claim_id).await?;
        let _gate = slot.gate.lock().await;

        let before = slot.state.read().await.clone();
        let mut next = before.clone();
        let previous = next.reject()?;
        self.settle_claim_status(claim_id, ClaimStatus::Rejected).await?;

        info!(reason, "workflow rejected");
        let entry = AuditEntry::new(claim_id, AuditAction::WorkflowRejected, actor)
            .with_change(Some(json!(previous)), Some(json!(next.status)))
            .with_note(reason);
        self.commit(&slot, before, next, entry).await
    }

    /// Current state of a claim's workflow
    pub async fn workflow_status(&self, claim_id: ClaimId) -> Result<VerificationWorkflow, VerificationError> {
        let slot = self.slot(claim_id).await?;
        let workflow = slot.state.read().await.clone();
        Ok(workflow)
    }

    /// Audit entries of a claim in the order they were written
    pub async fn audit_trail(&self, claim_id: ClaimId) -> Result<Vec<AuditEntry>, VerificationError> {
        Ok(self.audit.entries_for_claim(claim_id).await?)
    }

    /// Drops completed and rejected workflows from memory
    ///
    /// They stay in the workflow store and are reloaded on the next access.
    pub async fn evict_finished(&self) -> usize {
        let mut workflows = self.workflows.write().await;
        let mut finished = Vec::new();
        for (claim_id, slot) in workflows.iter() {
            if slot.state.read().await.is_finished() {
                finished.push(*claim_id);
            }
        }
        for claim_id in &finished {
            workflows.remove(claim_id);
        }
        if !finished.is_empty() {
            debug!(evicted = finished.len(), "finished workflows evicted");
        }
        finished.len()
    }

    /// Number of workflows held in memory
    pub async fn cached_workflows(&self) -> usize {
        self.workflows.read().await.len()
    }

    async fn slot(&self, claim_id: ClaimId) -> Result<Arc<WorkflowSlot>, VerificationError> {
        if let Some(slot) = self.workflows.read().await.get(&claim_id) {
            return Ok(slot.clone());
        }
        let loaded = self
            .store
            .load_workflow(claim_id)
            .await?
            .ok_or(VerificationError::WorkflowNotFound(claim_id))?;
        debug!(claim_id = %claim_id, "workflow loaded from store");
        let mut workflows = self.workflows.write().await;
        Ok(workflows
            .entry(claim_id)
            .or_insert_with(|| WorkflowSlot::new(loaded))
            .clone())
    }

    /// Moves the claim to `status` unless an attempt whose commit failed already did
    async fn settle_claim_status(&self, claim_id: ClaimId, status: ClaimStatus) -> Result<(), PortError> {
        if self.claims.get_claim(claim_id).await?.status == status {
            debug!(claim_id = %claim_id, status = ?status, "claim already in target status");
            return Ok(());
        }
        self.claims.update_status(claim_id, status).await?;
        Ok(())
    }

    async fn persist(&self, entry: AuditEntry, workflow: &VerificationWorkflow) -> Result<(), PortError> {
        self.audit.append(entry).await?;
        self.store.save_workflow(workflow).await
    }

    async fn commit(
        &self,
        slot: &WorkflowSlot,
        before: VerificationWorkflow,
        next: VerificationWorkflow,
        entry: AuditEntry,
    ) -> Result<VerificationWorkflow, VerificationError> {
        match self.persist(entry, &next).await {
            Ok(()) => {
                *slot.state.write().await = next.clone();
                Ok(next)
            }
            Err(e) => {
                warn!(claim_id = %next.claim_id, error = %e, "transition not persisted, keeping previous state");
                *slot.state.write().await = before;
                Err(e.into())
            }
        }
    }
}
