//! Verification workflow aggregate
//!
//! The workflow owns its step list and enforces the state machine; the
//! engine performs the I/O around each transition.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use core_kernel::{ClaimId, StepId, UserId, WorkflowId};

use crate::catalog::{StepCatalog, StepDefinition, StepKind, StepRequirement};
use crate::error::VerificationError;

/// Workflow priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl WorkflowPriority {
    /// One tier up, staying at `Urgent`
    pub fn escalated(self) -> Self {
        match self {
            WorkflowPriority::Low => WorkflowPriority::Medium,
            WorkflowPriority::Medium => WorkflowPriority::High,
            WorkflowPriority::High | WorkflowPriority::Urgent => WorkflowPriority::Urgent,
        }
    }

    /// Days allowed to finish verification
    pub fn sla_days(self) -> i64 {
        match self {
            WorkflowPriority::Urgent => 3,
            WorkflowPriority::High => 7,
            WorkflowPriority::Medium => 14,
            WorkflowPriority::Low => 21,
        }
    }
}

/// Workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
    OnHold,
}

impl WorkflowStatus {
    /// Completed and rejected workflows accept no further changes
    pub fn is_finished(self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Rejected)
    }
}

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// A single step of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub kind: StepKind,
    pub name: String,
    pub requirement: StepRequirement,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Structured output of the last successful execution
    pub result: Option<Value>,
    /// Errors of every failed execution, oldest first
    pub errors: Vec<String>,
    /// Actor who completed, failed or skipped the step
    pub resolved_by: Option<UserId>,
}

impl WorkflowStep {
    fn from_definition(definition: &StepDefinition) -> Self {
        Self {
            id: StepId::new_v7(),
            kind: definition.kind,
            name: definition.kind.display_name().to_string(),
            requirement: definition.requirement,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            errors: Vec::new(),
            resolved_by: None,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.requirement == StepRequirement::Optional
    }

    fn start(&mut self) {
        self.status = StepStatus::InProgress;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
    }

    fn complete(&mut self, actor: UserId, result: Value) {
        self.status = StepStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        self.resolved_by = Some(actor);
    }

    fn fail(&mut self, actor: UserId, error: String) {
        self.status = StepStatus::Failed;
        self.errors.push(error);
        self.resolved_by = Some(actor);
    }

    fn skip(&mut self, actor: UserId, reason: &str) {
        self.status = StepStatus::Skipped;
        self.completed_at = Some(Utc::now());
        self.result = Some(json!({ "skipped": true, "reason": reason }));
        self.resolved_by = Some(actor);
    }
}

/// Verification state of one claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationWorkflow {
    pub id: WorkflowId,
    pub claim_id: ClaimId,
    /// Index of the next step to execute; equals the step count once completed
    pub current_step_index: usize,
    pub status: WorkflowStatus,
    pub steps: Vec<WorkflowStep>,
    pub priority: WorkflowPriority,
    pub assigned_to: Option<UserId>,
    pub estimated_completion: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationWorkflow {
    /// Creates a pending workflow with every catalog step pending
    pub fn new(claim_id: ClaimId, priority: WorkflowPriority, catalog: &StepCatalog) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new_v7(),
            claim_id,
            current_step_index: 0,
            status: WorkflowStatus::Pending,
            steps: catalog.steps().iter().map(WorkflowStep::from_definition).collect(),
            priority,
            assigned_to: None,
            estimated_completion: now + Duration::days(priority.sla_days()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_step(&self) -> Option<&WorkflowStep> {
        self.steps.get(self.current_step_index)
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// True when the current step is the last one of the catalog
    pub fn is_on_last_step(&self) -> bool {
        self.current_step_index + 1 == self.steps.len()
    }

    /// Number of completed or skipped steps
    pub fn resolved_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Completed | StepStatus::Skipped))
            .count()
    }

    fn ensure_open(&self) -> Result<(), VerificationError> {
        if self.is_finished() {
            return Err(VerificationError::WorkflowClosed {
                claim_id: self.claim_id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Marks the current step in progress and returns its kind
    pub fn begin_current_step(&mut self) -> Result<StepKind, VerificationError> {
        self.ensure_open()?;
        let index = self.current_step_index;
        let step = self.steps.get_mut(index).ok_or(VerificationError::WorkflowClosed {
            claim_id: self.claim_id,
            status: self.status,
        })?;
        step.start();
        let kind = step.kind;
        self.status = WorkflowStatus::InProgress;
        self.touch();
        Ok(kind)
    }

    /// Records success of the current step and moves to the next one
    pub fn complete_current_step(&mut self, actor: UserId, result: Value) {
        if let Some(step) = self.steps.get_mut(self.current_step_index) {
            step.complete(actor, result);
            self.move_past_current_step();
        }
    }

    /// Records failure of the current step; the index stays put
    pub fn fail_current_step(&mut self, actor: UserId, error: impl Into<String>) {
        if let Some(step) = self.steps.get_mut(self.current_step_index) {
            step.fail(actor, error.into());
            self.status = WorkflowStatus::OnHold;
            self.touch();
        }
    }

    /// Skips the current step if it is optional
    pub fn skip_current_step(&mut self, actor: UserId, reason: &str) -> Result<StepKind, VerificationError> {
        self.ensure_open()?;
        let claim_id = self.claim_id;
        let status = self.status;
        let step = self
            .steps
            .get_mut(self.current_step_index)
            .ok_or(VerificationError::WorkflowClosed { claim_id, status })?;
        if !step.is_optional() {
            return Err(VerificationError::StepNotSkippable { step: step.name.clone() });
        }
        step.skip(actor, reason);
        let kind = step.kind;
        self.move_past_current_step();
        Ok(kind)
    }

    /// Sets the assignee, returning the previous one
    pub fn assign(&mut self, assignee: UserId) -> Result<Option<UserId>, VerificationError> {
        self.ensure_open()?;
        let previous = self.assigned_to.replace(assignee);
        self.touch();
        Ok(previous)
    }

    /// Raises the priority one tier, returning `(old, new)`
    ///
    /// The estimated completion keeps its original value.
    pub fn escalate(&mut self) -> Result<(WorkflowPriority, WorkflowPriority), VerificationError> {
        self.ensure_open()?;
        let old = self.priority;
        self.priority = old.escalated();
        self.touch();
        Ok((old, self.priority))
    }

    /// Terminates the workflow, returning the status it had
    pub fn reject(&mut self) -> Result<WorkflowStatus, VerificationError> {
        self.ensure_open()?;
        let previous = self.status;
        self.status = WorkflowStatus::Rejected;
        self.touch();
        Ok(previous)
    }

    fn move_past_current_step(&mut self) {
        self.current_step_index += 1;
        self.status = if self.current_step_index >= self.steps.len() {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::InProgress
        };
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
