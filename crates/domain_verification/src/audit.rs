//! Audit trail
//!
//! Every workflow transition is recorded as an [`AuditEntry`]. Entries are
//! append-only: sinks never expose a way to change or remove them.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use core_kernel::{AuditEntryId, ClaimId, DomainPort, PortError, UserId};

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    WorkflowInitialized,
    StepCompleted,
    StepFailed,
    StepSkipped,
    WorkflowAssigned,
    WorkflowEscalated,
    WorkflowRejected,
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub claim_id: ClaimId,
    pub action: AuditAction,
    pub actor: UserId,
    pub timestamp: DateTime<Utc>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub note: Option<String>,
}

impl AuditEntry {
    pub fn new(claim_id: ClaimId, action: AuditAction, actor: UserId) -> Self {
        Self {
            id: AuditEntryId::new_v7(),
            claim_id,
            action,
            actor,
            timestamp: Utc::now(),
            old_value: None,
            new_value: None,
            note: None,
        }
    }

    pub fn with_change(mut self, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Audit persistence
#[async_trait]
pub trait AuditSinkPort: DomainPort {
    async fn append(&self, entry: AuditEntry) -> Result<(), PortError>;

    /// Entries of a claim in append order
    async fn entries_for_claim(&self, claim_id: ClaimId) -> Result<Vec<AuditEntry>, PortError>;
}

/// In-process audit log
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<HashMap<ClaimId, Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all claims
    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl DomainPort for InMemoryAuditLog {}

#[async_trait]
impl AuditSinkPort for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), PortError> {
        tracing::debug!(claim_id = %entry.claim_id, action = ?entry.action, "audit entry appended");
        self.entries
            .write()
            .await
            .entry(entry.claim_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn entries_for_claim(&self, claim_id: ClaimId) -> Result<Vec<AuditEntry>, PortError> {
        Ok(self
            .entries
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
    use serde_json::json;

    #[tokio::test]
    async fn test_entries_are_kept_per_claim_in_order() {
        let log = InMemoryAuditLog::new();
        let claim_id = ClaimId::new();
        let actor = UserId::new();

        log.append(AuditEntry::new(claim_id, AuditAction::WorkflowInitialized, actor)).await.unwrap();
        log.append(AuditEntry::new(ClaimId::new(), AuditAction::WorkflowInitialized, actor)).await.unwrap();
        log.append(
            AuditEntry::new(claim_id, AuditAction::WorkflowEscalated, actor)
                .with_change(Some(json!("low")), Some(json!("medium")))
                .with_note("deadline at risk"),
        )
        .await
        .unwrap();

        let entries = log.entries_for_claim(claim_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::WorkflowInitialized);
        assert_eq!(entries[1].new_value, Some(json!("medium")));
        assert_eq!(entries[1].note.as_deref(), Some("deadline at risk"));
        assert_eq!(log.len().await, 3);
    }

    #[tokio::test]
    async fn test_unknown_claim_has_empty_trail() {
        let log = InMemoryAuditLog::new();
        assert!(log.entries_for_claim(ClaimId::new()).await.unwrap().is_empty());
        assert!(log.is_empty().await);
    }
}
