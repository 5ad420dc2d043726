//! Custom Test Assertions
//!
//! Assertion helpers for domain types that give more meaningful failure
//! messages than bare `assert!`.

use domain_processing::{BatchJob, BatchStatus};
use domain_verification::{AuditAction, AuditEntry, StepStatus, VerificationWorkflow};

/// Asserts the progress invariant of a batch
///
/// `processed + failed` never exceeds `total`, and the batch is `completed`
/// exactly when every job has an outcome (a batch abandoned at shutdown is
/// `failed` and incomplete).
pub fn assert_batch_consistent(batch: &BatchJob) {
    let progress = batch.progress;
    assert!(
        progress.settled() <= progress.total,
        "Batch {} over-counted: processed={}, failed={}, total={}",
        batch.id,
        progress.processed,
        progress.failed,
        progress.total
    );
    assert_eq!(
        batch.status == BatchStatus::Completed,
        progress.is_complete(),
        "Batch {} status {:?} disagrees with progress {:?}",
        batch.id,
        batch.status,
        progress
    );
    assert_eq!(
        batch.completed_at.is_some(),
        batch.status == BatchStatus::Completed,
        "Batch {} completion timestamp disagrees with status {:?}",
        batch.id,
        batch.status
    );
}

/// Asserts a batch completed with the given counters
pub fn assert_batch_completed(batch: &BatchJob, processed: usize, failed: usize) {
    assert_batch_consistent(batch);
    assert_eq!(batch.status, BatchStatus::Completed, "Batch {} not completed", batch.id);
    assert_eq!(
        (batch.progress.processed, batch.progress.failed),
        (processed, failed),
        "Batch {} counters mismatch",
        batch.id
    );
}

/// Asserts the audit trail consists of exactly these actions, in order
pub fn assert_audit_actions(entries: &[AuditEntry], expected: &[AuditAction]) {
    let actual: Vec<AuditAction> = entries.iter().map(|e| e.action).collect();
    assert_eq!(actual, expected, "Audit trail mismatch");
}

/// Asserts the status of every step, in catalog order
pub fn assert_step_statuses(workflow: &VerificationWorkflow, expected: &[StepStatus]) {
    let actual: Vec<StepStatus> = workflow.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        actual, expected,
        "Step statuses of workflow {} mismatch",
        workflow.id
    );
}

/// Asserts `calls` contains `first` before `second`
pub fn assert_called_before(calls: &[String], first: &str, second: &str) {
    let position = |needle: &str| {
        calls
            .iter()
            .position(|c| c == needle)
            .unwrap_or_else(|| panic!("{needle} was never called; calls: {calls:?}"))
    };
    assert!(
        position(first) < position(second),
        "Expected {first} before {second}; calls: {calls:?}"
    );
}
