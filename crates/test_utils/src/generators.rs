//! Property-Based Test Generators
//!
//! Proptest strategies for generating random test data that respects domain
//! invariants.

use proptest::prelude::*;

use domain_processing::{DocumentSubmission, JobPriority};
use domain_verification::WorkflowPriority;

use crate::builders::SubmissionBuilder;

/// Strategy for job priorities
pub fn job_priority_strategy() -> impl Strategy<Value = JobPriority> {
    prop_oneof![
        Just(JobPriority::High),
        Just(JobPriority::Normal),
        Just(JobPriority::Low),
    ]
}

/// Strategy for workflow priorities
pub fn workflow_priority_strategy() -> impl Strategy<Value = WorkflowPriority> {
    prop_oneof![
        Just(WorkflowPriority::Low),
        Just(WorkflowPriority::Medium),
        Just(WorkflowPriority::High),
        Just(WorkflowPriority::Urgent),
    ]
}

/// Strategy for scan file types
pub fn file_type_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("pdf"), Just("jpg"), Just("png"), Just("tiff")].prop_map(str::to_string)
}

/// Strategy for valid submissions with distinct-looking paths
pub fn submission_strategy() -> impl Strategy<Value = DocumentSubmission> {
    (
        "[a-z]{3,12}",
        file_type_strategy(),
        prop::option::of(job_priority_strategy()),
    )
        .prop_map(|(name, file_type, priority)| {
            let builder = SubmissionBuilder::new()
                .with_path(format!("/scans/{name}.{file_type}"))
                .with_file_type(file_type);
            match priority {
                Some(priority) => builder.with_priority(priority).build(),
                None => builder.build(),
            }
        })
}

/// Strategy for a batch of 1 to `max` submissions
pub fn batch_strategy(max: usize) -> impl Strategy<Value = Vec<DocumentSubmission>> {
    prop::collection::vec(submission_strategy(), 1..=max.max(1))
}
