//! Batch progress aggregation

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, JobId};

/// Batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Submitted, no outcome recorded yet
    Pending,
    /// At least one outcome recorded
    Processing,
    /// Every job reached a final outcome
    Completed,
    /// Abandoned before completion (pipeline shutdown)
    Failed,
}

/// Progress counters of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

impl BatchProgress {
    /// Jobs with a final outcome
    pub fn settled(&self) -> usize {
        self.processed + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.settled() == self.total
    }
}

/// Final outcome of one job, as seen by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Processed,
    Failed,
}

/// A set of documents submitted together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: BatchId,
    /// Jobs in submission order
    pub job_ids: Vec<JobId>,
    pub status: BatchStatus,
    pub progress: BatchProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    pub fn new(id: BatchId, job_ids: Vec<JobId>) -> Self {
        let now = Utc::now();
        Self {
            id,
            progress: BatchProgress {
                total: job_ids.len(),
                ..Default::default()
            },
            job_ids,
            status: BatchStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }
}

/// Aggregates job outcomes into batch progress
///
/// Each job is counted at most once, so a duplicated outcome can neither
/// push a counter past `total` nor complete a batch twice.
#[derive(Debug, Default)]
pub struct BatchTracker {
    batches: HashMap<BatchId, BatchJob>,
    settled: HashMap<BatchId, HashSet<JobId>>,
    retention: Option<Duration>,
}

impl BatchTracker {
    pub fn new(retention: Option<Duration>) -> Self {
        Self {
            retention,
            ..Default::default()
        }
    }

    /// Registers a newly submitted batch
    pub fn register(&mut self, batch: BatchJob) {
        self.settled.insert(batch.id, HashSet::new());
        self.batches.insert(batch.id, batch);
    }

    /// Records a job outcome
    ///
    /// Returns a snapshot of the batch only on the call that completed it.
    pub fn record(&mut self, batch_id: BatchId, job_id: JobId, outcome: JobOutcome) -> Option<BatchJob> {
        let batch = self.batches.get_mut(&batch_id)?;
        if matches!(batch.status, BatchStatus::Completed | BatchStatus::Failed) {
            return None;
        }
        if !batch.job_ids.contains(&job_id) {
            tracing::warn!(%batch_id, %job_id, "outcome for job outside batch ignored");
            return None;
        }
        let settled = self.settled.entry(batch_id).or_default();
        if !settled.insert(job_id) {
            tracing::debug!(%batch_id, %job_id, "duplicate outcome ignored");
            return None;
        }

        match outcome {
            JobOutcome::Processed => batch.progress.processed += 1,
            JobOutcome::Failed => batch.progress.failed += 1,
        }
        let now = Utc::now();
        batch.updated_at = now;

        if batch.progress.is_complete() {
            batch.status = BatchStatus::Completed;
            batch.completed_at = Some(now);
            self.settled.remove(&batch_id);
            let snapshot = batch.clone();
            self.evict_expired(now);
            return Some(snapshot);
        }

        batch.status = BatchStatus::Processing;
        None
    }

    pub fn get(&self, batch_id: BatchId) -> Option<&BatchJob> {
        self.batches.get(&batch_id)
    }

    /// All tracked batches, oldest first
    pub fn all(&self) -> Vec<BatchJob> {
        let mut batches: Vec<BatchJob> = self.batches.values().cloned().collect();
        batches.sort_by_key(|b| b.created_at);
        batches
    }

    /// Drops completed batches, returning how many were removed
    pub fn clear_completed(&mut self) -> usize {
        let before = self.batches.len();
        self.batches.retain(|_, b| !b.is_completed());
        before - self.batches.len()
    }

    /// Marks every unfinished batch as failed, returning their ids
    pub fn abandon_incomplete(&mut self) -> Vec<BatchId> {
        let now = Utc::now();
        let mut abandoned = Vec::new();
        for batch in self.batches.values_mut() {
            if matches!(batch.status, BatchStatus::Pending | BatchStatus::Processing) {
                batch.status = BatchStatus::Failed;
                batch.updated_at = now;
                abandoned.push(batch.id);
            }
        }
        for id in &abandoned {
            self.settled.remove(id);
        }
        abandoned
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) {
        let Some(retention) = self.retention else {
            return;
        };
        let before = self.batches.len();
        self.batches.retain(|_, b| match b.completed_at {
            Some(completed_at) => now - completed_at <= retention,
            None => true,
        });
        let evicted = before - self.batches.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired batches");
        }
    }
}
