//! Pipeline events
//!
//! Events are published on a tokio broadcast channel. Callers receive them
//! through an [`EventSubscription`]; dropping the subscription unsubscribes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use core_kernel::{DocumentId, JobId};

use crate::batch::BatchJob;
use crate::ports::AnalysisResult;

/// Notifications emitted by the processing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A document was analysed and its result persisted
    DocumentProcessed {
        document_id: DocumentId,
        job_id: JobId,
        result: AnalysisResult,
        timestamp: DateTime<Utc>,
    },

    /// A document failed terminally (retry ceiling exceeded)
    DocumentFailed {
        document_id: DocumentId,
        job_id: JobId,
        error: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// Every job of a batch reached a final outcome
    BatchCompleted {
        batch: BatchJob,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Returns the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PipelineEvent::DocumentProcessed { timestamp, .. } => *timestamp,
            PipelineEvent::DocumentFailed { timestamp, .. } => *timestamp,
            PipelineEvent::BatchCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::DocumentProcessed { .. } => "documentProcessed",
            PipelineEvent::DocumentFailed { .. } => "documentFailed",
            PipelineEvent::BatchCompleted { .. } => "batchCompleted",
        }
    }
}

/// Publishing side of the pipeline's event stream
#[derive(Debug, Clone)]
pub struct EventChannel {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes to current subscribers; having none is not an error
    pub fn publish(&self, event: PipelineEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(receivers) => tracing::trace!(event_type, receivers, "event published"),
            Err(_) => tracing::trace!(event_type, "event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving handle for pipeline events
///
/// Only events published after the subscription was created are delivered.
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<PipelineEvent>,
}

impl EventSubscription {
    /// Waits for the next event; `None` once the pipeline is gone
    ///
    /// A subscriber that falls behind the channel capacity skips the
    /// overwritten events and continues with the oldest retained one.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already published event without waiting
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
