//! Document Processing Domain
//!
//! This crate implements the asynchronous pipeline that analyses scanned
//! land-claim documents: a priority-ordered job queue, a bounded-concurrency
//! dispatcher with retry, batch progress tracking and a typed event stream.
//!
//! # Request Lifecycle
//!
//! ```text
//! Queued -> In flight -> Processed
//!              │
//!              └-> failed -> Queued (low tier) ... -> Failed (ceiling exceeded)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let pipeline = DocumentPipeline::start(DispatcherConfig::default(), analysis, store);
//! let mut events = pipeline.subscribe();
//! let batch_id = pipeline.submit_batch(submissions).await?;
//! while let Some(event) = events.recv().await {
//!     if let PipelineEvent::BatchCompleted { batch, .. } = event {
//!         if batch.id == batch_id { break; }
//!     }
//! }
//! ```

pub mod adapters;
pub mod batch;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod ports;
pub mod queue;
pub mod request;
pub mod retry;

pub use adapters::{InMemoryDocumentStore, ScriptedAnalysis};
pub use batch::{BatchJob, BatchProgress, BatchStatus, BatchTracker, JobOutcome};
pub use config::{DispatcherConfig, DispatcherSettings};
pub use dispatcher::{DocumentPipeline, QueueStatus};
pub use error::ProcessingError;
pub use events::{EventChannel, EventSubscription, PipelineEvent};
pub use ports::{
    AnalysisResult, DocumentAnalysisPort, DocumentRecord, DocumentStatus, DocumentStorePort,
    ExtractedEntity,
};
pub use queue::JobQueue;
pub use request::{DocumentSubmission, JobPriority, ProcessingRequest};
pub use retry::{RetryDecision, RetryPolicy};
