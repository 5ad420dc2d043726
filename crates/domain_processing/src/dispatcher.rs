//! Bounded-concurrency document dispatcher
//!
//! The [`DocumentPipeline`] owns the job queue, the in-flight set and the
//! batch tracker. One dispatch loop task pops requests in priority order
//! while fewer than `max_concurrent_jobs` are in flight, and runs each as its
//! own task. The loop is woken on enqueue, on slot release and on limit
//! changes; the poll interval is only a fallback.
//!
//! ```text
//! submit_batch / submit_single
//!            │
//!            ▼
//!      ┌──────────┐  pop   ┌────────────┐ analyze ┌──────────────────────┐
//!      │ JobQueue │ ─────▶ │ job task N │ ──────▶ │ DocumentAnalysisPort │
//!      └──────────┘        └────────────┘         └──────────────────────┘
//!            ▲                   │ ok: DocumentStorePort + DocumentProcessed
//!            │ retry (low tier)  │ terminal: DocumentFailed
//!            └───────────────────┤
//!                                ▼
//!                          BatchTracker ──▶ BatchCompleted
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use core_kernel::{BatchId, JobId};

use crate::batch::{BatchJob, BatchTracker, JobOutcome};
use crate::config::{clamp_concurrency, DispatcherConfig};
use crate::error::ProcessingError;
use crate::events::{EventChannel, EventSubscription, PipelineEvent};
use crate::ports::{AnalysisResult, DocumentAnalysisPort, DocumentStorePort};
use crate::queue::JobQueue;
use crate::request::{DocumentSubmission, JobPriority, ProcessingRequest};
use crate::retry::{RetryDecision, RetryPolicy};

/// Point-in-time view of the dispatcher, for monitoring only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub processing: usize,
    pub total_active: usize,
    pub max_concurrent: usize,
}

#[derive(Debug)]
struct DispatchState {
    queue: JobQueue,
    in_flight: HashSet<JobId>,
    accepting: bool,
}

struct PipelineInner {
    state: Mutex<DispatchState>,
    batches: Mutex<BatchTracker>,
    max_concurrent: AtomicUsize,
    wake: Notify,
    idle: Notify,
    shutdown: watch::Sender<bool>,
    events: EventChannel,
    analysis: Arc<dyn DocumentAnalysisPort>,
    store: Arc<dyn DocumentStorePort>,
    retry: RetryPolicy,
    config: DispatcherConfig,
}

/// The document processing service
///
/// Must be started from within a tokio runtime. Dropping the pipeline stops
/// the dispatch loop; [`DocumentPipeline::shutdown`] additionally waits for
/// in-flight work to be cancelled and marks unfinished batches failed.
pub struct DocumentPipeline {
    inner: Arc<PipelineInner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl DocumentPipeline {
    /// Creates the pipeline and spawns its dispatch loop
    pub fn start(
        config: DispatcherConfig,
        analysis: Arc<dyn DocumentAnalysisPort>,
        store: Arc<dyn DocumentStorePort>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let retention = config
            .batch_retention
            .and_then(|r| chrono::Duration::from_std(r).ok());
        let inner = Arc::new(PipelineInner {
            state: Mutex::new(DispatchState {
                queue: JobQueue::new(),
                in_flight: HashSet::new(),
                accepting: true,
            }),
            batches: Mutex::new(BatchTracker::new(retention)),
            max_concurrent: AtomicUsize::new(clamp_concurrency(config.max_concurrent_jobs)),
            wake: Notify::new(),
            idle: Notify::new(),
            shutdown,
            events: EventChannel::new(config.event_capacity),
            analysis,
            store,
            retry: RetryPolicy::new(),
            config,
        });

        info!(
            max_concurrent = inner.max_concurrent.load(Ordering::Relaxed),
            max_retries = inner.config.max_retries,
            "document pipeline started"
        );
        let handle = tokio::spawn(Arc::clone(&inner).run());

        Self {
            inner,
            dispatcher: Mutex::new(Some(handle)),
        }
    }

    /// Enqueues a batch of documents, returning the new batch id
    ///
    /// Items without an explicit priority are queued as `normal`.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn submit_batch(&self, items: Vec<DocumentSubmission>) -> Result<BatchId, ProcessingError> {
        if items.is_empty() {
            return Err(ProcessingError::EmptyBatch);
        }
        for item in &items {
            item.validate()?;
        }

        let batch_id = BatchId::new_v7();
        let max_retries = self.inner.config.max_retries;
        let requests: Vec<ProcessingRequest> = items
            .into_iter()
            .map(|item| {
                ProcessingRequest::from_submission(item, JobPriority::Normal, max_retries, Some(batch_id))
            })
            .collect();
        let batch = BatchJob::new(batch_id, requests.iter().map(|r| r.id).collect());

        {
            let mut state = self.inner.state.lock().await;
            if !state.accepting {
                return Err(ProcessingError::ShutDown);
            }
            // Registered before any of its jobs can be dispatched
            self.inner.batches.lock().await.register(batch);
            for request in requests {
                state.queue.push_back(request);
            }
        }
        self.inner.wake.notify_one();

        info!(%batch_id, "batch submitted");
        Ok(batch_id)
    }

    /// Enqueues one document ahead of queued documents of equal priority
    ///
    /// Defaults to `high` priority.
    #[instrument(skip(self, item), fields(document_id = %item.document_id))]
    pub async fn submit_single(&self, item: DocumentSubmission) -> Result<JobId, ProcessingError> {
        item.validate()?;
        let request = ProcessingRequest::from_submission(
            item,
            JobPriority::High,
            self.inner.config.max_retries,
            None,
        );
        let job_id = request.id;

        {
            let mut state = self.inner.state.lock().await;
            if !state.accepting {
                return Err(ProcessingError::ShutDown);
            }
            state.queue.push_front(request);
        }
        self.inner.wake.notify_one();

        debug!(%job_id, "single document submitted");
        Ok(job_id)
    }

    pub async fn queue_status(&self) -> QueueStatus {
        let state = self.inner.state.lock().await;
        let queued = state.queue.len();
        let processing = state.in_flight.len();
        QueueStatus {
            queued,
            processing,
            total_active: queued + processing,
            max_concurrent: self.inner.max_concurrent.load(Ordering::Acquire),
        }
    }

    /// Changes the concurrency bound, returning the clamped value applied
    pub fn set_max_concurrent_jobs(&self, requested: usize) -> usize {
        let applied = clamp_concurrency(requested);
        self.inner.max_concurrent.store(applied, Ordering::Release);
        if applied != requested {
            warn!(requested, applied, "concurrency limit clamped");
        } else {
            info!(applied, "concurrency limit changed");
        }
        self.inner.wake.notify_one();
        applied
    }

    pub async fn batch_status(&self, batch_id: BatchId) -> Option<BatchJob> {
        self.inner.batches.lock().await.get(batch_id).cloned()
    }

    pub async fn all_batches(&self) -> Vec<BatchJob> {
        self.inner.batches.lock().await.all()
    }

    /// Drops completed batches, returning how many were removed
    pub async fn clear_completed_batches(&self) -> usize {
        let cleared = self.inner.batches.lock().await.clear_completed();
        debug!(cleared, "completed batches cleared");
        cleared
    }

    /// Subscribes to pipeline events published from now on
    pub fn subscribe(&self) -> EventSubscription {
        self.inner.events.subscribe()
    }

    /// Stops accepting work, cancels in-flight analysis and fails open batches
    pub async fn shutdown(&self) {
        let drained = {
            let mut state = self.inner.state.lock().await;
            if !state.accepting {
                return;
            }
            state.accepting = false;
            state.queue.drain()
        };
        self.inner.shutdown.send_replace(true);

        for request in &drained {
            self.inner.persist_failure(request, "pipeline shut down").await;
        }

        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "dispatch loop ended abnormally");
            }
        }

        loop {
            let idle = self.inner.idle.notified();
            if self.inner.state.lock().await.in_flight.is_empty() {
                break;
            }
            idle.await;
        }

        let abandoned = self.inner.batches.lock().await.abandon_incomplete();
        info!(
            dropped = drained.len(),
            abandoned_batches = abandoned.len(),
            "document pipeline shut down"
        );
    }
}

impl Drop for DocumentPipeline {
    fn drop(&mut self) {
        self.inner.shutdown.send_replace(true);
    }
}

impl PipelineInner {
    async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            self.dispatch_ready().await;
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
        debug!("dispatch loop stopped");
    }

    /// Starts queued requests until the concurrency bound is reached
    async fn dispatch_ready(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        if !state.accepting {
            return;
        }
        let limit = self.max_concurrent.load(Ordering::Acquire);
        while state.in_flight.len() < limit {
            let Some(request) = state.queue.pop() else {
                break;
            };
            state.in_flight.insert(request.id);
            debug!(
                job_id = %request.id,
                priority = ?request.priority,
                attempt = request.attempts + 1,
                "dispatching request"
            );
            let inner = Arc::clone(self);
            tokio::spawn(inner.process(request));
        }
    }

    async fn process(self: Arc<Self>, mut request: ProcessingRequest) {
        match self.attempt(&request).await {
            Ok(result) => {
                self.release(request.id, None).await;
                self.events.publish(PipelineEvent::DocumentProcessed {
                    document_id: request.document_id,
                    job_id: request.id,
                    result,
                    timestamp: Utc::now(),
                });
                self.settle(&request, JobOutcome::Processed).await;
            }
            Err(e) if e.is_cancellation() => {
                // Persisted before the slot is freed so shutdown observes it
                self.persist_failure(&request, &e.to_string()).await;
                self.release(request.id, None).await;
            }
            Err(e) => {
                let message = e.to_string();
                match self.retry.on_failure(&mut request) {
                    RetryDecision::Retry { .. } => {
                        warn!(
                            job_id = %request.id,
                            attempts = request.attempts,
                            max_retries = request.max_retries,
                            error = %message,
                            "analysis failed, retrying"
                        );
                        if self.config.retry_delay.is_zero() {
                            self.release(request.id, Some(request)).await;
                        } else {
                            self.release(request.id, None).await;
                            Arc::clone(&self).requeue_after_delay(request);
                        }
                    }
                    RetryDecision::Fail => {
                        warn!(
                            job_id = %request.id,
                            attempts = request.attempts,
                            error = %message,
                            "analysis failed terminally"
                        );
                        self.release(request.id, None).await;
                        self.persist_failure(&request, &message).await;
                        self.events.publish(PipelineEvent::DocumentFailed {
                            document_id: request.document_id,
                            job_id: request.id,
                            error: message,
                            attempts: request.attempts,
                            timestamp: Utc::now(),
                        });
                        self.settle(&request, JobOutcome::Failed).await;
                    }
                }
            }
        }
    }

    /// One analysis attempt, including persistence of its result
    async fn attempt(&self, request: &ProcessingRequest) -> Result<AnalysisResult, ProcessingError> {
        self.store.mark_processing(request.document_id, request.id).await?;

        let analysis = Arc::clone(&self.analysis);
        let (path, file_type) = (request.file_path.clone(), request.file_type.clone());
        // A panicking analyser surfaces as a JoinError instead of unwinding this task
        let mut handle = tokio::spawn(async move { analysis.analyze(&path, &file_type).await });
        let mut shutdown = self.shutdown.subscribe();
        let timeout = self.config.job_timeout;

        let result = tokio::select! {
            joined = tokio::time::timeout(timeout, &mut handle) => match joined {
                Ok(Ok(result)) => result.map_err(ProcessingError::from),
                Ok(Err(join_error)) => Err(ProcessingError::Aborted(join_error.to_string())),
                Err(_) => {
                    handle.abort();
                    Err(ProcessingError::Timeout(timeout.as_millis() as u64))
                }
            },
            _ = cancelled(&mut shutdown) => {
                handle.abort();
                Err(ProcessingError::Cancelled)
            }
        };
        let result = result?;

        self.store
            .save_result(request.document_id, request.id, &result)
            .await?;
        Ok(result)
    }

    /// Frees the request's slot, optionally re-enqueueing it in the same step
    async fn release(&self, job_id: JobId, requeue: Option<ProcessingRequest>) {
        let (now_idle, rejected) = {
            let mut state = self.state.lock().await;
            state.in_flight.remove(&job_id);
            let rejected = match requeue {
                Some(request) if state.accepting => {
                    state.queue.push_back(request);
                    None
                }
                other => other,
            };
            (state.in_flight.is_empty(), rejected)
        };

        self.wake.notify_one();
        if now_idle {
            self.idle.notify_waiters();
        }
        if let Some(request) = rejected {
            self.persist_failure(&request, "pipeline shut down").await;
        }
    }

    fn requeue_after_delay(self: Arc<Self>, request: ProcessingRequest) {
        let delay = self.config.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let accepted = {
                let mut state = self.state.lock().await;
                if state.accepting {
                    state.queue.push_back(request.clone());
                }
                state.accepting
            };
            if accepted {
                self.wake.notify_one();
            } else {
                self.persist_failure(&request, "pipeline shut down").await;
            }
        });
    }

    async fn persist_failure(&self, request: &ProcessingRequest, message: &str) {
        if let Err(e) = self
            .store
            .mark_failed(request.document_id, request.id, message, request.attempts)
            .await
        {
            error!(job_id = %request.id, error = %e, "failed to persist document failure");
        }
    }

    async fn settle(&self, request: &ProcessingRequest, outcome: JobOutcome) {
        let Some(batch_id) = request.batch_id else {
            return;
        };
        let completed = self.batches.lock().await.record(batch_id, request.id, outcome);
        if let Some(batch) = completed {
            info!(
                %batch_id,
                processed = batch.progress.processed,
                failed = batch.progress.failed,
                "batch completed"
            );
            self.events.publish(PipelineEvent::BatchCompleted {
                batch,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Resolves once the shutdown flag is raised
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
