//! End-to-end tests for the document pipeline
//!
//! These drive a real `DocumentPipeline` against the in-memory adapters and
//! observe it through the event stream and status queries.

use std::sync::Arc;
use std::time::Duration;

use core_kernel::{BatchId, DocumentId};
use domain_processing::{
    BatchJob, BatchStatus, DispatcherConfig, DocumentPipeline, DocumentStatus, DocumentStorePort,
    DocumentSubmission, EventSubscription, InMemoryDocumentStore, JobPriority, PipelineEvent,
    ScriptedAnalysis,
};
use proptest::prelude::*;
use test_utils::{assert_batch_completed, assert_called_before, batch_strategy, AnalysisFixtures};

const WAIT: Duration = Duration::from_secs(10);

struct Harness {
    pipeline: DocumentPipeline,
    analysis: Arc<ScriptedAnalysis>,
    store: Arc<InMemoryDocumentStore>,
}

fn harness(config: DispatcherConfig, analysis: ScriptedAnalysis) -> Harness {
    let analysis = Arc::new(analysis);
    let store = Arc::new(InMemoryDocumentStore::new());
    let pipeline = DocumentPipeline::start(config, analysis.clone(), store.clone());
    Harness { pipeline, analysis, store }
}

fn fast_config() -> DispatcherConfig {
    DispatcherConfig::default().with_poll_interval(Duration::from_millis(20))
}

fn doc(path: &str) -> DocumentSubmission {
    DocumentSubmission::new(DocumentId::new(), path, "pdf")
}

async fn wait_for_batch(events: &mut EventSubscription, batch_id: BatchId) -> BatchJob {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(PipelineEvent::BatchCompleted { batch, .. }) if batch.id == batch_id => {
                    return batch
                }
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("batch did not complete in time")
}

async fn wait_until_processing(pipeline: &DocumentPipeline, count: usize) {
    tokio::time::timeout(WAIT, async {
        while pipeline.queue_status().await.processing < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("requests were not dispatched in time")
}

mod ordering {
    use super::*;

    #[tokio::test]
    async fn test_batch_dispatches_by_priority() {
        let h = harness(fast_config().with_max_concurrent_jobs(1), ScriptedAnalysis::new());
        let mut events = h.pipeline.subscribe();

        let batch_id = h
            .pipeline
            .submit_batch(vec![
                doc("/low.pdf").with_priority(JobPriority::Low),
                doc("/high.pdf").with_priority(JobPriority::High),
                doc("/normal.pdf").with_priority(JobPriority::Normal),
            ])
            .await
            .unwrap();
        wait_for_batch(&mut events, batch_id).await;

        assert_eq!(
            h.analysis.calls().await,
            vec!["/high.pdf", "/normal.pdf", "/low.pdf"]
        );
    }

    #[tokio::test]
    async fn test_single_submission_jumps_equal_and_lower_tiers() {
        let analysis = ScriptedAnalysis::new().with_latency(Duration::from_millis(50));
        let h = harness(fast_config().with_max_concurrent_jobs(1), analysis);
        let mut events = h.pipeline.subscribe();

        let first = h.pipeline.submit_batch(vec![doc("/blocker.pdf")]).await.unwrap();
        wait_until_processing(&h.pipeline, 1).await;

        let queued = h
            .pipeline
            .submit_batch(vec![
                doc("/queued-low.pdf").with_priority(JobPriority::Low),
                doc("/queued-normal.pdf"),
                doc("/queued-high.pdf").with_priority(JobPriority::High),
            ])
            .await
            .unwrap();
        h.pipeline.submit_single(doc("/single.pdf")).await.unwrap();

        wait_for_batch(&mut events, first).await;
        wait_for_batch(&mut events, queued).await;

        assert_eq!(
            h.analysis.calls().await,
            vec![
                "/blocker.pdf",
                "/single.pdf",
                "/queued-high.pdf",
                "/queued-normal.pdf",
                "/queued-low.pdf",
            ]
        );
    }

    #[tokio::test]
    async fn test_single_submission_stays_behind_higher_tier() {
        let analysis = ScriptedAnalysis::new().with_latency(Duration::from_millis(50));
        let h = harness(fast_config().with_max_concurrent_jobs(1), analysis);
        let mut events = h.pipeline.subscribe();

        let first = h.pipeline.submit_batch(vec![doc("/blocker.pdf")]).await.unwrap();
        wait_until_processing(&h.pipeline, 1).await;

        let queued = h
            .pipeline
            .submit_batch(vec![doc("/queued-high.pdf").with_priority(JobPriority::High)])
            .await
            .unwrap();
        h.pipeline
            .submit_single(doc("/single-normal.pdf").with_priority(JobPriority::Normal))
            .await
            .unwrap();

        wait_for_batch(&mut events, first).await;
        wait_for_batch(&mut events, queued).await;
        tokio::time::timeout(WAIT, async {
            while h.analysis.call_count("/single-normal.pdf").await == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(
            h.analysis.calls().await,
            vec!["/blocker.pdf", "/queued-high.pdf", "/single-normal.pdf"]
        );
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn test_in_flight_never_exceeds_bound() {
        let analysis = ScriptedAnalysis::new().with_latency(Duration::from_millis(30));
        let h = harness(fast_config().with_max_concurrent_jobs(2), analysis);
        let mut events = h.pipeline.subscribe();

        let items = (0..8).map(|i| doc(&format!("/doc-{}.pdf", i))).collect();
        let batch_id = h.pipeline.submit_batch(items).await.unwrap();
        let batch = wait_for_batch(&mut events, batch_id).await;

        assert_eq!(batch.progress.processed, 8);
        assert!(h.analysis.peak_concurrency() <= 2);
        assert_eq!(h.analysis.peak_concurrency(), 2);
    }

    #[tokio::test]
    async fn test_raising_limit_dispatches_more() {
        let analysis = ScriptedAnalysis::new().with_latency(Duration::from_millis(100));
        let h = harness(fast_config().with_max_concurrent_jobs(1), analysis);

        let items = (0..4).map(|i| doc(&format!("/doc-{}.pdf", i))).collect();
        h.pipeline.submit_batch(items).await.unwrap();
        wait_until_processing(&h.pipeline, 1).await;

        h.pipeline.set_max_concurrent_jobs(4);
        wait_until_processing(&h.pipeline, 3).await;

        let status = h.pipeline.queue_status().await;
        assert_eq!(status.max_concurrent, 4);
        assert!(status.processing <= 4);
    }

    #[tokio::test]
    async fn test_status_snapshot_counts_queued_and_processing() {
        let analysis = ScriptedAnalysis::new().with_latency(Duration::from_millis(200));
        let h = harness(fast_config().with_max_concurrent_jobs(1), analysis);

        let items = (0..3).map(|i| doc(&format!("/doc-{}.pdf", i))).collect();
        h.pipeline.submit_batch(items).await.unwrap();
        wait_until_processing(&h.pipeline, 1).await;

        let status = h.pipeline.queue_status().await;
        assert_eq!(status.processing, 1);
        assert_eq!(status.queued, 2);
        assert_eq!(status.total_active, 3);
    }
}

mod retries {
    use super::*;

    #[tokio::test]
    async fn test_transient_failures_recover_within_ceiling() {
        let h = harness(fast_config().with_max_retries(3), ScriptedAnalysis::new());
        h.analysis.fail_times("/flaky.pdf", 2).await;
        let mut events = h.pipeline.subscribe();

        let batch_id = h
            .pipeline
            .submit_batch(vec![doc("/a.pdf"), doc("/flaky.pdf"), doc("/b.pdf")])
            .await
            .unwrap();
        let batch = wait_for_batch(&mut events, batch_id).await;

        assert_batch_completed(&batch, 3, 0);
        assert_eq!(batch.progress.total, 3);
        assert_eq!(h.analysis.call_count("/flaky.pdf").await, 3);
    }

    #[tokio::test]
    async fn test_ceiling_exceeded_is_terminal() {
        let h = harness(fast_config().with_max_retries(2), ScriptedAnalysis::new());
        h.analysis.always_fail("/broken.pdf").await;
        let mut events = h.pipeline.subscribe();

        let broken = doc("/broken.pdf");
        let broken_id = broken.document_id;
        let batch_id = h.pipeline.submit_batch(vec![broken, doc("/fine.pdf")]).await.unwrap();

        let mut failure = None;
        let batch = tokio::time::timeout(WAIT, async {
            loop {
                match events.recv().await.expect("stream closed") {
                    PipelineEvent::DocumentFailed { document_id, attempts, error, .. } => {
                        failure = Some((document_id, attempts, error));
                    }
                    PipelineEvent::BatchCompleted { batch, .. } if batch.id == batch_id => {
                        return batch
                    }
                    _ => {}
                }
            }
        })
        .await
        .unwrap();

        let (document_id, attempts, error) = failure.expect("no failure event");
        assert_eq!(document_id, broken_id);
        assert_eq!(attempts, 3);
        assert!(error.contains("unavailable"));
        assert_eq!(h.analysis.call_count("/broken.pdf").await, 3);

        assert_batch_completed(&batch, 1, 1);

        let record = h.store.get_document(broken_id).await.unwrap();
        assert_eq!(record.status, DocumentStatus::Failed);
        assert_eq!(record.attempts, 3);
    }

    #[tokio::test]
    async fn test_retry_delay_still_completes() {
        let config = fast_config()
            .with_max_retries(1)
            .with_retry_delay(Duration::from_millis(30));
        let h = harness(config, ScriptedAnalysis::new());
        h.analysis.fail_times("/slow-retry.pdf", 1).await;
        let mut events = h.pipeline.subscribe();

        let batch_id = h.pipeline.submit_batch(vec![doc("/slow-retry.pdf")]).await.unwrap();
        let batch = wait_for_batch(&mut events, batch_id).await;

        assert_eq!(batch.progress.processed, 1);
        assert_eq!(h.analysis.call_count("/slow-retry.pdf").await, 2);
    }
}

mod isolation {
    use super::*;

    #[tokio::test]
    async fn test_panicking_analysis_does_not_stop_pipeline() {
        let h = harness(fast_config().with_max_retries(0), ScriptedAnalysis::new());
        h.analysis.panic_on("/poison.pdf").await;
        let mut events = h.pipeline.subscribe();

        let batch_id = h
            .pipeline
            .submit_batch(vec![doc("/poison.pdf"), doc("/healthy.pdf")])
            .await
            .unwrap();
        let batch = wait_for_batch(&mut events, batch_id).await;

        assert_eq!(batch.progress.processed, 1);
        assert_eq!(batch.progress.failed, 1);

        // Still dispatching afterwards
        let next = h.pipeline.submit_batch(vec![doc("/after.pdf")]).await.unwrap();
        assert_eq!(wait_for_batch(&mut events, next).await.progress.processed, 1);
    }

    #[tokio::test]
    async fn test_hanging_analysis_times_out() {
        let config = fast_config()
            .with_max_retries(0)
            .with_job_timeout(Duration::from_millis(100));
        let h = harness(config, ScriptedAnalysis::new());
        h.analysis.hang("/stuck.pdf").await;
        let mut events = h.pipeline.subscribe();

        let batch_id = h.pipeline.submit_batch(vec![doc("/stuck.pdf")]).await.unwrap();
        let batch = wait_for_batch(&mut events, batch_id).await;

        assert_eq!(batch.progress.failed, 1);
        assert_eq!(h.pipeline.queue_status().await.processing, 0);
    }
}

mod batches {
    use super::*;

    #[tokio::test]
    async fn test_batch_registered_and_cleared() {
        let h = harness(fast_config(), ScriptedAnalysis::new());
        let mut events = h.pipeline.subscribe();

        let batch_id = h.pipeline.submit_batch(vec![doc("/one.pdf"), doc("/two.pdf")]).await.unwrap();
        let pending = h.pipeline.batch_status(batch_id).await.unwrap();
        assert_eq!(pending.job_ids.len(), 2);
        assert_eq!(pending.progress.total, 2);

        wait_for_batch(&mut events, batch_id).await;
        let completed = h.pipeline.batch_status(batch_id).await.unwrap();
        assert!(completed.is_completed());
        assert_eq!(h.pipeline.all_batches().await.len(), 1);

        assert_eq!(h.pipeline.clear_completed_batches().await, 1);
        assert!(h.pipeline.batch_status(batch_id).await.is_none());
    }

    #[tokio::test]
    async fn test_results_persisted_to_store() {
        let h = harness(fast_config(), ScriptedAnalysis::new());
        h.analysis.respond_with("/patta.pdf", AnalysisFixtures::patta_result()).await;
        let mut events = h.pipeline.subscribe();

        let scripted = doc("/patta.pdf");
        let scripted_id = scripted.document_id;
        let canned = doc("/persisted.pdf");
        let canned_id = canned.document_id;
        let batch_id = h.pipeline.submit_batch(vec![scripted, canned]).await.unwrap();
        wait_for_batch(&mut events, batch_id).await;

        let record = h.store.get_document(scripted_id).await.unwrap();
        assert_eq!(record.status, DocumentStatus::Processed);
        assert_eq!(record.result, Some(AnalysisFixtures::patta_result()));

        let record = h.store.get_document(canned_id).await.unwrap();
        assert!(record.result.unwrap().text.contains("/persisted.pdf"));
    }

    #[tokio::test]
    async fn test_shutdown_fails_open_batches() {
        let h = harness(fast_config().with_max_concurrent_jobs(1), ScriptedAnalysis::new());
        h.analysis.hang("/never.pdf").await;

        let stuck = doc("/never.pdf");
        let stuck_id = stuck.document_id;
        let waiting = doc("/waiting.pdf");
        let waiting_id = waiting.document_id;
        let batch_id = h.pipeline.submit_batch(vec![stuck, waiting]).await.unwrap();
        wait_until_processing(&h.pipeline, 1).await;

        tokio::time::timeout(WAIT, h.pipeline.shutdown()).await.unwrap();

        let batch = h.pipeline.batch_status(batch_id).await.unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(h.pipeline.queue_status().await.total_active, 0);

        let stuck_record = h.store.get_document(stuck_id).await.unwrap();
        assert_eq!(stuck_record.status, DocumentStatus::Failed);
        assert!(stuck_record.error.unwrap().contains("cancelled"));
        let waiting_record = h.store.get_document(waiting_id).await.unwrap();
        assert_eq!(waiting_record.status, DocumentStatus::Failed);
    }
}

mod properties {
    use super::*;

    /// Runs one batch through a single-slot pipeline, returning the analysis order
    fn run_serially(items: Vec<DocumentSubmission>) -> (BatchJob, Vec<String>) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let h = harness(fast_config().with_max_concurrent_jobs(1), ScriptedAnalysis::new());
            let mut events = h.pipeline.subscribe();
            let batch_id = h.pipeline.submit_batch(items).await.unwrap();
            let batch = wait_for_batch(&mut events, batch_id).await;
            (batch, h.analysis.calls().await)
        })
    }

    fn rank(item: &DocumentSubmission) -> u8 {
        item.priority.unwrap_or(JobPriority::Normal).rank()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn batches_dispatch_by_tier_then_submission_order(batch in batch_strategy(6)) {
            let items: Vec<DocumentSubmission> = batch
                .into_iter()
                .enumerate()
                .map(|(i, mut item)| {
                    item.file_path = format!("/scans/{i:02}{}", item.file_path.trim_start_matches("/scans/"));
                    item
                })
                .collect();

            let (completed, calls) = run_serially(items.clone());

            assert_batch_completed(&completed, items.len(), 0);
            prop_assert_eq!(calls.len(), items.len());
            for (i, earlier) in items.iter().enumerate() {
                for later in &items[i + 1..] {
                    if rank(earlier) <= rank(later) {
                        assert_called_before(&calls, &earlier.file_path, &later.file_path);
                    } else {
                        assert_called_before(&calls, &later.file_path, &earlier.file_path);
                    }
                }
            }
        }
    }
}
