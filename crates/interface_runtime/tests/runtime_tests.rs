//! Dry-run wiring tests

use interface_runtime::{ClaimsRuntime, RuntimeSettings};
use test_utils::{fast_dispatcher_config, fast_engine_config};

fn settings() -> RuntimeSettings {
    RuntimeSettings {
        dispatcher: fast_dispatcher_config(),
        engine: fast_engine_config(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_dry_run_approves_every_seeded_claim() {
    let runtime = ClaimsRuntime::in_memory(&settings());

    let report = runtime.run_demo(2).await.unwrap();

    assert_eq!(report.approved, 2);
    assert_eq!(report.on_hold, 0);
    // One initialization entry plus one per step for each claim
    assert_eq!(report.audit_entries, 18);

    let batches = runtime.pipeline().all_batches().await;
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|b| b.is_completed()));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_submissions_rejected_after_shutdown() {
    let runtime = ClaimsRuntime::in_memory(&settings());
    runtime.shutdown().await;

    let status = runtime.pipeline().queue_status().await;
    assert_eq!(status.total_active, 0);
    assert!(runtime.run_demo(1).await.is_ok_and(|r| r.on_hold == 1));
}
