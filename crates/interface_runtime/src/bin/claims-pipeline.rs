//! Claims Pipeline - Dry-Run Binary
//!
//! Starts the document pipeline and the verification engine over in-memory
//! adapters, verifies a few seeded claims end to end, and shuts down.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin claims-pipeline
//!
//! RUNTIME_DEMO_CLAIMS=8 PIPELINE_MAX_CONCURRENT_JOBS=5 cargo run --bin claims-pipeline
//! ```
//!
//! # Environment Variables
//!
//! * `RUNTIME_LOG_LEVEL` - Log filter when `RUST_LOG` is unset (default: info)
//! * `RUNTIME_DEMO_CLAIMS` - Claims verified by the dry run (default: 3)
//! * `PIPELINE_MAX_CONCURRENT_JOBS` - Concurrent analyses, clamped to 1..=10 (default: 3)
//! * `PIPELINE_MAX_RETRIES` - Retries per document (default: 3)
//! * `PIPELINE_JOB_TIMEOUT_SECS` - Per-document analysis timeout (default: 300)
//! * `PIPELINE_RETRY_DELAY_MS` - Delay before a retried document is queued again (default: 0)
//! * `VERIFICATION_EXTRACTION_TIMEOUT_SECS` - Wait for a text extraction batch (default: 600)
//! * `VERIFICATION_MIN_SPATIAL_CONFIDENCE` - Minimum spatial match confidence (default: 0.6)

use anyhow::Context;

use interface_runtime::{telemetry::init_tracing, ClaimsRuntime, RuntimeSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let settings = RuntimeSettings::from_env().context("loading settings")?;
    init_tracing(&settings.log_level).context("initialising tracing")?;

    tracing::info!(
        demo_claims = settings.demo_claims,
        max_concurrent_jobs = settings.dispatcher.max_concurrent_jobs,
        "Starting claims pipeline dry run"
    );

    let runtime = ClaimsRuntime::in_memory(&settings);

    tokio::select! {
        report = runtime.run_demo(settings.demo_claims) => {
            let report = report.context("dry run failed")?;
            tracing::info!(approved = report.approved, on_hold = report.on_hold, "Dry run complete");
        }
        _ = shutdown_signal() => {}
    }

    runtime.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
