//! In-memory processing adapters

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use core_kernel::{DocumentId, DomainPort, JobId, PortError};
use crate::ports::{
    AnalysisResult, DocumentAnalysisPort, DocumentRecord, DocumentStatus, DocumentStorePort,
    ExtractedEntity,
};

#[derive(Debug, Clone)]
enum Behaviour {
    /// Fail this many more calls, then succeed
    FailTimes(u32),
    AlwaysFail,
    Hang,
    Panic,
    Result(AnalysisResult),
}

/// Document analyser driven by per-path scripts
///
/// Unscripted paths succeed with a canned result naming the file.
#[derive(Debug, Default)]
pub struct ScriptedAnalysis {
    scripts: Arc<RwLock<HashMap<String, Behaviour>>>,
    calls: Arc<RwLock<Vec<String>>>,
    latency: Duration,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Counts a call as active until dropped, even when the call is aborted
struct ActiveCall<'a> {
    active: &'a AtomicUsize,
}

impl<'a> ActiveCall<'a> {
    fn enter(active: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency` before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fails the next `times` calls for `path`, then succeeds
    pub async fn fail_times(&self, path: impl Into<String>, times: u32) {
        self.scripts.write().await.insert(path.into(), Behaviour::FailTimes(times));
    }

    pub async fn always_fail(&self, path: impl Into<String>) {
        self.scripts.write().await.insert(path.into(), Behaviour::AlwaysFail);
    }

    /// Never returns for `path`
    pub async fn hang(&self, path: impl Into<String>) {
        self.scripts.write().await.insert(path.into(), Behaviour::Hang);
    }

    pub async fn panic_on(&self, path: impl Into<String>) {
        self.scripts.write().await.insert(path.into(), Behaviour::Panic);
    }

    /// Returns `result` for `path`
    pub async fn respond_with(&self, path: impl Into<String>, result: AnalysisResult) {
        self.scripts.write().await.insert(path.into(), Behaviour::Result(result));
    }

    /// Paths analysed so far, in call order
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    /// Highest number of calls that were running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub async fn call_count(&self, path: &str) -> usize {
        self.calls.read().await.iter().filter(|p| p.as_str() == path).count()
    }

    fn canned_result(file_path: &str) -> AnalysisResult {
        AnalysisResult {
            text: format!("Scanned content of {}", file_path),
            confidence: 0.9,
            entities: vec![ExtractedEntity {
                kind: "document_ref".to_string(),
                value: file_path.to_string(),
                confidence: 0.9,
            }],
        }
    }
}

impl DomainPort for ScriptedAnalysis {}

#[async_trait]
impl DocumentAnalysisPort for ScriptedAnalysis {
    async fn analyze(&self, file_path: &str, _file_type: &str) -> Result<AnalysisResult, PortError> {
        let _active = ActiveCall::enter(&self.active, &self.peak);
        self.calls.write().await.push(file_path.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let behaviour = {
            let mut scripts = self.scripts.write().await;
            match scripts.get_mut(file_path) {
                Some(Behaviour::FailTimes(remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(Behaviour::AlwaysFail)
                }
                Some(Behaviour::FailTimes(_)) => None,
                other => other.cloned(),
            }
        };

        match behaviour {
            None => Ok(Self::canned_result(file_path)),
            Some(Behaviour::Result(result)) => Ok(result),
            Some(Behaviour::AlwaysFail) | Some(Behaviour::FailTimes(_)) => {
                Err(PortError::unavailable(format!("analysis of {}", file_path)))
            }
            Some(Behaviour::Hang) => std::future::pending().await,
            Some(Behaviour::Panic) => panic!("analyser crashed on {}", file_path),
        }
    }
}

/// Document store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    records: Arc<RwLock<HashMap<DocumentId, DocumentRecord>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates with stored records
    pub async fn with_records(records: Vec<DocumentRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.records.write().await.insert(record.document_id, record);
        }
        store
    }

    pub async fn records(&self) -> Vec<DocumentRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

impl DomainPort for InMemoryDocumentStore {}

#[async_trait]
impl DocumentStorePort for InMemoryDocumentStore {
    async fn mark_processing(&self, document_id: DocumentId, job_id: JobId) -> Result<(), PortError> {
        let mut records = self.records.write().await;
        let record = records.entry(document_id).or_insert_with(|| DocumentRecord {
            document_id,
            status: DocumentStatus::Processing,
            job_id,
            result: None,
            error: None,
            attempts: 0,
            updated_at: Utc::now(),
        });
        record.status = DocumentStatus::Processing;
        record.job_id = job_id;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn save_result(
        &self,
        document_id: DocumentId,
        job_id: JobId,
        result: &AnalysisResult,
    ) -> Result<(), PortError> {
        let mut records = self.records.write().await;
        let attempts = records.get(&document_id).map(|r| r.attempts).unwrap_or(0);
        records.insert(
            document_id,
            DocumentRecord {
                document_id,
                status: DocumentStatus::Processed,
                job_id,
                result: Some(result.clone()),
                error: None,
                attempts,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn mark_failed(
        &self,
        document_id: DocumentId,
        job_id: JobId,
        error: &str,
        attempts: u32,
    ) -> Result<(), PortError> {
        let mut records = self.records.write().await;
        records.insert(
            document_id,
            DocumentRecord {
                document_id,
                status: DocumentStatus::Failed,
                job_id,
                result: None,
                error: Some(error.to_string()),
                attempts,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_document(&self, document_id: DocumentId) -> Result<DocumentRecord, PortError> {
        self.records
            .read()
            .await
            .get(&document_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Document", document_id))
    }
}
