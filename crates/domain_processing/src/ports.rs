//! Processing Domain Ports
//!
//! The pipeline reaches document analysis (OCR and entity extraction) and
//! document persistence through these traits. Adapters may call an external
//! OCR service, a database, or live in memory for tests and dry runs.
//!
//! ```rust,ignore
//! let pipeline = DocumentPipeline::start(
//!     DispatcherConfig::default(),
//!     Arc::new(OcrServiceAdapter::new(ocr_config)),
//!     Arc::new(PostgresDocumentStore::new(pool)),
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{DocumentId, DomainPort, JobId, PortError};

/// An entity recognised in a document (owner name, survey number, area...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub kind: String,
    pub value: String,
    pub confidence: f64,
}

/// Output of document analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub text: String,
    /// Overall extraction confidence in `[0, 1]`
    pub confidence: f64,
    pub entities: Vec<ExtractedEntity>,
}

/// Processing state of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Processed,
    Failed,
}

/// What the document store knows about a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: DocumentId,
    pub status: DocumentStatus,
    /// Job that last touched the document
    pub job_id: JobId,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
}

/// Document analysis collaborator
#[async_trait]
pub trait DocumentAnalysisPort: DomainPort {
    /// Extracts text and entities from a scanned document; may fail or hang
    async fn analyze(&self, file_path: &str, file_type: &str) -> Result<AnalysisResult, PortError>;
}

/// Document processing status persistence
#[async_trait]
pub trait DocumentStorePort: DomainPort {
    /// Records that an attempt for the document has started
    async fn mark_processing(&self, document_id: DocumentId, job_id: JobId) -> Result<(), PortError>;

    /// Persists a successful analysis
    async fn save_result(
        &self,
        document_id: DocumentId,
        job_id: JobId,
        result: &AnalysisResult,
    ) -> Result<(), PortError>;

    /// Persists a terminal failure
    async fn mark_failed(
        &self,
        document_id: DocumentId,
        job_id: JobId,
        error: &str,
        attempts: u32,
    ) -> Result<(), PortError>;

    /// Returns the stored record, or `PortError::NotFound`
    async fn get_document(&self, document_id: DocumentId) -> Result<DocumentRecord, PortError>;
}
