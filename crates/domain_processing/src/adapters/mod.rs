//! Adapters for the Processing Domain
//!
//! In-memory implementations of the processing ports. They back the test
//! suites and the dry-run mode of the `claims-pipeline` binary; production
//! deployments plug an OCR service and a database in through the same traits.
//!
//! ```rust,ignore
//! use domain_processing::adapters::{ScriptedAnalysis, InMemoryDocumentStore};
//!
//! let analysis = Arc::new(ScriptedAnalysis::new());
//! analysis.fail_times("/scans/deed.pdf", 2).await;
//! ```

pub mod memory;

pub use memory::{InMemoryDocumentStore, ScriptedAnalysis};
