//! Claim Verification Domain
//!
//! This crate drives each land claim through an ordered sequence of
//! verification steps, from document intake to final approval, recording
//! every transition in an append-only audit trail.
//!
//! # Workflow Lifecycle
//!
//! ```text
//! Pending -> In Progress -> Completed
//!                │   ▲
//!                ▼   │ (advance again)
//!              On Hold ──> Rejected
//! ```
//!
//! Text extraction hands the claim's documents to the
//! [`domain_processing::DocumentPipeline`] and waits for the batch to finish.

pub mod adapters;
pub mod audit;
pub mod catalog;
pub mod claim;
pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod steps;
pub mod workflow;

pub use adapters::{InMemoryClaims, InMemoryWorkflowStore, StaticRecommendations, StaticSpatialLinkage};
pub use audit::{AuditAction, AuditEntry, AuditSinkPort, InMemoryAuditLog};
pub use catalog::{StepCatalog, StepDefinition, StepKind, StepRequirement};
pub use claim::{ClaimDocument, ClaimRecord, ClaimStatus};
pub use config::{EngineConfig, EngineSettings};
pub use engine::{EnginePorts, VerificationEngine};
pub use error::{StepError, VerificationError};
pub use ports::{
    ClaimsPort, RecommendationPort, SchemeRecommendation, SpatialLink, SpatialLinkagePort,
    WorkflowStorePort,
};
pub use steps::StepExecutor;
pub use workflow::{StepStatus, VerificationWorkflow, WorkflowPriority, WorkflowStatus, WorkflowStep};
