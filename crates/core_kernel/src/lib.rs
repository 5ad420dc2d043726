//! Core Kernel - Foundational types shared by the claim processing crates
//!
//! This crate provides the building blocks used across the domain modules:
//! - Strongly-typed identifiers for claims, documents, jobs and workflows
//! - The kernel error type
//! - Port primitives (`PortError`, `DomainPort`) for hexagonal adapters

pub mod error;
pub mod identifiers;
pub mod ports;

pub use error::CoreError;
pub use identifiers::{
    AuditEntryId, BatchId, ClaimId, DocumentId, JobId, StepId, UserId, WorkflowId,
};
pub use ports::{DomainPort, PortError};
