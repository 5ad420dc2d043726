//! Adapters for the Verification Domain
//!
//! In-memory claim, workflow, spatial and recommendation adapters used by the
//! test suites and the dry-run binary.

pub mod memory;

pub use memory::{InMemoryClaims, InMemoryWorkflowStore, StaticRecommendations, StaticSpatialLinkage};
