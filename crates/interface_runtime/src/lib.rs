//! Runtime Layer
//!
//! Wires the document pipeline and the verification engine into a running
//! process: settings loading, tracing initialisation, and a runtime that
//! owns both services.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_runtime::{settings::RuntimeSettings, ClaimsRuntime};
//!
//! let settings = RuntimeSettings::from_env()?;
//! let runtime = ClaimsRuntime::in_memory(&settings);
//! let report = runtime.run_demo(3).await?;
//! runtime.shutdown().await;
//! ```

pub mod error;
pub mod runtime;
pub mod settings;
pub mod telemetry;

pub use error::RuntimeError;
pub use runtime::{ClaimsRuntime, DemoReport};
pub use settings::RuntimeSettings;
