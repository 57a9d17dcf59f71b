//! Ties a registry of named adapters to a `Pipeline` over shared storage,
//! running bounded-concurrency collection across feeds (spec.md §4.8). See
//! SPEC_FULL.md §4.8.

pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod result;

pub use error::{OrchestratorError, Result};
pub use orchestrator::Orchestrator;
pub use registry::AdapterRegistry;
pub use result::CollectionResult;
