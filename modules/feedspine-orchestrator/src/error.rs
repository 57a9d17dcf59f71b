/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors the `Orchestrator` itself can raise outside of per-feed
/// collection (which is instead folded into `CollectionResult.errors`,
/// spec.md §4.8 step 4).
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("adapter {0:?} is not registered")]
    UnknownAdapter(String),

    #[error("adapter {0:?} is already registered")]
    AlreadyRegistered(String),
}
