/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors the `Pipeline` itself can raise. Per-candidate failures during
/// `run` are not represented here — they're caught, counted, and folded
/// into `FeedRun.errors`/`PipelineStats.errors` (spec.md §4.4 step 4)
/// rather than aborting the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] feedspine_storage::StorageError),

    #[error(transparent)]
    Adapter(#[from] feedspine_adapter::FeedError),

    #[error(transparent)]
    Checkpoint(#[from] feedspine_checkpoint::CheckpointError),

    #[error("enricher {enricher} failed: {message}")]
    EnrichmentFailed { enricher: String, message: String },

    #[error("operation cancelled")]
    Cancelled,
}
