use thiserror::Error;

/// Result type alias for core data-model operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while constructing or validating core entities.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("natural_key must be 1-512 chars after normalization, got {0}")]
    InvalidNaturalKey(usize),

    #[error("source name must be non-empty")]
    EmptySource,
}
