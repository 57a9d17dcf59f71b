/// Result type alias for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("feed '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("feed '{0}' is not registered")]
    NotRegistered(String),
}
