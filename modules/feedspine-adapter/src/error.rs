/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors an adapter can surface. Per-item construction failures and
/// upstream fetch failures are both represented here, but the `Pipeline`
/// (and `fetch`'s own stream) treat them differently: a `Parse`/`Item`
/// error is isolated and skipped, while `Transport`/`Http`/`Cancelled`
/// abort the adapter's whole sequence (spec.md §4.3, §7).
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("{adapter} fetch failed: {source}")]
    Transport {
        adapter: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{adapter} item conversion failed: {message}")]
    ItemConversion { adapter: String, message: String },

    #[error("{adapter} feed parse failed: {message}")]
    Parse { adapter: String, message: String },

    #[error(transparent)]
    Http(#[from] feedspine_http::HttpError),

    #[error("operation cancelled")]
    Cancelled,
}

impl FeedError {
    /// Per-item errors (`ItemConversion`, `Parse`) are isolated by the
    /// adapter itself and never reach `fetch`'s stream as a terminal
    /// `Err` — only fatal kinds do (spec.md §4.3 "per-item construction
    /// errors are isolated").
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FeedError::ItemConversion { .. } | FeedError::Parse { .. })
    }
}
