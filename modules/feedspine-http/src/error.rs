/// Result type alias for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpError>;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("rate limiter configured with non-positive rate: {0}")]
    InvalidRateLimit(f64),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("rate limited (429) fetching {url}, retry-after {retry_after_secs}s")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("unexpected status {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("download of {url} to {dest} failed: {source}")]
    Download {
        url: String,
        dest: String,
        #[source]
        source: std::io::Error,
    },

    #[error("all {attempts} retry attempts exhausted; last error: {last_error}")]
    RetryExhausted {
        last_error: Box<HttpError>,
        attempts: u32,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HttpError {
    /// Whether this error kind is retried by default under `RetryConfig`'s
    /// `retry_on` set — transport failures, timeouts, 429s, and 5xx status
    /// codes are transient; other 4xx codes are not (spec.md §4.2).
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Timeout { .. } => true,
            HttpError::Transport { .. } => true,
            HttpError::RateLimited { .. } => true,
            HttpError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
