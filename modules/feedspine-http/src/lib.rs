//! Rate-limited, retried HTTP transport (spec.md §4.2). See SPEC_FULL.md §4.2.

pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod retry;

pub use client::HttpClient;
pub use error::{HttpError, Result};
pub use rate_limiter::RateLimiter;
pub use retry::{retry_with, RetryConfig};
