use async_trait::async_trait;
use futures::stream::BoxStream;

use feedspine_core::RecordCandidate;

use crate::error::{FeedError, Result};
use crate::stats::AdapterStats;

/// Converts one external source into a lazy sequence of `RecordCandidate`
/// (spec.md §4.3). Implementations take `&self` with interior mutability
/// for their own state (rate limiter, snapshot, stats), matching
/// `feedspine-storage::Storage`'s shared-handle idiom — `fetch` may be
/// called from a long-lived, cloneable `Arc<dyn FeedAdapter>`.
#[async_trait]
pub trait FeedAdapter: Send + Sync {
    /// Unique adapter name, used as `Sighting.source` and the FeedRun key.
    fn name(&self) -> &str;

    fn source_url(&self) -> Option<&str> {
        None
    }

    fn requests_per_second(&self) -> f64 {
        1.0
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Lazy candidate stream. MUST apply the adapter's own rate limit
    /// before the first upstream call; per-item construction errors MUST
    /// be isolated (skipped, counted) rather than surfaced as a stream
    /// item, while a fatal upstream error ends the stream with one final
    /// `Err` (spec.md §4.3).
    fn fetch(&self) -> BoxStream<'_, Result<RecordCandidate>>;

    fn stats(&self) -> AdapterStats;
}

/// Wrap a `FeedError` for logging at the point an adapter decides to skip
/// a single malformed item rather than abort its sequence.
pub(crate) fn log_skipped_item(adapter: &str, err: &FeedError) {
    tracing::warn!(adapter, error = %err, "adapter skipped a malformed item");
}
