use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use feedspine_core::RecordCandidate;
use feedspine_http::RateLimiter;

use crate::base::{log_skipped_item, FeedAdapter};
use crate::error::{FeedError, Result};
use crate::stats::AdapterStats;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type FetchItemsFn = dyn Fn() -> BoxFuture<Result<Vec<Value>>> + Send + Sync;
type ToCandidateFn = dyn Fn(&Value, usize) -> Result<RecordCandidate> + Send + Sync;

/// List-mode adapter: materializes a full batch of raw items in one call,
/// then converts each individually, isolating per-item errors — ported
/// from `examples/original_source/src/feedspine/adapter/base.py`'s
/// `_fetch_items`/`_to_candidate` path (the non-generator half of
/// `BaseFeedAdapter.fetch`). The default path for small feeds (spec.md
/// §4.3 "List" mode).
pub struct ListFeedAdapter {
    name: String,
    source_url: Option<String>,
    requests_per_second: f64,
    fetch_items: Arc<FetchItemsFn>,
    to_candidate: Arc<ToCandidateFn>,
    rate_limiter: RateLimiter,
    stats: AsyncMutex<AdapterStats>,
}

impl ListFeedAdapter {
    pub fn new(
        name: impl Into<String>,
        requests_per_second: f64,
        fetch_items: impl Fn() -> BoxFuture<Result<Vec<Value>>> + Send + Sync + 'static,
        to_candidate: impl Fn(&Value, usize) -> Result<RecordCandidate> + Send + Sync + 'static,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            source_url: None,
            requests_per_second,
            fetch_items: Arc::new(fetch_items),
            to_candidate: Arc::new(to_candidate),
            rate_limiter: RateLimiter::with_minimum_interval(requests_per_second)?,
            stats: AsyncMutex::new(AdapterStats::default()),
        })
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

#[async_trait]
impl FeedAdapter for ListFeedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    fn fetch(&self) -> BoxStream<'_, Result<RecordCandidate>> {
        let name = self.name.clone();
        let fetch_items = self.fetch_items.clone();
        let to_candidate = self.to_candidate.clone();
        Box::pin(async_stream::try_stream! {
            self.rate_limiter.acquire(1).await;

            let items = (fetch_items)().await?;

            let mut new_items = 0u64;
            let mut new_errors = 0u64;
            for (idx, item) in items.iter().enumerate() {
                match (to_candidate)(item, idx) {
                    Ok(candidate) => {
                        new_items += 1;
                        yield candidate;
                    }
                    Err(err) => {
                        new_errors += 1;
                        log_skipped_item(&name, &err);
                    }
                }
            }

            let mut stats = self.stats.lock().await;
            stats.last_fetch_at = Some(Utc::now());
            stats.item_count += new_items;
            stats.error_count += new_errors;
        })
    }

    fn stats(&self) -> AdapterStats {
        self.stats.try_lock().map(|s| s.clone()).unwrap_or_default()
    }
}
