use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use tokio::sync::Mutex as AsyncMutex;

use feedspine_core::{Metadata, RecordCandidate};
use feedspine_http::HttpClient;

use crate::base::{log_skipped_item, FeedAdapter};
use crate::error::{FeedError, Result};
use crate::stats::AdapterStats;

/// RSS/Atom feed adapter, grounded directly on
/// `rootsignal-archive/src/services/feed.rs::FeedService::fetch`: fetch
/// bytes via the shared `HttpClient`, parse with `feed_rs`, derive
/// `published_at` from `published.or(updated)`, and pick a natural key
/// from the entry's first link (falling back to its `id` when that looks
/// like a URL) — the adapter's own "key strategy" choice (spec.md §9).
pub struct RssFeedAdapter {
    name: String,
    feed_url: String,
    requests_per_second: f64,
    http: HttpClient,
    stats: AsyncMutex<AdapterStats>,
}

impl RssFeedAdapter {
    pub fn new(name: impl Into<String>, feed_url: impl Into<String>, requests_per_second: f64, http: HttpClient) -> Self {
        Self {
            name: name.into(),
            feed_url: feed_url.into(),
            requests_per_second,
            http,
            stats: AsyncMutex::new(AdapterStats::default()),
        }
    }

    fn natural_key_for(entry: &feed_rs::model::Entry) -> Option<String> {
        entry
            .links
            .first()
            .map(|l| l.href.clone())
            .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
    }
}

#[async_trait]
impl FeedAdapter for RssFeedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_url(&self) -> Option<&str> {
        Some(&self.feed_url)
    }

    fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    fn fetch(&self) -> BoxStream<'_, Result<RecordCandidate>> {
        let name = self.name.clone();
        let feed_url = self.feed_url.clone();
        Box::pin(async_stream::try_stream! {
            let bytes = self.http.get_bytes(&feed_url).await.map_err(FeedError::Http)?;
            let parsed = feed_rs::parser::parse(&bytes[..]).map_err(|e| FeedError::Parse {
                adapter: name.clone(),
                message: e.to_string(),
            })?;

            let mut new_items = 0u64;
            let mut new_errors = 0u64;
            for entry in parsed.entries.iter() {
                let Some(natural_key) = Self::natural_key_for(entry) else {
                    new_errors += 1;
                    log_skipped_item(&name, &FeedError::ItemConversion {
                        adapter: name.clone(),
                        message: "entry has no usable link or id".into(),
                    });
                    continue;
                };

                let published_at = entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now);

                let title = entry.title.as_ref().map(|t| t.content.clone());
                let content = serde_json::json!({
                    "title": title,
                    "link": natural_key,
                    "summary": entry.summary.as_ref().map(|s| s.content.clone()),
                });

                let metadata = match Metadata::new(name.clone()) {
                    Ok(m) => m.with_source_type("rss"),
                    Err(e) => {
                        new_errors += 1;
                        log_skipped_item(&name, &FeedError::ItemConversion { adapter: name.clone(), message: e.to_string() });
                        continue;
                    }
                };

                match RecordCandidate::new(&natural_key, published_at, content, metadata) {
                    Ok(candidate) => {
                        new_items += 1;
                        yield candidate;
                    }
                    Err(e) => {
                        new_errors += 1;
                        log_skipped_item(&name, &FeedError::ItemConversion { adapter: name.clone(), message: e.to_string() });
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
