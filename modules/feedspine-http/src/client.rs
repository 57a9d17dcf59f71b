use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{HttpError, Result};
use crate::rate_limiter::RateLimiter;
use crate::retry::{retry_with, RetryConfig};

/// Parse a `Retry-After` header as an integer number of seconds, falling
/// back to `base_delay` when the header is missing or non-numeric
/// (spec.md §6 "Rate-limit server response").
fn parse_retry_after(header: Option<&str>, base_delay: Duration) -> u64 {
    header
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or_else(|| base_delay.as_secs())
}

/// Rate-limited, retried HTTP transport, grounded on
/// `FeedService::new`'s timeout-configured `reqwest::Client::builder()`
/// (`rootsignal-archive/src/services/feed.rs`) and the manual retry loop
/// in `rootsignal-domains/.../adapters/epa_echo.rs::get_facility_qid`.
///
/// One `RateLimiter` is shared across every method on a given client
/// (spec.md §4.2 "the rate limiter is shared across HttpClient methods").
pub struct HttpClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
}

impl HttpClient {
    pub fn new(rate: f64, burst: u32, timeout: Duration, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Transport {
                url: "<client-build>".into(),
                source: e,
            })?;
        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::new(rate, burst)?),
            retry,
        })
    }

    async fn send_once(&self, req: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout { url: url.to_string() }
            } else {
                HttpError::Transport { url: url.to_string(), source: e }
            }
        })?;

        if resp.status().as_u16() == 429 {
            let header = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let retry_after = parse_retry_after(header.as_deref(), self.retry.base_delay);
            return Err(HttpError::RateLimited {
                url: url.to_string(),
                retry_after_secs: retry_after,
            });
        }

        if !resp.status().is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        Ok(resp)
    }

    async fn get_response(&self, url: &str) -> Result<reqwest::Response> {
        self.limiter.acquire(1).await;
        let url = url.to_string();
        retry_with(&self.retry, || {
            let client = &self.client;
            let url = url.clone();
            async move { self.send_once(client.get(&url), &url).await }
        })
        .await
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.get_response(url).await?;
        resp.text().await.map_err(|e| HttpError::Transport {
            url: url.to_string(),
            source: e,
        })
    }

    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let resp = self.get_response(url).await?;
        resp.text()
            .await
            .map_err(|e| HttpError::Transport {
                url: url.to_string(),
                source: e,
            })
            .and_then(|text| serde_json::from_str(&text).map_err(HttpError::from))
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.get_response(url).await?;
        Ok(resp
            .bytes()
            .await
            .map_err(|e| HttpError::Transport {
                url: url.to_string(),
                source: e,
            })?
            .to_vec())
    }

    pub async fn post(&self, url: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        self.limiter.acquire(1).await;
        let url_owned = url.to_string();
        let resp = retry_with(&self.retry, || {
            let client = &self.client;
            let body = body.clone();
            let url = url_owned.clone();
            async move { self.send_once(client.post(&url).json(&body), &url).await }
        })
        .await?;
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| HttpError::Transport { url: url.to_string(), source: e })
    }

    /// Stream the body to `dest`, writing through a `.tmp` sibling and
    /// renaming atomically on success (spec.md §4.2/§6). On any error the
    /// temp file is removed; the destination is never left partial. Counts
    /// exactly one rate-limiter token regardless of body size.
    pub async fn download(&self, url: &str, dest: &Path, chunk_size: usize) -> Result<()> {
        self.limiter.acquire(1).await;
        let tmp_path = {
            let mut p = dest.as_os_str().to_owned();
            p.push(".tmp");
            std::path::PathBuf::from(p)
        };

        let result = self.download_to_tmp(url, &tmp_path, chunk_size).await;
        match result {
            Ok(()) => {
                tokio::fs::rename(&tmp_path, dest).await.map_err(|e| HttpError::Download {
                    url: url.to_string(),
                    dest: dest.display().to_string(),
                    source: e,
                })?;
                info!(url, dest = %dest.display(), "download complete");
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                Err(e)
            }
        }
    }

    async fn download_to_tmp(&self, url: &str, tmp_path: &Path, chunk_size: usize) -> Result<()> {
        let url_owned = url.to_string();
        let resp = retry_with(&self.retry, || {
            let client = &self.client;
            let url = url_owned.clone();
            async move { self.send_once(client.get(&url), &url).await }
        })
        .await?;

        let mut file = tokio::fs::File::create(tmp_path).await.map_err(|e| HttpError::Download {
            url: url.to_string(),
            dest: tmp_path.display().to_string(),
            source: e,
        })?;

        let mut stream = resp.bytes_stream();
        let mut buffer = Vec::with_capacity(chunk_size);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| HttpError::Transport {
                url: url.to_string(),
                source: e,
            })?;
            buffer.extend_from_slice(&chunk);
            if buffer.len() >= chunk_size {
                file.write_all(&buffer).await.map_err(|e| HttpError::Download {
                    url: url.to_string(),
                    dest: tmp_path.display().to_string(),
                    source: e,
                })?;
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            file.write_all(&buffer).await.map_err(|e| HttpError::Download {
                url: url.to_string(),
                dest: tmp_path.display().to_string(),
                source: e,
            })?;
        }
        file.flush().await.map_err(|e| HttpError::Download {
            url: url.to_string(),
            dest: tmp_path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// Stream response body lines, backpressured: the consumer drives
    /// pacing by polling the stream (spec.md §4.2). Counts one token to
    /// start, like `download`.
    pub fn stream_lines(&self, url: &str) -> impl Stream<Item = Result<String>> + '_ {
        let url = url.to_string();
        async_stream::try_stream! {
            self.limiter.acquire(1).await;
            let resp = self.send_once(self.client.get(&url), &url).await?;
            let mut byte_stream = resp.bytes_stream();
            let mut carry = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk.map_err(|e| HttpError::Transport { url: url.clone(), source: e })?;
                carry.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = carry.find('\n') {
                    let line = carry[..pos].trim_end_matches('\r').to_string();
                    carry.drain(..=pos);
                    debug!(url = %url, line_len = line.len(), "stream_lines yielded line");
                    yield line;
                }
            }
            if !carry.is_empty() {
                yield carry;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_parses_integer_seconds() {
        assert_eq!(parse_retry_after(Some("2"), Duration::from_secs(1)), 2);
    }

    #[test]
    fn retry_after_falls_back_to_base_delay_when_missing() {
        assert_eq!(parse_retry_after(None, Duration::from_secs(5)), 5);
    }

    #[test]
    fn retry_after_falls_back_to_base_delay_when_non_numeric() {
        assert_eq!(parse_retry_after(Some("soon"), Duration::from_secs(5)), 5);
    }
}
