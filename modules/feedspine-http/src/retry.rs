use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::HttpError;

/// Retry policy, ported from
/// `examples/original_source/src/feedspine/utils/retry.py`'s `RetryConfig`
/// (spec.md §4.2). An immutable value object, injected into `HttpClient`
/// and reusable by adapters that need retry logic of their own (though the
/// adapter contract itself forbids internal retry — spec.md §4.3).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Delay before attempt `attempt` (1-indexed), exponential backoff with
    /// symmetric jitter: `min(base * base_exp^(attempt-1), max) * (1 ±
    /// uniform(0, jitter))` (spec.md §4.2).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let mut delay = base * self.exponential_base.powi(attempt as i32 - 1);
        delay = delay.min(self.max_delay.as_secs_f64());

        if self.jitter > 0.0 {
            let jitter_amount = delay * self.jitter;
            let offset = rand::thread_rng().gen_range(-jitter_amount..=jitter_amount);
            delay += offset;
        }

        Duration::from_secs_f64(delay.max(0.0))
    }
}

/// Run `op` under `config`, retrying retryable errors with backoff.
/// `classify` decides whether a given error is retryable — callers pass
/// `HttpError::is_retryable` for HTTP use, or a custom predicate to
/// implement `retry_on`/`no_retry_on` precedence at a different layer.
///
/// After `max_attempts` failed tries, returns
/// `HttpError::RetryExhausted { last_error, attempts }` (spec.md §4.2).
pub async fn retry_with<F, Fut, T>(config: &RetryConfig, mut op: F) -> Result<T, HttpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts || !err.is_retryable() {
                    if attempt >= config.max_attempts {
                        return Err(HttpError::RetryExhausted {
                            last_error: Box::new(err),
                            attempts: attempt,
                        });
                    }
                    return Err(err);
                }

                let delay = match &err {
                    HttpError::RateLimited { retry_after_secs, .. } => {
                        Duration::from_secs(*retry_after_secs)
                    }
                    _ => config.delay_for_attempt(attempt),
                };

                warn!(attempt, max_attempts = config.max_attempts, delay_secs = delay.as_secs_f64(), error = %err, "retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
