use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{HttpError, Result};

/// Token bucket rate limiter (spec.md §4.2), ported from
/// `examples/original_source/src/feedspine/http/rate_limiter.py`'s
/// `BurstRateLimiter`: continuous refill at `rate` tokens/sec up to
/// `burst` capacity, one critical section around refill + decrement
/// (spec.md §5 "RateLimiter: serialized internally").
///
/// `burst = 1` makes this equivalent to the plain "minimum interval"
/// variant spec.md §4.2 calls out as a special case.
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    state: Mutex<State>,
}

struct State {
    tokens: f64,
    last_update: Instant,
}

impl RateLimiter {
    /// `rate` must be positive — spec.md §8 boundary behavior: "rate limiter
    /// with rate=0 blocks forever (callers must not configure zero)". This
    /// constructor fails fast instead.
    pub fn new(rate: f64, burst: u32) -> Result<Self> {
        if rate <= 0.0 {
            return Err(HttpError::InvalidRateLimit(rate));
        }
        Ok(Self {
            rate,
            burst: burst.max(1) as f64,
            state: Mutex::new(State {
                tokens: burst.max(1) as f64,
                last_update: Instant::now(),
            }),
        })
    }

    /// A limiter with `burst = 1`: one token refilled every `1/rate`
    /// seconds, equivalent to the "minimum interval" variant.
    pub fn with_minimum_interval(rate: f64) -> Result<Self> {
        Self::new(rate, 1)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Block until `n` tokens are available, refilling continuously.
    /// Returns the number of seconds waited. Cancellation-safe: callers
    /// wrap this in `tokio::select!` against their own cancellation token
    /// (spec.md §5 "RateLimiter waits MUST also be cancellable").
    pub async fn acquire(&self, n: u32) -> f64 {
        let n = n as f64;
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap();
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_update).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
                state.last_update = now;

                if state.tokens >= n {
                    state.tokens -= n;
                    None
                } else {
                    let deficit = n - state.tokens;
                    Some(deficit / self.rate)
                }
            };

            match wait {
                None => return 0.0,
                Some(secs) => {
                    tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))).await;
                    // Loop again: refill/decrement happens atomically on the
                    // next pass so concurrent waiters don't double-spend.
                    let mut state = self.state.lock().unwrap();
                    let now = Instant::now();
                    let elapsed = now.duration_since(state.last_update).as_secs_f64();
                    state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
                    state.last_update = now;
                    if state.tokens >= n {
                        state.tokens -= n;
                        return secs;
                    }
                    // Rare: another waiter drained tokens first; loop back
                    // around to recompute the remaining wait.
                }
            }
        }
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.tokens = self.burst;
        state.last_update = Instant::now();
    }

    pub fn available_tokens(&self) -> f64 {
        let state = self.state.lock().unwrap();
        let elapsed = Instant::now().duration_since(state.last_update).as_secs_f64();
        (state.tokens + elapsed * self.rate).min(self.burst)
    }
}
