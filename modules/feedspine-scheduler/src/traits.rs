use async_trait::async_trait;
use chrono::Duration;

use feedspine_core::ScheduleInfo;

use crate::error::Result;

/// Tracks when each registered feed is next due for collection (spec.md
/// §4.5), ported from `examples/original_source/src/feedspine/protocols/scheduler.py::Scheduler`.
/// `get_due`/`get_all` return a snapshot `Vec` rather than the Python
/// protocol's async iterator — every current implementation holds its
/// state in memory, so there's no streaming cost to amortize.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Register a new feed. Errors with `SchedulerError::AlreadyRegistered`
    /// if `feed_name` is already tracked.
    async fn register(&self, feed_name: &str, interval: Duration, enabled: bool, metadata: serde_json::Value) -> Result<ScheduleInfo>;

    /// Returns `true` iff `feed_name` was registered and has been removed.
    async fn unregister(&self, feed_name: &str) -> Result<bool>;

    async fn get(&self, feed_name: &str) -> Result<Option<ScheduleInfo>>;

    /// Snapshot of every enabled feed whose `next_run` is due now.
    async fn get_due(&self) -> Result<Vec<ScheduleInfo>>;

    async fn get_all(&self) -> Result<Vec<ScheduleInfo>>;

    /// Bump `last_run`/`next_run`/`run_count`, reset `consecutive_failures`
    /// to 0. Errors with `SchedulerError::NotRegistered` if unregistered.
    async fn mark_success(&self, feed_name: &str) -> Result<()>;

    /// Bump `consecutive_failures` only — `next_run` is left untouched so
    /// the feed remains (or becomes) immediately due for retry.
    async fn mark_failure(&self, feed_name: &str) -> Result<()>;

    async fn enable(&self, feed_name: &str) -> Result<()>;

    async fn disable(&self, feed_name: &str) -> Result<()>;

    /// Change a feed's interval, recomputing `next_run` from `last_run +
    /// interval` when `last_run` is set.
    async fn update_interval(&self, feed_name: &str, interval: Duration) -> Result<ScheduleInfo>;
}
