use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use feedspine_core::ScheduleInfo;

use crate::error::{Result, SchedulerError};
use crate::traits::Scheduler;

/// Process-local scheduler, ported from
/// `examples/original_source/src/feedspine/scheduler/memory.py::MemoryScheduler`.
/// Suitable for single-process deployments and tests; state does not
/// survive a restart.
#[derive(Default)]
pub struct InMemoryScheduler {
    schedules: RwLock<HashMap<String, ScheduleInfo>>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Scheduler for InMemoryScheduler {
    async fn register(&self, feed_name: &str, interval: Duration, enabled: bool, metadata: serde_json::Value) -> Result<ScheduleInfo> {
        let mut schedules = self.schedules.write().await;
        if schedules.contains_key(feed_name) {
            return Err(SchedulerError::AlreadyRegistered(feed_name.to_string()));
        }
        let info = ScheduleInfo::new(feed_name, interval, enabled, metadata);
        schedules.insert(feed_name.to_string(), info.clone());
        Ok(info)
    }

    async fn unregister(&self, feed_name: &str) -> Result<bool> {
        Ok(self.schedules.write().await.remove(feed_name).is_some())
    }

    async fn get(&self, feed_name: &str) -> Result<Option<ScheduleInfo>> {
        Ok(self.schedules.read().await.get(feed_name).cloned())
    }

    async fn get_due(&self) -> Result<Vec<ScheduleInfo>> {
        let now = Utc::now();
        Ok(self.schedules.read().await.values().filter(|info| info.is_due(now)).cloned().collect())
    }

    async fn get_all(&self) -> Result<Vec<ScheduleInfo>> {
        Ok(self.schedules.read().await.values().cloned().collect())
    }

    async fn mark_success(&self, feed_name: &str) -> Result<()> {
        let mut schedules = self.schedules.write().await;
        let info = schedules.get_mut(feed_name).ok_or_else(|| SchedulerError::NotRegistered(feed_name.to_string()))?;
        let now = Utc::now();
        info.last_run = Some(now);
        info.next_run = Some(now + info.interval);
        info.run_count += 1;
        info.consecutive_failures = 0;
        Ok(())
    }

    async fn mark_failure(&self, feed_name: &str) -> Result<()> {
        let mut schedules = self.schedules.write().await;
        let info = schedules.get_mut(feed_name).ok_or_else(|| SchedulerError::NotRegistered(feed_name.to_string()))?;
        info.consecutive_failures += 1;
        Ok(())
    }

    async fn enable(&self, feed_name: &str) -> Result<()> {
        let mut schedules = self.schedules.write().await;
        let info = schedules.get_mut(feed_name).ok_or_else(|| SchedulerError::NotRegistered(feed_name.to_string()))?;
        info.enabled = true;
        Ok(())
    }

    async fn disable(&self, feed_name: &str) -> Result<()> {
        let mut schedules = self.schedules.write().await;
        let info = schedules.get_mut(feed_name).ok_or_else(|| SchedulerError::NotRegistered(feed_name.to_string()))?;
        info.enabled = false;
        Ok(())
    }

    async fn update_interval(&self, feed_name: &str, interval: Duration) -> Result<ScheduleInfo> {
        let mut schedules = self.schedules.write().await;
        let info = schedules.get_mut(feed_name).ok_or_else(|| SchedulerError::NotRegistered(feed_name.to_string()))?;
        info.interval = interval;
        if let Some(last_run) = info.last_run {
            info.next_run = Some(last_run + interval);
        }
        Ok(info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_rejects_duplicate() {
        let scheduler = InMemoryScheduler::new();
        scheduler.register("feed-a", Duration::minutes(5), true, serde_json::json!({})).await.unwrap();
        let err = scheduler.register("feed-a", Duration::minutes(5), true, serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyRegistered(name) if name == "feed-a"));
    }

    #[tokio::test]
    async fn unregister_reports_presence() {
        let scheduler = InMemoryScheduler::new();
        assert!(!scheduler.unregister("feed-a").await.unwrap());
        scheduler.register("feed-a", Duration::minutes(5), true, serde_json::json!({})).await.unwrap();
        assert!(scheduler.unregister("feed-a").await.unwrap());
        assert!(scheduler.get("feed-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_success_resets_failures_and_advances_next_run() {
        let scheduler = InMemoryScheduler::new();
        scheduler.register("feed-a", Duration::minutes(5), true, serde_json::json!({})).await.unwrap();
        scheduler.mark_failure("feed-a").await.unwrap();
        scheduler.mark_failure("feed-a").await.unwrap();
        scheduler.mark_success("feed-a").await.unwrap();

        let info = scheduler.get("feed-a").await.unwrap().unwrap();
        assert_eq!(info.consecutive_failures, 0);
        assert_eq!(info.run_count, 1);
        assert!(info.last_run.is_some());
        assert!(info.next_run.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn mark_failure_does_not_touch_next_run() {
        let scheduler = InMemoryScheduler::new();
        scheduler.register("feed-a", Duration::minutes(5), true, serde_json::json!({})).await.unwrap();
        scheduler.mark_success("feed-a").await.unwrap();
        let before = scheduler.get("feed-a").await.unwrap().unwrap().next_run;

        scheduler.mark_failure("feed-a").await.unwrap();
        let after = scheduler.get("feed-a").await.unwrap().unwrap();
        assert_eq!(after.next_run, before);
        assert_eq!(after.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn disabled_feed_is_never_due() {
        let scheduler = InMemoryScheduler::new();
        scheduler.register("feed-a", Duration::minutes(5), true, serde_json::json!({})).await.unwrap();
        scheduler.disable("feed-a").await.unwrap();
        assert!(scheduler.get_due().await.unwrap().is_empty());

        scheduler.enable("feed-a").await.unwrap();
        assert_eq!(scheduler.get_due().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_interval_recomputes_next_run_from_last_run() {
        let scheduler = InMemoryScheduler::new();
        scheduler.register("feed-a", Duration::minutes(5), true, serde_json::json!({})).await.unwrap();
        scheduler.mark_success("feed-a").await.unwrap();
        let last_run = scheduler.get("feed-a").await.unwrap().unwrap().last_run.unwrap();

        let updated = scheduler.update_interval("feed-a", Duration::minutes(30)).await.unwrap();
        assert_eq!(updated.interval, Duration::minutes(30));
        assert_eq!(updated.next_run, Some(last_run + Duration::minutes(30)));
    }

    #[tokio::test]
    async fn operations_on_unregistered_feed_error() {
        let scheduler = InMemoryScheduler::new();
        assert!(matches!(scheduler.mark_success("ghost").await, Err(SchedulerError::NotRegistered(_))));
        assert!(matches!(scheduler.mark_failure("ghost").await, Err(SchedulerError::NotRegistered(_))));
        assert!(matches!(scheduler.enable("ghost").await, Err(SchedulerError::NotRegistered(_))));
        assert!(matches!(scheduler.disable("ghost").await, Err(SchedulerError::NotRegistered(_))));
        assert!(matches!(scheduler.update_interval("ghost", Duration::minutes(1)).await, Err(SchedulerError::NotRegistered(_))));
    }
}
