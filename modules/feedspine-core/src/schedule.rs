use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Per-feed scheduling state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub feed_name: String,
    #[serde(with = "duration_seconds")]
    pub interval: Duration,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub run_count: u32,
    pub consecutive_failures: u32,
    pub metadata: serde_json::Value,
}

impl ScheduleInfo {
    pub fn new(feed_name: impl Into<String>, interval: Duration, enabled: bool, metadata: serde_json::Value) -> Self {
        Self {
            feed_name: feed_name.into(),
            interval,
            last_run: None,
            next_run: None,
            enabled,
            run_count: 0,
            consecutive_failures: 0,
            metadata,
        }
    }

    /// Due iff enabled and `next_run` is unset or in the past (spec.md §3.1).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run.map(|t| t <= now).unwrap_or(true)
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(d)?;
        Ok(Duration::seconds(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_when_next_run_unset() {
        let info = ScheduleInfo::new("feed-a", Duration::minutes(5), true, serde_json::json!({}));
        assert!(info.is_due(Utc::now()));
    }

    #[test]
    fn not_due_when_disabled() {
        let info = ScheduleInfo::new("feed-a", Duration::minutes(5), false, serde_json::json!({}));
        assert!(!info.is_due(Utc::now()));
    }

    #[test]
    fn not_due_when_next_run_in_future() {
        let mut info = ScheduleInfo::new("feed-a", Duration::minutes(5), true, serde_json::json!({}));
        info.next_run = Some(Utc::now() + Duration::minutes(10));
        assert!(!info.is_due(Utc::now()));
    }
}
