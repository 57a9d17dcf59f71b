use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bound on `FeedRun::errors` growth during very long runs (spec.md §4.4
/// step 4: "implementations MAY cap at 1024 entries").
pub const MAX_ERRORS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Terminal statuses always carry a `completed_at` (invariant §3.2-7).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

/// One execution of one adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRun {
    pub id: String,
    pub feed_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processed: u64,
    pub new: u64,
    pub duplicate: u64,
    pub failed: u64,
    pub errors: Vec<String>,
    pub error_type: Option<String>,
    pub checkpoint_position: serde_json::Value,
    pub metadata: serde_json::Value,
}

impl FeedRun {
    pub fn start(feed_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            feed_name: feed_name.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            processed: 0,
            new: 0,
            duplicate: 0,
            failed: 0,
            errors: Vec::new(),
            error_type: None,
            checkpoint_position: serde_json::Value::Null,
            metadata: serde_json::json!({}),
        }
    }

    /// Append an error string, capped at `MAX_ERRORS` (oldest dropped last
    /// is intentionally avoided: we simply stop appending once full, so the
    /// earliest failures — often the most diagnostic — are preserved).
    pub fn push_error(&mut self, error: impl Into<String>) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error.into());
        }
        self.failed += 1;
    }

    /// Transition to a terminal status and stamp `completed_at`
    /// (invariant §3.2-7).
    pub fn complete(&mut self, status: RunStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_at_set_iff_terminal() {
        let mut run = FeedRun::start("feed-a");
        assert!(run.completed_at.is_none());
        run.complete(RunStatus::Success);
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn error_cap_stops_growth_but_keeps_counting_failures() {
        let mut run = FeedRun::start("feed-a");
        for i in 0..(MAX_ERRORS + 10) {
            run.push_error(format!("err-{i}"));
        }
        assert_eq!(run.errors.len(), MAX_ERRORS);
        assert_eq!(run.failed, (MAX_ERRORS + 10) as u64);
    }

    #[test]
    fn round_trips_through_json() {
        let mut run = FeedRun::start("feed-a");
        run.push_error("boom");
        let json = serde_json::to_value(&run).unwrap();
        let back: FeedRun = serde_json::from_value(json).unwrap();
        assert_eq!(back.feed_name, run.feed_name);
        assert_eq!(back.errors, run.errors);
        assert_eq!(back.failed, run.failed);
    }
}
