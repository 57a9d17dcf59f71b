use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one `Pipeline::run` call, exactly per spec.md §4.4's
/// `run(adapter, runId?)` return value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStats {
    pub feed_name: String,
    pub processed: u64,
    pub new: u64,
    pub duplicates: u64,
    pub errors: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl PipelineStats {
    pub fn from_run(run: &feedspine_core::FeedRun, duration_ms: i64) -> Self {
        Self {
            feed_name: run.feed_name.clone(),
            processed: run.processed,
            new: run.new,
            duplicates: run.duplicate,
            errors: run.failed,
            started_at: run.started_at,
            duration_ms,
        }
    }
}
