use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of the collection pipeline a [`ProgressEvent`] reports on, ported
/// from `examples/original_source/src/feedspine/protocols/progress.py::ProgressStage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Planning,
    Fetching,
    Parsing,
    Deduplicating,
    Storing,
    Complete,
    Failed,
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProgressStage::Planning => "planning",
            ProgressStage::Fetching => "fetching",
            ProgressStage::Parsing => "parsing",
            ProgressStage::Deduplicating => "deduplicating",
            ProgressStage::Storing => "storing",
            ProgressStage::Complete => "complete",
            ProgressStage::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A point-in-time snapshot of collection progress, ported from
/// `ProgressEvent` in the same source file. `progress_percent`/
/// `elapsed_seconds`/`records_per_second`/`eta_seconds` are derived from
/// `current`/`total`/`started_at` rather than stored, so every consumer
/// sees a consistent snapshot regardless of when it reads the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub adapter_name: String,
    pub current: u64,
    pub total: u64,
    pub message: String,
    pub records_new: u64,
    pub records_duplicate: u64,
    pub bytes_downloaded: u64,
    pub started_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, adapter_name: impl Into<String>) -> Self {
        Self {
            stage,
            adapter_name: adapter_name.into(),
            current: 0,
            total: 0,
            message: String::new(),
            records_new: 0,
            records_duplicate: 0,
            bytes_downloaded: 0,
            started_at: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_progress(mut self, current: u64, total: u64) -> Self {
        self.current = current;
        self.total = total;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_counts(mut self, records_new: u64, records_duplicate: u64) -> Self {
        self.records_new = records_new;
        self.records_duplicate = records_duplicate;
        self
    }

    /// 0-100, capped, 0.0 when `total` is unknown (<= 0).
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.current as f64 / self.total as f64 * 100.0).min(100.0)
    }

    pub fn elapsed_seconds(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn records_per_second(&self) -> f64 {
        let elapsed = self.elapsed_seconds();
        if elapsed <= 0.0 {
            return 0.0;
        }
        (self.records_new + self.records_duplicate) as f64 / elapsed
    }

    /// Estimated seconds remaining, assuming the observed rate holds;
    /// `None` when `total`/`current` don't yet give a meaningful estimate.
    pub fn eta_seconds(&self) -> Option<f64> {
        if self.total == 0 || self.current == 0 {
            return None;
        }
        let elapsed = self.elapsed_seconds();
        let rate = self.current as f64 / elapsed;
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.current);
        Some(remaining as f64 / rate)
    }
}
