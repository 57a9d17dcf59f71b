use std::collections::HashMap;

use chrono::{DateTime, Utc};
use feedspine_pipeline::PipelineStats;
use serde::{Deserialize, Serialize};

/// Aggregated outcome of one `Orchestrator::collect` call, keyed by
/// adapter name per spec.md §4.8 step 3/4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub stats: HashMap<String, PipelineStats>,
    pub errors: HashMap<String, String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CollectionResult {
    pub fn start() -> Self {
        Self {
            stats: HashMap::new(),
            errors: HashMap::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn complete(mut self) -> Self {
        self.completed_at = Some(Utc::now());
        self
    }

    pub fn total_new(&self) -> u64 {
        self.stats.values().map(|s| s.new).sum()
    }

    pub fn total_duplicates(&self) -> u64 {
        self.stats.values().map(|s| s.duplicates).sum()
    }

    pub fn total_processed(&self) -> u64 {
        self.stats.values().map(|s| s.processed).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.stats.values().map(|s| s.errors).sum::<u64>() + self.errors.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(feed_name: &str, new: u64, duplicates: u64) -> PipelineStats {
        PipelineStats {
            feed_name: feed_name.to_string(),
            processed: new + duplicates,
            new,
            duplicates,
            errors: 0,
            started_at: Utc::now(),
            duration_ms: 1,
        }
    }

    #[test]
    fn totals_sum_across_feeds() {
        let mut result = CollectionResult::start();
        result.stats.insert("feed-a".to_string(), stats("feed-a", 3, 1));
        result.stats.insert("feed-b".to_string(), stats("feed-b", 2, 0));
        result.errors.insert("feed-c".to_string(), "boom".to_string());

        assert_eq!(result.total_new(), 5);
        assert_eq!(result.total_duplicates(), 1);
        assert_eq!(result.total_errors(), 1);
    }
}
