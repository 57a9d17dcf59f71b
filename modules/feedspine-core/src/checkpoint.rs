use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resumable progress marker for one collection run. Owned by the
/// `CheckpointManager` during a run and by a `CheckpointStore` at rest
/// (feedspine-checkpoint crate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub collection_id: String,
    pub feed_name: String,
    #[serde(default)]
    pub position: serde_json::Value,
    pub records_processed: u64,
    pub records_new: u64,
    pub records_duplicate: u64,
    pub records_failed: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub is_complete: bool,
}

impl Checkpoint {
    pub fn new(collection_id: impl Into<String>, feed_name: impl Into<String>, position: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            collection_id: collection_id.into(),
            feed_name: feed_name.into(),
            position,
            records_processed: 0,
            records_new: 0,
            records_duplicate: 0,
            records_failed: 0,
            started_at: now,
            updated_at: now,
            metadata: serde_json::json!({}),
            is_complete: false,
        }
    }

    /// Build an updated checkpoint, carrying forward any field left `None`.
    /// Counters here are non-decreasing per call (invariant §3.2-6) —
    /// callers pass the new absolute totals, not deltas.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        position: Option<serde_json::Value>,
        records_processed: Option<u64>,
        records_new: Option<u64>,
        records_duplicate: Option<u64>,
        records_failed: Option<u64>,
    ) -> Self {
        Self {
            collection_id: self.collection_id.clone(),
            feed_name: self.feed_name.clone(),
            position: position.unwrap_or_else(|| self.position.clone()),
            records_processed: records_processed.unwrap_or(self.records_processed),
            records_new: records_new.unwrap_or(self.records_new),
            records_duplicate: records_duplicate.unwrap_or(self.records_duplicate),
            records_failed: records_failed.unwrap_or(self.records_failed),
            started_at: self.started_at,
            updated_at: Utc::now(),
            metadata: self.metadata.clone(),
            is_complete: self.is_complete,
        }
    }

    /// Mark complete. Idempotent — calling twice is a no-op beyond bumping
    /// `updated_at` (invariant §3.2-6: `is_complete` is terminal).
    pub fn mark_complete(&self) -> Self {
        Self {
            is_complete: true,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_carries_forward_unset_fields() {
        let cp = Checkpoint::new("run-1", "feed-a", serde_json::json!({"page": 1}));
        let cp2 = cp.update(None, Some(50), None, None, None);
        assert_eq!(cp2.records_processed, 50);
        assert_eq!(cp2.position, cp.position);
        assert_eq!(cp2.collection_id, cp.collection_id);
    }

    #[test]
    fn mark_complete_is_idempotent() {
        let cp = Checkpoint::new("run-1", "feed-a", serde_json::json!({}));
        let cp2 = cp.mark_complete();
        let cp3 = cp2.mark_complete();
        assert!(cp2.is_complete);
        assert!(cp3.is_complete);
    }

    #[test]
    fn json_round_trip_is_field_equal() {
        let cp = Checkpoint::new("run-1", "feed-a", serde_json::json!({"page": 3}))
            .update(None, Some(10), Some(2), Some(1), Some(0));
        let json = cp.to_json().unwrap();
        let back = Checkpoint::from_json(json).unwrap();
        assert_eq!(back, cp);
    }
}
