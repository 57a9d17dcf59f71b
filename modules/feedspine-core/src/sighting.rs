use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One observation of a natural_key from a named source. Append-only: the
/// core never mutates or deletes a sighting once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sighting {
    pub id: String,
    pub natural_key: String,
    pub record_id: Option<String>,
    pub source: String,
    pub seen_at: DateTime<Utc>,
    pub is_new: bool,
    pub raw_data_hash: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl Sighting {
    pub fn new(natural_key: impl Into<String>, source: impl Into<String>, is_new: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            natural_key: natural_key.into(),
            record_id: None,
            source: source.into(),
            seen_at: Utc::now(),
            is_new,
            raw_data_hash: None,
            metadata: None,
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn with_seen_at(mut self, seen_at: DateTime<Utc>) -> Self {
        self.seen_at = seen_at;
        self
    }

    pub fn with_raw_data_hash(mut self, hash: impl Into<String>) -> Self {
        self.raw_data_hash = Some(hash.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
