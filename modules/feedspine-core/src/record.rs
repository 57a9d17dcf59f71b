use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidate::RecordCandidate;
use crate::layer::Layer;
use crate::metadata::Metadata;

/// A persisted, identified entity. One `Record` exists per natural key
/// (invariant §3.2-1); later sightings mutate only its sighting-tracking
/// fields, never its identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub natural_key: String,
    pub layer: Layer,
    pub content: serde_json::Value,
    pub metadata: Metadata,
    pub published_at: DateTime<Utc>,
    pub captured_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub seen_count: u32,
}

impl Record {
    /// Build the first version of a record from the candidate that created
    /// it. Layer starts at Bronze, version at 1, `seen_count` at 1.
    pub fn from_candidate(id: impl Into<String>, candidate: &RecordCandidate, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            natural_key: candidate.natural_key().to_string(),
            layer: Layer::Bronze,
            content: candidate.content.clone(),
            metadata: candidate.metadata.clone(),
            published_at: candidate.published_at,
            captured_at: candidate.metadata.captured_at,
            updated_at: now,
            version: 1,
            first_seen_at: now,
            last_seen_at: now,
            seen_count: 1,
        }
    }

    /// Record another sighting: bump `last_seen_at`/`seen_count`, touch
    /// `updated_at`. Does not touch identity, layer, or content.
    pub fn record_sighting(&mut self, seen_at: DateTime<Utc>) {
        if seen_at > self.last_seen_at {
            self.last_seen_at = seen_at;
        }
        self.seen_count += 1;
        self.updated_at = seen_at;
    }

    /// Replace content/metadata and bump the version (invariant §3.2-3).
    /// Layer promotion is monotonic (§3.2-5) — callers must not pass a
    /// lower layer than `self.layer`; `Storage::store` enforces this.
    pub fn apply_update(&mut self, content: serde_json::Value, metadata: Metadata, layer: Layer, now: DateTime<Utc>) {
        self.content = content;
        self.metadata = metadata;
        if layer > self.layer {
            self.layer = layer;
        }
        self.version += 1;
        self.updated_at = now;
    }
}

/// One historical version of a `Record`, appended whenever `Record::version`
/// bumps (SPEC_FULL.md §3.4 — not in the distilled spec, added to make
/// layer-promotion history auditable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordVersion {
    pub record_id: String,
    pub version: u32,
    pub layer: Layer,
    pub content: serde_json::Value,
    pub metadata: Metadata,
    pub captured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RecordVersion {
    pub fn from_record(record: &Record, created_at: DateTime<Utc>) -> Self {
        Self {
            record_id: record.id.clone(),
            version: record.version,
            layer: record.layer,
            content: record.content.clone(),
            metadata: record.metadata.clone(),
            captured_at: record.captured_at,
            created_at,
        }
    }
}

/// Generate a fresh, globally-unique record id (UUID v4 string form).
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> RecordCandidate {
        RecordCandidate::new(
            "k1",
            Utc::now(),
            serde_json::json!({"title": "hello"}),
            Metadata::new("test").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn from_candidate_seeds_identity() {
        let c = candidate();
        let now = Utc::now();
        let r = Record::from_candidate("id-1", &c, now);
        assert_eq!(r.version, 1);
        assert_eq!(r.seen_count, 1);
        assert_eq!(r.first_seen_at, r.last_seen_at);
        assert_eq!(r.layer, Layer::Bronze);
    }

    #[test]
    fn record_sighting_bumps_counters_not_identity() {
        let c = candidate();
        let now = Utc::now();
        let mut r = Record::from_candidate("id-1", &c, now);
        let later = now + chrono::Duration::seconds(5);
        r.record_sighting(later);
        assert_eq!(r.seen_count, 2);
        assert_eq!(r.last_seen_at, later);
        assert_eq!(r.first_seen_at, now);
        assert_eq!(r.version, 1);
    }

    #[test]
    fn apply_update_is_monotonic_on_layer() {
        let c = candidate();
        let now = Utc::now();
        let mut r = Record::from_candidate("id-1", &c, now);
        r.apply_update(serde_json::json!({}), c.metadata.clone(), Layer::Gold, now);
        assert_eq!(r.layer, Layer::Gold);
        assert_eq!(r.version, 2);
        // Attempting a "demotion" is a no-op on layer (caller passes Silver < Gold).
        r.apply_update(serde_json::json!({}), c.metadata.clone(), Layer::Silver, now);
        assert_eq!(r.layer, Layer::Gold);
        assert_eq!(r.version, 3);
    }
}
