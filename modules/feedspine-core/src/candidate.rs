use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::normalize_checked;
use crate::metadata::Metadata;

/// Pre-dedup unit emitted by an adapter. `natural_key` is normalized at
/// construction time — every other component treats it as already-canonical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCandidate {
    natural_key: String,
    pub published_at: DateTime<Utc>,
    pub content: serde_json::Value,
    pub metadata: Metadata,
}

impl RecordCandidate {
    /// Construct a candidate, normalizing and validating `natural_key`
    /// (1-512 chars after `trim()` + ASCII lowercase, per spec.md §3.1).
    pub fn new(
        natural_key: impl AsRef<str>,
        published_at: DateTime<Utc>,
        content: serde_json::Value,
        metadata: Metadata,
    ) -> Result<Self> {
        let natural_key = normalize_checked(natural_key.as_ref())?;
        Ok(Self {
            natural_key,
            published_at,
            content,
            metadata,
        })
    }

    /// The normalized natural key — this is the dedup identity.
    pub fn natural_key(&self) -> &str {
        &self.natural_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Metadata {
        Metadata::new("test-source").unwrap()
    }

    #[test]
    fn normalizes_on_construction() {
        let c = RecordCandidate::new(" K1 ", Utc::now(), serde_json::json!({}), meta()).unwrap();
        assert_eq!(c.natural_key(), "k1");
    }

    #[test]
    fn rejects_overlong_key() {
        let key = "a".repeat(513);
        assert!(RecordCandidate::new(key, Utc::now(), serde_json::json!({}), meta()).is_err());
    }
}
