use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Fields captured alongside every record and sighting: where it came from,
/// when it was captured, and an open bag of source-specific extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    pub source_type: Option<String>,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Metadata {
    /// Build metadata for `source`, stamping `captured_at` as now.
    ///
    /// Fails if `source` is empty — every sighting and record needs a
    /// non-empty adapter name to dedupe and notify against.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        if source.is_empty() {
            return Err(CoreError::EmptySource);
        }
        Ok(Self {
            source,
            source_type: None,
            captured_at: Utc::now(),
            extra: HashMap::new(),
        })
    }

    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_source() {
        assert!(matches!(Metadata::new(""), Err(CoreError::EmptySource)));
    }

    #[test]
    fn builder_chain() {
        let m = Metadata::new("sec-edgar")
            .unwrap()
            .with_source_type("rss")
            .with_extra("region", "us-east");
        assert_eq!(m.source, "sec-edgar");
        assert_eq!(m.source_type.as_deref(), Some("rss"));
        assert_eq!(m.extra.get("region").unwrap(), "us-east");
    }
}
