use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A content-hashed capture of a full source file at a point in time
/// (file adapters only — spec.md §3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: String,
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    pub row_count: u64,
    pub metadata: serde_json::Value,
}

impl FileSnapshot {
    pub fn new(path: impl Into<String>, content: &[u8], row_count: u64) -> Self {
        Self {
            path: path.into(),
            content_hash: hex_sha256(content),
            fetched_at: Utc::now(),
            row_count,
            metadata: serde_json::json!({}),
        }
    }

    /// True if `other` is absent or has a different content hash
    /// (spec.md §4.3 file-snapshot mode).
    pub fn has_changed(&self, other: Option<&FileSnapshot>) -> bool {
        match other {
            None => true,
            Some(prev) => self.content_hash != prev.content_hash,
        }
    }
}

/// Lowercase hex SHA-256 of raw bytes (spec.md §6 "File-snapshot hash").
pub fn hex_sha256(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
