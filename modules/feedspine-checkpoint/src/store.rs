use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use feedspine_core::Checkpoint;

use crate::error::Result;

/// Durable checkpoint storage backend, ported from
/// `examples/original_source/src/feedspine/core/checkpoint.py::CheckpointStore`.
/// One checkpoint per `collection_id`; saving again overwrites in place.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    async fn load(&self, collection_id: &str) -> Result<Option<Checkpoint>>;

    async fn delete(&self, collection_id: &str) -> Result<bool>;

    /// Incomplete checkpoints, optionally filtered to one feed — used to
    /// find runs that need resuming after a restart.
    async fn list_incomplete(&self, feed_name: Option<&str>) -> Result<Vec<Checkpoint>>;
}

/// Non-durable store for tests and short-lived processes, ported from
/// `MemoryCheckpointStore` in the same source file.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<std::collections::HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.collection_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, collection_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(collection_id).cloned())
    }

    async fn delete(&self, collection_id: &str) -> Result<bool> {
        Ok(self.checkpoints.write().await.remove(collection_id).is_some())
    }

    async fn list_incomplete(&self, feed_name: Option<&str>) -> Result<Vec<Checkpoint>> {
        Ok(self
            .checkpoints
            .read()
            .await
            .values()
            .filter(|cp| !cp.is_complete)
            .filter(|cp| feed_name.map_or(true, |f| cp.feed_name == f))
            .cloned()
            .collect())
    }
}

/// One JSON file per checkpoint, under a directory created at construction
/// time. Ported from `FileCheckpointStore` in the same source file,
/// including its filename sanitization: any character that isn't
/// alphanumeric, `-`, or `_` becomes `_`.
pub struct FileCheckpointStore {
    directory: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    fn checkpoint_path(&self, collection_id: &str) -> PathBuf {
        let safe_id: String = collection_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.directory.join(format!("{safe_id}.json"))
    }

    async fn read_checkpoint(path: &Path) -> Result<Option<Checkpoint>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.checkpoint_path(&checkpoint.collection_id);
        let json = serde_json::to_string_pretty(checkpoint)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn load(&self, collection_id: &str) -> Result<Option<Checkpoint>> {
        Self::read_checkpoint(&self.checkpoint_path(collection_id)).await
    }

    async fn delete(&self, collection_id: &str) -> Result<bool> {
        let path = self.checkpoint_path(collection_id);
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_incomplete(&self, feed_name: Option<&str>) -> Result<Vec<Checkpoint>> {
        let mut result = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // Skip files that don't parse as a checkpoint, matching the
            // Python store's tolerance of stray/corrupt files in the directory.
            let Ok(Some(cp)) = Self::read_checkpoint(&path).await else {
                continue;
            };
            if cp.is_complete {
                continue;
            }
            if feed_name.map_or(true, |f| cp.feed_name == f) {
                result.push(cp);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = InMemoryCheckpointStore::new();
        let cp = Checkpoint::new("run-1", "feed-a", serde_json::json!({}));
        store.save(&cp).await.unwrap();
        let loaded = store.load("run-1").await.unwrap().unwrap();
        assert_eq!(loaded, cp);
    }

    #[tokio::test]
    async fn memory_store_list_incomplete_filters_complete_and_feed() {
        let store = InMemoryCheckpointStore::new();
        let done = Checkpoint::new("run-done", "feed-a", serde_json::json!({})).mark_complete();
        let pending_a = Checkpoint::new("run-a", "feed-a", serde_json::json!({}));
        let pending_b = Checkpoint::new("run-b", "feed-b", serde_json::json!({}));
        store.save(&done).await.unwrap();
        store.save(&pending_a).await.unwrap();
        store.save(&pending_b).await.unwrap();

        let all_incomplete = store.list_incomplete(None).await.unwrap();
        assert_eq!(all_incomplete.len(), 2);

        let feed_a_only = store.list_incomplete(Some("feed-a")).await.unwrap();
        assert_eq!(feed_a_only.len(), 1);
        assert_eq!(feed_a_only[0].collection_id, "run-a");
    }

    #[tokio::test]
    async fn memory_store_delete_reports_presence() {
        let store = InMemoryCheckpointStore::new();
        assert!(!store.delete("missing").await.unwrap());
        store.save(&Checkpoint::new("run-1", "feed-a", serde_json::json!({}))).await.unwrap();
        assert!(store.delete("run-1").await.unwrap());
        assert!(store.load("run-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_sanitizes_unsafe_collection_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let cp = Checkpoint::new("run/2024:01?*", "feed-a", serde_json::json!({}));
        store.save(&cp).await.unwrap();
        let loaded = store.load("run/2024:01?*").await.unwrap().unwrap();
        assert_eq!(loaded, cp);

        let mut found_safe_name = false;
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.chars().all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.')) {
                found_safe_name = true;
            }
        }
        assert!(found_safe_name);
    }

    #[tokio::test]
    async fn file_store_round_trips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let cp = Checkpoint::new("run-1", "feed-a", serde_json::json!({"page": 2}));
        store.save(&cp).await.unwrap();
        assert_eq!(store.load("run-1").await.unwrap().unwrap(), cp);
        assert!(store.delete("run-1").await.unwrap());
        assert!(store.load("run-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_list_incomplete_skips_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        store.save(&Checkpoint::new("run-1", "feed-a", serde_json::json!({})).mark_complete()).await.unwrap();
        store.save(&Checkpoint::new("run-2", "feed-a", serde_json::json!({}))).await.unwrap();
        let incomplete = store.list_incomplete(None).await.unwrap();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].collection_id, "run-2");
    }
}
