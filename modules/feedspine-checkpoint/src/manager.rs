use std::sync::Arc;

use feedspine_core::Checkpoint;

use crate::error::{CheckpointError, Result};
use crate::store::CheckpointStore;

/// Default save cadence: checkpoint every 100 records processed, matching
/// `CheckpointManager.__init__`'s `save_interval=100` default in
/// `examples/original_source/src/feedspine/core/checkpoint.py`.
pub const DEFAULT_SAVE_INTERVAL: u64 = 100;

/// High-level checkpoint lifecycle for one collection run: start or resume,
/// update progress as records are processed, periodically persist, and
/// mark complete at the end. Ported from `CheckpointManager` in the same
/// source file. `start`/`resume` establish the active checkpoint;
/// `update`/`save`/`complete` before either returns
/// `CheckpointError::NoActiveCheckpoint` (the Rust analogue of the
/// Python's `RuntimeError`) — this is a fail-fast programmer error, not a
/// recoverable condition.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    save_interval: u64,
    current: Option<Checkpoint>,
    last_save_count: u64,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self::with_save_interval(store, DEFAULT_SAVE_INTERVAL)
    }

    pub fn with_save_interval(store: Arc<dyn CheckpointStore>, save_interval: u64) -> Self {
        Self {
            store,
            save_interval,
            current: None,
            last_save_count: 0,
        }
    }

    /// Begin a fresh checkpoint, discarding any previously active one.
    pub fn start(&mut self, collection_id: impl Into<String>, feed_name: impl Into<String>) -> &Checkpoint {
        self.current = Some(Checkpoint::new(collection_id, feed_name, serde_json::json!({})));
        self.last_save_count = 0;
        self.current.as_ref().expect("just set")
    }

    /// Load an existing checkpoint from the store and make it active,
    /// seeding `last_save_count` from its processed count so an immediate
    /// `maybe_save` doesn't re-save unchanged progress.
    pub async fn resume(&mut self, collection_id: &str) -> Result<Option<&Checkpoint>> {
        self.current = self.store.load(collection_id).await?;
        if let Some(cp) = &self.current {
            self.last_save_count = cp.records_processed;
        }
        Ok(self.current.as_ref())
    }

    pub fn current(&self) -> Option<&Checkpoint> {
        self.current.as_ref()
    }

    pub fn position(&self) -> serde_json::Value {
        self.current.as_ref().map(|cp| cp.position.clone()).unwrap_or_else(|| serde_json::json!({}))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        position: Option<serde_json::Value>,
        records_processed: Option<u64>,
        records_new: Option<u64>,
        records_duplicate: Option<u64>,
        records_failed: Option<u64>,
    ) -> Result<&Checkpoint> {
        let current = self.current.as_ref().ok_or(CheckpointError::NoActiveCheckpoint)?;
        self.current = Some(current.update(position, records_processed, records_new, records_duplicate, records_failed));
        Ok(self.current.as_ref().expect("just set"))
    }

    pub async fn save(&mut self) -> Result<()> {
        let Some(current) = self.current.as_ref() else {
            return Ok(());
        };
        self.store.save(current).await?;
        self.last_save_count = current.records_processed;
        Ok(())
    }

    /// Save iff at least `save_interval` records have been processed since
    /// the last save. Returns whether a save happened.
    pub async fn maybe_save(&mut self) -> Result<bool> {
        let Some(current) = self.current.as_ref() else {
            return Ok(false);
        };
        let since_save = current.records_processed.saturating_sub(self.last_save_count);
        if since_save >= self.save_interval {
            self.save().await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn complete(&mut self) -> Result<&Checkpoint> {
        let current = self.current.as_ref().ok_or(CheckpointError::NoActiveCheckpoint)?;
        self.current = Some(current.mark_complete());
        self.save().await?;
        Ok(self.current.as_ref().expect("just set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCheckpointStore;

    fn manager() -> CheckpointManager {
        CheckpointManager::new(Arc::new(InMemoryCheckpointStore::new()))
    }

    #[test]
    fn start_sets_current_checkpoint() {
        let mut manager = manager();
        let cp = manager.start("run-1", "feed-a");
        assert_eq!(cp.collection_id, "run-1");
        assert!(!cp.is_complete);
    }

    #[test]
    fn update_without_active_checkpoint_fails_fast() {
        let mut manager = manager();
        let err = manager.update(None, Some(1), None, None, None).unwrap_err();
        assert!(matches!(err, CheckpointError::NoActiveCheckpoint));
    }

    #[tokio::test]
    async fn complete_without_active_checkpoint_fails_fast() {
        let mut manager = manager();
        let err = manager.complete().await.unwrap_err();
        assert!(matches!(err, CheckpointError::NoActiveCheckpoint));
    }

    #[tokio::test]
    async fn resume_loads_and_seeds_last_save_count() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let cp = Checkpoint::new("run-1", "feed-a", serde_json::json!({})).update(None, Some(42), None, None, None);
        store.save(&cp).await.unwrap();

        let mut manager = CheckpointManager::with_save_interval(store, 10);
        let loaded = manager.resume("run-1").await.unwrap().unwrap();
        assert_eq!(loaded.records_processed, 42);

        manager.update(None, Some(45), None, None, None).unwrap();
        assert!(!manager.maybe_save().await.unwrap());
    }

    #[tokio::test]
    async fn resume_missing_checkpoint_returns_none() {
        let mut manager = manager();
        assert!(manager.resume("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn maybe_save_triggers_once_interval_reached() {
        let mut manager = CheckpointManager::with_save_interval(Arc::new(InMemoryCheckpointStore::new()), 10);
        manager.start("run-1", "feed-a");
        manager.update(None, Some(5), None, None, None).unwrap();
        assert!(!manager.maybe_save().await.unwrap());
        manager.update(None, Some(15), None, None, None).unwrap();
        assert!(manager.maybe_save().await.unwrap());
    }

    #[tokio::test]
    async fn complete_marks_and_persists() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut manager = CheckpointManager::new(store.clone());
        manager.start("run-1", "feed-a");
        let cp = manager.complete().await.unwrap();
        assert!(cp.is_complete);
        let persisted = store.load("run-1").await.unwrap().unwrap();
        assert!(persisted.is_complete);
    }
}
