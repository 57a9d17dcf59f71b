use std::collections::HashMap;
use std::sync::Arc;

use feedspine_adapter::FeedAdapter;
use tokio::sync::RwLock;

use crate::error::{OrchestratorError, Result};

/// Process-wide catalog of named adapters, ported in spirit from
/// `examples/original_source/src/feedspine/core/registry.py`'s module-level
/// adapter registry (spec.md §6 "adapter discovery registry"). Backed by a
/// `tokio::sync::RwLock` rather than a bare `HashMap` so registration can
/// happen concurrently with an in-flight `Orchestrator::collect`.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn FeedAdapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, adapter: Arc<dyn FeedAdapter>) -> Result<()> {
        let name = adapter.name().to_string();
        let mut adapters = self.adapters.write().await;
        if adapters.contains_key(&name) {
            return Err(OrchestratorError::AlreadyRegistered(name));
        }
        adapters.insert(name, adapter);
        Ok(())
    }

    pub async fn unregister(&self, name: &str) -> bool {
        self.adapters.write().await.remove(name).is_some()
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn FeedAdapter>> {
        self.adapters.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        self.adapters.read().await.keys().cloned().collect()
    }
}
