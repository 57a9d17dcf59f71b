use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use feedspine_adapter::FeedAdapter;
use feedspine_core::FeedRun;
use feedspine_pipeline::{Notifier, Pipeline, PipelineStats};
use feedspine_progress::ProgressReporter;
use feedspine_storage::Storage;

use crate::registry::AdapterRegistry;
use crate::result::CollectionResult;

/// Ties a shared [`AdapterRegistry`] to one [`feedspine_pipeline::Pipeline`]
/// configuration and exposes a single [`Orchestrator::collect`] entry
/// point, exactly per spec.md §4.8's five numbered steps. Bounded per-feed
/// concurrency (default 1, spec.md §5) is driven by a `tokio::sync::Semaphore`
/// guarding a `futures::stream::FuturesUnordered` of in-flight feed runs,
/// grounded on the bounded single-dependency-bundle shape of
/// `rootsignal-scout/src/core/scrape_pipeline.rs`'s `ScrapePipeline`,
/// generalized here to N adapters collected concurrently instead of one.
pub struct Orchestrator {
    registry: Arc<AdapterRegistry>,
    storage: Arc<dyn Storage>,
    notifier: Option<Arc<dyn Notifier>>,
    progress: Option<Arc<dyn ProgressReporter>>,
    concurrency: usize,
    cancellation: Option<CancellationToken>,
    initialized: AsyncMutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(registry: Arc<AdapterRegistry>, storage: Arc<dyn Storage>) -> Self {
        Self {
            registry,
            storage,
            notifier: None,
            progress: None,
            concurrency: 1,
            cancellation: None,
            initialized: AsyncMutex::new(HashSet::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_progress_reporter(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Collect from `feeds`, or every registered adapter when `None`.
    /// Per-feed failures are recorded in `CollectionResult.errors` and do
    /// not stop collection of the remaining feeds (spec.md §4.8 step 4).
    pub async fn collect(&self, feeds: Option<&[String]>) -> CollectionResult {
        let mut result = CollectionResult::start();
        if let Some(progress) = &self.progress {
            progress.start();
        }

        let names: Vec<String> = match feeds {
            Some(f) => f.to_vec(),
            None => self.registry.names().await,
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = FuturesUnordered::new();

        for name in names {
            let semaphore = semaphore.clone();
            tasks.push(async move {
                let permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                let outcome = self.collect_one(&name).await;
                drop(permit);
                (name, outcome)
            });
        }

        while let Some((name, outcome)) = tasks.next().await {
            match outcome {
                Ok(stats) => {
                    result.stats.insert(name, stats);
                }
                Err(message) => {
                    result.errors.insert(name, message);
                }
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish(result.errors.is_empty());
        }

        result.complete()
    }

    /// Steps 1-5 of spec.md §4.8 for one adapter.
    async fn collect_one(&self, name: &str) -> std::result::Result<PipelineStats, String> {
        let Some(adapter) = self.registry.get(name).await else {
            return Err(format!("adapter {name:?} is not registered"));
        };

        {
            let mut initialized = self.initialized.lock().await;
            if !initialized.contains(name) {
                if let Err(err) = adapter.initialize().await {
                    return Err(err.to_string());
                }
                initialized.insert(name.to_string());
            }
        }

        let mut pipeline = Pipeline::new(self.storage.clone());
        if let Some(notifier) = &self.notifier {
            pipeline = pipeline.with_notifier(notifier.clone());
        }
        if let Some(progress) = &self.progress {
            pipeline = pipeline.with_progress_reporter(progress.clone());
        }
        if let Some(token) = &self.cancellation {
            pipeline = pipeline.with_cancellation_token(token.clone());
        }

        let mut run = FeedRun::start(name);
        let outcome = pipeline.run(adapter.as_ref(), &mut run).await;

        if let Err(err) = adapter.close().await {
            warn!(adapter = name, error = %err, "adapter close failed; ignoring");
        }

        outcome.map(|stats| stats).map_err(|e| e.to_string())
    }
}
