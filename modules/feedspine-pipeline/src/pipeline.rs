use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use feedspine_adapter::FeedAdapter;
use feedspine_checkpoint::CheckpointManager;
use feedspine_core::{new_record_id, FeedRun, Record, Sighting};
use feedspine_http::RateLimiter;
use feedspine_progress::{ProgressEvent, ProgressReporter, ProgressStage};
use feedspine_storage::{OnConflict, Storage};

use crate::error::{PipelineError, Result};
use crate::notifier::{NotificationEvent, Notifier};
use crate::operation::{PipelineOperation, BATCH_MARKER, CHECKPOINT_MARKER, RATE_LIMIT_MARKER};
use crate::stats::PipelineStats;

/// Drives one adapter to completion for one run, enforcing the dedup and
/// sighting invariants described by spec.md §4.4. Construct via
/// [`Pipeline::new`] and the `with_*` builder methods, then call
/// [`Pipeline::run`] once per `FeedRun`.
pub struct Pipeline {
    storage: Arc<dyn Storage>,
    operations: Vec<Box<dyn PipelineOperation>>,
    notifier: Option<Arc<dyn Notifier>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    checkpoint_manager: Option<Arc<AsyncMutex<CheckpointManager>>>,
    batch_size: Option<usize>,
    progress: Option<Arc<dyn ProgressReporter>>,
    cancellation: Option<CancellationToken>,
}

impl Pipeline {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            operations: Vec::new(),
            notifier: None,
            rate_limiter: None,
            checkpoint_manager: None,
            batch_size: None,
            progress: None,
            cancellation: None,
        }
    }

    pub fn with_operations(mut self, operations: Vec<Box<dyn PipelineOperation>>) -> Self {
        self.operations = operations;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn with_checkpoint_manager(mut self, checkpoint_manager: Arc<AsyncMutex<CheckpointManager>>) -> Self {
        self.checkpoint_manager = Some(checkpoint_manager);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_progress_reporter(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Drive `adapter`'s candidate stream to completion against `run`,
    /// which the caller (typically an `Orchestrator`) owns and passes in
    /// so it can be inspected/persisted independently of this call
    /// returning. Returns summary `PipelineStats` derived from `run`.
    pub async fn run(&self, adapter: &dyn FeedAdapter, run: &mut FeedRun) -> Result<PipelineStats> {
        let start = std::time::Instant::now();
        if let Some(progress) = &self.progress {
            progress.start();
        }

        let mut pending: Vec<Record> = Vec::new();
        let mut pending_index: HashMap<String, usize> = HashMap::new();
        let has_checkpoint_marker = self.operations.iter().any(|op| op.name() == CHECKPOINT_MARKER);

        let mut stream = adapter.fetch();
        loop {
            let next = match &self.cancellation {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!(feed = %run.feed_name, "pipeline run cancelled");
                            run.complete(feedspine_core::RunStatus::Cancelled);
                            if let Err(err) = self.flush_pending(&mut pending, &mut pending_index).await {
                                run.push_error(err.to_string());
                                run.complete(feedspine_core::RunStatus::Failed);
                            }
                            return Ok(PipelineStats::from_run(run, start.elapsed().as_millis() as i64));
                        }
                        item = stream.next() => item,
                    }
                }
                None => stream.next().await,
            };

            let Some(item) = next else {
                break;
            };

            let candidate = match item {
                Ok(candidate) => candidate,
                Err(err) => {
                    // A fatal stream error ends the whole run (spec.md §4.3);
                    // per-item construction errors never reach this point,
                    // the adapter isolates them itself.
                    if err.is_fatal() {
                        run.push_error(err.to_string());
                        run.complete(feedspine_core::RunStatus::Failed);
                        if let Err(flush_err) = self.flush_pending(&mut pending, &mut pending_index).await {
                            run.push_error(flush_err.to_string());
                        }
                        return Ok(PipelineStats::from_run(run, start.elapsed().as_millis() as i64));
                    }
                    run.push_error(err.to_string());
                    continue;
                }
            };

            run.processed += 1;

            if let Err(err) = self
                .process_one(adapter.name(), candidate, &mut pending, &mut pending_index, run)
                .await
            {
                run.push_error(err.to_string());

                // A storage error surfaced from `process_one` (including a
                // mid-run batch flush) is `StorageUnavailable`-class, which
                // spec.md §7 makes fatal to the whole run rather than a
                // per-candidate failure to absorb.
                if matches!(err, PipelineError::Storage(_)) {
                    run.complete(feedspine_core::RunStatus::Failed);
                    if let Some(progress) = &self.progress {
                        progress.finish(false);
                    }
                    return Ok(PipelineStats::from_run(run, start.elapsed().as_millis() as i64));
                }
            }

            if let Some(checkpoint_manager) = &self.checkpoint_manager {
                if has_checkpoint_marker {
                    let mut manager = checkpoint_manager.lock().await;
                    let _ = manager.update(None, Some(run.processed), Some(run.new), Some(run.duplicate), Some(run.failed));
                    let _ = manager.maybe_save().await;
                }
            }

            if let Some(progress) = &self.progress {
                progress.report(
                    &ProgressEvent::new(ProgressStage::Storing, adapter.name())
                        .with_progress(run.processed, 0)
                        .with_counts(run.new, run.duplicate),
                );
            }
        }

        let flush_result = self.flush_pending(&mut pending, &mut pending_index).await;

        if let Some(checkpoint_manager) = &self.checkpoint_manager {
            let mut manager = checkpoint_manager.lock().await;
            let _ = manager.update(None, Some(run.processed), Some(run.new), Some(run.duplicate), Some(run.failed));
            let _ = manager.save().await;
        }

        // A failed final flush is a storage fatality (spec.md §7
        // `StorageUnavailable`: "Fatal for the pipeline run; run marked
        // failed"), not a warn-and-continue condition — the batched
        // records never reached storage even though their sightings were
        // already recorded and counted into `run.new`.
        let success = match flush_result {
            Ok(()) => true,
            Err(err) => {
                run.push_error(err.to_string());
                false
            }
        };
        run.complete(if success { feedspine_core::RunStatus::Success } else { feedspine_core::RunStatus::Failed });
        if let Some(progress) = &self.progress {
            progress.finish(success);
        }

        Ok(PipelineStats::from_run(run, start.elapsed().as_millis() as i64))
    }

    /// Per-candidate algorithm, exactly per spec.md §4.4 steps 1-3. Any
    /// error here is caught by `run` (step 4) rather than propagated.
    async fn process_one(
        &self,
        adapter_name: &str,
        candidate: feedspine_core::RecordCandidate,
        pending: &mut Vec<Record>,
        pending_index: &mut HashMap<String, usize>,
        run: &mut FeedRun,
    ) -> Result<()> {
        if let Some(&idx) = pending_index.get(candidate.natural_key()) {
            let existing_id = pending[idx].id.clone();
            self.record_duplicate_sighting(adapter_name, candidate.natural_key(), &existing_id, run).await?;
            return Ok(());
        }

        if let Some(existing) = self.storage.get_by_natural_key(candidate.natural_key()).await? {
            self.record_duplicate_sighting(adapter_name, candidate.natural_key(), &existing.id, run).await?;
            return Ok(());
        }

        let id = new_record_id();
        let now = Utc::now();
        let mut record = Record::from_candidate(id, &candidate, now);

        let mut dropped = false;
        for op in &self.operations {
            let name = op.name();
            if name == RATE_LIMIT_MARKER {
                if let Some(limiter) = &self.rate_limiter {
                    limiter.acquire(1).await;
                }
                continue;
            }
            if name == CHECKPOINT_MARKER || name == BATCH_MARKER {
                continue;
            }
            match op.apply(record).await? {
                Some(next) => record = next,
                None => {
                    dropped = true;
                    break;
                }
            }
        }

        if dropped {
            return Ok(());
        }

        if self.batch_size.is_some() {
            pending_index.insert(record.natural_key.clone(), pending.len());
            pending.push(record.clone());
        } else {
            self.storage.store(record.clone()).await?;
        }

        self.storage
            .record_sighting(Sighting::new(record.natural_key.clone(), adapter_name, true).with_record_id(record.id.clone()))
            .await?;

        if let Some(notifier) = &self.notifier {
            if let Err(err) = notifier.notify(NotificationEvent::new_record(&record, adapter_name)).await {
                warn!(error = %err, "notifier failed; continuing run");
            }
        }

        run.new += 1;

        if let Some(batch_size) = self.batch_size {
            if pending.len() >= batch_size {
                self.flush_pending(pending, pending_index).await?;
            }
        }

        Ok(())
    }

    async fn record_duplicate_sighting(&self, adapter_name: &str, natural_key: &str, record_id: &str, run: &mut FeedRun) -> Result<()> {
        self.storage
            .record_sighting(Sighting::new(natural_key, adapter_name, false).with_record_id(record_id))
            .await?;
        run.duplicate += 1;
        Ok(())
    }

    /// Flush any buffered batch-mode records to storage. Storage errors are
    /// propagated to the caller rather than swallowed (spec.md §4.1: "all
    /// storage errors are surfaced; the core never swallows them") — the
    /// records already counted into `run.new` and sighted would otherwise
    /// be silently lost if the backing store rejected the batch.
    async fn flush_pending(&self, pending: &mut Vec<Record>, pending_index: &mut HashMap<String, usize>) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(pending);
        pending_index.clear();
        self.storage
            .store_batch(batch, self.batch_size.unwrap_or(100), OnConflict::Error)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use feedspine_adapter::{AdapterStats, FeedError};
    use feedspine_core::{Metadata, RecordCandidate};
    use feedspine_storage::InMemoryStorage;
    use futures::stream::{self, BoxStream};

    struct FixedAdapter {
        name: String,
        candidates: Vec<std::result::Result<RecordCandidate, ()>>,
    }

    #[async_trait]
    impl FeedAdapter for FixedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn fetch(&self) -> BoxStream<'_, feedspine_adapter::error::Result<RecordCandidate>> {
            Box::pin(stream::iter(self.candidates.iter().map(|r| match r {
                Ok(c) => Ok(c.clone()),
                Err(_) => Err(FeedError::Transport {
                    adapter: self.name.clone(),
                    source: anyhow::anyhow!("boom"),
                }),
            })))
        }

        fn stats(&self) -> AdapterStats {
            AdapterStats::default()
        }
    }

    fn candidate(key: &str) -> RecordCandidate {
        RecordCandidate::new(key, Utc::now(), serde_json::json!({"title": key}), Metadata::new("test").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn first_seen_candidates_are_all_new() {
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = Pipeline::new(storage.clone());
        let adapter = FixedAdapter {
            name: "feed-a".to_string(),
            candidates: vec![Ok(candidate("k1")), Ok(candidate("k2")), Ok(candidate("k3"))],
        };
        let mut run = FeedRun::start("feed-a");
        let stats = pipeline.run(&adapter, &mut run).await.unwrap();

        assert_eq!(stats.new, 3);
        assert_eq!(stats.duplicates, 0);
        assert_eq!(stats.processed, 3);
        assert_eq!(storage.count(None, feedspine_storage::Filters::new()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn repeated_natural_key_counts_as_duplicate() {
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = Pipeline::new(storage.clone());
        let adapter = FixedAdapter {
            name: "feed-a".to_string(),
            candidates: vec![Ok(candidate("k1")), Ok(candidate("k1"))],
        };
        let mut run = FeedRun::start("feed-a");
        let stats = pipeline.run(&adapter, &mut run).await.unwrap();

        assert_eq!(stats.new, 1);
        assert_eq!(stats.duplicates, 1);
        let sightings = storage.get_sightings("k1").await.unwrap();
        assert_eq!(sightings.len(), 2);
        assert!(sightings[0].is_new);
        assert!(!sightings[1].is_new);
    }

    #[tokio::test]
    async fn empty_stream_yields_all_zero_stats() {
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = Pipeline::new(storage);
        let adapter = FixedAdapter {
            name: "feed-a".to_string(),
            candidates: vec![],
        };
        let mut run = FeedRun::start("feed-a");
        let stats = pipeline.run(&adapter, &mut run).await.unwrap();

        assert_eq!(stats.processed, 0);
        assert_eq!(stats.new, 0);
        assert_eq!(stats.duplicates, 0);
        assert_eq!(stats.errors, 0);
        assert_eq!(run.status, feedspine_core::RunStatus::Success);
    }

    #[tokio::test]
    async fn fatal_stream_error_ends_the_run_and_is_recorded() {
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = Pipeline::new(storage.clone());
        let adapter = FixedAdapter {
            name: "feed-a".to_string(),
            candidates: vec![Ok(candidate("k1")), Err(())],
        };
        let mut run = FeedRun::start("feed-a");
        let stats = pipeline.run(&adapter, &mut run).await.unwrap();

        assert_eq!(stats.new, 1);
        assert_eq!(run.status, feedspine_core::RunStatus::Failed);
        assert_eq!(run.errors.len(), 1);
    }

    #[tokio::test]
    async fn batch_mode_defers_storage_but_honors_in_run_dedup() {
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = Pipeline::new(storage.clone()).with_batch_size(2);
        let adapter = FixedAdapter {
            name: "feed-a".to_string(),
            candidates: vec![Ok(candidate("k1")), Ok(candidate("k1")), Ok(candidate("k2"))],
        };
        let mut run = FeedRun::start("feed-a");
        let stats = pipeline.run(&adapter, &mut run).await.unwrap();

        assert_eq!(stats.new, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(storage.count(None, feedspine_storage::Filters::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn notifier_errors_do_not_fail_the_run() {
        struct FailingNotifier;
        #[async_trait]
        impl Notifier for FailingNotifier {
            async fn notify(&self, _event: NotificationEvent) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("downstream unavailable"))
            }
        }

        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = Pipeline::new(storage.clone()).with_notifier(Arc::new(FailingNotifier));
        let adapter = FixedAdapter {
            name: "feed-a".to_string(),
            candidates: vec![Ok(candidate("k1"))],
        };
        let mut run = FeedRun::start("feed-a");
        let stats = pipeline.run(&adapter, &mut run).await.unwrap();

        assert_eq!(stats.new, 1);
        assert_eq!(stats.errors, 0);
    }

    struct FailingBatchStorage {
        inner: InMemoryStorage,
    }

    #[async_trait]
    impl feedspine_storage::Storage for FailingBatchStorage {
        async fn store(&self, record: Record) -> feedspine_storage::Result<()> {
            self.inner.store(record).await
        }
        async fn get(&self, id: &str, layer: Option<feedspine_core::Layer>) -> feedspine_storage::Result<Option<Record>> {
            self.inner.get(id, layer).await
        }
        async fn get_by_natural_key(&self, natural_key: &str) -> feedspine_storage::Result<Option<Record>> {
            self.inner.get_by_natural_key(natural_key).await
        }
        async fn exists(&self, id: &str, layer: Option<feedspine_core::Layer>) -> feedspine_storage::Result<bool> {
            self.inner.exists(id, layer).await
        }
        async fn exists_by_natural_key(&self, natural_key: &str) -> feedspine_storage::Result<bool> {
            self.inner.exists_by_natural_key(natural_key).await
        }
        async fn delete(&self, id: &str, layer: Option<feedspine_core::Layer>) -> feedspine_storage::Result<bool> {
            self.inner.delete(id, layer).await
        }
        async fn query(&self, spec: feedspine_storage::QuerySpec) -> feedspine_storage::Result<Vec<Record>> {
            self.inner.query(spec).await
        }
        async fn count(&self, layer: Option<feedspine_core::Layer>, filters: feedspine_storage::Filters) -> feedspine_storage::Result<u64> {
            self.inner.count(layer, filters).await
        }
        async fn record_sighting(&self, sighting: feedspine_core::Sighting) -> feedspine_storage::Result<bool> {
            self.inner.record_sighting(sighting).await
        }
        async fn get_sightings(&self, natural_key: &str) -> feedspine_storage::Result<Vec<feedspine_core::Sighting>> {
            self.inner.get_sightings(natural_key).await
        }
        async fn store_batch(
            &self,
            _records: Vec<Record>,
            _batch_size: usize,
            _on_conflict: feedspine_storage::OnConflict,
        ) -> feedspine_storage::Result<usize> {
            Err(feedspine_storage::StorageError::Unavailable("simulated outage".to_string()))
        }
        async fn delete_batch(&self, ids: Vec<String>, batch_size: usize) -> feedspine_storage::Result<usize> {
            self.inner.delete_batch(ids, batch_size).await
        }
    }

    #[tokio::test]
    async fn failed_final_flush_fails_the_run_instead_of_reporting_success() {
        let storage = Arc::new(FailingBatchStorage { inner: InMemoryStorage::new() });
        let pipeline = Pipeline::new(storage).with_batch_size(10);
        let adapter = FixedAdapter {
            name: "feed-a".to_string(),
            candidates: vec![Ok(candidate("k1")), Ok(candidate("k2"))],
        };
        let mut run = FeedRun::start("feed-a");
        let stats = pipeline.run(&adapter, &mut run).await.unwrap();

        assert_eq!(run.status, feedspine_core::RunStatus::Failed);
        assert_eq!(stats.errors, 1);
        assert!(run.errors[0].contains("simulated outage"));
    }

    #[tokio::test]
    async fn failed_mid_run_flush_fails_the_run_and_stops_processing() {
        let storage = Arc::new(FailingBatchStorage { inner: InMemoryStorage::new() });
        let pipeline = Pipeline::new(storage).with_batch_size(2);
        let adapter = FixedAdapter {
            name: "feed-a".to_string(),
            candidates: vec![Ok(candidate("k1")), Ok(candidate("k2")), Ok(candidate("k3"))],
        };
        let mut run = FeedRun::start("feed-a");
        let stats = pipeline.run(&adapter, &mut run).await.unwrap();

        assert_eq!(run.status, feedspine_core::RunStatus::Failed);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.processed, 2);
    }
}
