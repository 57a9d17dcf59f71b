use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use feedspine_core::Record;

use crate::enricher::{Enricher, EnrichmentStatus};
use crate::error::{PipelineError, Result};

/// Names the three markers `Pipeline::run` recognizes and handles itself
/// rather than dispatching to `apply` (SPEC_FULL.md §4.4, spec.md §9's
/// "pluggable pipeline operations" note).
pub const RATE_LIMIT_MARKER: &str = "rate_limit";
pub const CHECKPOINT_MARKER: &str = "checkpoint";
pub const BATCH_MARKER: &str = "batch";

/// One step of an optional post-creation pipeline (spec.md §4.4's
/// "pipeline composition"): each step either transforms a record or drops
/// it, short-circuiting everything after it. Implementations take `&self`
/// so a single operation instance can be shared and reused across an
/// entire run; any per-run state (dedupe sets, batch buffers) lives
/// behind interior mutability.
#[async_trait]
pub trait PipelineOperation: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, record: Record) -> Result<Option<Record>>;
}

/// Keep the record only if `predicate` returns true.
pub struct FilterOp<F> {
    name: String,
    predicate: F,
}

impl<F> FilterOp<F>
where
    F: Fn(&Record) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

#[async_trait]
impl<F> PipelineOperation for FilterOp<F>
where
    F: Fn(&Record) -> bool + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, record: Record) -> Result<Option<Record>> {
        Ok(if (self.predicate)(&record) { Some(record) } else { None })
    }
}

/// Unconditionally rewrite the record.
pub struct TransformOp<F> {
    name: String,
    transform: F,
}

impl<F> TransformOp<F>
where
    F: Fn(Record) -> Record + Send + Sync,
{
    pub fn new(name: impl Into<String>, transform: F) -> Self {
        Self {
            name: name.into(),
            transform,
        }
    }
}

#[async_trait]
impl<F> PipelineOperation for TransformOp<F>
where
    F: Fn(Record) -> Record + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, record: Record) -> Result<Option<Record>> {
        Ok(Some((self.transform)(record)))
    }
}

/// Drop any record whose `key_fn(record)` has already been seen earlier
/// in this run, per spec.md §4.4's "dedupe-by-key (in-run only; keeps a
/// seen-key set)".
pub struct DedupeByKeyOp<F> {
    name: String,
    key_fn: F,
    seen: Mutex<HashSet<String>>,
}

impl<F> DedupeByKeyOp<F>
where
    F: Fn(&Record) -> String + Send + Sync,
{
    pub fn new(name: impl Into<String>, key_fn: F) -> Self {
        Self {
            name: name.into(),
            key_fn,
            seen: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl<F> PipelineOperation for DedupeByKeyOp<F>
where
    F: Fn(&Record) -> String + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, record: Record) -> Result<Option<Record>> {
        let key = (self.key_fn)(&record);
        let mut seen = self.seen.lock().expect("dedupe seen-set lock poisoned");
        if seen.contains(&key) {
            return Ok(None);
        }
        seen.insert(key);
        drop(seen);
        Ok(Some(record))
    }
}

/// Invokes an `Enricher` and enforces layer monotonicity (invariant
/// §3.2-5) on its behalf, since that invariant is the caller's
/// responsibility, not the enricher's (spec.md §4.5).
pub struct EnrichOp {
    enricher: Arc<dyn Enricher>,
}

impl EnrichOp {
    pub fn new(enricher: Arc<dyn Enricher>) -> Self {
        Self { enricher }
    }
}

#[async_trait]
impl PipelineOperation for EnrichOp {
    fn name(&self) -> &str {
        self.enricher.name()
    }

    async fn apply(&self, mut record: Record) -> Result<Option<Record>> {
        if !self.enricher.can_enrich(&record) {
            return Ok(Some(record));
        }

        let before_layer = record.layer;
        let result = self.enricher.enrich(&mut record).await;

        if record.layer < before_layer {
            tracing::warn!(
                enricher = self.enricher.name(),
                from = %before_layer,
                attempted = %record.layer,
                "enricher attempted a layer demotion; clamping"
            );
            record.layer = before_layer;
        }

        if result.status == EnrichmentStatus::Failed {
            return Err(PipelineError::EnrichmentFailed {
                enricher: self.enricher.name().to_string(),
                message: "enrichment reported failure".to_string(),
            });
        }

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enricher::EnrichmentResult;
    use chrono::Utc;
    use feedspine_core::{Layer, Metadata, RecordCandidate};

    fn record() -> Record {
        let candidate = RecordCandidate::new("k1", Utc::now(), serde_json::json!({}), Metadata::new("test").unwrap()).unwrap();
        Record::from_candidate("id-1", &candidate, Utc::now())
    }

    #[tokio::test]
    async fn filter_drops_non_matching_records() {
        let op = FilterOp::new("has-title", |r: &Record| r.content.get("title").is_some());
        assert!(op.apply(record()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transform_rewrites_content() {
        let op = TransformOp::new("stamp", |mut r: Record| {
            r.content = serde_json::json!({"stamped": true});
            r
        });
        let out = op.apply(record()).await.unwrap().unwrap();
        assert_eq!(out.content, serde_json::json!({"stamped": true}));
    }

    #[tokio::test]
    async fn dedupe_by_key_drops_second_occurrence() {
        let op = DedupeByKeyOp::new("by-natural-key", |r: &Record| r.natural_key.clone());
        assert!(op.apply(record()).await.unwrap().is_some());
        assert!(op.apply(record()).await.unwrap().is_none());
    }

    struct PromotingEnricher;
    #[async_trait]
    impl Enricher for PromotingEnricher {
        fn name(&self) -> &str {
            "promoter"
        }
        fn can_enrich(&self, _record: &Record) -> bool {
            true
        }
        async fn enrich(&self, record: &mut Record) -> EnrichmentResult {
            record.layer = Layer::Gold;
            EnrichmentResult {
                status: EnrichmentStatus::Success,
                source_layer: Layer::Bronze,
                target_layer: Layer::Gold,
                fields_added: vec![],
                fields_updated: vec![],
                duration_ms: 1,
            }
        }
    }

    struct DemotingEnricher;
    #[async_trait]
    impl Enricher for DemotingEnricher {
        fn name(&self) -> &str {
            "demoter"
        }
        fn can_enrich(&self, _record: &Record) -> bool {
            true
        }
        async fn enrich(&self, record: &mut Record) -> EnrichmentResult {
            record.layer = Layer::Bronze;
            EnrichmentResult {
                status: EnrichmentStatus::Success,
                source_layer: Layer::Gold,
                target_layer: Layer::Bronze,
                fields_added: vec![],
                fields_updated: vec![],
                duration_ms: 1,
            }
        }
    }

    #[tokio::test]
    async fn enrich_op_allows_promotion() {
        let op = EnrichOp::new(Arc::new(PromotingEnricher));
        let out = op.apply(record()).await.unwrap().unwrap();
        assert_eq!(out.layer, Layer::Gold);
    }

    #[tokio::test]
    async fn enrich_op_clamps_demotion() {
        let mut r = record();
        r.layer = Layer::Gold;
        let op = EnrichOp::new(Arc::new(DemotingEnricher));
        let out = op.apply(r).await.unwrap().unwrap();
        assert_eq!(out.layer, Layer::Gold);
    }

    struct FailingEnricher;
    #[async_trait]
    impl Enricher for FailingEnricher {
        fn name(&self) -> &str {
            "failing"
        }
        fn can_enrich(&self, _record: &Record) -> bool {
            true
        }
        async fn enrich(&self, record: &mut Record) -> EnrichmentResult {
            EnrichmentResult::failed(record.layer, 1)
        }
    }

    #[tokio::test]
    async fn enrich_op_surfaces_failed_status_as_error() {
        let op = EnrichOp::new(Arc::new(FailingEnricher));
        let err = op.apply(record()).await.unwrap_err();
        assert!(matches!(err, PipelineError::EnrichmentFailed { .. }));
    }
}
