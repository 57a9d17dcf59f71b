use async_trait::async_trait;
use feedspine_core::{Layer, Record};

/// Outcome of one `Enricher::enrich` call, ported field-for-field from
/// spec.md §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStatus {
    Success,
    Skipped,
    Failed,
    Partial,
}

#[derive(Debug, Clone)]
pub struct EnrichmentResult {
    pub status: EnrichmentStatus,
    pub source_layer: Layer,
    pub target_layer: Layer,
    pub fields_added: Vec<String>,
    pub fields_updated: Vec<String>,
    pub duration_ms: i64,
}

impl EnrichmentResult {
    pub fn skipped(layer: Layer) -> Self {
        Self {
            status: EnrichmentStatus::Skipped,
            source_layer: layer,
            target_layer: layer,
            fields_added: Vec::new(),
            fields_updated: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn failed(layer: Layer, duration_ms: i64) -> Self {
        Self {
            status: EnrichmentStatus::Failed,
            source_layer: layer,
            target_layer: layer,
            fields_added: Vec::new(),
            fields_updated: Vec::new(),
            duration_ms,
        }
    }
}

/// Enrichment boundary (spec.md §4.5): mutates a record in place, may
/// promote its layer, and reports what it did. Layer monotonicity
/// (invariant §3.2-5) is enforced by the caller (`EnrichOp`), not trusted
/// from the implementation — an enricher is free to *attempt* a demotion,
/// it will simply be clamped.
#[async_trait]
pub trait Enricher: Send + Sync {
    fn name(&self) -> &str;

    fn can_enrich(&self, record: &Record) -> bool;

    async fn enrich(&self, record: &mut Record) -> EnrichmentResult;
}

/// No-op enricher for tests and composition examples, ported in spirit
/// from `examples/original_source/src/feedspine/enricher/passthrough.py`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughEnricher;

#[async_trait]
impl Enricher for PassthroughEnricher {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn can_enrich(&self, _record: &Record) -> bool {
        true
    }

    async fn enrich(&self, record: &mut Record) -> EnrichmentResult {
        EnrichmentResult::skipped(record.layer)
    }
}
