use async_trait::async_trait;
use feedspine_core::{Layer, Record, Sighting};

use crate::error::Result;
use crate::filter::Filters;

/// What to do when `store_batch` encounters a natural-key collision
/// within the batch or against existing storage (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    Skip,
    Update,
    Error,
}

/// Ordering + pagination for `query` (spec.md §4.1). `order_by` names any
/// top-level `Record` attribute; `None` returns insertion order.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub layer: Option<Layer>,
    pub filters: Filters,
    pub order_by: Option<String>,
    pub order_desc: bool,
    pub limit: usize,
    pub offset: usize,
}

impl QuerySpec {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}

/// Durable persistence of records and sightings: layered, paginated,
/// filtered reads and idempotent batch writes (spec.md §4.1). Every
/// operation surfaces failures — implementations must never swallow a
/// transport error.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn store(&self, record: Record) -> Result<()>;
    async fn get(&self, id: &str, layer: Option<Layer>) -> Result<Option<Record>>;
    async fn get_by_natural_key(&self, natural_key: &str) -> Result<Option<Record>>;
    async fn exists(&self, id: &str, layer: Option<Layer>) -> Result<bool>;
    async fn exists_by_natural_key(&self, natural_key: &str) -> Result<bool>;
    async fn delete(&self, id: &str, layer: Option<Layer>) -> Result<bool>;
    async fn query(&self, spec: QuerySpec) -> Result<Vec<Record>>;
    async fn count(&self, layer: Option<Layer>, filters: Filters) -> Result<u64>;

    /// Record one observation. Returns `true` iff the natural_key was
    /// previously unseen (i.e. this is the sighting that created the
    /// record) — spec.md §4.1 invariant tying `Sighting.is_new` to this
    /// return value.
    async fn record_sighting(&self, sighting: Sighting) -> Result<bool>;
    /// Chronological (oldest first) sightings for a natural key.
    async fn get_sightings(&self, natural_key: &str) -> Result<Vec<Sighting>>;

    async fn store_batch(
        &self,
        records: Vec<Record>,
        batch_size: usize,
        on_conflict: OnConflict,
    ) -> Result<usize>;
    async fn delete_batch(&self, ids: Vec<String>, batch_size: usize) -> Result<usize>;
}
