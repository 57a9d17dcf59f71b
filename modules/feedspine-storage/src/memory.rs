use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use feedspine_core::{Layer, Record, RecordVersion, Sighting};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{Result, StorageError};
use crate::filter::{extract, matches};
use crate::traits::{OnConflict, QuerySpec, Storage};

/// Process-local storage backend, ported from
/// `examples/original_source/src/feedspine/storage/memory.py::MemoryStorage`
/// (spec.md §4.6 "in-memory implementation ... used in tests and short
/// runs"). `tokio::sync::RwLock` around a handful of `HashMap`s gives the
/// concurrent-safe-per-operation guarantee spec.md §5 requires without any
/// external dependency.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Record>,
    natural_key_index: HashMap<String, String>,
    versions: HashMap<String, Vec<RecordVersion>>,
    sightings: HashMap<String, Vec<Sighting>>,
    insertion_order: Vec<String>,
}

/// Order two `order_by` values the way `PostgresStorage::query` orders its
/// numeric columns — numerically, not by comparing stringified JSON (which
/// would sort `"10"` before `"2"`). Missing values sort first; among present
/// values, numbers compare numerically, strings lexically, and anything
/// else falls back to its string form.
fn compare_order_values(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(af), Some(bf)) => af.partial_cmp(&bf).unwrap_or(Ordering::Equal),
            _ => match (a.as_str(), b.as_str()) {
                (Some(a_str), Some(b_str)) => a_str.cmp(b_str),
                _ => a.to_string().cmp(&b.to_string()),
            },
        },
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_to_json(record: &Record) -> serde_json::Value {
        serde_json::to_value(record).expect("Record always serializes")
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn store(&self, record: Record) -> Result<()> {
        let mut inner = self.inner.write().await;

        if let Some(existing_id) = inner.natural_key_index.get(&record.natural_key) {
            if existing_id != &record.id {
                return Err(StorageError::DuplicateNaturalKey(record.natural_key.clone()));
            }
        }

        if !inner.records.contains_key(&record.id) {
            inner.insertion_order.push(record.id.clone());
        }

        inner.natural_key_index.insert(record.natural_key.clone(), record.id.clone());
        inner
            .versions
            .entry(record.id.clone())
            .or_default()
            .push(RecordVersion::from_record(&record, Utc::now()));
        inner.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str, layer: Option<Layer>) -> Result<Option<Record>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .get(id)
            .filter(|r| layer.map(|l| r.layer == l).unwrap_or(true))
            .cloned())
    }

    async fn get_by_natural_key(&self, natural_key: &str) -> Result<Option<Record>> {
        let inner = self.inner.read().await;
        Ok(inner
            .natural_key_index
            .get(natural_key)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn exists(&self, id: &str, layer: Option<Layer>) -> Result<bool> {
        Ok(self.get(id, layer).await?.is_some())
    }

    async fn exists_by_natural_key(&self, natural_key: &str) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.natural_key_index.contains_key(natural_key))
    }

    async fn delete(&self, id: &str, layer: Option<Layer>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let matches_layer = inner
            .records
            .get(id)
            .map(|r| layer.map(|l| r.layer == l).unwrap_or(true))
            .unwrap_or(false);
        if !matches_layer {
            return Ok(false);
        }
        if let Some(record) = inner.records.remove(id) {
            inner.natural_key_index.remove(&record.natural_key);
            inner.versions.remove(id);
            inner.insertion_order.retain(|x| x != id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn query(&self, spec: QuerySpec) -> Result<Vec<Record>> {
        let inner = self.inner.read().await;

        let mut records: Vec<Record> = inner
            .insertion_order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|r| spec.layer.map(|l| r.layer == l).unwrap_or(true))
            .cloned()
            .collect();

        if !spec.filters.is_empty() {
            records.retain(|r| {
                let json = Self::record_to_json(r);
                spec.filters
                    .0
                    .iter()
                    .all(|(field, op)| matches(op, extract(&json, field)))
            });
        }

        if let Some(field) = &spec.order_by {
            records.sort_by(|a, b| {
                let a_json = Self::record_to_json(a);
                let b_json = Self::record_to_json(b);
                compare_order_values(extract(&a_json, field), extract(&b_json, field))
            });
            if spec.order_desc {
                records.reverse();
            }
        }

        let end = (spec.offset + spec.limit).min(records.len());
        let start = spec.offset.min(records.len());
        Ok(records[start..end].to_vec())
    }

    async fn count(&self, layer: Option<Layer>, filters: crate::filter::Filters) -> Result<u64> {
        let spec = QuerySpec {
            layer,
            filters,
            limit: usize::MAX,
            ..Default::default()
        };
        Ok(self.query(spec).await?.len() as u64)
    }

    async fn record_sighting(&self, sighting: Sighting) -> Result<bool> {
        let mut inner = self.inner.write().await;

        let is_new = !inner.sightings.contains_key(&sighting.natural_key);

        if let Some(record_id) = &sighting.record_id {
            if let Some(record) = inner.records.get_mut(record_id) {
                record.record_sighting(sighting.seen_at);
            }
        }

        inner
            .sightings
            .entry(sighting.natural_key.clone())
            .or_default()
            .push(sighting);

        Ok(is_new)
    }

    async fn get_sightings(&self, natural_key: &str) -> Result<Vec<Sighting>> {
        let inner = self.inner.read().await;
        let mut sightings = inner.sightings.get(natural_key).cloned().unwrap_or_default();
        sightings.sort_by_key(|s| s.seen_at);
        Ok(sightings)
    }

    async fn store_batch(
        &self,
        records: Vec<Record>,
        _batch_size: usize,
        on_conflict: OnConflict,
    ) -> Result<usize> {
        let mut stored = 0;
        for record in records {
            let exists = self.exists_by_natural_key(&record.natural_key).await?;
            if exists {
                match on_conflict {
                    OnConflict::Skip => continue,
                    OnConflict::Error => {
                        return Err(StorageError::DuplicateNaturalKey(record.natural_key));
                    }
                    OnConflict::Update => {
                        let mut inner = self.inner.write().await;
                        if let Some(old_id) = inner.natural_key_index.get(&record.natural_key).cloned() {
                            if old_id != record.id {
                                inner.records.remove(&old_id);
                                inner.versions.remove(&old_id);
                                inner.insertion_order.retain(|x| x != &old_id);
                            }
                        }
                    }
                }
            }
            if let Err(e) = self.store(record).await {
                warn!(error = %e, "store_batch: failed to store a record, aborting batch");
                return Err(e);
            }
            stored += 1;
        }
        Ok(stored)
    }

    async fn delete_batch(&self, ids: Vec<String>, _batch_size: usize) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete(&id, None).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
