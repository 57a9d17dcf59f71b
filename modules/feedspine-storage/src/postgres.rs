use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedspine_core::{Layer, Metadata, Record, Sighting};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, warn};

use crate::error::{Result, StorageError};
use crate::filter::{FilterOp, Filters};
use crate::traits::{OnConflict, QuerySpec, Storage};

/// Durable storage backend, ported from `ArchiveStore`
/// (`rootsignal-archive/src/store.rs`): a thin wrapper over a `PgPool`
/// with one method per operation and `sqlx::migrate!` for schema
/// management (SPEC_FULL.md §4.1).
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: String,
    natural_key: String,
    layer: String,
    content: Json<serde_json::Value>,
    metadata: Json<Metadata>,
    published_at: DateTime<Utc>,
    captured_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i32,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    seen_count: i32,
}

impl TryFrom<RecordRow> for Record {
    type Error = StorageError;

    fn try_from(row: RecordRow) -> std::result::Result<Self, Self::Error> {
        let layer = Layer::from_str(&row.layer)
            .map_err(|e| StorageError::Unavailable(format!("invalid layer column: {e}")))?;
        Ok(Record {
            id: row.id,
            natural_key: row.natural_key,
            layer,
            content: row.content.0,
            metadata: row.metadata.0,
            published_at: row.published_at,
            captured_at: row.captured_at,
            updated_at: row.updated_at,
            version: row.version as u32,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
            seen_count: row.seen_count as u32,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SightingRow {
    id: String,
    natural_key: String,
    record_id: Option<String>,
    source: String,
    seen_at: DateTime<Utc>,
    is_new: bool,
    raw_data_hash: Option<String>,
    metadata: Option<Json<serde_json::Value>>,
}

impl From<SightingRow> for Sighting {
    fn from(row: SightingRow) -> Self {
        Sighting {
            id: row.id,
            natural_key: row.natural_key,
            record_id: row.record_id,
            source: row.source,
            seen_at: row.seen_at,
            is_new: row.is_new,
            raw_data_hash: row.raw_data_hash,
            metadata: row.metadata.map(|j| j.0),
        }
    }
}

impl PostgresStorage {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &Filters) {
        for (field, op) in &filters.0 {
            builder.push(" AND ");
            push_field_op(builder, field, op);
        }
    }
}

/// Render one `(field, op)` pair as a jsonb or column comparison. Top-level
/// columns are compared directly; anything else (or a dotted `content.`
/// path) is read out of the `content` jsonb column via `#>>`.
fn push_field_op(builder: &mut QueryBuilder<'_, Postgres>, field: &str, op: &FilterOp) {
    let is_top_level = matches!(
        field,
        "id" | "natural_key" | "layer" | "published_at" | "captured_at" | "updated_at" | "version"
            | "first_seen_at" | "last_seen_at" | "seen_count"
    );

    if is_top_level {
        push_column_op(builder, field, op);
        return;
    }

    let path = field.strip_prefix("content.").unwrap_or(field);
    let path_literal: Vec<&str> = path.split('.').collect();
    builder.push("content #>> ARRAY[");
    for (i, part) in path_literal.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push_bind(part.to_string());
    }
    builder.push("]");
    push_text_op(builder, op);
}

fn push_column_op(builder: &mut QueryBuilder<'_, Postgres>, column: &str, op: &FilterOp) {
    builder.push(column);
    match op {
        FilterOp::Eq(v) => {
            builder.push(" = ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::In(values) => {
            builder.push(" = ANY(");
            builder.push_bind(values.iter().map(json_to_text).collect::<Vec<_>>());
            builder.push(")");
        }
        FilterOp::Like(pattern) => {
            builder.push(" LIKE ");
            builder.push_bind(pattern.clone());
        }
        FilterOp::Gt(v) => {
            builder.push(" > ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::Lt(v) => {
            builder.push(" < ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::Gte(v) => {
            builder.push(" >= ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::Lte(v) => {
            builder.push(" <= ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::IsNull => {
            builder.push(" IS NULL");
        }
        FilterOp::IsNotNull => {
            builder.push(" IS NOT NULL");
        }
    }
}

fn push_text_op(builder: &mut QueryBuilder<'_, Postgres>, op: &FilterOp) {
    match op {
        FilterOp::Eq(v) => {
            builder.push(" = ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::In(values) => {
            builder.push(" = ANY(");
            builder.push_bind(values.iter().map(json_to_text).collect::<Vec<_>>());
            builder.push(")");
        }
        FilterOp::Like(pattern) => {
            builder.push(" LIKE ");
            builder.push_bind(pattern.clone());
        }
        FilterOp::Gt(v) => {
            builder.push(" > ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::Lt(v) => {
            builder.push(" < ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::Gte(v) => {
            builder.push(" >= ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::Lte(v) => {
            builder.push(" <= ");
            builder.push_bind(json_to_text(v));
        }
        FilterOp::IsNull => {
            builder.push(" IS NULL");
        }
        FilterOp::IsNotNull => {
            builder.push(" IS NOT NULL");
        }
    }
}

fn json_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn store(&self, record: Record) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO records
                (id, natural_key, layer, content, metadata, published_at,
                 captured_at, updated_at, version, first_seen_at, last_seen_at, seen_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                layer = EXCLUDED.layer,
                content = EXCLUDED.content,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at,
                version = EXCLUDED.version,
                last_seen_at = EXCLUDED.last_seen_at,
                seen_count = EXCLUDED.seen_count
            "#,
        )
        .bind(&record.id)
        .bind(&record.natural_key)
        .bind(record.layer.to_string())
        .bind(Json(&record.content))
        .bind(Json(&record.metadata))
        .bind(record.published_at)
        .bind(record.captured_at)
        .bind(record.updated_at)
        .bind(record.version as i32)
        .bind(record.first_seen_at)
        .bind(record.last_seen_at)
        .bind(record.seen_count as i32)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint() == Some("records_natural_key_key") => {
                StorageError::DuplicateNaturalKey(record.natural_key.clone())
            }
            _ => StorageError::Database(e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO record_versions (record_id, version, layer, content, metadata, captured_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (record_id, version) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(record.version as i32)
        .bind(record.layer.to_string())
        .bind(Json(&record.content))
        .bind(Json(&record.metadata))
        .bind(record.captured_at)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &str, layer: Option<Layer>) -> Result<Option<Record>> {
        let row: Option<RecordRow> = match layer {
            Some(l) => {
                sqlx::query_as("SELECT * FROM records WHERE id = $1 AND layer = $2")
                    .bind(id)
                    .bind(l.to_string())
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM records WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        row.map(Record::try_from).transpose()
    }

    async fn get_by_natural_key(&self, natural_key: &str) -> Result<Option<Record>> {
        let row: Option<RecordRow> = sqlx::query_as("SELECT * FROM records WHERE natural_key = $1")
            .bind(natural_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Record::try_from).transpose()
    }

    async fn exists(&self, id: &str, layer: Option<Layer>) -> Result<bool> {
        Ok(self.get(id, layer).await?.is_some())
    }

    async fn exists_by_natural_key(&self, natural_key: &str) -> Result<bool> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM records WHERE natural_key = $1")
            .bind(natural_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn delete(&self, id: &str, layer: Option<Layer>) -> Result<bool> {
        let result = match layer {
            Some(l) => {
                sqlx::query("DELETE FROM records WHERE id = $1 AND layer = $2")
                    .bind(id)
                    .bind(l.to_string())
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM records WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, spec: QuerySpec) -> Result<Vec<Record>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM records WHERE 1=1");

        if let Some(layer) = spec.layer {
            builder.push(" AND layer = ");
            builder.push_bind(layer.to_string());
        }
        Self::push_filters(&mut builder, &spec.filters);

        match &spec.order_by {
            Some(field) => {
                let column = if matches!(
                    field.as_str(),
                    "id" | "natural_key" | "layer" | "published_at" | "captured_at" | "updated_at"
                        | "version" | "first_seen_at" | "last_seen_at" | "seen_count"
                ) {
                    field.clone()
                } else {
                    "updated_at".to_string()
                };
                builder.push(" ORDER BY ").push(column);
                builder.push(if spec.order_desc { " DESC" } else { " ASC" });
            }
            None => {
                builder.push(" ORDER BY updated_at ASC");
            }
        }

        builder.push(" LIMIT ");
        builder.push_bind(spec.limit as i64);
        builder.push(" OFFSET ");
        builder.push_bind(spec.offset as i64);

        let rows: Vec<RecordRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Record::try_from).collect()
    }

    async fn count(&self, layer: Option<Layer>, filters: Filters) -> Result<u64> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM records WHERE 1=1");
        if let Some(layer) = layer {
            builder.push(" AND layer = ");
            builder.push_bind(layer.to_string());
        }
        Self::push_filters(&mut builder, &filters);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn record_sighting(&self, sighting: Sighting) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i32> = sqlx::query_scalar("SELECT 1 FROM sightings WHERE natural_key = $1 LIMIT 1")
            .bind(&sighting.natural_key)
            .fetch_optional(&mut *tx)
            .await?;
        let is_new = existing.is_none();

        sqlx::query(
            r#"
            INSERT INTO sightings (id, natural_key, record_id, source, seen_at, is_new, raw_data_hash, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&sighting.id)
        .bind(&sighting.natural_key)
        .bind(&sighting.record_id)
        .bind(&sighting.source)
        .bind(sighting.seen_at)
        .bind(is_new)
        .bind(&sighting.raw_data_hash)
        .bind(sighting.metadata.as_ref().map(Json))
        .execute(&mut *tx)
        .await?;

        if let Some(record_id) = &sighting.record_id {
            let updated = sqlx::query(
                r#"
                UPDATE records
                SET seen_count = seen_count + 1,
                    last_seen_at = GREATEST(last_seen_at, $2),
                    updated_at = $2
                WHERE id = $1
                "#,
            )
            .bind(record_id)
            .bind(sighting.seen_at)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                debug!(record_id, "record_sighting: target record not found, skipping counter bump");
            }
        }

        tx.commit().await?;
        Ok(is_new)
    }

    async fn get_sightings(&self, natural_key: &str) -> Result<Vec<Sighting>> {
        let rows: Vec<SightingRow> = sqlx::query_as(
            "SELECT * FROM sightings WHERE natural_key = $1 ORDER BY seen_at ASC",
        )
        .bind(natural_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Sighting::from).collect())
    }

    async fn store_batch(
        &self,
        records: Vec<Record>,
        batch_size: usize,
        on_conflict: OnConflict,
    ) -> Result<usize> {
        let batch_size = batch_size.max(1);
        let mut stored = 0;
        for chunk in records.chunks(batch_size) {
            // One transaction per chunk (spec.md §4.1: "Batches are not
            // partially committed"); on_conflict=Error aborts the whole
            // chunk, leaving storage as if this call had never happened for
            // these records, rather than stopping partway through.
            let mut tx = self.pool.begin().await?;
            let mut chunk_stored = 0;

            for record in chunk {
                let existing_id: Option<String> =
                    sqlx::query_scalar("SELECT id FROM records WHERE natural_key = $1")
                        .bind(&record.natural_key)
                        .fetch_optional(&mut *tx)
                        .await?;

                if let Some(existing_id) = &existing_id {
                    match on_conflict {
                        OnConflict::Skip => continue,
                        OnConflict::Error => {
                            return Err(StorageError::DuplicateNaturalKey(record.natural_key.clone()));
                        }
                        OnConflict::Update => {
                            // The natural_key's UNIQUE constraint means the
                            // incoming record can only land via the INSERT
                            // below if the stale row (possibly under a
                            // different id, mirroring `InMemoryStorage`'s
                            // reindex) is gone first; `ON DELETE CASCADE`
                            // takes its `record_versions` rows with it.
                            if existing_id != &record.id {
                                sqlx::query("DELETE FROM records WHERE id = $1")
                                    .bind(existing_id)
                                    .execute(&mut *tx)
                                    .await?;
                            }
                        }
                    }
                }

                sqlx::query(
                    r#"
                    INSERT INTO records
                        (id, natural_key, layer, content, metadata, published_at,
                         captured_at, updated_at, version, first_seen_at, last_seen_at, seen_count)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    ON CONFLICT (id) DO UPDATE SET
                        layer = EXCLUDED.layer,
                        content = EXCLUDED.content,
                        metadata = EXCLUDED.metadata,
                        updated_at = EXCLUDED.updated_at,
                        version = EXCLUDED.version,
                        last_seen_at = EXCLUDED.last_seen_at,
                        seen_count = EXCLUDED.seen_count
                    "#,
                )
                .bind(&record.id)
                .bind(&record.natural_key)
                .bind(record.layer.to_string())
                .bind(Json(&record.content))
                .bind(Json(&record.metadata))
                .bind(record.published_at)
                .bind(record.captured_at)
                .bind(record.updated_at)
                .bind(record.version as i32)
                .bind(record.first_seen_at)
                .bind(record.last_seen_at)
                .bind(record.seen_count as i32)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO record_versions (record_id, version, layer, content, metadata, captured_at, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (record_id, version) DO NOTHING
                    "#,
                )
                .bind(&record.id)
                .bind(record.version as i32)
                .bind(record.layer.to_string())
                .bind(Json(&record.content))
                .bind(Json(&record.metadata))
                .bind(record.captured_at)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;

                chunk_stored += 1;
            }

            if let Err(e) = tx.commit().await {
                warn!(error = %e, "store_batch: chunk transaction failed to commit");
                return Err(StorageError::Database(e));
            }
            stored += chunk_stored;
        }
        Ok(stored)
    }

    async fn delete_batch(&self, ids: Vec<String>, batch_size: usize) -> Result<usize> {
        let batch_size = batch_size.max(1);
        let mut deleted = 0;
        for chunk in ids.chunks(batch_size) {
            let result = sqlx::query("DELETE FROM records WHERE id = ANY($1)")
                .bind(chunk.iter().map(|s| s.as_str()).collect::<Vec<_>>())
                .execute(&self.pool)
                .await?;
            deleted += result.rows_affected() as usize;
        }
        Ok(deleted)
    }
}
