//! Integration tests for `PostgresStorage` against a real database.
//!
//! Requirements: Docker (for Postgres via testcontainers)
//!
//! Run with: cargo test -p feedspine-storage --features test-utils --test postgres_storage_test
#![cfg(feature = "test-utils")]

use chrono::Utc;
use feedspine_core::{Metadata, Record, RecordCandidate, Sighting};
use feedspine_storage::{testutil::postgres_storage, OnConflict, QuerySpec, Storage};

fn candidate(key: &str) -> RecordCandidate {
    RecordCandidate::new(key, Utc::now(), serde_json::json!({"title": key}), Metadata::new("test").unwrap()).unwrap()
}

#[tokio::test]
async fn store_and_round_trip_by_natural_key() {
    let (_container, storage) = postgres_storage().await;

    let record = Record::from_candidate("rec-1", &candidate("k1"), Utc::now());
    storage.store(record).await.unwrap();

    let fetched = storage.get_by_natural_key("k1").await.unwrap().unwrap();
    assert_eq!(fetched.id, "rec-1");
    assert_eq!(fetched.version, 1);
}

#[tokio::test]
async fn duplicate_natural_key_is_rejected() {
    let (_container, storage) = postgres_storage().await;

    storage
        .store(Record::from_candidate("rec-1", &candidate("k1"), Utc::now()))
        .await
        .unwrap();

    let err = storage
        .store(Record::from_candidate("rec-2", &candidate("k1"), Utc::now()))
        .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn record_sighting_is_new_only_once_and_bumps_counters() {
    let (_container, storage) = postgres_storage().await;

    storage
        .store(Record::from_candidate("rec-1", &candidate("k1"), Utc::now()))
        .await
        .unwrap();

    let first = storage
        .record_sighting(Sighting::new("k1", "feed-a", true).with_record_id("rec-1"))
        .await
        .unwrap();
    let second = storage
        .record_sighting(Sighting::new("k1", "feed-a", false).with_record_id("rec-1"))
        .await
        .unwrap();

    assert!(first);
    assert!(!second);

    let record = storage.get("rec-1", None).await.unwrap().unwrap();
    assert_eq!(record.seen_count, 3);

    let sightings = storage.get_sightings("k1").await.unwrap();
    assert_eq!(sightings.len(), 2);
}

#[tokio::test]
async fn store_batch_skip_then_update_semantics() {
    let (_container, storage) = postgres_storage().await;

    storage
        .store(Record::from_candidate("rec-1", &candidate("k1"), Utc::now()))
        .await
        .unwrap();

    let skipped = storage
        .store_batch(
            vec![Record::from_candidate("rec-2", &candidate("k1"), Utc::now())],
            10,
            OnConflict::Skip,
        )
        .await
        .unwrap();
    assert_eq!(skipped, 0);

    let errored = storage
        .store_batch(
            vec![Record::from_candidate("rec-3", &candidate("k1"), Utc::now())],
            10,
            OnConflict::Error,
        )
        .await;
    assert!(errored.is_err());
}

#[tokio::test]
async fn store_batch_rolls_back_the_whole_chunk_on_conflict_error() {
    let (_container, storage) = postgres_storage().await;

    storage
        .store(Record::from_candidate("rec-1", &candidate("k1"), Utc::now()))
        .await
        .unwrap();

    // "k2" is new and would insert fine, but it shares a chunk with a
    // natural_key that already exists ("k1"); OnConflict::Error must abort
    // the whole chunk rather than leaving "k2" committed on its own
    // (spec.md §4.1: "Batches are not partially committed").
    let result = storage
        .store_batch(
            vec![
                Record::from_candidate("rec-2", &candidate("k2"), Utc::now()),
                Record::from_candidate("rec-3", &candidate("k1"), Utc::now()),
            ],
            10,
            OnConflict::Error,
        )
        .await;
    assert!(result.is_err());

    assert!(storage.get("rec-2", None).await.unwrap().is_none());
    assert_eq!(storage.count(None, Default::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn store_batch_update_reindexes_a_natural_key_onto_a_new_id() {
    let (_container, storage) = postgres_storage().await;

    storage
        .store(Record::from_candidate("rec-1", &candidate("k1"), Utc::now()))
        .await
        .unwrap();

    // "k1" already belongs to "rec-1"; an Update batch carrying it under a
    // different id must reindex the natural_key onto the new id rather than
    // hitting the natural_key UNIQUE constraint.
    let updated = storage
        .store_batch(
            vec![Record::from_candidate("rec-2", &candidate("k1"), Utc::now())],
            10,
            OnConflict::Update,
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);

    assert!(storage.get("rec-1", None).await.unwrap().is_none());
    let current = storage.get_by_natural_key("k1").await.unwrap().unwrap();
    assert_eq!(current.id, "rec-2");
    assert_eq!(storage.count(None, Default::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn query_paginates_and_counts() {
    let (_container, storage) = postgres_storage().await;

    for i in 0..5 {
        storage
            .store(Record::from_candidate(format!("rec-{i}"), &candidate(&format!("k{i}")), Utc::now()))
            .await
            .unwrap();
    }

    let total = storage.count(None, Default::default()).await.unwrap();
    assert_eq!(total, 5);

    let page = storage
        .query(QuerySpec {
            limit: 2,
            offset: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
}
