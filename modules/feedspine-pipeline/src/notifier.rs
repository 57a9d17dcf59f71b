use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a [`NotificationEvent`], ported from
/// `examples/original_source/src/feedspine/protocols/notifier.py::NotificationLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// One notification fired by the `Pipeline`, carrying enough of the new
/// record for a downstream consumer to react without a storage round trip
/// (spec.md §4.4 step 3.f: `{id, natural_key, title-from-content-if-present}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub level: NotificationLevel,
    pub record_id: String,
    pub natural_key: String,
    pub title: Option<String>,
    pub source: String,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new_record(record: &feedspine_core::Record, source: impl Into<String>) -> Self {
        let title = record
            .content
            .get("title")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Self {
            level: NotificationLevel::Info,
            record_id: record.id.clone(),
            natural_key: record.natural_key.clone(),
            title,
            source: source.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Boundary trait for delivering [`NotificationEvent`]s out of the
/// pipeline, ported from `Notifier` in the same source file. Exactly one
/// invocation point: after a new record is created (spec.md §4.4 step
/// 3.f and SPEC_FULL.md §9 Open Question resolution 3). Notification
/// failures MUST NOT fail the run — `Pipeline` logs and discards them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()>;
}

/// No-op notifier for tests and compositions that don't need one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _event: NotificationEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedspine_core::{Metadata, Record, RecordCandidate};

    #[test]
    fn new_record_extracts_title_when_present() {
        let candidate = RecordCandidate::new(
            "k1",
            Utc::now(),
            serde_json::json!({"title": "hello world"}),
            Metadata::new("test").unwrap(),
        )
        .unwrap();
        let record = Record::from_candidate("id-1", &candidate, Utc::now());
        let event = NotificationEvent::new_record(&record, "feed-a");
        assert_eq!(event.title.as_deref(), Some("hello world"));
        assert_eq!(event.level, NotificationLevel::Info);
    }

    #[test]
    fn new_record_title_is_none_without_a_title_field() {
        let candidate = RecordCandidate::new(
            "k1",
            Utc::now(),
            serde_json::json!({"body": "no title here"}),
            Metadata::new("test").unwrap(),
        )
        .unwrap();
        let record = Record::from_candidate("id-1", &candidate, Utc::now());
        let event = NotificationEvent::new_record(&record, "feed-a");
        assert!(event.title.is_none());
    }

    #[tokio::test]
    async fn null_notifier_always_succeeds() {
        let candidate = RecordCandidate::new("k1", Utc::now(), serde_json::json!({}), Metadata::new("test").unwrap()).unwrap();
        let record = Record::from_candidate("id-1", &candidate, Utc::now());
        NullNotifier.notify(NotificationEvent::new_record(&record, "feed-a")).await.unwrap();
    }
}
