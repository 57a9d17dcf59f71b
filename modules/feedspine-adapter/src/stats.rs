use chrono::{DateTime, Utc};

/// Summary info exposed by every adapter (spec.md §4.3 "It exposes summary
/// info"), grounded on `HttpIngestor`'s last-fetch bookkeeping
/// (`rootsignal-domains/.../adapters/http.rs`) and `rootsignal-core::ingestor::Ingestor`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterStats {
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub item_count: u64,
    pub error_count: u64,
}
