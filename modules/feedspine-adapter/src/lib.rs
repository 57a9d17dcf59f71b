//! Converts external sources into `RecordCandidate` streams (spec.md §4.3).
//! See SPEC_FULL.md §4.3.

pub mod base;
pub mod error;
pub mod file;
pub mod keys;
pub mod list;
pub mod rss;
pub mod stats;

pub use base::FeedAdapter;
pub use error::{FeedError, Result};
pub use file::{DiffableFileFeedAdapter, FileFeedAdapter, SnapshotDiff};
pub use list::ListFeedAdapter;
pub use rss::RssFeedAdapter;
pub use stats::AdapterStats;
