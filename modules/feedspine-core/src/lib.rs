//! Core data model for FeedSpine's Bronze/Silver/Gold collection pipeline:
//! entities, invariants, and identity rules shared by every other crate in
//! the workspace. See SPEC_FULL.md §3.

pub mod candidate;
pub mod checkpoint;
pub mod error;
pub mod feed_run;
pub mod keys;
pub mod layer;
pub mod metadata;
pub mod record;
pub mod schedule;
pub mod sighting;
pub mod snapshot;

pub use candidate::RecordCandidate;
pub use checkpoint::Checkpoint;
pub use error::{CoreError, Result};
pub use feed_run::{FeedRun, RunStatus, MAX_ERRORS};
pub use layer::Layer;
pub use metadata::Metadata;
pub use record::{new_record_id, Record, RecordVersion};
pub use schedule::ScheduleInfo;
pub use sighting::Sighting;
pub use snapshot::{hex_sha256, FileSnapshot};
