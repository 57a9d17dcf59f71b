//! Progress reporting and run metrics for collection runs (spec.md §4.9).
//! See SPEC_FULL.md §4.9.

pub mod event;
pub mod metrics;
pub mod reporter;

pub use event::{ProgressEvent, ProgressStage};
pub use metrics::{Metrics, OperationTimer};
pub use reporter::{CallbackProgressReporter, LoggingProgressReporter, NullProgressReporter, ProgressReporter};
