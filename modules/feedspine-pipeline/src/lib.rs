//! Drives one adapter to completion for one collection run: dedup against
//! natural keys, sighting bookkeeping, optional composable record
//! operations, and notification (spec.md §4.4). See SPEC_FULL.md §4.4-4.5.

pub mod enricher;
pub mod error;
pub mod notifier;
pub mod operation;
pub mod pipeline;
pub mod stats;

pub use enricher::{Enricher, EnrichmentResult, EnrichmentStatus, PassthroughEnricher};
pub use error::{PipelineError, Result};
pub use notifier::{NotificationEvent, NotificationLevel, Notifier, NullNotifier};
pub use operation::{DedupeByKeyOp, EnrichOp, FilterOp, PipelineOperation, TransformOp, BATCH_MARKER, CHECKPOINT_MARKER, RATE_LIMIT_MARKER};
pub use pipeline::Pipeline;
pub use stats::PipelineStats;
