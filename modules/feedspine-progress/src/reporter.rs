use std::sync::Arc;

use tracing::info;

use crate::event::ProgressEvent;

/// Receives progress notifications during a collection run, ported from
/// `examples/original_source/src/feedspine/protocols/progress.py::ProgressReporter`.
/// Methods are synchronous — every implementation here does in-memory
/// bookkeeping or a single log call, never I/O worth awaiting.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);

    fn start(&self) {}

    fn finish(&self, success: bool) {
        let _ = success;
    }
}

/// Default reporter when the caller doesn't want progress output, ported
/// from `NullProgressReporter` in the same source file.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Emits each event as a structured `tracing` record, grounded on
/// `RunLog::log`'s structured-field style in
/// `rootsignal-scout/src/infra/run_log.rs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProgressReporter;

impl ProgressReporter for LoggingProgressReporter {
    fn report(&self, event: &ProgressEvent) {
        info!(
            stage = %event.stage,
            adapter = %event.adapter_name,
            current = event.current,
            total = event.total,
            percent = event.progress_percent(),
            records_new = event.records_new,
            records_duplicate = event.records_duplicate,
            message = %event.message,
            "collection progress",
        );
    }

    fn start(&self) {
        info!("collection started");
    }

    fn finish(&self, success: bool) {
        info!(success, "collection finished");
    }
}

type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;
type StartCallback = Arc<dyn Fn() + Send + Sync>;
type FinishCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Adapts plain closures to [`ProgressReporter`], ported from
/// `CallbackProgressReporter` in the same source file. Any callback left
/// unset is a no-op for that hook.
#[derive(Clone, Default)]
pub struct CallbackProgressReporter {
    on_progress: Option<ProgressCallback>,
    on_start: Option<StartCallback>,
    on_finish: Option<FinishCallback>,
}

impl CallbackProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_progress(mut self, callback: impl Fn(&ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn with_on_start(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(callback));
        self
    }

    pub fn with_on_finish(mut self, callback: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(callback));
        self
    }
}

impl ProgressReporter for CallbackProgressReporter {
    fn report(&self, event: &ProgressEvent) {
        if let Some(callback) = &self.on_progress {
            callback(event);
        }
    }

    fn start(&self) {
        if let Some(callback) = &self.on_start {
            callback();
        }
    }

    fn finish(&self, success: bool) {
        if let Some(callback) = &self.on_finish {
            callback(success);
        }
    }
}
