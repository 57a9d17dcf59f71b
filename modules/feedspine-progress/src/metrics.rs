use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Process-local counters and timings for a collection run, grouped by an
/// arbitrary `(category, key)` pair — e.g. `("fetched", "<adapter name>")`
/// or `("errors", "<error kind>")`. Grounded on the atomic/mutex-guarded
/// counter style of `rootsignal-scout/src/scheduling/budget.rs::BudgetTracker`,
/// generalized from one fixed counter to an open set of named ones.
#[derive(Default)]
pub struct Metrics {
    counters: Mutex<HashMap<String, u64>>,
    durations: Mutex<HashMap<String, Vec<Duration>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn composite_key(category: &str, key: &str) -> String {
        format!("{category}:{key}")
    }

    pub fn increment(&self, category: &str, key: &str) {
        self.increment_by(category, key, 1);
    }

    pub fn increment_by(&self, category: &str, key: &str, amount: u64) {
        let composite = Self::composite_key(category, key);
        let mut counters = self.counters.lock().expect("metrics counters lock poisoned");
        *counters.entry(composite).or_insert(0) += amount;
    }

    pub fn get(&self, category: &str, key: &str) -> u64 {
        let composite = Self::composite_key(category, key);
        self.counters.lock().expect("metrics counters lock poisoned").get(&composite).copied().unwrap_or(0)
    }

    /// All counters whose key starts with `"{category}:"`, keyed by the
    /// bare key (category prefix stripped).
    pub fn counters_for_category(&self, category: &str) -> HashMap<String, u64> {
        let prefix = format!("{category}:");
        self.counters
            .lock()
            .expect("metrics counters lock poisoned")
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|bare| (bare.to_string(), *v)))
            .collect()
    }

    pub fn record_duration(&self, category: &str, key: &str, duration: Duration) {
        let composite = Self::composite_key(category, key);
        self.durations
            .lock()
            .expect("metrics durations lock poisoned")
            .entry(composite)
            .or_default()
            .push(duration);
    }

    /// Arithmetic mean duration recorded for `(category, key)`, or `None`
    /// if nothing has been recorded yet.
    pub fn mean_duration(&self, category: &str, key: &str) -> Option<Duration> {
        let composite = Self::composite_key(category, key);
        let durations = self.durations.lock().expect("metrics durations lock poisoned");
        let samples = durations.get(&composite)?;
        if samples.is_empty() {
            return None;
        }
        let total: Duration = samples.iter().sum();
        Some(total / samples.len() as u32)
    }

    /// RAII guard recording elapsed wall time under `(category, key)` when
    /// dropped, so timing a fallible operation is one line regardless of
    /// which return path is taken.
    pub fn time_operation<'a>(&'a self, category: &'a str, key: &'a str) -> OperationTimer<'a> {
        OperationTimer {
            metrics: self,
            category,
            key,
            start: Instant::now(),
        }
    }
}

pub struct OperationTimer<'a> {
    metrics: &'a Metrics,
    category: &'a str,
    key: &'a str,
    start: Instant,
}

impl Drop for OperationTimer<'_> {
    fn drop(&mut self) {
        self.metrics.record_duration(self.category, self.key, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn increment_accumulates_per_key() {
        let metrics = Metrics::new();
        metrics.increment("fetched", "feed-a");
        metrics.increment_by("fetched", "feed-a", 4);
        metrics.increment("fetched", "feed-b");

        assert_eq!(metrics.get("fetched", "feed-a"), 5);
        assert_eq!(metrics.get("fetched", "feed-b"), 1);
        assert_eq!(metrics.get("fetched", "feed-c"), 0);
    }

    #[test]
    fn counters_for_category_strips_prefix() {
        let metrics = Metrics::new();
        metrics.increment("errors", "timeout");
        metrics.increment("errors", "parse");
        metrics.increment("fetched", "feed-a");

        let errors = metrics.counters_for_category("errors");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("timeout"), Some(&1));
    }

    #[test]
    fn time_operation_records_a_sample_on_drop() {
        let metrics = Metrics::new();
        {
            let _timer = metrics.time_operation("latency", "feed-a");
            sleep(Duration::from_millis(5));
        }
        assert!(metrics.mean_duration("latency", "feed-a").unwrap() >= Duration::from_millis(5));
    }

    #[test]
    fn mean_duration_is_none_without_samples() {
        let metrics = Metrics::new();
        assert!(metrics.mean_duration("latency", "feed-a").is_none());
    }
}
