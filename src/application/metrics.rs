//! Observability metrics for the limiter.
//!
//! Defines the four instruments the limiter publishes and an in-memory
//! [`MetricsSink`] that keeps them in atomics for querying and tests.

use crate::application::ports::MetricsSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Gauges published by the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gauge {
    /// Number of unique values currently tracked
    Seen,
}

impl Gauge {
    /// Exported metric name.
    pub fn name(&self) -> &'static str {
        match self {
            Gauge::Seen => "stream_replicator_limiter_memory_seen",
        }
    }

    /// Help text for exporters.
    pub fn help(&self) -> &'static str {
        match self {
            Gauge::Seen => "How many unique values were seen in the inspect key",
        }
    }
}

/// Counters published by the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Messages handed to the callback with `process = true`
    Passed,
    /// Messages handed to the callback with `process = false`
    Skipped,
    /// Callback failures
    Errors,
}

impl Counter {
    /// All counters, in export order.
    pub const ALL: [Counter; 3] = [Counter::Passed, Counter::Skipped, Counter::Errors];

    /// Exported metric name.
    pub fn name(&self) -> &'static str {
        match self {
            Counter::Passed => "stream_replicator_limiter_memory_passed",
            Counter::Skipped => "stream_replicator_limiter_memory_skipped",
            Counter::Errors => "stream_replicator_limiter_memory_errors",
        }
    }

    /// Help text for exporters.
    pub fn help(&self) -> &'static str {
        match self {
            Counter::Passed => "How many times the limiter passed a message for processing",
            Counter::Skipped => {
                "How many times the limiter skipped a message that would have been published"
            }
            Counter::Errors => "How many errors were encountered during processing messages",
        }
    }
}

/// Label set attached to every instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricLabels {
    /// The field path being inspected
    pub key: String,
    /// The topic the limiter is attached to
    pub name: String,
}

impl MetricLabels {
    /// Create labels for a field path and topic.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }
}

/// In-memory metrics sink.
///
/// Counts are aggregated across label sets; share one instance per limiter if
/// per-topic numbers are needed. Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    seen: AtomicU64,
    passed: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                seen: AtomicU64::new(0),
                passed: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                errors: AtomicU64::new(0),
            }),
        }
    }

    /// Last reported store size.
    pub fn seen(&self) -> u64 {
        self.inner.seen.load(Ordering::Relaxed)
    }

    /// Total messages passed for processing.
    pub fn passed(&self) -> u64 {
        self.inner.passed.load(Ordering::Relaxed)
    }

    /// Total messages skipped.
    pub fn skipped(&self) -> u64 {
        self.inner.skipped.load(Ordering::Relaxed)
    }

    /// Total callback failures.
    pub fn errors(&self) -> u64 {
        self.inner.errors.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            seen: self.seen(),
            passed: self.passed(),
            skipped: self.skipped(),
            errors: self.errors(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for Metrics {
    fn set_gauge(&self, gauge: Gauge, _labels: &MetricLabels, value: f64) {
        match gauge {
            Gauge::Seen => self.inner.seen.store(value as u64, Ordering::Relaxed),
        }
    }

    fn increment_counter(&self, counter: Counter, _labels: &MetricLabels) {
        let target = match counter {
            Counter::Passed => &self.inner.passed,
            Counter::Skipped => &self.inner.skipped,
            Counter::Errors => &self.inner.errors,
        };
        target.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Last reported store size
    pub seen: u64,
    /// Total messages passed for processing
    pub passed: u64,
    /// Total messages skipped
    pub skipped: u64,
    /// Total callback failures
    pub errors: u64,
}

impl MetricsSnapshot {
    /// Ratio of skipped messages to all decided messages (0.0 to 1.0).
    pub fn skip_rate(&self) -> f64 {
        let total = self.total_decisions();
        if total == 0 {
            0.0
        } else {
            self.skipped as f64 / total as f64
        }
    }

    /// Total messages decided (passed + skipped).
    pub fn total_decisions(&self) -> u64 {
        self.passed.saturating_add(self.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> MetricLabels {
        MetricLabels::new("sender", "events")
    }

    #[test]
    fn test_metrics_initial_state() {
        let metrics = Metrics::new();
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                seen: 0,
                passed: 0,
                skipped: 0,
                errors: 0
            }
        );
    }

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.increment_counter(Counter::Passed, &labels());
        metrics.increment_counter(Counter::Passed, &labels());
        metrics.increment_counter(Counter::Skipped, &labels());
        metrics.increment_counter(Counter::Errors, &labels());

        assert_eq!(metrics.passed(), 2);
        assert_eq!(metrics.skipped(), 1);
        assert_eq!(metrics.errors(), 1);
    }

    #[test]
    fn test_gauge_overwrites() {
        let metrics = Metrics::new();
        metrics.set_gauge(Gauge::Seen, &labels(), 12.0);
        metrics.set_gauge(Gauge::Seen, &labels(), 3.0);
        assert_eq!(metrics.seen(), 3);
    }

    #[test]
    fn test_skip_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().skip_rate(), 0.0);

        metrics.increment_counter(Counter::Passed, &labels());
        metrics.increment_counter(Counter::Skipped, &labels());
        metrics.increment_counter(Counter::Skipped, &labels());
        metrics.increment_counter(Counter::Skipped, &labels());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_decisions(), 4);
        assert!((snapshot.skip_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_clone_shares_counters() {
        let metrics1 = Metrics::new();
        let metrics2 = metrics1.clone();
        metrics1.increment_counter(Counter::Passed, &labels());
        metrics2.increment_counter(Counter::Passed, &labels());

        assert_eq!(metrics1.passed(), 2);
        assert_eq!(metrics2.passed(), 2);
    }

    #[test]
    fn test_metric_names_are_distinct() {
        let mut names: Vec<&str> = Counter::ALL.iter().map(Counter::name).collect();
        names.push(Gauge::Seen.name());
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 4);
    }
}
