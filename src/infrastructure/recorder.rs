//! Metrics sink backed by the `metrics` facade.
//!
//! Forwards limiter instruments to whatever global recorder the host process
//! installed (Prometheus exporter, StatsD, ...). Without a recorder every
//! call is a no-op.

use crate::application::metrics::{Counter, Gauge, MetricLabels};
use crate::application::ports::MetricsSink;

/// Sink that publishes through `metrics::gauge!` and `metrics::counter!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderSink;

impl RecorderSink {
    /// Create a sink and register metric descriptions with the recorder.
    pub fn new() -> Self {
        metrics::describe_gauge!(Gauge::Seen.name(), Gauge::Seen.help());
        for counter in Counter::ALL {
            metrics::describe_counter!(counter.name(), counter.help());
        }
        Self
    }
}

impl MetricsSink for RecorderSink {
    fn set_gauge(&self, gauge: Gauge, labels: &MetricLabels, value: f64) {
        metrics::gauge!(
            gauge.name(),
            "key" => labels.key.clone(),
            "name" => labels.name.clone()
        )
        .set(value);
    }

    fn increment_counter(&self, counter: Counter, labels: &MetricLabels) {
        metrics::counter!(
            counter.name(),
            "key" => labels.key.clone(),
            "name" => labels.name.clone()
        )
        .increment(1);
    }
}
