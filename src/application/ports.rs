//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::application::metrics::{Counter, Gauge, MetricLabels};
use crate::application::persistence::PersistenceError;
use crate::domain::SeenMap;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::path::Path;

/// Port for obtaining current wall-clock time.
///
/// Wall-clock rather than monotonic time because timestamps are persisted
/// and compared across process restarts.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Port for publishing limiter instruments.
///
/// The limiter never touches a process-wide registry directly; whatever is
/// injected here decides where gauges and counters end up.
pub trait MetricsSink: Send + Sync + Debug {
    /// Set a gauge to an absolute value.
    fn set_gauge(&self, gauge: Gauge, labels: &MetricLabels, value: f64);

    /// Increment a monotonic counter by one.
    fn increment_counter(&self, counter: Counter, labels: &MetricLabels);
}

/// Port for durable storage of the seen map.
///
/// Implementations must guarantee that a reader never observes a partially
/// written snapshot.
pub trait StateRepository: Send + Sync + Debug {
    /// Read the last complete snapshot.
    ///
    /// # Returns
    /// `Ok(None)` if no snapshot exists yet, otherwise the stored entries and
    /// the number of bytes read.
    fn load(&self) -> Result<Option<(SeenMap, usize)>, PersistenceError>;

    /// Replace the stored snapshot with `entries`.
    ///
    /// # Returns
    /// The number of bytes written.
    fn save(&self, entries: &SeenMap) -> Result<usize, PersistenceError>;

    /// Where the snapshot lives, for log messages.
    fn location(&self) -> &Path;
}
