//! Deduplication gate in front of a message handler.
//!
//! The limiter extracts the dedup value from each payload, asks the seen store
//! whether it was processed within the window, hands the message and the
//! decision to the caller's handler, and records the value only once the
//! handler reports success.

use crate::application::config::{ConfigError, LimiterConfig};
use crate::application::metrics::{Counter, Gauge, MetricLabels};
use crate::application::persistence::{
    PersistenceError, PersistenceManager, SnapshotOutcome,
};
use crate::application::ports::MetricsSink;
use crate::application::seen_store::{Decision, SeenStore};
use crate::application::tasks::{self, LimiterHandle};
use crate::domain::field_path::FieldPath;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Error returned when building or starting a limiter fails.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Configuration did not validate
    #[error("invalid limiter configuration: {0}")]
    Config(#[from] ConfigError),
    /// Persisted state could not be loaded and `strict_state` is set
    #[error("could not load last seen state: {0}")]
    State(#[source] PersistenceError),
}

/// Outcome of the value lookup, carried from the decision to the record step.
struct Admission {
    // `None` when dedup is disabled.
    value: Option<String>,
    decision: Decision,
}

/// Deduplicating limiter for one topic.
///
/// Cheap to clone; clones share the same store, sink and persistence.
#[derive(Debug, Clone)]
pub struct Limiter {
    config: Arc<LimiterConfig>,
    field_path: Option<FieldPath>,
    store: SeenStore,
    persistence: PersistenceManager,
    sink: Arc<dyn MetricsSink>,
    labels: MetricLabels,
}

impl Limiter {
    /// Assemble a limiter from already-built parts. The config must have
    /// passed `LimiterConfig::validate`.
    pub(crate) fn new(
        config: LimiterConfig,
        store: SeenStore,
        persistence: PersistenceManager,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        let field_path = Some(FieldPath::parse(&config.field_path)).filter(|p| !p.is_empty());
        let labels = MetricLabels::new(config.field_path.clone(), config.topic.clone());

        Self {
            config: Arc::new(config),
            field_path,
            store,
            persistence,
            sink,
            labels,
        }
    }

    /// Run `process` on `msg` unless its dedup value was processed within the
    /// window.
    ///
    /// `process` always runs and receives the decision as its second argument;
    /// a `false` means the message is a duplicate and should be dropped or
    /// acknowledged without side effects. The value is recorded only when the
    /// decision was to process and `process` returned `Ok`.
    ///
    /// # Errors
    /// Returns whatever `process` returns, unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use stream_dedup::{Limiter, LimiterConfig};
    /// use std::time::Duration;
    ///
    /// let config = LimiterConfig::new("sender", Duration::from_secs(60), "events");
    /// let limiter = Limiter::builder(config).build().unwrap();
    ///
    /// let mut delivered = Vec::new();
    /// for msg in [r#"{"sender":"a"}"#, r#"{"sender":"a"}"#, r#"{"sender":"b"}"#] {
    ///     limiter
    ///         .process_and_record(msg, |msg, process| {
    ///             if process {
    ///                 delivered.push(msg);
    ///             }
    ///             Ok::<_, ()>(())
    ///         })
    ///         .unwrap();
    /// }
    ///
    /// assert_eq!(delivered, [r#"{"sender":"a"}"#, r#"{"sender":"b"}"#]);
    /// ```
    pub fn process_and_record<M, E, F>(&self, msg: M, process: F) -> Result<(), E>
    where
        M: AsRef<[u8]>,
        F: FnOnce(M, bool) -> Result<(), E>,
    {
        let admission = self.admit(msg.as_ref());
        let should_process = admission.decision.should_process();
        let result = process(msg, should_process);
        self.settle(admission, result)
    }

    /// Async form of [`Limiter::process_and_record`].
    ///
    /// The store lock is not held while the handler future runs, so two
    /// messages with the same value that arrive concurrently may both be
    /// processed.
    ///
    /// # Errors
    /// Returns whatever the handler future resolves to, unchanged.
    pub async fn process_and_record_async<M, E, F, Fut>(&self, msg: M, process: F) -> Result<(), E>
    where
        M: AsRef<[u8]>,
        F: FnOnce(M, bool) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let admission = self.admit(msg.as_ref());
        let should_process = admission.decision.should_process();
        let result = process(msg, should_process).await;
        self.settle(admission, result)
    }

    fn admit(&self, payload: &[u8]) -> Admission {
        let Some(path) = &self.field_path else {
            self.count(Counter::Passed);
            return Admission {
                value: None,
                decision: Decision::Process,
            };
        };

        let value = path.extract(payload);
        let decision = self.store.decide(&value);
        self.count(match decision {
            Decision::Process => Counter::Passed,
            Decision::Skip => Counter::Skipped,
        });

        Admission {
            value: Some(value),
            decision,
        }
    }

    fn settle<E>(&self, admission: Admission, result: Result<(), E>) -> Result<(), E> {
        // Without a field path the handler result passes through untouched.
        let Some(value) = admission.value else {
            return result;
        };

        if let Err(e) = result {
            self.count(Counter::Errors);
            return Err(e);
        }

        if admission.decision.should_process() {
            self.store.record(&value);
        }
        Ok(())
    }

    fn count(&self, counter: Counter) {
        self.sink.increment_counter(counter, &self.labels);
    }

    /// Load persisted state and spawn the background loops.
    ///
    /// Must be called from within a tokio runtime, at most once per store.
    /// The snapshot loop is only spawned when persistence is enabled. All
    /// loops stop when `token` is cancelled; the snapshot loop writes one
    /// final snapshot first.
    ///
    /// # Errors
    /// `BuildError::State` if the state file exists but cannot be loaded and
    /// `strict_state` is set. Otherwise load failures are logged and the
    /// limiter starts empty.
    pub fn start(&self, token: CancellationToken) -> Result<LimiterHandle, BuildError> {
        info!(
            key = %self.config.field_path,
            topic = %self.config.topic,
            window = ?self.config.window,
            "starting limiter"
        );
        if self.field_path.is_none() {
            warn!(topic = %self.config.topic, "no field path configured, messages are not deduplicated");
        }

        match self.persistence.load() {
            Ok(_) => {}
            Err(e) if self.config.strict_state => return Err(BuildError::State(e)),
            Err(error) => {
                error!(%error, "could not load last seen cache, starting empty");
            }
        }

        let mut handle = LimiterHandle::new(token.clone());

        if self.persistence.is_enabled() {
            handle.push(
                "snapshot",
                tasks::spawn_snapshots(
                    self.persistence.clone(),
                    self.config.snapshot_interval,
                    token.clone(),
                ),
            );
        }
        handle.push(
            "scrub",
            tasks::spawn_scrubber(self.store.clone(), self.config.scrub_interval, token.clone()),
        );
        handle.push(
            "metrics",
            tasks::spawn_reporter(
                self.store.clone(),
                Arc::clone(&self.sink),
                self.labels.clone(),
                self.config.metrics_interval,
                token,
            ),
        );

        Ok(handle)
    }

    /// Publish the current store size immediately.
    pub fn report_metrics(&self) {
        self.sink
            .set_gauge(Gauge::Seen, &self.labels, self.store.len() as f64);
    }

    /// Remove stale entries now instead of waiting for the scrub loop.
    pub fn scrub(&self) -> usize {
        self.store.scrub()
    }

    /// Write a snapshot now instead of waiting for the snapshot loop.
    ///
    /// This performs blocking file I/O.
    ///
    /// # Errors
    /// See [`PersistenceManager::snapshot`].
    pub fn snapshot(&self) -> Result<SnapshotOutcome, PersistenceError> {
        self.persistence.snapshot()
    }

    /// Number of values currently tracked.
    pub fn seen_count(&self) -> usize {
        self.store.len()
    }

    /// The configuration this limiter was built from.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// The parsed field path, or `None` when dedup is disabled.
    pub fn field_path(&self) -> Option<&FieldPath> {
        self.field_path.as_ref()
    }

    /// Location of the state file, if persistence is enabled.
    pub fn state_path(&self) -> Option<&Path> {
        self.persistence.repository().map(|r| r.location())
    }

    /// The underlying seen store.
    pub fn store(&self) -> &SeenStore {
        &self.store
    }

    /// Labels attached to every instrument.
    pub fn labels(&self) -> &MetricLabels {
        &self.labels
    }
}
