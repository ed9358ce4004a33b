//! # stream-dedup
//!
//! Time-window deduplication for message replication pipelines.
//!
//! A [`Limiter`] sits in front of a message handler. For every message it
//! extracts a dedup value from the JSON payload using a field path, and
//! decides whether that value was already processed within a configurable
//! window. The handler is always called and told whether to process; the value
//! is only recorded once the handler reports success, so a failed message is
//! retried rather than suppressed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stream_dedup::{Limiter, LimiterConfig};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LimiterConfig::new("sender", Duration::from_secs(3600), "registrations")
//!     .with_state_dir("/var/lib/replicator");
//!
//! let limiter = Limiter::builder(config).build()?;
//! let handle = limiter.start(CancellationToken::new())?;
//!
//! limiter.process_and_record(r#"{"sender":"node1.example.net"}"#, |msg, process| {
//!     if process {
//!         // publish msg downstream
//!     }
//!     Ok::<_, std::io::Error>(())
//! })?;
//!
//! // Flushes the last seen state to disk before returning.
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Decisions
//!
//! A message is processed when any of these hold:
//! - no field path is configured
//! - the value at the path is missing, null or an empty string
//! - the value has never been recorded
//! - strictly more than `window` has passed since it was last recorded
//!
//! Otherwise the handler is called with `process = false`. Skipping never
//! refreshes the stored timestamp, so a value that keeps arriving is processed
//! again once per window.
//!
//! ## Field Paths
//!
//! Paths use dot-separated keys over the JSON payload:
//!
//! | Path | Payload | Value |
//! |------|---------|-------|
//! | `sender` | `{"sender":"a"}` | `a` |
//! | `meta.host` | `{"meta":{"host":"h1"}}` | `h1` |
//! | `ids.1` | `{"ids":[7,8]}` | `8` |
//! | `ids.#` | `{"ids":[7,8]}` | `2` |
//! | `items.#.id` | `{"items":[{"id":1},{"id":2}]}` | `[1,2]` |
//! | `na*` | `{"name":"x"}` | `x` |
//!
//! Strings are used verbatim; booleans, objects and arrays use their compact
//! JSON text. Integers keep their exact digits, however large, and other
//! numbers are written as the shortest plain decimal, so `1.0` reads as `1`.
//! A `\` escapes the next character, so `a\.b` addresses the key `a.b`.
//!
//! ## Persistence
//!
//! With a state directory configured, the store is written to
//! `{state_dir}/{topic}.json` every `snapshot_interval` and once more on
//! shutdown. Writes go through a temporary file in the same directory and an
//! atomic rename. On start the file is loaded and entries older than the
//! window plus a ten minute grace period are dropped.
//!
//! ## Observability
//!
//! Instruments are published through a [`MetricsSink`]:
//!
//! | Name | Kind |
//! |------|------|
//! | `stream_replicator_limiter_memory_seen` | gauge |
//! | `stream_replicator_limiter_memory_passed` | counter |
//! | `stream_replicator_limiter_memory_skipped` | counter |
//! | `stream_replicator_limiter_memory_errors` | counter |
//!
//! All carry `key` (the field path) and `name` (the topic) labels. The
//! default sink is the in-memory [`Metrics`]; [`RecorderSink`] forwards to the
//! `metrics` facade so any exporter installed by the host process picks them
//! up.

// Domain layer - pure dedup rules
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

pub use domain::{
    field_path::FieldPath,
    window::{Window, WindowOutOfRange, GRACE_PERIOD},
    SeenMap,
};

pub use application::{
    config::{ConfigError, LimiterConfig},
    limiter::{BuildError, Limiter},
    metrics::{Counter, Gauge, MetricLabels, Metrics, MetricsSnapshot},
    persistence::{LoadOutcome, PersistenceError, PersistenceManager, SnapshotOutcome},
    ports::{Clock, MetricsSink, StateRepository},
    seen_store::{Decision, SeenStore},
    tasks::{LimiterHandle, ShutdownError},
};

pub use infrastructure::{
    builder::LimiterBuilder,
    clock::SystemClock,
    recorder::RecorderSink,
    state_file::{JsonStateFile, StagedSnapshot},
};
