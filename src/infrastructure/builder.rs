//! Limiter construction.
//!
//! Wires a [`Limiter`] from its configuration, filling in the production
//! adapters for any port the caller did not override.

use crate::application::config::LimiterConfig;
use crate::application::limiter::{BuildError, Limiter};
use crate::application::metrics::Metrics;
use crate::application::persistence::PersistenceManager;
use crate::application::ports::{Clock, MetricsSink, StateRepository};
use crate::application::seen_store::SeenStore;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::state_file::JsonStateFile;
use std::sync::Arc;

/// Builder for constructing a [`Limiter`].
#[derive(Debug)]
pub struct LimiterBuilder {
    config: LimiterConfig,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn MetricsSink>>,
    repository: Option<Arc<dyn StateRepository>>,
}

impl Limiter {
    /// Create a builder for a limiter with the given configuration.
    pub fn builder(config: LimiterConfig) -> LimiterBuilder {
        LimiterBuilder {
            config,
            clock: None,
            sink: None,
            repository: None,
        }
    }
}

impl LimiterBuilder {
    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Publish instruments through `sink`.
    ///
    /// Defaults to an in-memory [`Metrics`]. Use
    /// [`RecorderSink`](crate::RecorderSink) to export through the `metrics`
    /// facade.
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Persist state through `repository` instead of the JSON state file.
    ///
    /// Enables persistence even when no state directory is configured.
    pub fn with_state_repository(mut self, repository: Arc<dyn StateRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Build the limiter.
    ///
    /// No tasks are spawned and no state is read until
    /// [`Limiter::start`] is called.
    ///
    /// # Errors
    /// Returns `BuildError::Config` if the configuration is invalid.
    pub fn build(self) -> Result<Limiter, BuildError> {
        let window = self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(Metrics::new()));
        let repository = self.repository.or_else(|| {
            self.config.state_dir().map(|dir| {
                Arc::new(JsonStateFile::new(dir, &self.config.topic)) as Arc<dyn StateRepository>
            })
        });

        let store = SeenStore::new(clock, window);
        let persistence = PersistenceManager::new(store.clone(), repository);

        Ok(Limiter::new(self.config, store, persistence, sink))
    }
}
