//! Limiter configuration.
//!
//! The surrounding application loads this from its own config file; the
//! struct deserialises from any serde format, with durations written in
//! humantime form:
//!
//! ```toml
//! field_path = "sender"
//! window = "1h"
//! topic = "registrations"
//! state_dir = "/var/lib/replicator"
//! ```

use crate::domain::window::{Window, WindowOutOfRange};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How often the seen store is written to disk.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);
/// How often stale entries are scrubbed.
pub const DEFAULT_SCRUB_INTERVAL: Duration = Duration::from_secs(60);
/// How often the store size gauge is published.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Error returned when configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Persistence needs a topic to name the state file
    #[error("topic must not be empty when a state directory is configured")]
    EmptyTopic,
    /// Topic would escape the state directory
    #[error("topic {0:?} cannot be used as a state file name")]
    InvalidTopic(String),
    /// A background interval is zero
    #[error("{0} must be greater than 0")]
    ZeroInterval(&'static str),
    /// Window cannot be represented
    #[error(transparent)]
    Window(#[from] WindowOutOfRange),
}

/// Configuration for a single limiter instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LimiterConfig {
    /// Path of the dedup value in each payload. Empty disables dedup.
    #[serde(default)]
    pub field_path: String,
    /// How long a processed value suppresses repeats
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Topic name, used for metric labels and the state file name
    pub topic: String,
    /// Directory for the state file. Absent or empty disables persistence.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Refuse to start if an existing state file cannot be loaded
    #[serde(default)]
    pub strict_state: bool,
    /// Snapshot period
    #[serde(default = "default_snapshot_interval", with = "humantime_serde")]
    pub snapshot_interval: Duration,
    /// Scrub period
    #[serde(default = "default_scrub_interval", with = "humantime_serde")]
    pub scrub_interval: Duration,
    /// Gauge publication period
    #[serde(default = "default_metrics_interval", with = "humantime_serde")]
    pub metrics_interval: Duration,
}

fn default_snapshot_interval() -> Duration {
    DEFAULT_SNAPSHOT_INTERVAL
}

fn default_scrub_interval() -> Duration {
    DEFAULT_SCRUB_INTERVAL
}

fn default_metrics_interval() -> Duration {
    DEFAULT_METRICS_INTERVAL
}

impl LimiterConfig {
    /// Create a config without persistence.
    pub fn new(field_path: impl Into<String>, window: Duration, topic: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            window,
            topic: topic.into(),
            state_dir: None,
            strict_state: false,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            scrub_interval: DEFAULT_SCRUB_INTERVAL,
            metrics_interval: DEFAULT_METRICS_INTERVAL,
        }
    }

    /// Persist state under `dir`.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Fail startup on an unreadable or corrupt state file.
    pub fn with_strict_state(mut self, strict: bool) -> Self {
        self.strict_state = strict;
        self
    }

    /// Set the snapshot period.
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Set the scrub period.
    pub fn with_scrub_interval(mut self, interval: Duration) -> Self {
        self.scrub_interval = interval;
        self
    }

    /// Set the gauge publication period.
    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    /// True if a field path is configured.
    pub fn dedup_enabled(&self) -> bool {
        !self.field_path.is_empty()
    }

    /// The state directory, treating an empty path as unset.
    pub fn state_dir(&self) -> Option<&Path> {
        self.state_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// Check the configuration and build its window.
    ///
    /// # Errors
    /// See [`ConfigError`].
    pub fn validate(&self) -> Result<Window, ConfigError> {
        for (name, interval) in [
            ("snapshot_interval", self.snapshot_interval),
            ("scrub_interval", self.scrub_interval),
            ("metrics_interval", self.metrics_interval),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }

        if self.state_dir().is_some() {
            if self.topic.is_empty() {
                return Err(ConfigError::EmptyTopic);
            }
            if self.topic.contains(['/', '\\']) || self.topic == "." || self.topic == ".." {
                return Err(ConfigError::InvalidTopic(self.topic.clone()));
            }
        }

        Ok(Window::new(self.window)?)
    }
}
