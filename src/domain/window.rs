//! Suppression window arithmetic.
//!
//! A value is suppressed while `now - last_seen` is within the window. Entries
//! are kept for an extra [`GRACE_PERIOD`] past the window before they become
//! eligible for scrubbing.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Fixed extension past the window before an entry may be evicted.
pub const GRACE_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Error returned when a window cannot be represented as a signed time delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("window of {0:?} is out of range")]
pub struct WindowOutOfRange(pub Duration);

/// The suppression window for a single limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    age: Duration,
    age_delta: TimeDelta,
    retention: TimeDelta,
}

impl Window {
    /// Create a window of the given age.
    ///
    /// # Errors
    /// Returns `WindowOutOfRange` if `age + GRACE_PERIOD` does not fit in a
    /// [`TimeDelta`].
    pub fn new(age: Duration) -> Result<Self, WindowOutOfRange> {
        let age_delta = TimeDelta::from_std(age).map_err(|_| WindowOutOfRange(age))?;
        let grace = TimeDelta::from_std(GRACE_PERIOD).map_err(|_| WindowOutOfRange(age))?;
        let retention = age_delta
            .checked_add(&grace)
            .ok_or(WindowOutOfRange(age))?;

        Ok(Self {
            age,
            age_delta,
            retention,
        })
    }

    /// The configured window duration.
    pub fn age(&self) -> Duration {
        self.age
    }

    /// True if a value last seen at `last_seen` may be processed again at `now`.
    ///
    /// Strictly greater than: a repeat exactly at the window edge is still
    /// suppressed. A `last_seen` in the future (clock stepped backwards) is
    /// treated as recent.
    pub fn has_elapsed(&self, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_seen) > self.age_delta
    }

    /// When a value last seen at `last_seen` stops being suppressed.
    pub fn expires_at(&self, last_seen: DateTime<Utc>) -> Option<DateTime<Utc>> {
        last_seen.checked_add_signed(self.age_delta)
    }

    /// Cut-off below which an entry has outlived the window plus grace period.
    ///
    /// `None` if the subtraction would leave the representable range, in which
    /// case nothing is old enough to evict.
    pub fn kill_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.retention)
    }

    /// True if an entry last seen at `last_seen` should be scrubbed at `now`.
    pub fn is_stale(&self, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.kill_time(now)
            .is_some_and(|kill_time| last_seen < kill_time)
    }
}
