//! Mock clock for testing.

use crate::application::ports::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling deterministic
/// testing of window expiry and scrubbing.
///
/// # Examples
///
/// Requires the `test-helpers` feature outside of this crate's own tests.
///
/// ```rust,ignore
/// use stream_dedup::infrastructure::mocks::MockClock;
/// use stream_dedup::application::ports::Clock;
/// use std::time::Duration;
///
/// let clock = MockClock::at_epoch(1_700_000_000);
/// let start = clock.now();
///
/// clock.advance(Duration::from_secs(10));
/// assert_eq!((clock.now() - start).num_seconds(), 10);
/// ```
///
/// # Thread Safety
///
/// `MockClock` is thread-safe and can be cloned to share across threads.
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific time.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a mock clock starting at `secs` seconds after the Unix epoch.
    ///
    /// # Panics
    /// Panics if `secs` is outside chrono's representable range.
    pub fn at_epoch(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).expect("timestamp out of range"))
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let delta = TimeDelta::from_std(duration).expect("duration out of range");
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time += delta;
    }

    /// Move the clock backwards by a duration.
    pub fn rewind(&self, duration: Duration) {
        let delta = TimeDelta::from_std(duration).expect("duration out of range");
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time -= delta;
    }

    /// Set the clock to a specific time.
    pub fn set(&self, time: DateTime<Utc>) {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock") =
            time;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}
