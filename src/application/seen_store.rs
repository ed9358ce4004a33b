//! Central store of recently processed dedup values.
//!
//! Maps each dedup value to the time it was last successfully processed. A
//! single mutex serialises every read and write; callers never hold it across
//! user code.

use crate::application::persistence::PersistenceError;
use crate::application::ports::Clock;
use crate::domain::window::Window;
use crate::domain::SeenMap;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Whether a message should be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// First sighting, empty value, or the window has expired
    Process,
    /// Seen within the window
    Skip,
}

impl Decision {
    /// True for [`Decision::Process`].
    pub fn should_process(self) -> bool {
        matches!(self, Decision::Process)
    }
}

/// Concurrent map of dedup value to last-seen time.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct SeenStore {
    seen: Arc<Mutex<SeenMap>>,
    clock: Arc<dyn Clock>,
    window: Window,
}

impl SeenStore {
    /// Create an empty store.
    pub fn new(clock: Arc<dyn Clock>, window: Window) -> Self {
        Self {
            seen: Arc::new(Mutex::new(SeenMap::new())),
            clock,
            window,
        }
    }

    // Every mutation is a single insert or remove, so the map is consistent
    // even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, SeenMap> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a message carrying `value` should be processed now.
    pub fn decide(&self, value: &str) -> Decision {
        if value.is_empty() {
            return Decision::Process;
        }

        let now = self.clock.now();
        let seen = self.lock();

        let Some(&last_seen) = seen.get(value) else {
            return Decision::Process;
        };

        if self.window.has_elapsed(last_seen, now) {
            return Decision::Process;
        }

        debug!(
            value,
            last_seen = %last_seen.to_rfc3339(),
            until = ?self.window.expires_at(last_seen).map(|t| t.to_rfc3339()),
            window = ?self.window.age(),
            "skipping message, value seen within window"
        );
        Decision::Skip
    }

    /// Mark `value` as processed now. Empty values are ignored.
    pub fn record(&self, value: &str) {
        if value.is_empty() {
            return;
        }

        let now = self.clock.now();
        self.lock().insert(value.to_string(), now);
    }

    /// Remove every entry older than the window plus grace period.
    ///
    /// # Returns
    /// The number of entries removed.
    pub fn scrub(&self) -> usize {
        let now = self.clock.now();
        let window = self.window;
        let mut seen = self.lock();
        let before = seen.len();
        seen.retain(|_, last_seen| !window.is_stale(*last_seen, now));
        before - seen.len()
    }

    /// Populate an empty store from persisted entries, dropping stale ones.
    ///
    /// # Errors
    /// Returns `PersistenceError::StoreNotEmpty` if the store already holds
    /// entries; loading over live state would resurrect older timestamps.
    ///
    /// # Returns
    /// The number of entries kept.
    pub fn hydrate(&self, entries: SeenMap) -> Result<usize, PersistenceError> {
        let now = self.clock.now();
        let window = self.window;
        let mut seen = self.lock();

        if !seen.is_empty() {
            return Err(PersistenceError::StoreNotEmpty { entries: seen.len() });
        }

        seen.extend(
            entries
                .into_iter()
                .filter(|(_, last_seen)| !window.is_stale(*last_seen, now)),
        );
        Ok(seen.len())
    }

    /// Copy the current entries, or `None` if the store is empty.
    pub fn snapshot(&self) -> Option<SeenMap> {
        let seen = self.lock();
        if seen.is_empty() {
            None
        } else {
            Some(seen.clone())
        }
    }

    /// When `value` was last recorded.
    pub fn last_seen(&self, value: &str) -> Option<DateTime<Utc>> {
        self.lock().get(value).copied()
    }

    /// Get the number of tracked values.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The suppression window.
    pub fn window(&self) -> &Window {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;
    use chrono::TimeDelta;
    use std::time::Duration;

    fn store(window_secs: u64) -> (SeenStore, MockClock) {
        let clock = MockClock::at_epoch(1_700_000_000);
        let window = Window::new(Duration::from_secs(window_secs)).unwrap();
        (SeenStore::new(Arc::new(clock.clone()), window), clock)
    }

    #[test]
    fn test_empty_value_always_processes() {
        let (store, _clock) = store(60);
        store.record("");
        assert_eq!(store.decide(""), Decision::Process);
        assert!(store.is_empty());
    }

    #[test]
    fn test_first_sighting_processes() {
        let (store, _clock) = store(60);
        assert_eq!(store.decide("a"), Decision::Process);
        // decide alone never records
        assert_eq!(store.decide("a"), Decision::Process);
    }

    #[test]
    fn test_window_suppresses_then_expires() {
        let (store, clock) = store(5);
        store.record("x");

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.decide("x"), Decision::Skip);

        clock.advance(Duration::from_secs(4));
        assert_eq!(store.decide("x"), Decision::Skip);

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.decide("x"), Decision::Process);
    }

    #[test]
    fn test_record_slides_window() {
        let (store, clock) = store(5);
        store.record("x");
        clock.advance(Duration::from_secs(6));
        store.record("x");

        clock.advance(Duration::from_secs(3));
        assert_eq!(store.decide("x"), Decision::Skip);
        assert_eq!(
            store.last_seen("x"),
            Some(clock.now() - TimeDelta::seconds(3))
        );
    }

    #[test]
    fn test_values_are_independent() {
        let (store, _clock) = store(60);
        store.record("a");
        assert_eq!(store.decide("a"), Decision::Skip);
        assert_eq!(store.decide("b"), Decision::Process);
    }

    #[test]
    fn test_scrub_removes_only_stale_entries() {
        let (store, clock) = store(60);
        store.record("old");
        clock.advance(Duration::from_secs(600));
        store.record("recent");

        clock.advance(Duration::from_secs(61));
        assert_eq!(store.scrub(), 1);
        assert_eq!(store.last_seen("old"), None);
        assert!(store.last_seen("recent").is_some());
    }

    #[test]
    fn test_scrub_keeps_expired_but_within_grace() {
        let (store, clock) = store(60);
        store.record("a");
        clock.advance(Duration::from_secs(120));

        assert_eq!(store.decide("a"), Decision::Process);
        assert_eq!(store.scrub(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_hydrate_prunes_stale() {
        let (store, clock) = store(60);
        let now = clock.now();
        let entries = SeenMap::from([
            ("fresh".to_string(), now - TimeDelta::seconds(30)),
            ("expired".to_string(), now - TimeDelta::seconds(300)),
            ("stale".to_string(), now - TimeDelta::seconds(661)),
        ]);

        assert_eq!(store.hydrate(entries).unwrap(), 2);
        assert_eq!(store.decide("fresh"), Decision::Skip);
        assert_eq!(store.decide("expired"), Decision::Process);
        assert_eq!(store.last_seen("stale"), None);
    }

    #[test]
    fn test_hydrate_into_non_empty_store_fails() {
        let (store, _clock) = store(60);
        store.record("live");

        let result = store.hydrate(SeenMap::new());
        assert!(matches!(
            result,
            Err(PersistenceError::StoreNotEmpty { entries: 1 })
        ));
    }

    #[test]
    fn test_snapshot_of_empty_store_is_none() {
        let (store, _clock) = store(60);
        assert!(store.snapshot().is_none());

        store.record("a");
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("a"));
    }

    #[test]
    fn test_concurrent_records() {
        use std::thread;

        let (store, _clock) = store(60);
        let mut handles = vec![];

        for i in 0..10 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    store.record(&format!("value_{}_{}", i, j));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
    }
}
