//! In-memory state repository for testing.

use crate::application::persistence::PersistenceError;
use crate::application::ports::StateRepository;
use crate::domain::SeenMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// State repository that keeps the snapshot in memory.
///
/// Failures can be injected to exercise the retry paths. Clones share state.
#[derive(Debug, Clone)]
pub struct MockStateRepository {
    inner: Arc<Mutex<Inner>>,
    location: PathBuf,
}

#[derive(Debug, Default)]
struct Inner {
    stored: Option<SeenMap>,
    fail_loads: bool,
    fail_saves: bool,
    load_calls: usize,
    save_calls: usize,
}

impl MockStateRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            location: PathBuf::from("memory://state.json"),
        }
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .expect("MockStateRepository mutex poisoned - a test thread panicked while holding the lock")
    }

    /// Replace the stored snapshot.
    pub fn put(&self, entries: SeenMap) {
        self.inner().stored = Some(entries);
    }

    /// The stored snapshot, if any.
    pub fn stored(&self) -> Option<SeenMap> {
        self.inner().stored.clone()
    }

    /// Make subsequent loads fail with a decode error.
    pub fn fail_loads(&self, fail: bool) {
        self.inner().fail_loads = fail;
    }

    /// Make subsequent saves fail with a rename error.
    pub fn fail_saves(&self, fail: bool) {
        self.inner().fail_saves = fail;
    }

    /// Number of `load` calls so far.
    pub fn load_calls(&self) -> usize {
        self.inner().load_calls
    }

    /// Number of `save` calls so far.
    pub fn save_calls(&self) -> usize {
        self.inner().save_calls
    }
}

impl Default for MockStateRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl StateRepository for MockStateRepository {
    fn load(&self) -> Result<Option<(SeenMap, usize)>, PersistenceError> {
        let mut inner = self.inner();
        inner.load_calls += 1;

        if inner.fail_loads {
            let source = serde_json::from_str::<SeenMap>("{").unwrap_err();
            return Err(PersistenceError::Decode {
                path: self.location.clone(),
                source,
            });
        }

        Ok(inner.stored.clone().map(|entries| {
            let bytes = serde_json::to_vec(&entries).map(|v| v.len()).unwrap_or(0);
            (entries, bytes)
        }))
    }

    fn save(&self, entries: &SeenMap) -> Result<usize, PersistenceError> {
        let mut inner = self.inner();
        inner.save_calls += 1;

        if inner.fail_saves {
            return Err(PersistenceError::Rename {
                path: self.location.clone(),
                source: io::Error::other("injected failure"),
            });
        }

        let bytes = serde_json::to_vec(entries)
            .map_err(PersistenceError::Encode)?
            .len();
        inner.stored = Some(entries.clone());
        Ok(bytes)
    }

    fn location(&self) -> &Path {
        &self.location
    }
}
