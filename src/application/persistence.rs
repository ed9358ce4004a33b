//! Loading and snapshotting the seen store.
//!
//! The manager is the only component that talks to a [`StateRepository`]. It
//! copies the map under the store lock and performs all I/O after releasing
//! it, so foreground decisions never wait on the disk.

use crate::application::ports::StateRepository;
use crate::application::seen_store::SeenStore;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Errors from reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The store already holds entries and cannot be loaded into
    #[error("last seen cache is not empty ({entries} entries)")]
    StoreNotEmpty {
        /// Entries present at load time
        entries: usize,
    },
    /// Reading the state file failed
    #[error("could not read state file {path}: {source}")]
    Read {
        /// File being read
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// The state file is not a valid snapshot
    #[error("could not decode state file {path}: {source}")]
    Decode {
        /// File being decoded
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },
    /// Serialising the map failed
    #[error("could not encode last seen data: {0}")]
    Encode(#[source] serde_json::Error),
    /// Creating, writing or syncing the temporary file failed
    #[error("could not write temp file in {dir}: {source}")]
    Write {
        /// Directory holding the temp file
        dir: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// Renaming the temporary file over the state file failed
    #[error("could not rename temp file to {path}: {source}")]
    Rename {
        /// Final state file path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
}

/// Result of a startup load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No state directory configured
    Disabled,
    /// No snapshot on disk yet
    Missing,
    /// Snapshot read and pruned
    Loaded {
        /// Bytes read from disk
        bytes: usize,
        /// Entries kept after pruning
        kept: usize,
    },
}

/// Result of a single snapshot cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Persistence disabled
    Disabled,
    /// Store was empty, nothing written
    Skipped,
    /// Snapshot written and renamed into place
    Written {
        /// Entries in the snapshot
        entries: usize,
        /// Bytes written
        bytes: usize,
    },
}

/// Moves the seen store to and from durable storage.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    store: SeenStore,
    repository: Option<Arc<dyn StateRepository>>,
}

impl PersistenceManager {
    /// Create a manager. `None` disables persistence.
    pub fn new(store: SeenStore, repository: Option<Arc<dyn StateRepository>>) -> Self {
        Self { store, repository }
    }

    /// True if a repository is configured.
    pub fn is_enabled(&self) -> bool {
        self.repository.is_some()
    }

    /// The repository, if persistence is enabled.
    pub fn repository(&self) -> Option<&Arc<dyn StateRepository>> {
        self.repository.as_ref()
    }

    /// Hydrate the store from the last snapshot.
    ///
    /// # Errors
    /// `StoreNotEmpty` if the store already has entries; `Read` or `Decode` if
    /// the snapshot exists but cannot be used. A missing snapshot is not an
    /// error.
    pub fn load(&self) -> Result<LoadOutcome, PersistenceError> {
        let Some(repository) = &self.repository else {
            warn!("no state directory configured, last seen cache is not saved");
            return Ok(LoadOutcome::Disabled);
        };

        if !self.store.is_empty() {
            return Err(PersistenceError::StoreNotEmpty {
                entries: self.store.len(),
            });
        }

        let Some((entries, bytes)) = repository.load()? else {
            debug!(path = %repository.location().display(), "no last seen cache on disk");
            return Ok(LoadOutcome::Missing);
        };

        let kept = self.store.hydrate(entries)?;
        info!(
            path = %repository.location().display(),
            bytes,
            entries = kept,
            "read last seen data from cache file"
        );

        Ok(LoadOutcome::Loaded { bytes, kept })
    }

    /// Write the current store contents, skipping an empty store.
    ///
    /// # Errors
    /// Any encode, write or rename failure. The previous snapshot stays intact
    /// and the store is unaffected.
    pub fn snapshot(&self) -> Result<SnapshotOutcome, PersistenceError> {
        let Some(repository) = &self.repository else {
            return Ok(SnapshotOutcome::Disabled);
        };

        let Some(entries) = self.store.snapshot() else {
            return Ok(SnapshotOutcome::Skipped);
        };

        let bytes = repository.save(&entries)?;
        debug!(
            path = %repository.location().display(),
            entries = entries.len(),
            bytes,
            "wrote last seen cache"
        );

        Ok(SnapshotOutcome::Written {
            entries: entries.len(),
            bytes,
        })
    }
}
