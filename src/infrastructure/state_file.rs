//! JSON state file adapter.
//!
//! One file per topic at `{state_dir}/{topic}.json`, holding an object of
//! dedup value to RFC 3339 timestamp:
//!
//! ```json
//! {"node1.example.net":"2024-05-01T10:15:30.123456789Z"}
//! ```
//!
//! Snapshots are written to a temporary file in the same directory, synced,
//! and renamed over the final path, so the file at that path is always either
//! the previous complete snapshot or the new one.

use crate::application::persistence::PersistenceError;
use crate::application::ports::StateRepository;
use crate::domain::SeenMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// State repository backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonStateFile {
    dir: PathBuf,
    path: PathBuf,
    temp_prefix: String,
}

impl JsonStateFile {
    /// State file for `topic` inside `dir`.
    pub fn new(dir: impl Into<PathBuf>, topic: &str) -> Self {
        let dir = dir.into();
        let path = dir.join(format!("{}.json", topic));
        Self {
            dir,
            path,
            temp_prefix: format!(".{}.", topic),
        }
    }

    /// Final path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `entries` to a synced temporary file without publishing it.
    ///
    /// Dropping the returned snapshot discards it and leaves the state file
    /// untouched.
    ///
    /// # Errors
    /// `Encode` if serialisation fails, `Write` if the directory or temporary
    /// file cannot be created, written or synced.
    pub fn stage(&self, entries: &SeenMap) -> Result<StagedSnapshot, PersistenceError> {
        let content = serde_json::to_vec(entries).map_err(PersistenceError::Encode)?;

        let write_err = |source: io::Error| PersistenceError::Write {
            dir: self.dir.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;
        let mut file = tempfile::Builder::new()
            .prefix(&self.temp_prefix)
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(write_err)?;
        file.write_all(&content).map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;

        Ok(StagedSnapshot {
            file,
            target: self.path.clone(),
            bytes: content.len(),
        })
    }
}

impl StateRepository for JsonStateFile {
    fn load(&self) -> Result<Option<(SeenMap, usize)>, PersistenceError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let entries = serde_json::from_slice(&data).map_err(|source| PersistenceError::Decode {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some((entries, data.len())))
    }

    fn save(&self, entries: &SeenMap) -> Result<usize, PersistenceError> {
        self.stage(entries)?.commit()
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// A fully written snapshot waiting to be renamed into place.
#[derive(Debug)]
pub struct StagedSnapshot {
    file: NamedTempFile,
    target: PathBuf,
    bytes: usize,
}

impl StagedSnapshot {
    /// Path of the temporary file.
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Atomically replace the state file with this snapshot.
    ///
    /// # Errors
    /// `Rename` if the rename fails; the temporary file is removed and the
    /// previous state file is left as it was.
    pub fn commit(self) -> Result<usize, PersistenceError> {
        self.file
            .persist(&self.target)
            .map_err(|e| PersistenceError::Rename {
                path: self.target.clone(),
                source: e.error,
            })?;

        sync_parent(&self.target);
        Ok(self.bytes)
    }
}

// Makes the rename itself durable. Failure only weakens crash durability, the
// file contents are already complete.
#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(dir) = path.parent() {
        if let Err(error) = fs::File::open(dir).and_then(|d| d.sync_all()) {
            tracing::debug!(dir = %dir.display(), %error, "could not sync state directory");
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use tempfile::TempDir;

    fn entries(n: usize) -> SeenMap {
        let base = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        (0..n)
            .map(|i| (format!("value-{}", i), base + TimeDelta::seconds(i as i64)))
            .collect()
    }

    fn temp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[test]
    fn test_path_is_topic_json() {
        let state = JsonStateFile::new("/var/lib/limiter", "events");
        assert_eq!(state.path(), Path::new("/var/lib/limiter/events.json"));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let state = JsonStateFile::new(dir.path(), "events");
        assert!(state.load().unwrap().is_none());
    }

    #[test]
    fn test_round_trip_preserves_sub_second_precision() {
        let dir = TempDir::new().unwrap();
        let state = JsonStateFile::new(dir.path(), "events");
        let written = entries(3);

        let bytes = state.save(&written).unwrap();
        let (read, read_bytes) = state.load().unwrap().unwrap();

        assert_eq!(read, written);
        assert_eq!(read_bytes, bytes);
        assert!(temp_files(dir.path()).is_empty());
    }

    #[test]
    fn test_reads_offset_timestamps() {
        let dir = TempDir::new().unwrap();
        let state = JsonStateFile::new(dir.path(), "events");
        fs::write(
            state.path(),
            r#"{"node1":"2024-01-02T03:04:05.5+02:00","node2":"2024-01-02T01:04:05Z"}"#,
        )
        .unwrap();

        let (read, _) = state.load().unwrap().unwrap();
        let expected: DateTime<Utc> = "2024-01-02T01:04:05.5Z".parse().unwrap();
        assert_eq!(read["node1"], expected);
        assert_eq!(read["node2"], expected - TimeDelta::milliseconds(500));
    }

    #[test]
    fn test_corrupt_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let state = JsonStateFile::new(dir.path(), "events");
        fs::write(state.path(), b"{\"truncated\": \"2024-").unwrap();

        assert!(matches!(
            state.load(),
            Err(PersistenceError::Decode { .. })
        ));
    }

    #[test]
    fn test_unreadable_path_is_read_error() {
        let dir = TempDir::new().unwrap();
        let state = JsonStateFile::new(dir.path(), "events");
        fs::create_dir(state.path()).unwrap();

        assert!(matches!(state.load(), Err(PersistenceError::Read { .. })));
    }

    #[test]
    fn test_interrupted_write_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let state = JsonStateFile::new(dir.path(), "events");
        state.save(&entries(2)).unwrap();
        let before = fs::read(state.path()).unwrap();

        let staged = state.stage(&entries(50)).unwrap();
        assert!(staged.temp_path().starts_with(dir.path()));
        assert_eq!(fs::read(state.path()).unwrap(), before);

        // Simulate a crash between write and rename.
        drop(staged);

        assert_eq!(fs::read(state.path()).unwrap(), before);
        assert!(temp_files(dir.path()).is_empty());
        assert_eq!(state.load().unwrap().unwrap().0, entries(2));
    }

    #[test]
    fn test_commit_replaces_snapshot() {
        let dir = TempDir::new().unwrap();
        let state = JsonStateFile::new(dir.path(), "events");
        state.save(&entries(2)).unwrap();

        state.stage(&entries(5)).unwrap().commit().unwrap();
        assert_eq!(state.load().unwrap().unwrap().0.len(), 5);
    }

    #[test]
    fn test_creates_missing_state_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("state").join("limiter");
        let state = JsonStateFile::new(&nested, "events");

        state.save(&entries(1)).unwrap();
        assert!(nested.join("events.json").exists());
    }
}
