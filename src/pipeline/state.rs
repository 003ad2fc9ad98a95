use std::{collections::BTreeMap, fs, path::PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read or write pipeline state: {0}")]
    Io(#[from] std::io::Error),
    #[error("pipeline state file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub digest: String,
    pub processed_at: DateTime<Utc>,
}

/// Persisted mapping from issue id to the digest of its last processed
/// content. The driver is the only component that reads or writes it, which
/// keeps change detection out of the segmenter and classifier.
pub struct StateStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, IssueRecord>>,
}

impl StateStore {
    /// Loads existing state, or starts empty when the file does not exist
    /// yet (first run).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn is_unchanged(&self, issue_id: &str, digest: &str) -> bool {
        self.entries
            .lock()
            .get(issue_id)
            .is_some_and(|record| record.digest == digest)
    }

    pub fn record(&self, issue_id: &str, digest: &str) {
        self.entries.lock().insert(
            issue_id.to_string(),
            IssueRecord {
                digest: digest.to_string(),
                processed_at: Utc::now(),
            },
        );
    }

    pub fn save(&self) -> Result<(), StateError> {
        let json = {
            let entries = self.entries.lock();
            serde_json::to_vec_pretty(&*entries)?
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_detects_unchanged_issues() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).unwrap();
        assert!(!store.is_unchanged("issue-1", "abc"));
        store.record("issue-1", "abc");
        assert!(store.is_unchanged("issue-1", "abc"));
        assert!(!store.is_unchanged("issue-1", "def"));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::open(&path).unwrap();
        store.record("issue-3", "deadbeef");
        store.save().unwrap();

        let reloaded = StateStore::open(&path).unwrap();
        assert!(reloaded.is_unchanged("issue-3", "deadbeef"));
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"[oops").unwrap();
        assert!(matches!(StateStore::open(&path), Err(StateError::Corrupt(_))));
    }
}
