//! FILENAME: app/src/snapshot.rs
//! Snapshot loading.
//!
//! The analytics engine never fetches records itself; a [`RecordSource`]
//! hands it one complete, immutable snapshot. The JSON source accepts a
//! bare array of records or an object with a `records` array. Entries that
//! cannot be read as a record at all (not an object, no identifier) are
//! skipped and counted, never fatal. A malformed field inside a readable
//! entry only blanks that field.

use std::path::{Path, PathBuf};

use herd_model::Record;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::log_warn;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read snapshot {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of one load.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub records: Vec<Record>,
    /// Entries dropped because they could not be read as records.
    pub skipped: usize,
}

/// Anything able to produce a full record snapshot.
pub trait RecordSource {
    fn load(&self) -> Result<LoadedSnapshot, SnapshotError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    List(Vec<Value>),
    Wrapped { records: Vec<Value> },
}

/// Parses a snapshot document, skipping unreadable entries.
pub fn parse_snapshot(text: &str) -> Result<LoadedSnapshot, SnapshotError> {
    let entries = match serde_json::from_str::<SnapshotDocument>(text)? {
        SnapshotDocument::List(entries) => entries,
        SnapshotDocument::Wrapped { records } => records,
    };

    let mut records = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for (i, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Record>(entry) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                log_warn!("SNAPSHOT", "skipping entry {}: {}", i, e);
            }
        }
    }

    Ok(LoadedSnapshot { records, skipped })
}

/// Snapshot stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileSource {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for JsonFileSource {
    fn load(&self) -> Result<LoadedSnapshot, SnapshotError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| SnapshotError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_snapshot(&text)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
