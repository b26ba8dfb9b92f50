//! # Transcript Persistence
//!
//! Durable sink for finished session transcripts: one JSON file per session
//! under the configured directory, keyed by a UTC timestamp. Sessions write to
//! distinct keys, so concurrent saves from different connections need no
//! coordination.
//!
//! A failed save is reported to the caller and logged, but never raised;
//! persistence problems must not keep a session from closing cleanly.

use chrono::Utc;
use serde_json::json;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A transcript could not be written to disk.
#[derive(Debug)]
pub struct StorageError {
    pub message: String,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage error: {}", self.message)
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Writes finished transcripts as timestamp-keyed JSON documents.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::info!(dir = %dir.display(), "transcript store ready");
        Ok(Self { dir })
    }

    /// Persist one finished transcript.
    ///
    /// The key is derived from the current UTC time
    /// (`speech_recognition_YYYYMMDD_HHMMSS.json`); the document carries the
    /// ISO-8601 timestamp and the joined transcript text. Returns the file
    /// name of the saved transcript.
    pub fn save(&self, text: &str) -> Result<String, StorageError> {
        let now = Utc::now();
        let filename = format!("speech_recognition_{}.json", now.format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(&filename);

        let document = json!({
            "timestamp": now.to_rfc3339(),
            "text": text,
        });

        let body = serde_json::to_string_pretty(&document).map_err(|e| StorageError {
            message: e.to_string(),
        })?;
        fs::write(&path, body)?;

        tracing::info!(path = %path.display(), "transcript saved");
        Ok(filename)
    }

    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
