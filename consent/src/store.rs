//! Durable snapshot storage.
//!
//! The stored snapshot is the tuple (raw payload JSON, consent string,
//! metadata entries). It is only ever replaced whole: the engine persists a
//! snapshot after a payload parsed successfully, never partially.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use cmpflow_types::FlexibleValue;

use crate::model::MetadataEntry;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io failure: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode consent snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The last successfully acquired consent, as persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    /// Raw payload JSON as received from the service.
    pub raw_json: String,
    /// Base64 consent string (`cmpString`).
    pub consent_string: String,
    /// Metadata entries for individual key lookups.
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

impl StoredSnapshot {
    #[must_use]
    pub fn new(
        raw_json: impl Into<String>,
        consent_string: impl Into<String>,
        metadata: Vec<MetadataEntry>,
    ) -> Self {
        Self {
            raw_json: raw_json.into(),
            consent_string: consent_string.into(),
            metadata,
        }
    }
}

/// Durable key/value contract for the consent snapshot.
///
/// Writes must survive a process restart (flush-on-write); loads must not
/// fail when no snapshot exists yet.
pub trait ConsentStorage: Send + Sync {
    /// Atomically replace the stored snapshot.
    fn save(&self, snapshot: &StoredSnapshot) -> Result<(), StorageError>;

    /// The last stored snapshot, or `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<StoredSnapshot>, StorageError>;

    /// Remove all consent data.
    fn reset(&self) -> Result<(), StorageError>;

    /// Look up one metadata value by entry name.
    fn metadata_value(&self, key: &str) -> Result<Option<FlexibleValue>, StorageError> {
        Ok(self.load()?.and_then(|snapshot| {
            snapshot
                .metadata
                .into_iter()
                .find(|entry| entry.name.as_deref() == Some(key))
                .and_then(|entry| entry.value)
        }))
    }
}

/// In-memory store for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<StoredSnapshot>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<StoredSnapshot>> {
        self.snapshot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ConsentStorage for MemoryStore {
    fn save(&self, snapshot: &StoredSnapshot) -> Result<(), StorageError> {
        *self.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<StoredSnapshot>, StorageError> {
        Ok(self.lock().clone())
    }

    fn reset(&self) -> Result<(), StorageError> {
        *self.lock() = None;
        Ok(())
    }
}

/// File-backed store: one JSON document, replaced via temp file + rename and
/// fsynced before the rename so the snapshot survives restarts.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_durable(&self, bytes: &[u8]) -> Result<(), StorageError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(parent)?;
        io::Write::write_all(&mut tmp, bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }
}

impl ConsentStorage for FileStore {
    fn save(&self, snapshot: &StoredSnapshot) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.write_durable(&bytes)?;
        tracing::debug!(path = %self.path.display(), "persisted consent snapshot");
        Ok(())
    }

    fn load(&self) -> Result<Option<StoredSnapshot>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(error) => {
                // A corrupt snapshot must not take offline reads down with it.
                tracing::warn!(
                    path = %self.path.display(),
                    %error,
                    "stored consent snapshot is corrupt, treating as absent"
                );
                Ok(None)
            }
        }
    }

    fn reset(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
