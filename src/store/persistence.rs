//! Record snapshot persistence.
//!
//! One entry per uuid in the logical shape
//! `{uuid, file_name, local_url, remote_url, store_options, created_locally, status}`,
//! written as JSON with a write-then-rename so a crash never leaves half a file.

use super::{Record, RecordStatus, RecordStore, StoreOptions};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub uuid: String,
    pub file_name: String,
    pub local_url: PathBuf,
    pub remote_url: Option<PathBuf>,
    pub store_options: StoreOptions,
    pub created_locally: bool,
    pub status: RecordStatus,
}

impl From<&Record> for PersistedRecord {
    fn from(record: &Record) -> Self {
        Self {
            uuid: record.uuid.clone(),
            file_name: record.file_name.clone(),
            local_url: record.local_url.clone(),
            remote_url: record.remote_url.clone(),
            store_options: record.store_options.clone(),
            created_locally: record.created_locally,
            status: record.status,
        }
    }
}

impl PersistedRecord {
    /// Timestamps are not persisted; a restored record loses every
    /// last-write-wins comparison against a fresh observation.
    pub fn into_record(self) -> Record {
        let status = match self.status {
            RecordStatus::Failed => RecordStatus::Failed,
            _ => RecordStatus::Discovered,
        };
        Record {
            uuid: self.uuid,
            file_name: self.file_name,
            local_url: self.local_url,
            remote_updated: self.remote_url.as_ref().map(|_| DateTime::<Utc>::MIN_UTC),
            remote_url: self.remote_url,
            store_options: self.store_options,
            created_locally: self.created_locally,
            status,
            last_updated: DateTime::<Utc>::MIN_UTC,
        }
    }
}

/// Write the store's records to `path`.
pub fn save_snapshot(store: &RecordStore, path: &Path) -> Result<(), CoreError> {
    let records = store.to_persisted();
    let json = serde_json::to_vec_pretty(&records)
        .map_err(|e| CoreError::Persistence(format!("Failed to encode records: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            CoreError::Persistence(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, json).map_err(|e| {
        CoreError::Persistence(format!("Failed to write {}: {}", temp.display(), e))
    })?;
    std::fs::rename(&temp, path).map_err(|e| {
        CoreError::Persistence(format!("Failed to replace {}: {}", path.display(), e))
    })?;

    tracing::debug!(path = %path.display(), count = records.len(), "Saved record snapshot");
    Ok(())
}

/// Read a snapshot. A missing file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> Result<Vec<PersistedRecord>, CoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CoreError::Persistence(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    serde_json::from_slice(&bytes).map_err(|e| {
        CoreError::Persistence(format!("Failed to decode {}: {}", path.display(), e))
    })
}
