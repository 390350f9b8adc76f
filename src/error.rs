//! Error types for the document registry.
//!
//! `CoreError` is what callers of the registry see. `StorageError` is what a
//! document store provider reports; it is wrapped into `CoreError` on the way
//! out, either synchronously (validation) or through a continuation (storage).

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a document store provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Store at {path} was written by model version {found}, this build supports up to {supported}")]
    Incompatible {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("Store at {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Document handle is closed: {0}")]
    Closed(PathBuf),

    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether closing and reopening the document could plausibly clear the error.
    ///
    /// An incompatible store stays incompatible no matter how many times it is
    /// reopened, so it goes straight to `Failed`.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StorageError::Incompatible { .. })
    }
}

/// Errors surfaced by the registry core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid document identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Document {0} is already being established")]
    AlreadyEstablishing(String),

    #[error("Failed to open store for {uuid}: {source}")]
    StoreOpenFailed {
        uuid: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to save store for {uuid}: {source}")]
    StoreSaveFailed {
        uuid: String,
        #[source]
        source: StorageError,
    },

    #[error("Recovery failed for {uuid}: {source}")]
    RecoveryFailed {
        uuid: String,
        #[source]
        source: StorageError,
    },

    #[error("Conflicting discovery for {uuid}: kept {kept:?}, dropped {dropped:?}")]
    DiscoveryConflict {
        uuid: String,
        kept: String,
        dropped: String,
    },

    #[error("No record for {0}")]
    RecordNotFound(String),

    #[error("Remote search error: {0}")]
    RemoteSearch(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CoreError {
    /// The storage error carried by this error, if any.
    pub fn storage_source(&self) -> Option<&StorageError> {
        match self {
            CoreError::StoreOpenFailed { source, .. }
            | CoreError::StoreSaveFailed { source, .. }
            | CoreError::RecoveryFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
