//! StorageConfig and path resolution for local and remote document storage.

use crate::config::xdg;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding local documents; None means the XDG default
    #[serde(default)]
    pub local_docs_dir: Option<PathBuf>,

    /// Root of the synchronized remote container; None disables the remote tier
    #[serde(default)]
    pub remote_container_dir: Option<PathBuf>,

    /// Record snapshot file; None means the XDG default
    #[serde(default)]
    pub records_file: Option<PathBuf>,
}

/// Storage locations after defaults have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStorage {
    pub local_docs_dir: PathBuf,
    pub remote_container_dir: Option<PathBuf>,
    pub records_file: PathBuf,
}

impl StorageConfig {
    /// Resolve storage paths to actual filesystem locations.
    pub fn resolve_paths(&self) -> Result<ResolvedStorage, CoreError> {
        let local_docs_dir = match &self.local_docs_dir {
            Some(dir) => dir.clone(),
            None => xdg::default_local_docs_dir()?,
        };
        let records_file = match &self.records_file {
            Some(file) => file.clone(),
            None => xdg::default_records_file()?,
        };
        Ok(ResolvedStorage {
            local_docs_dir,
            remote_container_dir: self.remote_container_dir.clone(),
            records_file,
        })
    }
}
