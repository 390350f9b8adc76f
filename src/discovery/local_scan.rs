//! One-shot scan of the local documents directory.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One document found on local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub file_name: String,
    pub uuid: String,
    pub modified: DateTime<Utc>,
}

/// Produces the finite list of local documents for one discovery cycle.
pub trait LocalScanSource: Send + Sync {
    fn scan(&self) -> Result<Vec<LocalEntry>, CoreError>;
}

/// Scans a directory whose children are named `<file_name>_<uuid>`.
///
/// Names are split but not validated here; the pipeline rejects bad uuids.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    root: PathBuf,
}

impl DirectoryScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl LocalScanSource for DirectoryScanner {
    fn scan(&self) -> Result<Vec<LocalEntry>, CoreError> {
        if !self.root.exists() {
            debug!(root = %self.root.display(), "Local documents directory missing, nothing to scan");
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "Failed to read local entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                warn!(path = ?entry.path(), "Skipping non UTF-8 document name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Some((file_name, uuid)) = name.rsplit_once('_') else {
                debug!(name = %name, "Skipping directory without uuid suffix");
                continue;
            };
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(Utc::now);

            entries.push(LocalEntry {
                file_name: file_name.to_string(),
                uuid: uuid.to_string(),
                modified,
            });
        }

        debug!(root = %self.root.display(), count = entries.len(), "Local scan finished");
        Ok(entries)
    }
}
