//! Record: one document's identity, locations, and lifecycle status.

use crate::types::DocUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle status of a record.
///
/// `Discovered -> Establishing -> Ready` on success,
/// `Establishing -> Recovering -> Establishing` on a transient storage error,
/// `-> Failed` when the error is unrecoverable or recovery itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    Discovered,
    Establishing,
    Ready,
    Recovering,
    Failed,
}

impl RecordStatus {
    /// Short label for list views.
    pub fn label(&self) -> &'static str {
        match self {
            RecordStatus::Discovered => "discovered",
            RecordStatus::Establishing => "opening",
            RecordStatus::Ready => "ready",
            RecordStatus::Recovering => "recovering",
            RecordStatus::Failed => "failed",
        }
    }

    /// Whether an establishment or recovery attempt owns the record.
    pub fn is_busy(&self) -> bool {
        matches!(self, RecordStatus::Establishing | RecordStatus::Recovering)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Options handed to the document store provider when opening a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Name the synchronized store shares across devices (the uuid)
    pub content_name: String,
    /// Transaction log directory inside the remote container
    pub log_files_dir: Option<PathBuf>,
    pub migrate_automatically: bool,
    pub infer_mapping: bool,
}

/// One document record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub uuid: DocUuid,
    pub file_name: String,
    pub local_url: PathBuf,
    pub remote_url: Option<PathBuf>,
    pub store_options: StoreOptions,
    pub created_locally: bool,
    pub status: RecordStatus,
    /// Timestamp of the observation whose file name won
    pub last_updated: DateTime<Utc>,
    /// Timestamp of the observation whose remote url won
    pub(crate) remote_updated: Option<DateTime<Utc>>,
}

impl Record {
    /// Where the document is worked on: remote when materialized there and the
    /// remote tier is enabled, local otherwise.
    pub fn target_url(&self, remote_enabled: bool) -> &Path {
        match (&self.remote_url, remote_enabled) {
            (Some(remote), true) => remote,
            _ => &self.local_url,
        }
    }

    /// Locations to try when opening, most preferred first.
    pub fn candidate_urls(&self, remote_enabled: bool) -> Vec<&Path> {
        let target = self.target_url(remote_enabled);
        let mut urls = vec![target];
        if target != self.local_url.as_path() {
            urls.push(&self.local_url);
        }
        urls
    }

    pub fn is_viewable(&self) -> bool {
        self.status == RecordStatus::Ready
    }
}
