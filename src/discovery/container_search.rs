//! Remote search over a mounted container directory.
//!
//! Lists `<container>/Documents` once for the initial batch, then re-lists it
//! on a fixed interval and reports new or modified documents as updates.

use super::remote::{MetadataItem, RemoteBatch, RemoteSearchSource};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use walkdir::WalkDir;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct ContainerSearch {
    documents_dir: PathBuf,
    interval: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl ContainerSearch {
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self::with_interval(documents_dir, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(documents_dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            interval,
            poller: Mutex::new(None),
        }
    }
}

impl RemoteSearchSource for ContainerSearch {
    fn start(&self) -> Result<mpsc::UnboundedReceiver<RemoteBatch>, CoreError> {
        let runtime = Handle::try_current()
            .map_err(|e| CoreError::RemoteSearch(format!("No async runtime: {}", e)))?;

        let mut poller = self.poller.lock();
        if let Some(previous) = poller.take() {
            previous.abort();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let dir = self.documents_dir.clone();
        let interval = self.interval;
        *poller = Some(runtime.spawn(async move {
            let mut seen = list_documents(&dir);
            let initial = seen.values().cloned().collect();
            if tx.send(RemoteBatch::Initial(initial)).is_err() {
                return;
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let current = list_documents(&dir);
                let changed: Vec<MetadataItem> = current
                    .iter()
                    .filter(|(name, item)| {
                        seen.get(*name).map(|old| old.updated) != Some(item.updated)
                    })
                    .map(|(_, item)| item.clone())
                    .collect();
                seen = current;
                if changed.is_empty() {
                    continue;
                }
                debug!(dir = %dir.display(), count = changed.len(), "Container changed");
                if tx.send(RemoteBatch::Update(changed)).is_err() {
                    break;
                }
            }
        }));
        Ok(rx)
    }

    fn stop(&self) {
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }
    }
}

impl Drop for ContainerSearch {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Documents currently in `dir`, keyed by directory name, in name order.
fn list_documents(dir: &Path) -> BTreeMap<String, MetadataItem> {
    let mut found = BTreeMap::new();
    if !dir.exists() {
        return found;
    }
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to list container entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let Some((_, uuid)) = name.rsplit_once('_') else {
            continue;
        };
        let updated = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);
        found.insert(
            name.to_string(),
            MetadataItem {
                uuid: uuid.to_string(),
                remote_url: entry.path().to_path_buf(),
                file_name: None,
                updated,
            },
        );
    }
    found
}
