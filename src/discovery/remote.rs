//! Long-lived remote metadata search.

use super::pipeline::DiscoveryPipeline;
use crate::error::CoreError;
use crate::types::DocUuid;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One metadata result reported by the remote search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
    pub uuid: DocUuid,
    pub remote_url: PathBuf,
    /// Display name, when the search reports one separately from the url
    pub file_name: Option<String>,
    pub updated: DateTime<Utc>,
}

/// Results arrive as one initial batch followed by any number of updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteBatch {
    Initial(Vec<MetadataItem>),
    Update(Vec<MetadataItem>),
}

impl RemoteBatch {
    pub fn items(&self) -> &[MetadataItem] {
        match self {
            RemoteBatch::Initial(items) | RemoteBatch::Update(items) => items,
        }
    }

    pub fn is_initial(&self) -> bool {
        matches!(self, RemoteBatch::Initial(_))
    }
}

/// An external search that can be started and stopped explicitly.
pub trait RemoteSearchSource: Send + Sync {
    /// Begin searching. Batches are delivered on the returned channel until
    /// `stop` is called or the source gives up.
    fn start(&self) -> Result<mpsc::UnboundedReceiver<RemoteBatch>, CoreError>;

    fn stop(&self);
}

struct ActiveQuery {
    source: Arc<dyn RemoteSearchSource>,
    pump: JoinHandle<()>,
}

/// Owns at most one running remote search and feeds its batches into the
/// discovery pipeline.
#[derive(Default)]
pub struct RemoteQuery {
    active: Mutex<Option<ActiveQuery>>,
}

impl RemoteQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `source` and pump its batches on `runtime`.
    ///
    /// Returns false when a search is already running. A search whose source
    /// has closed its channel no longer counts as running.
    pub fn launch(
        &self,
        source: Arc<dyn RemoteSearchSource>,
        pipeline: DiscoveryPipeline,
        runtime: &Handle,
    ) -> Result<bool, CoreError> {
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(query) if !query.pump.is_finished() => {
                debug!("Remote search already running");
                return Ok(false);
            }
            Some(_) => {
                if let Some(finished) = active.take() {
                    finished.source.stop();
                    debug!("Replacing finished remote search");
                }
            }
            None => {}
        }

        let mut batches = source.start()?;
        let pump = runtime.spawn(async move {
            while let Some(batch) = batches.recv().await {
                pipeline.enroll_from_remote_batch(&batch);
            }
            debug!("Remote search channel closed");
        });

        info!("Launched remote search");
        *active = Some(ActiveQuery { source, pump });
        Ok(true)
    }

    /// Stop the running search. Records it already discovered stay enrolled.
    pub fn ignore(&self) -> bool {
        let Some(query) = self.active.lock().take() else {
            return false;
        };
        query.source.stop();
        query.pump.abort();
        info!("Stopped remote search");
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|query| !query.pump.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RemoteQuery {
    fn drop(&mut self) {
        self.ignore();
    }
}
