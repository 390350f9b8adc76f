//! Documents controller: the explicit context that owns one registry.
//!
//! Wires the record store, discovery, establishment, recovery and the refresh
//! debouncer together. Every event the registry publishes resets the
//! debouncer, so a burst of changes turns into a single refresh signal.

use crate::config::{xdg, MultidocConfig};
use crate::discovery::{
    DiscoveryPipeline, EnrollReport, LocalScanSource, MergeOutcome, Observation,
    ObservationSource, RemoteQuery, RemoteSearchSource,
};
use crate::docstore::{DocumentProvider, ObjectGraphInitializer};
use crate::error::{CoreError, StorageError};
use crate::establish::{close_quietly, Continuation, Establisher};
use crate::events::{CoreEvent, DocumentChange, EventBus};
use crate::paths::{PathResolver, UuidGrammar};
use crate::recovery::ErrorRecovery;
use crate::refresh::{RefreshDebouncer, RefreshSignal};
use crate::store::persistence::{load_snapshot, save_snapshot};
use crate::store::{Record, RecordStatus, RecordStore, SharedRecordStore};
use crate::types::{DocUuid, HandleId};
use chrono::Utc;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct DocumentsController {
    store: SharedRecordStore,
    resolver: Arc<PathResolver>,
    events: EventBus,
    pipeline: DiscoveryPipeline,
    establisher: Establisher,
    recovery: ErrorRecovery,
    remote: RemoteQuery,
    refresh_signals: Mutex<Option<mpsc::UnboundedReceiver<RefreshSignal>>>,
    forwarder: JoinHandle<()>,
    records_file: PathBuf,
    remote_search_enabled: bool,
    runtime: Handle,
}

impl DocumentsController {
    /// Build a controller on the current tokio runtime.
    pub fn new(
        config: &MultidocConfig,
        provider: Arc<dyn DocumentProvider>,
        initializer: Arc<dyn ObjectGraphInitializer>,
    ) -> Result<Self, CoreError> {
        let runtime = Handle::try_current().map_err(|e| {
            CoreError::ConfigError(format!("Documents controller needs a tokio runtime: {}", e))
        })?;
        config
            .validate()
            .map_err(|e| CoreError::ConfigError(e.to_string()))?;

        let storage = config.storage.resolve_paths()?;
        let grammar = UuidGrammar::new(&config.discovery.uuid_grammar)?;
        let resolver = Arc::new(PathResolver::from_storage(&storage, grammar));
        let store = RecordStore::new().shared();
        let events = EventBus::new();

        let pipeline = DiscoveryPipeline::new(store.clone(), resolver.clone(), events.clone());
        let establisher = Establisher::new(
            store.clone(),
            resolver.clone(),
            provider,
            initializer,
            events.clone(),
            runtime.clone(),
        );
        let recovery = ErrorRecovery::new(establisher.clone());

        let (debouncer, signals) =
            RefreshDebouncer::spawn(config.discovery.refresh_debounce_delay(), &runtime);
        let mut subscription = events.subscribe();
        let forwarder = runtime.spawn(async move {
            while let Some(event) = subscription.recv().await {
                debug!(event = ?event, "Scheduling refresh");
                debouncer.reset();
            }
        });

        info!(
            local_docs_dir = %resolver.local_docs_dir().display(),
            remote_enabled = resolver.is_remote_enabled(),
            records_file = %storage.records_file.display(),
            "Documents controller ready"
        );

        Ok(Self {
            store,
            resolver,
            events,
            pipeline,
            establisher,
            recovery,
            remote: RemoteQuery::new(),
            refresh_signals: Mutex::new(Some(signals)),
            forwarder,
            records_file: storage.records_file,
            remote_search_enabled: config.discovery.remote_search_enabled,
            runtime,
        })
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn records_file(&self) -> &Path {
        &self.records_file
    }

    /// Records in discovery order, copied out of the lock.
    pub fn snapshot(&self) -> Vec<Record> {
        self.store.lock().snapshot()
    }

    pub fn record(&self, uuid: &str) -> Option<Record> {
        self.store.lock().get(uuid).cloned()
    }

    pub fn record_for_handle(&self, handle: HandleId) -> Option<Record> {
        self.store.lock().record_for_handle(handle).cloned()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CoreEvent> {
        self.events.subscribe()
    }

    /// The refresh signal stream. There is one, so only the first call gets it.
    pub fn take_refresh_signals(&self) -> Option<mpsc::UnboundedReceiver<RefreshSignal>> {
        self.refresh_signals.lock().take()
    }

    pub fn enroll(&self, observation: &Observation) -> Result<MergeOutcome, CoreError> {
        self.pipeline.enroll(observation)
    }

    /// Run one local scan and enroll what it found.
    pub fn discover_local(&self, source: &dyn LocalScanSource) -> Result<EnrollReport, CoreError> {
        let entries = source.scan()?;
        Ok(self.pipeline.enroll_from_local_scan(&entries))
    }

    /// Start the remote search. Returns false when the remote tier is off
    /// or a search is already running.
    pub fn launch_remote_search(
        &self,
        source: Arc<dyn RemoteSearchSource>,
    ) -> Result<bool, CoreError> {
        if !self.remote_search_enabled || !self.resolver.is_remote_enabled() {
            info!(
                configured = self.remote_search_enabled,
                container = self.resolver.is_remote_enabled(),
                "Remote search disabled"
            );
            return Ok(false);
        }
        self.remote
            .launch(source, self.pipeline.clone(), &self.runtime)
    }

    pub fn ignore_remote_search(&self) -> bool {
        self.remote.ignore()
    }

    pub fn is_remote_search_active(&self) -> bool {
        self.remote.is_active()
    }

    /// Create a brand-new document named `file_name`.
    ///
    /// The record is enrolled immediately; the returned uuid is usable before
    /// the store has been written. The creation outcome goes to `continuation`.
    pub fn add_document(
        &self,
        file_name: &str,
        continuation: Continuation,
    ) -> Result<DocUuid, CoreError> {
        let uuid = UuidGrammar::mint();
        self.pipeline.enroll(&Observation {
            uuid: uuid.clone(),
            file_name: file_name.to_string(),
            observed_at: Utc::now(),
            source: ObservationSource::Local,
        })?;
        info!(uuid = %uuid, file_name = %file_name, "Adding document");
        self.establisher.establish(&uuid, continuation)?;
        Ok(uuid)
    }

    pub fn establish(&self, uuid: &str, continuation: Continuation) -> Result<(), CoreError> {
        self.establisher.establish(uuid, continuation)
    }

    /// Entry point for storage error notifications from the provider layer.
    pub fn notify_store_error(
        &self,
        handle: HandleId,
        error: StorageError,
        continuation: Continuation,
    ) -> Result<bool, CoreError> {
        self.recovery.handle_store_error(handle, error, continuation)
    }

    /// Entry point for change notifications from an open document.
    ///
    /// Only the record's live handle is listened to; returns false for any
    /// other handle the record once had.
    pub fn notify_document_changed(
        &self,
        handle: HandleId,
        change: DocumentChange,
    ) -> Result<bool, CoreError> {
        let uuid = {
            let store = self.store.lock();
            let record = store
                .record_for_handle(handle)
                .ok_or_else(|| CoreError::RecordNotFound(handle.to_string()))?;
            let is_live = store
                .live_handle(&record.uuid)
                .is_some_and(|live| live.id() == handle);
            if !is_live {
                debug!(uuid = %record.uuid, handle = %handle, "Ignoring change from stale handle");
                return Ok(false);
            }
            record.uuid.clone()
        };
        debug!(uuid = %uuid, handle = %handle, change = ?change, "Document changed");
        self.events.publish(CoreEvent::DocumentChanged {
            uuid,
            handle,
            change,
        });
        Ok(true)
    }

    /// Explicit user deletion. Closes the live handle; files are left alone.
    pub fn forget(&self, uuid: &str) -> Result<Record, CoreError> {
        let (record, handle) = self
            .store
            .lock()
            .remove(uuid)
            .ok_or_else(|| CoreError::RecordNotFound(uuid.to_string()))?;
        if let Some(handle) = handle {
            self.runtime.spawn(async move { close_quietly(&handle).await });
        }
        info!(uuid = %uuid, "Forgot document");
        Ok(record)
    }

    pub fn save_records(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.records_file.parent() {
            xdg::ensure_dir(parent)?;
        }
        save_snapshot(&self.store.lock(), &self.records_file)
    }

    /// Enroll records from the snapshot file that are not already known.
    ///
    /// Returns how many were added.
    pub fn load_records(&self) -> Result<usize, CoreError> {
        let persisted = load_snapshot(&self.records_file)?;
        let mut added = Vec::new();
        {
            let mut store = self.store.lock();
            for entry in persisted {
                if let Err(e) = self.resolver.grammar().validate(&entry.uuid) {
                    debug!(error = %e, "Skipping persisted record");
                    continue;
                }
                let record = entry.into_record();
                let (uuid, status) = (record.uuid.clone(), record.status);
                if store.insert(record) {
                    added.push((uuid, status));
                }
            }
        }
        for (uuid, status) in &added {
            self.events.state_changed(uuid, *status);
        }
        info!(path = %self.records_file.display(), count = added.len(), "Loaded records");
        Ok(added.len())
    }

    pub fn ready_count(&self) -> usize {
        self.store
            .lock()
            .iter()
            .filter(|r| r.status == RecordStatus::Ready)
            .count()
    }
}

impl Drop for DocumentsController {
    fn drop(&mut self) {
        self.remote.ignore();
        self.forwarder.abort();
    }
}
