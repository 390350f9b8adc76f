//! Create-or-open driver for a single record.

use super::continuation::{Continuation, EstablishResult, EstablishedDocument};
use crate::docstore::{DocumentHandle, DocumentProvider, ObjectGraphInitializer};
use crate::error::CoreError;
use crate::events::EventBus;
use crate::paths::PathResolver;
use crate::recovery;
use crate::store::{Record, RecordStatus, SharedRecordStore};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Outcome of one storage attempt: the handle and whether it was created.
pub(crate) type Attempt = Result<(Arc<dyn DocumentHandle>, bool), CoreError>;

/// Brings records to `Ready`, one in-flight attempt per uuid.
#[derive(Clone)]
pub struct Establisher {
    store: SharedRecordStore,
    resolver: Arc<PathResolver>,
    provider: Arc<dyn DocumentProvider>,
    initializer: Arc<dyn ObjectGraphInitializer>,
    events: EventBus,
    runtime: Handle,
}

impl Establisher {
    pub fn new(
        store: SharedRecordStore,
        resolver: Arc<PathResolver>,
        provider: Arc<dyn DocumentProvider>,
        initializer: Arc<dyn ObjectGraphInitializer>,
        events: EventBus,
        runtime: Handle,
    ) -> Self {
        Self {
            store,
            resolver,
            provider,
            initializer,
            events,
            runtime,
        }
    }

    pub(crate) fn store(&self) -> &SharedRecordStore {
        &self.store
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Start establishing `uuid`; the outcome goes to `continuation`.
    ///
    /// Unknown records and a second request while an attempt is in flight are
    /// rejected here, synchronously. Storage failures are only ever reported
    /// through the continuation. A record that is already `Ready` gets its
    /// live handle back without touching storage.
    pub fn establish(&self, uuid: &str, continuation: Continuation) -> Result<(), CoreError> {
        let record = {
            let mut store = self.store.lock();
            let current = store
                .get(uuid)
                .ok_or_else(|| CoreError::RecordNotFound(uuid.to_string()))?;
            if current.status == RecordStatus::Ready && !store.is_in_flight(uuid) {
                if let Some(handle) = store.live_handle(uuid) {
                    debug!(uuid = %uuid, handle = %handle.id(), "Record already established");
                    let document = EstablishedDocument {
                        uuid: uuid.to_string(),
                        handle,
                        created: false,
                    };
                    self.runtime
                        .spawn(async move { continuation.complete(Ok(document)) });
                    return Ok(());
                }
            }
            store.begin_attempt(uuid, RecordStatus::Establishing)?
        };
        self.events.state_changed(uuid, RecordStatus::Establishing);
        info!(uuid = %uuid, "Establishing document");

        let this = self.clone();
        self.runtime.spawn(async move {
            let result = match this.attempt_once(&record).await {
                Err(CoreError::StoreOpenFailed { source, .. }) if source.is_recoverable() => {
                    warn!(uuid = %record.uuid, error = %source, "Open failed, recovering");
                    recovery::reopen(&this, &record.uuid, None, source).await
                }
                other => other,
            };
            this.apply_outcome(&record.uuid, result, continuation).await;
        });
        Ok(())
    }

    /// One create-or-open pass against storage. Does not touch the store.
    pub(crate) async fn attempt_once(&self, record: &Record) -> Attempt {
        let remote_enabled = self.resolver.is_remote_enabled();
        for url in record.candidate_urls(remote_enabled) {
            if self.provider.exists(url).await {
                debug!(uuid = %record.uuid, url = %url.display(), "Opening existing store");
                let handle = self
                    .provider
                    .open(url, &record.store_options)
                    .await
                    .map_err(|source| CoreError::StoreOpenFailed {
                        uuid: record.uuid.clone(),
                        source,
                    })?;
                return Ok((handle, false));
            }
        }

        let target = record.target_url(remote_enabled);
        debug!(uuid = %record.uuid, url = %target.display(), "Creating new store");
        let save_failed = |source| CoreError::StoreSaveFailed {
            uuid: record.uuid.clone(),
            source,
        };
        let handle = self
            .provider
            .create(target, &record.store_options)
            .await
            .map_err(save_failed)?;
        if let Err(source) = self.initializer.populate(handle.as_ref()) {
            close_quietly(&handle).await;
            return Err(save_failed(source));
        }
        if let Err(source) = handle.save().await {
            close_quietly(&handle).await;
            return Err(save_failed(source));
        }
        Ok((handle, true))
    }

    /// Move `uuid` to `status`, announcing real changes.
    pub(crate) fn transition(&self, uuid: &str, status: RecordStatus) -> Result<(), CoreError> {
        let previous = self
            .store
            .lock()
            .set_status(uuid, status)
            .ok_or_else(|| CoreError::RecordNotFound(uuid.to_string()))?;
        if previous != status {
            debug!(uuid = %uuid, from = %previous, to = %status, "Record transition");
            self.events.state_changed(uuid, status);
        }
        Ok(())
    }

    /// Apply the final result of an attempt and release the attempt slot.
    ///
    /// Results for a record deleted while the attempt ran are not applied;
    /// the handle is closed and the continuation learns the record is gone.
    pub(crate) async fn apply_outcome(
        &self,
        uuid: &str,
        result: Attempt,
        continuation: Continuation,
    ) {
        let delivered: EstablishResult = {
            let mut store = self.store.lock();
            store.finish_attempt(uuid);
            if !store.contains(uuid) {
                Err(CoreError::RecordNotFound(uuid.to_string()))
            } else {
                match &result {
                    Ok((handle, created)) => match store.attach_handle(uuid, handle.clone()) {
                        Ok(()) => {
                            store.set_status(uuid, RecordStatus::Ready);
                            Ok(EstablishedDocument {
                                uuid: uuid.to_string(),
                                handle: handle.clone(),
                                created: *created,
                            })
                        }
                        Err(e) => Err(e),
                    },
                    Err(e) => {
                        store.set_status(uuid, RecordStatus::Failed);
                        Err(e.clone())
                    }
                }
            }
        };

        match &delivered {
            Ok(document) => {
                info!(uuid = %uuid, handle = %document.handle.id(), created = document.created, "Document ready");
                self.events.state_changed(uuid, RecordStatus::Ready);
            }
            Err(CoreError::RecordNotFound(_)) | Err(CoreError::AlreadyEstablishing(_))
                if result.is_ok() =>
            {
                warn!(uuid = %uuid, "Discarding established handle");
                if let Ok((handle, _)) = &result {
                    close_quietly(handle).await;
                }
            }
            Err(e) => {
                warn!(uuid = %uuid, error = %e, "Document failed");
                if !matches!(e, CoreError::RecordNotFound(_)) {
                    self.events.state_changed(uuid, RecordStatus::Failed);
                }
            }
        }
        continuation.complete(delivered);
    }
}

pub(crate) async fn close_quietly(handle: &Arc<dyn DocumentHandle>) {
    if let Err(e) = handle.close().await {
        warn!(handle = %handle.id(), error = %e, "Failed to close document");
    }
}
