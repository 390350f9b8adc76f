//! Error Recovery Protocol
//!
//! A storage error reported against a live document handle closes that
//! handle and establishes the record again, once. If the reopen fails too the
//! record is `Failed` and stays that way until someone asks for it again;
//! later errors on it are reported, never retried.

use crate::docstore::DocumentHandle;
use crate::error::{CoreError, StorageError};
use crate::establish::{close_quietly, Attempt, Continuation, Establisher};
use crate::events::CoreEvent;
use crate::store::RecordStatus;
use crate::types::HandleId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Close `handle` if any, then run exactly one more establishment attempt.
///
/// The caller holds the attempt slot for `uuid`. The handle is detached from
/// the store already, so it is closed here even if the record is gone.
pub(crate) async fn reopen(
    establisher: &Establisher,
    uuid: &str,
    handle: Option<Arc<dyn DocumentHandle>>,
    cause: StorageError,
) -> Attempt {
    info!(uuid = %uuid, cause = %cause, "Recovering document");
    if let Some(handle) = handle {
        close_quietly(&handle).await;
    }
    establisher.transition(uuid, RecordStatus::Recovering)?;

    establisher.transition(uuid, RecordStatus::Establishing)?;
    let record = establisher
        .store()
        .lock()
        .get(uuid)
        .cloned()
        .ok_or_else(|| CoreError::RecordNotFound(uuid.to_string()))?;

    match establisher.attempt_once(&record).await {
        Ok(attempt) => {
            info!(uuid = %uuid, "Recovery succeeded");
            Ok(attempt)
        }
        Err(e) => {
            warn!(uuid = %uuid, error = %e, "Recovery failed");
            let source = e.storage_source().cloned().unwrap_or(cause);
            Err(CoreError::RecoveryFailed {
                uuid: uuid.to_string(),
                source,
            })
        }
    }
}

/// Routes storage error notifications to the record that owns the handle.
#[derive(Clone)]
pub struct ErrorRecovery {
    establisher: Establisher,
}

impl ErrorRecovery {
    pub fn new(establisher: Establisher) -> Self {
        Self { establisher }
    }

    /// React to `error` reported against `handle`.
    ///
    /// Returns `Ok(true)` when a recovery attempt was started; its outcome
    /// goes to `continuation`. Returns `Ok(false)` when nothing was retried:
    /// either the handle is no longer the record's live one, or the record
    /// already failed, in which case `continuation` receives
    /// `RecoveryFailed` right away. A record with an attempt in flight
    /// rejects the notification with `AlreadyEstablishing`.
    pub fn handle_store_error(
        &self,
        handle: HandleId,
        error: StorageError,
        continuation: Continuation,
    ) -> Result<bool, CoreError> {
        enum Decision {
            Stale,
            Terminal,
            Recover(Arc<dyn DocumentHandle>),
        }

        let (uuid, decision) = {
            let mut store = self.establisher.store().lock();
            let record = store
                .record_for_handle(handle)
                .ok_or_else(|| CoreError::RecordNotFound(handle.to_string()))?;
            let uuid = record.uuid.clone();
            let status = record.status;

            let live = store
                .live_handle(&uuid)
                .filter(|live| live.id() == handle);
            let decision = if status == RecordStatus::Failed {
                Decision::Terminal
            } else if store.is_in_flight(&uuid) {
                return Err(CoreError::AlreadyEstablishing(uuid));
            } else if let Some(live) = live {
                store.begin_attempt(&uuid, RecordStatus::Recovering)?;
                store.detach_handle(&uuid);
                Decision::Recover(live)
            } else {
                Decision::Stale
            };
            (uuid, decision)
        };

        self.establisher.events().publish(CoreEvent::StoreError {
            uuid: uuid.clone(),
            handle,
            message: error.to_string(),
        });

        match decision {
            Decision::Stale => {
                debug!(uuid = %uuid, handle = %handle, "Ignoring error from stale handle");
                Ok(false)
            }
            Decision::Terminal => {
                warn!(uuid = %uuid, handle = %handle, error = %error, "Error on failed document, not retrying");
                continuation.complete(Err(CoreError::RecoveryFailed {
                    uuid,
                    source: error,
                }));
                Ok(false)
            }
            Decision::Recover(live) => {
                self.establisher
                    .events()
                    .state_changed(&uuid, RecordStatus::Recovering);
                let establisher = self.establisher.clone();
                self.establisher.runtime().spawn(async move {
                    let result = reopen(&establisher, &uuid, Some(live), error).await;
                    establisher.apply_outcome(&uuid, result, continuation).await;
                });
                Ok(true)
            }
        }
    }
}
