//! Typed success/failure callbacks with at-most-once delivery.

use crate::docstore::DocumentHandle;
use crate::error::CoreError;
use crate::types::DocUuid;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A document that finished establishment.
#[derive(Clone)]
pub struct EstablishedDocument {
    pub uuid: DocUuid,
    pub handle: Arc<dyn DocumentHandle>,
    /// True when the creation path ran
    pub created: bool,
}

impl fmt::Debug for EstablishedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstablishedDocument")
            .field("uuid", &self.uuid)
            .field("handle", &self.handle.id())
            .field("url", &self.handle.url())
            .field("created", &self.created)
            .finish()
    }
}

pub type EstablishResult = Result<EstablishedDocument, CoreError>;

/// Receives the outcome of one establishment or recovery attempt.
///
/// Consumed on delivery, so it can fire at most once.
pub struct Continuation {
    callback: Box<dyn FnOnce(EstablishResult) + Send>,
}

impl Continuation {
    pub fn new<S, F>(on_success: S, on_fail: F) -> Self
    where
        S: FnOnce(EstablishedDocument) + Send + 'static,
        F: FnOnce(CoreError) + Send + 'static,
    {
        Self::from_fn(move |result| match result {
            Ok(document) => on_success(document),
            Err(e) => on_fail(e),
        })
    }

    pub fn from_fn(callback: impl FnOnce(EstablishResult) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Continuation that forwards the outcome to an awaitable receiver.
    pub fn channel() -> (Self, oneshot::Receiver<EstablishResult>) {
        let (tx, rx) = oneshot::channel();
        let continuation = Self::from_fn(move |result| {
            if tx.send(result).is_err() {
                debug!("Establishment result receiver dropped");
            }
        });
        (continuation, rx)
    }

    /// Continuation nobody waits on; the outcome is only logged.
    pub fn detached() -> Self {
        Self::from_fn(|result| match result {
            Ok(document) => debug!(uuid = %document.uuid, "Document established"),
            Err(e) => warn!(error = %e, "Document establishment failed"),
        })
    }

    pub fn complete(self, result: EstablishResult) {
        (self.callback)(result)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Continuation")
    }
}
