//! Registry events and the subscriber list they are dispatched to.

use crate::store::RecordStatus;
use crate::types::{DocUuid, HandleId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What an open document reported about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentChange {
    /// The document's own state flags changed
    State,
    /// Changes made elsewhere were imported into its store
    RemoteImport,
}

/// Everything the registry announces to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    LocalScanCompleted {
        enrolled: usize,
        rejected: usize,
    },
    RemoteBatchReceived {
        initial: bool,
        enrolled: usize,
        rejected: usize,
    },
    StoreError {
        uuid: DocUuid,
        handle: HandleId,
        message: String,
    },
    DocumentStateChanged {
        uuid: DocUuid,
        status: RecordStatus,
    },
    DocumentChanged {
        uuid: DocUuid,
        handle: HandleId,
        change: DocumentChange,
    },
}

/// Fan-out of `CoreEvent`s to every live subscriber.
///
/// Subscribers whose receiver has been dropped are pruned on the next publish.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<CoreEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: CoreEvent) {
        tracing::trace!(event = ?event, "Publishing event");
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub(crate) fn state_changed(&self, uuid: &str, status: RecordStatus) {
        self.publish(CoreEvent::DocumentStateChanged {
            uuid: uuid.to_string(),
            status,
        });
    }
}
