//! Error recovery: close, reopen once, then give up.

use crate::support::*;
use multidoc::docstore::DocumentHandle;
use multidoc::establish::{Continuation, EstablishedDocument};
use multidoc::events::CoreEvent;
use multidoc::types::HandleId;
use multidoc::{CoreError, RecordStatus, StorageError};

fn corrupt(message: &str) -> StorageError {
    StorageError::Corrupt {
        path: "/store".into(),
        message: message.to_string(),
    }
}

async fn ready(h: &Harness) -> EstablishedDocument {
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();
    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    rx.await.unwrap().unwrap()
}

#[tokio::test]
async fn error_on_ready_record_reopens_once() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let first = ready(&h).await;
    let mut events = h.controller.subscribe();

    let (continuation, rx) = Continuation::channel();
    let started = h
        .controller
        .notify_store_error(first.handle.id(), corrupt("torn write"), continuation)
        .unwrap();
    assert!(started);
    let reopened = rx.await.unwrap().unwrap();

    assert!(first.handle.is_closed());
    assert_ne!(reopened.handle.id(), first.handle.id());
    assert!(!reopened.created);
    assert_eq!(h.provider.opens(), 1);
    assert_eq!(h.initializer.calls(), 1);
    assert_eq!(h.controller.record(UUID).unwrap().status, RecordStatus::Ready);

    let first_event = events.try_recv().unwrap();
    assert!(matches!(
        first_event,
        CoreEvent::StoreError { ref uuid, handle, .. } if uuid == UUID && handle == first.handle.id()
    ));
    assert_eq!(
        drain_statuses(&mut events, UUID),
        vec![
            RecordStatus::Recovering,
            RecordStatus::Establishing,
            RecordStatus::Ready
        ]
    );
}

#[tokio::test]
async fn failed_recovery_is_terminal() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let first = ready(&h).await;
    h.provider.fail_next_open(corrupt("still broken"));

    let (continuation, rx) = Continuation::channel();
    assert!(h
        .controller
        .notify_store_error(first.handle.id(), corrupt("torn write"), continuation)
        .unwrap());
    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        CoreError::RecoveryFailed {
            uuid: UUID.to_string(),
            source: corrupt("still broken"),
        }
    );
    assert_eq!(h.controller.record(UUID).unwrap().status, RecordStatus::Failed);
    assert_eq!(h.provider.opens(), 1);

    // a repeat error is surfaced, not retried
    let (continuation, rx) = Continuation::channel();
    let started = h
        .controller
        .notify_store_error(first.handle.id(), corrupt("again"), continuation)
        .unwrap();
    assert!(!started);
    assert!(matches!(
        rx.await.unwrap().unwrap_err(),
        CoreError::RecoveryFailed { .. }
    ));
    assert_eq!(h.provider.opens(), 1);
    assert_eq!(h.controller.record(UUID).unwrap().status, RecordStatus::Failed);
}

#[tokio::test]
async fn open_failure_recovers_then_fails_with_second_error() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();
    let url = h.controller.record(UUID).unwrap().local_url;
    h.provider.mark_existing(&url);
    h.provider.fail_next_open(corrupt("first"));
    h.provider.fail_next_open(corrupt("second"));
    let mut events = h.controller.subscribe();

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    let err = rx.await.unwrap().unwrap_err();

    assert_eq!(
        err,
        CoreError::RecoveryFailed {
            uuid: UUID.to_string(),
            source: corrupt("second"),
        }
    );
    assert_eq!(h.provider.opens(), 2);
    assert_eq!(
        drain_statuses(&mut events, UUID),
        vec![
            RecordStatus::Establishing,
            RecordStatus::Recovering,
            RecordStatus::Establishing,
            RecordStatus::Failed
        ]
    );
}

#[tokio::test]
async fn open_failure_recovers_on_second_try() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();
    let url = h.controller.record(UUID).unwrap().local_url;
    h.provider.mark_existing(&url);
    h.provider.fail_next_open(corrupt("transient"));

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    let document = rx.await.unwrap().unwrap();
    assert_eq!(document.handle.url(), url.as_path());
    assert_eq!(h.provider.opens(), 2);
    assert_eq!(h.controller.record(UUID).unwrap().status, RecordStatus::Ready);
}

#[tokio::test]
async fn errors_from_replaced_handles_are_ignored() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let first = ready(&h).await;

    let (continuation, rx) = Continuation::channel();
    h.controller
        .notify_store_error(first.handle.id(), corrupt("torn write"), continuation)
        .unwrap();
    rx.await.unwrap().unwrap();

    let started = h
        .controller
        .notify_store_error(first.handle.id(), corrupt("late"), Continuation::detached())
        .unwrap();
    assert!(!started);
    assert_eq!(h.provider.opens(), 1);
    assert_eq!(h.controller.record(UUID).unwrap().status, RecordStatus::Ready);
}

#[tokio::test]
async fn error_during_recovery_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let first = ready(&h).await;
    h.provider.hold();

    let (continuation, rx) = Continuation::channel();
    h.controller
        .notify_store_error(first.handle.id(), corrupt("torn write"), continuation)
        .unwrap();
    let err = h
        .controller
        .notify_store_error(first.handle.id(), corrupt("again"), Continuation::detached())
        .unwrap_err();
    assert_eq!(err, CoreError::AlreadyEstablishing(UUID.to_string()));

    h.provider.release();
    rx.await.unwrap().unwrap();
    assert_eq!(h.provider.opens(), 1);
}

#[tokio::test]
async fn forget_during_recovery_still_closes_handle() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let first = ready(&h).await;

    let (continuation, rx) = Continuation::channel();
    assert!(h
        .controller
        .notify_store_error(first.handle.id(), corrupt("torn write"), continuation)
        .unwrap());
    h.controller.forget(UUID).unwrap();

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err, CoreError::RecordNotFound(UUID.to_string()));
    assert!(first.handle.is_closed());
    assert_eq!(h.provider.opens(), 0);
    assert!(h.controller.record(UUID).is_none());
}

#[tokio::test]
async fn unknown_handle_is_not_found() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let err = h
        .controller
        .notify_store_error(HandleId::next(), corrupt("x"), Continuation::detached())
        .unwrap_err();
    assert!(matches!(err, CoreError::RecordNotFound(_)));
}
