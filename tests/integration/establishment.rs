//! Establishment: create-or-open, one attempt per uuid, continuations.

use crate::support::*;
use multidoc::docstore::DocumentHandle;
use multidoc::establish::Continuation;
use multidoc::{CoreError, RecordStatus, StorageError};

#[tokio::test]
async fn missing_store_takes_the_creation_path() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let mut events = h.controller.subscribe();
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    let document = rx.await.unwrap().unwrap();

    assert!(document.created);
    assert_eq!(h.initializer.calls(), 1);
    assert_eq!(h.provider.creates(), 1);
    assert_eq!(h.provider.opens(), 0);
    assert_eq!(h.provider.handles()[0].objects(), vec!["ModelVersion"]);
    assert_eq!(
        drain_statuses(&mut events, UUID),
        vec![
            RecordStatus::Discovered,
            RecordStatus::Establishing,
            RecordStatus::Ready
        ]
    );
    let record = h.controller.record(UUID).unwrap();
    assert!(record.is_viewable());
    assert_eq!(
        h.controller.record_for_handle(document.handle.id()).unwrap().uuid,
        UUID
    );
}

#[tokio::test]
async fn existing_store_is_opened_not_created() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();
    let url = h.controller.record(UUID).unwrap().local_url;
    h.provider.mark_existing(&url);

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    let document = rx.await.unwrap().unwrap();

    assert!(!document.created);
    assert_eq!(document.handle.url(), url.as_path());
    assert_eq!(h.provider.opens(), 1);
    assert_eq!(h.provider.creates(), 0);
    assert_eq!(h.initializer.calls(), 0);
}

#[tokio::test]
async fn remote_copy_is_preferred_then_local_fallback() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), true);
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();
    h.controller
        .enroll(&remote(temp.path(), UUID, "Notes", 1))
        .unwrap();
    let record = h.controller.record(UUID).unwrap();
    h.provider.mark_existing(&record.local_url);

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    let document = rx.await.unwrap().unwrap();
    assert_eq!(document.handle.url(), record.local_url.as_path());

    let other = harness(temp.path(), true);
    other
        .controller
        .enroll(&remote(temp.path(), OTHER_UUID, "Plans", 1))
        .unwrap();
    let (continuation, rx) = Continuation::channel();
    other.controller.establish(OTHER_UUID, continuation).unwrap();
    let created = rx.await.unwrap().unwrap();
    assert!(created.created);
    assert_eq!(
        created.handle.url(),
        temp.path()
            .join("Cloud")
            .join("Documents")
            .join(format!("Plans_{}", OTHER_UUID))
    );
}

#[tokio::test]
async fn concurrent_establish_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();

    let (first, first_rx) = Continuation::channel();
    let (second, second_rx) = Continuation::channel();
    h.controller.establish(UUID, first).unwrap();
    let err = h.controller.establish(UUID, second).unwrap_err();
    assert_eq!(err, CoreError::AlreadyEstablishing(UUID.to_string()));

    first_rx.await.unwrap().unwrap();
    // the rejected continuation is dropped, never invoked
    assert!(second_rx.await.is_err());
    assert_eq!(h.provider.creates(), 1);
    assert_eq!(h.provider.handles().len(), 1);
}

#[tokio::test]
async fn ready_record_hands_back_its_live_handle() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    let first = rx.await.unwrap().unwrap();

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    let second = rx.await.unwrap().unwrap();

    assert_eq!(first.handle.id(), second.handle.id());
    assert_eq!(h.provider.creates(), 1);
    assert_eq!(h.provider.opens(), 0);
}

#[tokio::test]
async fn save_failure_during_creation_fails_the_record() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();
    h.provider.fail_next_save(StorageError::Other("disk full".to_string()));

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    let err = rx.await.unwrap().unwrap_err();

    assert_eq!(
        err,
        CoreError::StoreSaveFailed {
            uuid: UUID.to_string(),
            source: StorageError::Other("disk full".to_string()),
        }
    );
    assert_eq!(h.controller.record(UUID).unwrap().status, RecordStatus::Failed);
    assert!(h.provider.handles()[0].is_closed());
}

#[tokio::test]
async fn incompatible_store_fails_without_recovery() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();
    let url = h.controller.record(UUID).unwrap().local_url;
    h.provider.mark_existing(&url);
    let incompatible = StorageError::Incompatible {
        path: url.clone(),
        found: 9,
        supported: 1,
    };
    h.provider.fail_next_open(incompatible.clone());

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    let err = rx.await.unwrap().unwrap_err();

    assert_eq!(
        err,
        CoreError::StoreOpenFailed {
            uuid: UUID.to_string(),
            source: incompatible,
        }
    );
    assert_eq!(h.provider.opens(), 1);
    assert_eq!(h.controller.record(UUID).unwrap().status, RecordStatus::Failed);
}

#[tokio::test]
async fn add_document_mints_and_creates() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), true);

    let (continuation, rx) = Continuation::channel();
    let uuid = h.controller.add_document("Ideas", continuation).unwrap();
    let document = rx.await.unwrap().unwrap();

    assert_eq!(uuid, uuid.to_uppercase());
    assert!(document.created);
    let record = h.controller.record(&uuid).unwrap();
    assert!(record.created_locally);
    assert_eq!(record.remote_url, None);
    assert_eq!(record.status, RecordStatus::Ready);
    assert_eq!(
        document.handle.url(),
        temp.path().join("Documents").join(format!("Ideas_{}", uuid))
    );

    let err = h
        .controller
        .add_document("bad/name", Continuation::detached())
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidIdentifier(_)));
}

#[tokio::test]
async fn results_for_forgotten_records_are_discarded() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();
    h.provider.hold();

    let (continuation, rx) = Continuation::channel();
    h.controller.establish(UUID, continuation).unwrap();
    h.controller.forget(UUID).unwrap();
    h.provider.release();

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err, CoreError::RecordNotFound(UUID.to_string()));
    assert!(h.controller.record(UUID).is_none());
    let handles = h.provider.handles();
    assert_eq!(handles.len(), 1);
    assert!(handles[0].is_closed());
}

#[tokio::test]
async fn unknown_uuid_is_rejected_synchronously() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let err = h
        .controller
        .establish(UUID, Continuation::detached())
        .unwrap_err();
    assert_eq!(err, CoreError::RecordNotFound(UUID.to_string()));
}
