//! Record snapshots across controller restarts.

use crate::support::*;
use multidoc::establish::Continuation;
use multidoc::RecordStatus;

#[tokio::test]
async fn snapshot_round_trip_restores_identity_not_state() {
    let temp = tempfile::tempdir().unwrap();
    {
        let h = harness(temp.path(), true);
        h.controller.enroll(&local(UUID, "Notes", 1)).unwrap();
        h.controller
            .enroll(&remote(temp.path(), OTHER_UUID, "Plans", 2))
            .unwrap();
        let (continuation, rx) = Continuation::channel();
        h.controller.establish(UUID, continuation).unwrap();
        rx.await.unwrap().unwrap();
        h.controller.save_records().unwrap();
    }
    assert!(temp.path().join("records.json").is_file());

    let h = harness(temp.path(), true);
    assert_eq!(h.controller.load_records().unwrap(), 2);
    let records = h.controller.snapshot();
    assert_eq!(records[0].uuid, UUID);
    assert_eq!(records[0].status, RecordStatus::Discovered);
    assert!(records[0].created_locally);
    assert_eq!(records[1].uuid, OTHER_UUID);
    assert!(records[1].remote_url.is_some());

    // a fresh sighting beats whatever was persisted
    h.controller
        .enroll(&remote(temp.path(), OTHER_UUID, "Renamed", 3))
        .unwrap();
    assert_eq!(h.controller.record(OTHER_UUID).unwrap().file_name, "Renamed");

    // loading again adds nothing
    assert_eq!(h.controller.load_records().unwrap(), 0);
}
