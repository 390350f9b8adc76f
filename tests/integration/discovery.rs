//! Discovery pipeline: merging local and remote sightings into one record.

use crate::support::*;
use chrono::Utc;
use multidoc::discovery::{
    DirectoryScanner, DiscoveryPipeline, MetadataItem, Observation, ObservationSource,
    RemoteBatch, RemoteSearchSource,
};
use multidoc::events::EventBus;
use multidoc::paths::{PathResolver, UuidGrammar};
use multidoc::store::RecordStore;
use multidoc::CoreError;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn pipeline(root: &std::path::Path) -> (DiscoveryPipeline, multidoc::store::SharedRecordStore) {
    let store = RecordStore::new().shared();
    let resolver = Arc::new(PathResolver::new(
        root.join("Documents"),
        Some(root.join("Cloud")),
        UuidGrammar::default(),
    ));
    (
        DiscoveryPipeline::new(store.clone(), resolver, EventBus::new()),
        store,
    )
}

#[tokio::test]
async fn lowercase_uuid_is_rejected_by_default_grammar() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), true);
    let lower = OTHER_UUID.to_ascii_lowercase();

    h.controller.enroll(&local(OTHER_UUID, "Notes", 1)).unwrap();
    let err = h.controller.enroll(&local(&lower, "Notes", 2)).unwrap_err();
    assert_eq!(err, CoreError::InvalidIdentifier(lower));
    assert_eq!(h.controller.snapshot().len(), 1);
}

#[tokio::test]
async fn both_spellings_of_a_uuid_share_one_record() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = config(temp.path(), true);
    config.discovery.uuid_grammar =
        r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}".to_string();
    let h = harness_with(temp.path(), config);
    let lower = OTHER_UUID.to_ascii_lowercase();

    h.controller.enroll(&local(OTHER_UUID, "Notes", 1)).unwrap();
    h.controller
        .enroll(&remote(temp.path(), &lower, "Notes", 2))
        .unwrap();

    let records = h.controller.snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].uuid, OTHER_UUID);
    assert!(records[0].created_locally);
    assert!(records[0].remote_url.is_some());
    assert!(h.controller.record(&lower).is_some());
}

#[tokio::test]
async fn local_then_remote_sighting_merges_into_one_record() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), true);

    h.controller.enroll(&local(UUID, "Notes", 10)).unwrap();
    h.controller
        .enroll(&remote(temp.path(), UUID, "Notes", 20))
        .unwrap();

    let records = h.controller.snapshot();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!(record.created_locally);
    assert_eq!(
        record.local_url,
        temp.path().join("Documents").join(format!("Notes_{}", UUID))
    );
    assert_eq!(
        record.remote_url,
        Some(
            temp.path()
                .join("Cloud")
                .join("Documents")
                .join(format!("Notes_{}", UUID))
        )
    );
    assert_eq!(
        record.store_options.log_files_dir,
        Some(temp.path().join("Cloud").join("TransactionLogs").join(UUID))
    );
}

#[tokio::test]
async fn remote_sighting_never_clears_local_flag_or_url() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), true);

    h.controller
        .enroll(&remote(temp.path(), UUID, "Notes", 30))
        .unwrap();
    assert!(!h.controller.record(UUID).unwrap().created_locally);

    h.controller.enroll(&local(UUID, "Notes", 10)).unwrap();
    h.controller
        .enroll(&remote(temp.path(), UUID, "Notes", 5))
        .unwrap();
    let record = h.controller.record(UUID).unwrap();
    assert!(record.created_locally);
    assert!(record.remote_url.is_some());
}

#[tokio::test]
async fn newer_file_name_wins() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), true);

    h.controller.enroll(&local(UUID, "Draft", 10)).unwrap();
    h.controller
        .enroll(&remote(temp.path(), UUID, "Final", 20))
        .unwrap();
    h.controller.enroll(&local(UUID, "Draft", 15)).unwrap();

    let record = h.controller.record(UUID).unwrap();
    assert_eq!(record.file_name, "Final");
    assert_eq!(record.last_updated, at(20));
    assert_eq!(
        record.local_url,
        temp.path().join("Documents").join(format!("Final_{}", UUID))
    );
}

#[tokio::test]
async fn local_scan_enrolls_directories_and_rejects_bad_uuids() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let docs = temp.path().join("Documents");
    std::fs::create_dir_all(docs.join(format!("Notes_{}", UUID))).unwrap();
    std::fs::create_dir_all(docs.join(format!("Plans_{}", OTHER_UUID))).unwrap();
    std::fs::create_dir_all(docs.join("Junk_1234")).unwrap();

    let report = h
        .controller
        .discover_local(&DirectoryScanner::new(&docs))
        .unwrap();
    assert_eq!(report.inserted, 2);
    assert!(matches!(
        report.rejected.as_slice(),
        [CoreError::InvalidIdentifier(_)]
    ));

    let again = h
        .controller
        .discover_local(&DirectoryScanner::new(&docs))
        .unwrap();
    assert_eq!(again.unchanged, 2);
    assert_eq!(h.controller.snapshot().len(), 2);
}

struct ChannelSource {
    sender: Mutex<Option<mpsc::UnboundedSender<RemoteBatch>>>,
}

impl ChannelSource {
    fn send(&self, batch: RemoteBatch) {
        if let Some(tx) = self.sender.lock().as_ref() {
            tx.send(batch).unwrap();
        }
    }
}

impl RemoteSearchSource for ChannelSource {
    fn start(&self) -> Result<mpsc::UnboundedReceiver<RemoteBatch>, CoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock() = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        self.sender.lock().take();
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn remote_batches_survive_ignore() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), true);
    let source = Arc::new(ChannelSource {
        sender: Mutex::new(None),
    });

    assert!(h.controller.launch_remote_search(source.clone()).unwrap());
    let item = |uuid: &str, name: &str| MetadataItem {
        uuid: uuid.to_string(),
        remote_url: temp
            .path()
            .join("Cloud")
            .join("Documents")
            .join(format!("{}_{}", name, uuid)),
        file_name: None,
        updated: Utc::now(),
    };
    source.send(RemoteBatch::Initial(vec![item(UUID, "Notes")]));
    source.send(RemoteBatch::Update(vec![item(OTHER_UUID, "Plans")]));
    wait_until(|| h.controller.snapshot().len() == 2).await;

    assert!(h.controller.ignore_remote_search());
    assert!(!h.controller.is_remote_search_active());
    let records = h.controller.snapshot();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].file_name, "Plans");
    assert!(records.iter().all(|r| r.remote_url.is_some()));
}

#[tokio::test]
async fn remote_search_needs_a_container() {
    let temp = tempfile::tempdir().unwrap();
    let h = harness(temp.path(), false);
    let source = Arc::new(ChannelSource {
        sender: Mutex::new(None),
    });
    assert!(!h.controller.launch_remote_search(source).unwrap());
}

fn interleaving(root: PathBuf) -> impl Strategy<Value = Vec<Observation>> {
    let observation = (any::<bool>(), 0usize..3, 0i64..5).prop_map(move |(is_local, name, secs)| {
        let name = ["Notes", "Plans", "Draft"][name];
        if is_local {
            local(UUID, name, secs)
        } else {
            remote(&root, UUID, name, secs)
        }
    });
    prop::collection::vec(observation, 1..8)
}

proptest! {
    #[test]
    fn any_interleaving_yields_the_same_record(
        (observations, shuffled) in interleaving(PathBuf::from("/data"))
            .prop_flat_map(|obs| (Just(obs.clone()), Just(obs).prop_shuffle()))
    ) {
        let (forward, forward_store) = pipeline(std::path::Path::new("/data"));
        let (mixed, mixed_store) = pipeline(std::path::Path::new("/data"));
        for obs in &observations {
            forward.enroll(obs).unwrap();
        }
        for obs in &shuffled {
            mixed.enroll(obs).unwrap();
        }
        let expected = forward_store.lock().snapshot();
        prop_assert_eq!(&expected, &mixed_store.lock().snapshot());

        // replaying everything changes nothing
        for obs in &observations {
            forward.enroll(obs).unwrap();
        }
        prop_assert_eq!(&expected, &forward_store.lock().snapshot());
    }

    #[test]
    fn malformed_uuids_are_rejected_without_touching_the_store(
        uuid in "[0-9a-zA-Z_-]{0,40}"
    ) {
        prop_assume!(!UuidGrammar::default().is_valid(&uuid));
        let (pipeline, store) = pipeline(std::path::Path::new("/data"));
        let result = pipeline.enroll(&Observation {
            uuid: uuid.clone(),
            file_name: "Notes".to_string(),
            observed_at: at(1),
            source: ObservationSource::Local,
        });
        prop_assert!(matches!(result, Err(CoreError::InvalidIdentifier(_))));
        prop_assert!(store.lock().is_empty());
    }
}
