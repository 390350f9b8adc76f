//! Enrollment of discovery results into the record store.

use super::local_scan::LocalEntry;
use super::merge::{self, MergeOutcome, Observation, ObservationSource};
use super::remote::{MetadataItem, RemoteBatch};
use crate::error::CoreError;
use crate::events::{CoreEvent, EventBus};
use crate::paths::PathResolver;
use crate::store::{RecordStatus, RecordStore, SharedRecordStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one enrollment pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: Vec<CoreError>,
}

impl EnrollReport {
    /// Entries that made it into the store, new or not.
    pub fn enrolled(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    pub fn changed(&self) -> bool {
        self.inserted + self.updated > 0
    }

    fn count(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Merges local and remote discovery results into the shared store.
#[derive(Clone)]
pub struct DiscoveryPipeline {
    store: SharedRecordStore,
    resolver: Arc<PathResolver>,
    events: EventBus,
}

impl DiscoveryPipeline {
    pub fn new(store: SharedRecordStore, resolver: Arc<PathResolver>, events: EventBus) -> Self {
        Self {
            store,
            resolver,
            events,
        }
    }

    /// Enroll one observation. Malformed identities are rejected before the
    /// store is touched.
    pub fn enroll(&self, observation: &Observation) -> Result<MergeOutcome, CoreError> {
        self.resolver
            .validate(&observation.file_name, &observation.uuid)?;
        let outcome = {
            let mut store = self.store.lock();
            enroll_locked(&mut store, observation, &self.resolver)?
        };
        if outcome == MergeOutcome::Inserted {
            self.events
                .state_changed(&observation.uuid, RecordStatus::Discovered);
        }
        Ok(outcome)
    }

    /// Enroll every entry of a local scan.
    pub fn enroll_from_local_scan(&self, entries: &[LocalEntry]) -> EnrollReport {
        let observations = entries.iter().map(|entry| {
            Ok(Observation {
                uuid: entry.uuid.clone(),
                file_name: entry.file_name.clone(),
                observed_at: entry.modified,
                source: ObservationSource::Local,
            })
        });
        let report = self.enroll_all(observations);
        info!(
            inserted = report.inserted,
            updated = report.updated,
            rejected = report.rejected.len(),
            "Enrolled local scan"
        );
        self.events.publish(CoreEvent::LocalScanCompleted {
            enrolled: report.enrolled(),
            rejected: report.rejected.len(),
        });
        report
    }

    /// Enroll one batch from the remote metadata search.
    pub fn enroll_from_remote_batch(&self, batch: &RemoteBatch) -> EnrollReport {
        let observations = batch
            .items()
            .iter()
            .map(|item| self.observation_for_item(item));
        let report = self.enroll_all(observations);
        info!(
            initial = batch.is_initial(),
            inserted = report.inserted,
            updated = report.updated,
            rejected = report.rejected.len(),
            "Enrolled remote batch"
        );
        self.events.publish(CoreEvent::RemoteBatchReceived {
            initial: batch.is_initial(),
            enrolled: report.enrolled(),
            rejected: report.rejected.len(),
        });
        report
    }

    fn observation_for_item(&self, item: &MetadataItem) -> Result<Observation, CoreError> {
        let file_name = match &item.file_name {
            Some(name) => name.clone(),
            None => match self.resolver.parse_document_url(&item.remote_url) {
                Some((name, uuid)) if uuid.eq_ignore_ascii_case(&item.uuid) => name,
                _ => {
                    return Err(CoreError::InvalidIdentifier(format!(
                        "{} (remote url {})",
                        item.uuid,
                        item.remote_url.display()
                    )))
                }
            },
        };
        Ok(Observation {
            uuid: item.uuid.clone(),
            file_name,
            observed_at: item.updated,
            source: ObservationSource::Remote {
                url: item.remote_url.clone(),
            },
        })
    }

    /// Validate everything first, then apply under a single lock.
    fn enroll_all(
        &self,
        observations: impl Iterator<Item = Result<Observation, CoreError>>,
    ) -> EnrollReport {
        let mut report = EnrollReport::default();
        let mut valid = Vec::new();
        for observation in observations {
            match observation.and_then(|obs| {
                self.resolver.validate(&obs.file_name, &obs.uuid)?;
                Ok(obs)
            }) {
                Ok(obs) => valid.push(obs),
                Err(e) => {
                    warn!(error = %e, "Rejected discovery entry");
                    report.rejected.push(e);
                }
            }
        }

        let mut inserted = Vec::new();
        {
            let mut store = self.store.lock();
            for obs in &valid {
                match enroll_locked(&mut store, obs, &self.resolver) {
                    Ok(outcome) => {
                        if outcome == MergeOutcome::Inserted {
                            inserted.push(obs.uuid.clone());
                        }
                        report.count(outcome);
                    }
                    Err(e) => {
                        warn!(uuid = %obs.uuid, error = %e, "Rejected discovery entry");
                        report.rejected.push(e);
                    }
                }
            }
        }

        for uuid in inserted {
            self.events.state_changed(&uuid, RecordStatus::Discovered);
        }
        report
    }
}

fn enroll_locked(
    store: &mut RecordStore,
    observation: &Observation,
    resolver: &PathResolver,
) -> Result<MergeOutcome, CoreError> {
    if let Some(record) = store.get_mut(&observation.uuid) {
        let outcome = merge::merge_into(record, observation, resolver)?;
        debug!(uuid = %observation.uuid, outcome = ?outcome, "Merged observation");
        return Ok(outcome);
    }
    let record = merge::new_record(observation, resolver)?;
    store.insert(record);
    debug!(uuid = %observation.uuid, "Enrolled new record");
    Ok(MergeOutcome::Inserted)
}
