//! Merge policy for discovery observations.
//!
//! Every attribute is merged with a commutative, idempotent rule so that any
//! arrival order of the same observations produces the same record:
//! - `created_locally` is the OR of all local sightings;
//! - `file_name` (and the `local_url` derived from it) is last-write-wins on
//!   `(observed_at, file_name)`, which also fixes `last_updated`;
//! - `remote_url` is last-write-wins on `(observed_at, remote_url)` among
//!   remote sightings and is never cleared.

use crate::error::CoreError;
use crate::paths::{normalize_path, PathResolver};
use crate::store::{Record, RecordStatus};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

/// Where an observation came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationSource {
    Local,
    Remote { url: PathBuf },
}

/// One sighting of a document by a discovery source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub uuid: String,
    pub file_name: String,
    pub observed_at: DateTime<Utc>,
    pub source: ObservationSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Record for a uuid seen for the first time.
pub(crate) fn new_record(
    observation: &Observation,
    resolver: &PathResolver,
) -> Result<Record, CoreError> {
    let (remote_url, remote_updated) = match &observation.source {
        ObservationSource::Remote { url } => {
            (Some(normalize_path(url)), Some(observation.observed_at))
        }
        ObservationSource::Local => (None, None),
    };
    Ok(Record {
        uuid: observation.uuid.clone(),
        file_name: observation.file_name.clone(),
        local_url: resolver.local_doc_url(&observation.file_name, &observation.uuid)?,
        remote_url,
        store_options: resolver.store_options(&observation.uuid),
        created_locally: observation.source == ObservationSource::Local,
        status: RecordStatus::Discovered,
        last_updated: observation.observed_at,
        remote_updated,
    })
}

/// Fold `observation` into an existing record.
pub(crate) fn merge_into(
    record: &mut Record,
    observation: &Observation,
    resolver: &PathResolver,
) -> Result<MergeOutcome, CoreError> {
    let mut changed = false;

    match &observation.source {
        ObservationSource::Local => {
            if !record.created_locally {
                record.created_locally = true;
                changed = true;
            }
        }
        ObservationSource::Remote { url } => {
            let url = normalize_path(url);
            let wins = match (&record.remote_url, record.remote_updated) {
                (Some(current), Some(current_at)) => {
                    (observation.observed_at, &url) > (current_at, current)
                }
                _ => true,
            };
            if wins && record.remote_url.as_ref() != Some(&url) {
                record.remote_url = Some(url);
                changed = true;
            }
            if wins && record.remote_updated != Some(observation.observed_at) {
                record.remote_updated = Some(observation.observed_at);
                changed = true;
            }
        }
    }

    let incoming = (observation.observed_at, observation.file_name.as_str());
    let current = (record.last_updated, record.file_name.as_str());
    if incoming > current {
        if observation.file_name != record.file_name {
            log_conflict(&record.uuid, &observation.file_name, &record.file_name);
            record.local_url = resolver.local_doc_url(&observation.file_name, &record.uuid)?;
            record.file_name = observation.file_name.clone();
        }
        record.last_updated = observation.observed_at;
        changed = true;
    } else if observation.file_name != record.file_name {
        log_conflict(&record.uuid, &record.file_name, &observation.file_name);
    }

    Ok(if changed {
        MergeOutcome::Updated
    } else {
        MergeOutcome::Unchanged
    })
}

fn log_conflict(uuid: &str, kept: &str, dropped: &str) {
    let conflict = CoreError::DiscoveryConflict {
        uuid: uuid.to_string(),
        kept: kept.to_string(),
        dropped: dropped.to_string(),
    };
    info!(uuid = %uuid, "{}", conflict);
}
