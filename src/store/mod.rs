//! Record Store
//!
//! Insertion-ordered set of document records keyed by uuid. This is the one
//! shared mutable resource in the registry: every mutation goes through a
//! `SharedRecordStore` lock, so there is a single logical writer at a time.
//! Live document handles are owned here too, next to the record they belong to.
//!
//! Uuids are compared without regard to ASCII case: two spellings of the same
//! uuid always resolve to one record.

pub mod persistence;
mod record;

pub use persistence::PersistedRecord;
pub use record::{Record, RecordStatus, StoreOptions};

use crate::error::CoreError;
use crate::docstore::DocumentHandle;
use crate::types::{DocUuid, HandleId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Store handle shared by discovery, establishment and recovery.
pub type SharedRecordStore = Arc<Mutex<RecordStore>>;

/// Replaced handles remembered per record for late error notifications.
pub const RETIRED_HANDLES_KEPT: usize = 4;

fn key(uuid: &str) -> DocUuid {
    uuid.to_ascii_uppercase()
}

#[derive(Default)]
pub struct RecordStore {
    records: Vec<Record>,
    index: HashMap<DocUuid, usize>,
    live: HashMap<DocUuid, Arc<dyn DocumentHandle>>,
    /// Live and recently replaced handles, so late error notifications still
    /// find their record
    handle_owners: HashMap<HandleId, DocUuid>,
    retired: HashMap<DocUuid, VecDeque<HandleId>>,
    in_flight: HashSet<DocUuid>,
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("records", &self.records)
            .field("live", &self.live.keys().collect::<Vec<_>>())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedRecordStore {
        Arc::new(Mutex::new(self))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.index.contains_key(&key(uuid))
    }

    pub fn get(&self, uuid: &str) -> Option<&Record> {
        self.index.get(&key(uuid)).map(|&i| &self.records[i])
    }

    pub(crate) fn get_mut(&mut self, uuid: &str) -> Option<&mut Record> {
        match self.index.get(&key(uuid)) {
            Some(&i) => Some(&mut self.records[i]),
            None => None,
        }
    }

    /// Records in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Owned copy for readers outside the lock.
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.clone()
    }

    /// Append a record. Returns false, leaving the store untouched, when the
    /// uuid is already enrolled.
    pub(crate) fn insert(&mut self, record: Record) -> bool {
        let uuid = key(&record.uuid);
        if self.index.contains_key(&uuid) {
            return false;
        }
        self.index.insert(uuid, self.records.len());
        self.records.push(record);
        true
    }

    /// Drop a record and hand back its live handle, if any, for closing.
    pub(crate) fn remove(
        &mut self,
        uuid: &str,
    ) -> Option<(Record, Option<Arc<dyn DocumentHandle>>)> {
        let uuid = key(uuid);
        let position = self.index.remove(&uuid)?;
        let record = self.records.remove(position);
        for i in self.index.values_mut() {
            if *i > position {
                *i -= 1;
            }
        }
        self.retired.remove(&uuid);
        self.handle_owners.retain(|_, owner| *owner != uuid);
        let handle = self.live.remove(&uuid);
        Some((record, handle))
    }

    pub fn record_for_handle(&self, handle: HandleId) -> Option<&Record> {
        self.handle_owners.get(&handle).and_then(|uuid| self.get(uuid))
    }

    /// Number of handles an error notification can still be routed from.
    pub fn known_handle_count(&self) -> usize {
        self.handle_owners.len()
    }

    pub fn live_handle(&self, uuid: &str) -> Option<Arc<dyn DocumentHandle>> {
        self.live.get(&key(uuid)).cloned()
    }

    pub fn is_in_flight(&self, uuid: &str) -> bool {
        self.in_flight.contains(&key(uuid))
    }

    /// Claim the single attempt slot for `uuid` and move it to `status`.
    pub(crate) fn begin_attempt(
        &mut self,
        uuid: &str,
        status: RecordStatus,
    ) -> Result<Record, CoreError> {
        if !self.contains(uuid) {
            return Err(CoreError::RecordNotFound(uuid.to_string()));
        }
        if !self.in_flight.insert(key(uuid)) {
            return Err(CoreError::AlreadyEstablishing(uuid.to_string()));
        }
        let record = self
            .get_mut(uuid)
            .ok_or_else(|| CoreError::RecordNotFound(uuid.to_string()))?;
        record.status = status;
        Ok(record.clone())
    }

    pub(crate) fn finish_attempt(&mut self, uuid: &str) {
        self.in_flight.remove(&key(uuid));
    }

    /// Returns the previous status, or None when the record is gone.
    pub(crate) fn set_status(&mut self, uuid: &str, status: RecordStatus) -> Option<RecordStatus> {
        let record = self.get_mut(uuid)?;
        let previous = record.status;
        record.status = status;
        Some(previous)
    }

    /// Bind a live handle to its record. Refuses while another handle is live.
    pub(crate) fn attach_handle(
        &mut self,
        uuid: &str,
        handle: Arc<dyn DocumentHandle>,
    ) -> Result<(), CoreError> {
        if !self.contains(uuid) {
            return Err(CoreError::RecordNotFound(uuid.to_string()));
        }
        let canonical = key(uuid);
        if self.live.contains_key(&canonical) {
            return Err(CoreError::AlreadyEstablishing(uuid.to_string()));
        }
        self.handle_owners.insert(handle.id(), canonical.clone());
        self.live.insert(canonical, handle);
        Ok(())
    }

    /// Take the live handle away from its record. The handle stays routable
    /// until `RETIRED_HANDLES_KEPT` newer ones have been retired after it.
    pub(crate) fn detach_handle(&mut self, uuid: &str) -> Option<Arc<dyn DocumentHandle>> {
        let uuid = key(uuid);
        let handle = self.live.remove(&uuid)?;
        let retired = self.retired.entry(uuid).or_default();
        retired.push_back(handle.id());
        while retired.len() > RETIRED_HANDLES_KEPT {
            if let Some(oldest) = retired.pop_front() {
                self.handle_owners.remove(&oldest);
            }
        }
        Some(handle)
    }

    pub fn to_persisted(&self) -> Vec<PersistedRecord> {
        self.records.iter().map(PersistedRecord::from).collect()
    }

    /// Rebuild a store from a snapshot. Nothing is open after a restart, so
    /// every record that is not `Failed` comes back as `Discovered`.
    pub fn from_persisted(persisted: Vec<PersistedRecord>) -> Self {
        let mut store = Self::new();
        for entry in persisted {
            if !store.insert(entry.into_record()) {
                tracing::warn!("Duplicate uuid in record snapshot, keeping the first");
            }
        }
        store
    }
}
