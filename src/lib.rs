//! Multidoc: Document Registry Reconciliation
//!
//! Keeps one coherent registry of documents that may live on local storage,
//! in a synchronized remote container, or both. Discovery merges what both
//! tiers report, establishment opens or creates each document's store, and
//! recovery closes and reopens a store after a storage error.

pub mod config;
pub mod controller;
pub mod discovery;
pub mod docstore;
pub mod error;
pub mod establish;
pub mod events;
pub mod logging;
pub mod paths;
pub mod recovery;
pub mod refresh;
pub mod store;
pub mod tooling;
pub mod types;

pub use controller::DocumentsController;
pub use error::{CoreError, StorageError};
pub use store::{Record, RecordStatus};
