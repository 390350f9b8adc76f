//! Document store provider boundary.
//!
//! The registry never touches document contents itself. It asks a
//! `DocumentProvider` to create or open a store at a resolved location and
//! gets back a `DocumentHandle`. Brand-new documents are populated once by an
//! injected `ObjectGraphInitializer` before their first save.

mod fs;

pub use fs::{FsDocument, FsDocumentProvider, MANIFEST_FILE};

use crate::error::StorageError;
use crate::store::StoreOptions;
use crate::types::HandleId;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Model version stamped into every new document.
pub const CURRENT_MODEL_VERSION: u32 = 1;

/// An opened or freshly instantiated document.
#[async_trait]
pub trait DocumentHandle: Send + Sync {
    fn id(&self) -> HandleId;

    fn url(&self) -> &Path;

    fn is_closed(&self) -> bool;

    /// Stage one object of the document's object graph; persisted on `save`.
    fn insert_object(&self, entity: &str, attributes: serde_json::Value) -> Result<(), StorageError>;

    async fn save(&self) -> Result<(), StorageError>;

    /// Discard in-memory state. Later saves fail.
    async fn close(&self) -> Result<(), StorageError>;
}

/// Opens and creates persistent stores.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Whether a store is already materialized at `url`.
    async fn exists(&self, url: &Path) -> bool;

    /// Instantiate a new, unsaved document bound to `url`.
    async fn create(
        &self,
        url: &Path,
        options: &StoreOptions,
    ) -> Result<Arc<dyn DocumentHandle>, StorageError>;

    async fn open(
        &self,
        url: &Path,
        options: &StoreOptions,
    ) -> Result<Arc<dyn DocumentHandle>, StorageError>;
}

/// Populates the object graph of a brand-new document.
pub trait ObjectGraphInitializer: Send + Sync {
    fn populate(&self, document: &dyn DocumentHandle) -> Result<(), StorageError>;
}

/// Default initializer: records the model version the document was created with.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelVersionInitializer;

impl ObjectGraphInitializer for ModelVersionInitializer {
    fn populate(&self, document: &dyn DocumentHandle) -> Result<(), StorageError> {
        document.insert_object(
            "ModelVersion",
            serde_json::json!({ "versionNumber": CURRENT_MODEL_VERSION }),
        )
    }
}
