//! Directory-backed document provider.
//!
//! A document is a directory holding `manifest.json`:
//! `{content_name, model_version, objects: [{entity, attributes}]}`.

use super::{DocumentHandle, DocumentProvider, CURRENT_MODEL_VERSION};
use crate::error::StorageError;
use crate::store::StoreOptions;
use crate::types::HandleId;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredObject {
    entity: String,
    attributes: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    content_name: String,
    model_version: u32,
    #[serde(default)]
    objects: Vec<StoredObject>,
}

#[derive(Debug)]
struct DocumentState {
    manifest: Manifest,
    closed: bool,
}

/// A document living in one directory.
#[derive(Debug)]
pub struct FsDocument {
    id: HandleId,
    path: PathBuf,
    state: Mutex<DocumentState>,
}

impl FsDocument {
    fn new(path: &Path, manifest: Manifest) -> Self {
        Self {
            id: HandleId::next(),
            path: path.to_path_buf(),
            state: Mutex::new(DocumentState {
                manifest,
                closed: false,
            }),
        }
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().manifest.objects.len()
    }

    pub fn model_version(&self) -> u32 {
        self.state.lock().manifest.model_version
    }
}

#[async_trait]
impl DocumentHandle for FsDocument {
    fn id(&self) -> HandleId {
        self.id
    }

    fn url(&self) -> &Path {
        &self.path
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn insert_object(&self, entity: &str, attributes: serde_json::Value) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StorageError::Closed(self.path.clone()));
        }
        state.manifest.objects.push(StoredObject {
            entity: entity.to_string(),
            attributes,
        });
        Ok(())
    }

    async fn save(&self) -> Result<(), StorageError> {
        let bytes = {
            let state = self.state.lock();
            if state.closed {
                return Err(StorageError::Closed(self.path.clone()));
            }
            serde_json::to_vec_pretty(&state.manifest)
                .map_err(|e| StorageError::Other(format!("Failed to encode manifest: {}", e)))?
        };

        std::fs::create_dir_all(&self.path).map_err(|e| StorageError::io(&self.path, &e))?;
        let manifest = self.path.join(MANIFEST_FILE);
        let temp = self.path.join(format!("{}.tmp", MANIFEST_FILE));
        std::fs::write(&temp, bytes).map_err(|e| StorageError::io(&temp, &e))?;
        std::fs::rename(&temp, &manifest).map_err(|e| StorageError::io(&manifest, &e))?;
        tracing::debug!(path = %self.path.display(), handle = %self.id, "Saved document");
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        state.closed = true;
        tracing::debug!(path = %self.path.display(), handle = %self.id, "Closed document");
        Ok(())
    }
}

/// Provider for directory-backed documents.
#[derive(Debug, Clone)]
pub struct FsDocumentProvider {
    supported_model_version: u32,
}

impl FsDocumentProvider {
    pub fn new() -> Self {
        Self::with_model_version(CURRENT_MODEL_VERSION)
    }

    /// Provider that writes and accepts up to `version`.
    pub fn with_model_version(version: u32) -> Self {
        Self {
            supported_model_version: version,
        }
    }
}

impl Default for FsDocumentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentProvider for FsDocumentProvider {
    async fn exists(&self, url: &Path) -> bool {
        url.join(MANIFEST_FILE).is_file()
    }

    async fn create(
        &self,
        url: &Path,
        options: &StoreOptions,
    ) -> Result<Arc<dyn DocumentHandle>, StorageError> {
        let manifest = Manifest {
            content_name: options.content_name.clone(),
            model_version: self.supported_model_version,
            objects: Vec::new(),
        };
        Ok(Arc::new(FsDocument::new(url, manifest)))
    }

    async fn open(
        &self,
        url: &Path,
        options: &StoreOptions,
    ) -> Result<Arc<dyn DocumentHandle>, StorageError> {
        let path = url.join(MANIFEST_FILE);
        let bytes = std::fs::read(&path).map_err(|e| StorageError::io(&path, &e))?;
        let manifest: Manifest = serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
            path: path.clone(),
            message: e.to_string(),
        })?;

        if manifest.model_version > self.supported_model_version {
            return Err(StorageError::Incompatible {
                path: url.to_path_buf(),
                found: manifest.model_version,
                supported: self.supported_model_version,
            });
        }
        if manifest.content_name != options.content_name {
            tracing::warn!(
                path = %url.display(),
                stored = %manifest.content_name,
                expected = %options.content_name,
                "Store content name does not match record"
            );
        }

        Ok(Arc::new(FsDocument::new(url, manifest)))
    }
}
