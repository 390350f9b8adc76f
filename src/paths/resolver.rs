//! Local and remote document locations.

use super::identifier::UuidGrammar;
use super::normalize::normalize_path;
use crate::config::ResolvedStorage;
use crate::error::CoreError;
use crate::store::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const REMOTE_DOCUMENTS_DIR: &str = "Documents";
const REMOTE_LOGS_DIR: &str = "TransactionLogs";

/// Which storage tier a location belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageTier {
    Local,
    Remote,
}

/// Both locations for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocations {
    pub local_url: PathBuf,
    /// None when the remote tier is disabled
    pub remote_url: Option<PathBuf>,
}

/// Maps document identities to storage locations.
///
/// Holds only configuration; every method is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct PathResolver {
    local_docs_dir: PathBuf,
    remote_container: Option<PathBuf>,
    grammar: UuidGrammar,
}

impl PathResolver {
    pub fn new(
        local_docs_dir: impl AsRef<Path>,
        remote_container: Option<PathBuf>,
        grammar: UuidGrammar,
    ) -> Self {
        Self {
            local_docs_dir: normalize_path(local_docs_dir.as_ref()),
            remote_container: remote_container.map(|dir| normalize_path(&dir)),
            grammar,
        }
    }

    pub fn from_storage(storage: &ResolvedStorage, grammar: UuidGrammar) -> Self {
        Self::new(
            &storage.local_docs_dir,
            storage.remote_container_dir.clone(),
            grammar,
        )
    }

    pub fn grammar(&self) -> &UuidGrammar {
        &self.grammar
    }

    pub fn local_docs_dir(&self) -> &Path {
        &self.local_docs_dir
    }

    /// The remote tier exists only when a container is configured.
    pub fn is_remote_enabled(&self) -> bool {
        self.remote_container.is_some()
    }

    pub fn remote_documents_dir(&self) -> Option<PathBuf> {
        self.remote_container
            .as_ref()
            .map(|container| container.join(REMOTE_DOCUMENTS_DIR))
    }

    pub fn transaction_logs_dir(&self) -> Option<PathBuf> {
        self.remote_container
            .as_ref()
            .map(|container| container.join(REMOTE_LOGS_DIR))
    }

    /// Check the identity pair before it is allowed anywhere near the store.
    pub fn validate(&self, file_name: &str, uuid: &str) -> Result<(), CoreError> {
        self.grammar.validate(uuid)?;
        if file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains(|c: char| c == '/' || c == '\\')
        {
            return Err(CoreError::InvalidIdentifier(format!(
                "{} (file name {:?})",
                uuid, file_name
            )));
        }
        Ok(())
    }

    pub fn local_doc_url(&self, file_name: &str, uuid: &str) -> Result<PathBuf, CoreError> {
        self.validate(file_name, uuid)?;
        Ok(normalize_path(
            &self.local_docs_dir.join(document_dir_name(file_name, uuid)),
        ))
    }

    pub fn remote_doc_url(&self, file_name: &str, uuid: &str) -> Result<Option<PathBuf>, CoreError> {
        self.validate(file_name, uuid)?;
        Ok(self
            .remote_documents_dir()
            .map(|dir| normalize_path(&dir.join(document_dir_name(file_name, uuid)))))
    }

    pub fn resolve(&self, file_name: &str, uuid: &str) -> Result<ResolvedLocations, CoreError> {
        Ok(ResolvedLocations {
            local_url: self.local_doc_url(file_name, uuid)?,
            remote_url: self.remote_doc_url(file_name, uuid)?,
        })
    }

    /// Split a document directory name back into `(file_name, uuid)`.
    ///
    /// Returns None when the name has no uuid suffix or the suffix does not
    /// satisfy the grammar.
    pub fn parse_document_name(&self, name: &str) -> Option<(String, String)> {
        let (file_name, uuid) = name.rsplit_once('_')?;
        self.validate(file_name, uuid).ok()?;
        Some((file_name.to_string(), uuid.to_string()))
    }

    /// Parse the last component of a document location.
    pub fn parse_document_url(&self, url: &Path) -> Option<(String, String)> {
        let name = normalize_path(url).file_name()?.to_str()?.to_string();
        self.parse_document_name(&name)
    }

    pub fn classify(&self, url: &Path) -> Option<StorageTier> {
        let url = normalize_path(url);
        if let Some(container) = &self.remote_container {
            if url.starts_with(container) {
                return Some(StorageTier::Remote);
            }
        }
        if url.starts_with(&self.local_docs_dir) {
            return Some(StorageTier::Local);
        }
        None
    }

    pub fn is_remote_url(&self, url: &Path) -> bool {
        self.classify(url) == Some(StorageTier::Remote)
    }

    /// Options for opening the store behind `uuid`.
    pub fn store_options(&self, uuid: &str) -> StoreOptions {
        StoreOptions {
            content_name: uuid.to_string(),
            log_files_dir: self.transaction_logs_dir().map(|dir| dir.join(uuid)),
            migrate_automatically: true,
            infer_mapping: true,
        }
    }
}

fn document_dir_name(file_name: &str, uuid: &str) -> String {
    format!("{}_{}", file_name, uuid)
}
