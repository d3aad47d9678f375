//! Content provider interface
//!
//! The remote repository is reached only through `ContentProvider`. The
//! backup core cares about success or failure and the data returned, never
//! about sessions or transport.
//!
//! `CatalogProvider` is a directory-backed implementation used by the CLI
//! and the tests.

mod catalog;

pub use catalog::{CatalogEntry, CatalogProvider, CATALOG_FILE_NAME};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::RemoteItem;

/// Failures reported by a content provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The remote object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request failed
    #[error("Request failed: {0}")]
    Request(String),
}

/// Handle to something that can be downloaded
///
/// Either the original item or a server-side export of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// Remote identifier of the artifact
    pub id: String,
    /// Name of the artifact on the remote side
    pub name: String,
    /// Whether the artifact is an export created by this run
    pub exported: bool,
}

impl ArtifactHandle {
    /// Pass an item through unchanged
    pub fn from_item(item: &RemoteItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.title.clone(),
            exported: false,
        }
    }

    /// Handle for a freshly created export
    pub fn export(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            exported: true,
        }
    }
}

/// Outcome of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Capabilities the backup core consumes from the remote repository
///
/// Implementations are shared by every worker of the queue.
pub trait ContentProvider: Send + Sync {
    /// Items carrying any of `tags`
    fn search(&self, tags: &[String]) -> Result<Vec<RemoteItem>, ProviderError>;

    /// Materialize an item server-side under `target_title`
    fn export(&self, item: &RemoteItem, target_title: &str) -> Result<ArtifactHandle, ProviderError>;

    /// Transfer an artifact into `destination_dir`, returning the local file
    fn download(
        &self,
        artifact: &ArtifactHandle,
        destination_dir: &Path,
    ) -> Result<PathBuf, ProviderError>;

    /// Delete a remote object by name
    fn delete_by_name(&self, name: &str) -> Result<DeleteOutcome, ProviderError>;
}
