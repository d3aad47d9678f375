//! Directory-backed content provider
//!
//! A catalog directory holds `catalog.json`, a list of items with the file
//! that holds each item's content:
//!
//! ```json
//! [
//!   { "id": "a1", "title": "Parks", "type": "Web Map",
//!     "tags": ["parks"], "file": "parks.json" }
//! ]
//! ```
//!
//! Exports are copies written to `exports/` under the export title, and
//! deleting by name removes those copies.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ArtifactHandle, ContentProvider, DeleteOutcome, ProviderError};
use crate::error::{VaultError, VaultResult};
use crate::models::RemoteItem;
use crate::storage::file_io::read_json_required;

/// File name of the catalog index
pub const CATALOG_FILE_NAME: &str = "catalog.json";

const EXPORT_DIR: &str = "exports";
const EXPORT_ID_PREFIX: &str = "export:";

/// One catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Content file, relative to the catalog directory
    pub file: PathBuf,
}

impl CatalogEntry {
    fn to_remote(&self) -> RemoteItem {
        RemoteItem {
            id: self.id.clone(),
            title: self.title.clone(),
            item_type: self.item_type.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Content provider reading from a local catalog directory
pub struct CatalogProvider {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl CatalogProvider {
    /// Open a catalog directory
    pub fn open(root: impl Into<PathBuf>) -> VaultResult<Self> {
        let root = root.into();
        let entries: Vec<CatalogEntry> = read_json_required(root.join(CATALOG_FILE_NAME))
            .map_err(|e| VaultError::Config(format!("Invalid catalog {}: {}", root.display(), e)))?;
        log::debug!("Opened catalog {} with {} items", root.display(), entries.len());
        Ok(Self { root, entries })
    }

    fn export_dir(&self) -> PathBuf {
        self.root.join(EXPORT_DIR)
    }

    /// Path of an export copy; the name must stay inside `exports/`
    fn export_path(&self, name: &str) -> Result<PathBuf, ProviderError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.export_dir().join(name)),
            _ => Err(ProviderError::Request(format!(
                "Invalid export name '{}'",
                name
            ))),
        }
    }

    fn entry(&self, id: &str) -> Result<&CatalogEntry, ProviderError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }
}

impl ContentProvider for CatalogProvider {
    fn search(&self, tags: &[String]) -> Result<Vec<RemoteItem>, ProviderError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| tags.is_empty() || tags.iter().any(|t| e.tags.contains(t)))
            .map(CatalogEntry::to_remote)
            .collect())
    }

    fn export(&self, item: &RemoteItem, target_title: &str) -> Result<ArtifactHandle, ProviderError> {
        let entry = self.entry(&item.id)?;
        let target = self.export_path(target_title)?;
        fs::create_dir_all(self.export_dir())
            .map_err(|e| ProviderError::Request(format!("Failed to prepare export: {}", e)))?;

        fs::copy(self.root.join(&entry.file), target)
            .map_err(|e| ProviderError::Request(format!("Export of {} failed: {}", item.id, e)))?;

        Ok(ArtifactHandle::export(
            format!("{}{}", EXPORT_ID_PREFIX, target_title),
            target_title,
        ))
    }

    fn download(
        &self,
        artifact: &ArtifactHandle,
        destination_dir: &Path,
    ) -> Result<PathBuf, ProviderError> {
        let source = if artifact.id.starts_with(EXPORT_ID_PREFIX) {
            self.export_path(&artifact.name)?
        } else {
            self.root.join(&self.entry(&artifact.id)?.file)
        };

        let file_name = source
            .file_name()
            .ok_or_else(|| ProviderError::NotFound(artifact.name.clone()))?;
        let target = destination_dir.join(file_name);

        fs::copy(&source, &target).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProviderError::NotFound(artifact.name.clone()),
            _ => ProviderError::Request(format!("Download of {} failed: {}", artifact.name, e)),
        })?;

        Ok(target)
    }

    fn delete_by_name(&self, name: &str) -> Result<DeleteOutcome, ProviderError> {
        match fs::remove_file(self.export_path(name)?) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(ProviderError::Request(format!(
                "Failed to delete {}: {}",
                name, e
            ))),
        }
    }
}
