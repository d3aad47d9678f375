//! Per-item backup pipeline
//!
//! One attempt for one item walks
//! `Pending -> Backing -> (Exporting) -> Downloading`, and every transition
//! is written to the ledger before the next step starts. The attempt
//! returns to the work queue as success or as an `ItemError`; the queue owns
//! the retry decision and the final `Complete`/`Failed` state.

mod classify;

pub use classify::{classify_destination, Classification};

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::{ItemError, VaultResult};
use crate::ledger::StatusLedger;
use crate::models::ItemStatus;
use crate::provider::{ArtifactHandle, ContentProvider, DeleteOutcome};
use crate::queue::ItemProcessor;

/// Settings the pipeline consults for every item
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub directory_tags: Vec<String>,
    pub uncategorized_tag: String,
    pub export_types: Vec<String>,
    pub delete_exports: bool,
}

impl From<&Settings> for PipelineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            directory_tags: settings.directory_tags.clone(),
            uncategorized_tag: settings.uncategorized_tag.clone(),
            export_types: settings.export_types.clone(),
            delete_exports: settings.delete_exports,
        }
    }
}

/// Runs single backup attempts against a provider
pub struct BackupPipeline<'a> {
    provider: &'a dyn ContentProvider,
    ledger: &'a StatusLedger,
    run_dir: PathBuf,
    options: PipelineOptions,
}

impl<'a> BackupPipeline<'a> {
    /// Create a pipeline writing into `run_dir`
    pub fn new(
        provider: &'a dyn ContentProvider,
        ledger: &'a StatusLedger,
        run_dir: impl Into<PathBuf>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            provider,
            ledger,
            run_dir: run_dir.into(),
            options,
        }
    }

    /// Run one attempt for an item, returning the local file on success
    pub fn back_up(&self, item_id: &str) -> Result<PathBuf, ItemError> {
        let item = self
            .ledger
            .item(item_id)
            .ok_or_else(|| ItemError::Untracked(item_id.to_string()))?;

        self.record(item_id, self.ledger.set_status(item_id, ItemStatus::Backing));

        let classification = classify_destination(
            &item.remote.tags,
            &self.options.directory_tags,
            &self.options.uncategorized_tag,
        );
        match &classification {
            Classification::Matched(_) => {}
            Classification::Uncategorized(tag) => log::warn!(
                "'{}' ({}) carries no directory tag, filing under '{}'",
                item.remote.title,
                item_id,
                tag
            ),
            Classification::Ambiguous { chosen, matches } => log::warn!(
                "'{}' ({}) matches directory tags {:?}, filing under '{}'",
                item.remote.title,
                item_id,
                matches,
                chosen
            ),
        }

        let destination = self.run_dir.join(classification.tag());
        ensure_directory(&destination)?;

        let artifact = if self.requires_export(&item.remote.item_type) {
            self.record(item_id, self.ledger.set_status(item_id, ItemStatus::Exporting));
            log::debug!("Exporting '{}' as '{}'", item.remote.title, item.export_filename);
            self.provider
                .export(&item.remote, &item.export_filename)
                .map_err(ItemError::Export)?
        } else {
            ArtifactHandle::from_item(&item.remote)
        };

        let result = self.download(item_id, &artifact, &destination);

        if artifact.exported && self.options.delete_exports {
            self.remove_export(&artifact.name);
        }

        result
    }

    fn download(
        &self,
        item_id: &str,
        artifact: &ArtifactHandle,
        destination: &Path,
    ) -> Result<PathBuf, ItemError> {
        self.record(
            item_id,
            self.ledger.begin_download(item_id, destination.to_path_buf()),
        );

        let path = self
            .provider
            .download(artifact, destination)
            .map_err(ItemError::Download)?;

        self.record(item_id, self.ledger.set_backup_path(item_id, path.clone()));
        Ok(path)
    }

    /// Best-effort removal of a server-side export copy
    fn remove_export(&self, name: &str) {
        match self.provider.delete_by_name(name) {
            Ok(DeleteOutcome::Deleted) => log::debug!("Deleted remote export '{}'", name),
            Ok(DeleteOutcome::NotFound) => {
                log::warn!("Remote export '{}' was already gone", name)
            }
            Err(e) => log::warn!("Failed to delete remote export '{}': {}", name, e),
        }
    }

    fn requires_export(&self, item_type: &str) -> bool {
        self.options.export_types.iter().any(|t| t == item_type)
    }

    fn record(&self, item_id: &str, result: VaultResult<()>) {
        if let Err(e) = result {
            log::error!("Failed to persist status of {}: {}", item_id, e);
        }
    }
}

impl ItemProcessor for BackupPipeline<'_> {
    fn process(&self, item_id: &str) -> Result<(), ItemError> {
        let path = self.back_up(item_id)?;
        log::info!("Backed up {} to {}", item_id, path.display());
        Ok(())
    }
}

/// Create a destination directory; another worker creating it first is fine
fn ensure_directory(path: &Path) -> Result<(), ItemError> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(ItemError::Destination {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}
