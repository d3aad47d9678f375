//! Backup item model
//!
//! A `RemoteItem` is what the content provider reports for one search hit.
//! A `BackupItem` is that item's state inside one run: where it is in the
//! pipeline, how many attempts it has used, and where it landed.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline state of a backup item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting in the queue
    #[default]
    Pending,
    /// Picked up by a worker, destination being resolved
    Backing,
    /// Server-side export requested
    Exporting,
    /// Artifact being transferred to the archive
    Downloading,
    /// Stored in the archive
    Complete,
    /// Retries exhausted
    Failed,
}

impl ItemStatus {
    /// Whether the item will never be processed again in this run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Backing => write!(f, "Backing"),
            Self::Exporting => write!(f, "Exporting"),
            Self::Downloading => write!(f, "Downloading"),
            Self::Complete => write!(f, "Complete"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// An item as reported by the content provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Remote identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Remote item type, e.g. "Feature Service"
    #[serde(rename = "type")]
    pub item_type: String,
    /// Tags attached to the item
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl RemoteItem {
    /// Create a new remote item
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        item_type: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            item_type: item_type.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// One item's state within a backup run
#[derive(Debug, Clone)]
pub struct BackupItem {
    /// The item as the provider reported it
    pub remote: RemoteItem,
    /// Title used for a server-side export copy, unique per run
    pub export_filename: String,
    /// Pipeline state
    pub status: ItemStatus,
    /// Failed attempts so far
    pub retries: u32,
    /// Description of the most recent failure
    pub last_error: Option<String>,
    /// Local destination, recorded before the transfer starts
    pub backup_path: Option<PathBuf>,
}

impl BackupItem {
    /// Start tracking a remote item
    ///
    /// The export filename gets a random token so it cannot collide with an
    /// export left behind by an earlier run. It is always a single path
    /// component, whatever the title contains.
    pub fn new(remote: RemoteItem, export_suffix: &str) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        let export_filename = format!(
            "{}{}_{}",
            file_name_safe(&remote.title),
            file_name_safe(export_suffix),
            &token[..8]
        );
        Self {
            remote,
            export_filename,
            status: ItemStatus::Pending,
            retries: 0,
            last_error: None,
            backup_path: None,
        }
    }

    /// Remote identifier
    pub fn id(&self) -> &str {
        &self.remote.id
    }

    /// Whether the item reached terminal success
    pub fn is_complete(&self) -> bool {
        self.status == ItemStatus::Complete
    }
}

/// Replace characters that would make `s` more than one path component
fn file_name_safe(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
