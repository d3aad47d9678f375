//! Persisted status document
//!
//! One JSON object per run, written to `status.json` in the run directory:
//!
//! ```json
//! {
//!   "info": { "date", "directory", "success", "total items",
//!             "backed up items", "size", "state", "end date" },
//!   "items": {
//!     "<itemId>": { "title", "type", "tags", "status",
//!                   "success", "retries", "error", "backup_path" }
//!   }
//! }
//! ```
//!
//! Items are keyed in a sorted map and tags are a sorted set, so the same
//! snapshot always serializes to the same bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::VaultResult;
use crate::models::{BackupItem, BackupRun, ItemStatus, RunState};
use crate::storage::file_io::read_json_required;

/// Run section of the status document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// Run start time
    pub date: NaiveDateTime,
    /// Run directory
    pub directory: PathBuf,
    /// True iff every seeded item completed
    pub success: bool,
    #[serde(rename = "total items")]
    pub total_items: usize,
    #[serde(rename = "backed up items")]
    pub backed_up_items: usize,
    /// Bytes under the run directory at finalization
    pub size: u64,
    #[serde(default)]
    pub state: RunState,
    #[serde(rename = "end date", default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDateTime>,
}

/// Item section entry of the status document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub status: ItemStatus,
    pub success: bool,
    pub retries: u32,
    pub error: Option<String>,
    pub backup_path: Option<PathBuf>,
}

/// Full snapshot of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub info: RunInfo,
    pub items: BTreeMap<String, ItemRecord>,
}

impl StatusDocument {
    /// Build a snapshot from live run state
    pub fn capture<'a>(run: &BackupRun, items: impl Iterator<Item = &'a BackupItem>) -> Self {
        let info = RunInfo {
            date: run.start_time,
            directory: run.directory.clone(),
            success: run.overall_success(),
            total_items: run.total_items,
            backed_up_items: run.backed_up_items,
            size: run.total_size_bytes,
            state: run.state,
            end_date: run.end_time,
        };

        let items = items
            .map(|item| {
                let record = ItemRecord {
                    title: item.remote.title.clone(),
                    item_type: item.remote.item_type.clone(),
                    tags: item.remote.tags.clone(),
                    status: item.status,
                    success: item.is_complete(),
                    retries: item.retries,
                    error: item.last_error.clone(),
                    backup_path: item.backup_path.clone(),
                };
                (item.remote.id.clone(), record)
            })
            .collect();

        Self { info, items }
    }

    /// Load a status document from disk
    pub fn load(path: &Path) -> VaultResult<Self> {
        read_json_required(path)
    }

    /// Number of items in a given status
    pub fn count_status(&self, status: ItemStatus) -> usize {
        self.items.values().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteItem;
    use chrono::NaiveDate;

    fn run() -> BackupRun {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        BackupRun::new("backup_2024-04-01", PathBuf::from("/archive/backup_2024-04-01"), start)
    }

    #[test]
    fn test_schema_keys() {
        let mut item = BackupItem::new(
            RemoteItem::new("id-1", "Parks", "Web Map", ["parks"]),
            "_backup",
        );
        item.retries = 1;
        item.last_error = Some("timeout".into());

        let doc = StatusDocument::capture(&run(), [&item].into_iter());
        let json = serde_json::to_value(&doc).unwrap();

        let info = &json["info"];
        for key in ["date", "directory", "success", "total items", "backed up items", "size"] {
            assert!(info.get(key).is_some(), "missing info key {}", key);
        }
        assert!(info.get("end date").is_none());

        let record = &json["items"]["id-1"];
        for key in ["title", "type", "tags", "status", "success", "retries", "error", "backup_path"] {
            assert!(record.get(key).is_some(), "missing item key {}", key);
        }
        assert_eq!(record["status"], "pending");
        assert_eq!(record["error"], "timeout");
        assert!(record["backup_path"].is_null());
    }

    #[test]
    fn test_count_status() {
        let mut done = BackupItem::new(RemoteItem::new("a", "A", "Web Map", ["x"]), "_b");
        done.status = ItemStatus::Complete;
        let waiting = BackupItem::new(RemoteItem::new("b", "B", "Web Map", ["x"]), "_b");

        let doc = StatusDocument::capture(&run(), [&done, &waiting].into_iter());
        assert_eq!(doc.count_status(ItemStatus::Complete), 1);
        assert_eq!(doc.count_status(ItemStatus::Pending), 1);
        assert!(doc.items["a"].success);
        assert!(!doc.items["b"].success);
    }
}
