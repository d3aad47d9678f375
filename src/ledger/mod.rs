//! Status ledger for a backup run
//!
//! The ledger owns the run and every item of the run. Workers never hold
//! item copies; they name an item by id and mutate it through the ledger.
//! Each mutation and the persist that follows happen under one lock, so a
//! snapshot on disk is never torn and at most the transition in flight is
//! lost by a crash.
//!
//! # Example
//!
//! ```rust,ignore
//! use itemvault::ledger::StatusLedger;
//!
//! let ledger = StatusLedger::new(run);
//! ledger.persist()?;
//! ledger.seed_items(items)?;
//! ledger.set_status("item-1", ItemStatus::Backing)?;
//! ```

mod document;

pub use document::{ItemRecord, RunInfo, StatusDocument};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use crate::config::paths::status_file;
use crate::error::{VaultError, VaultResult};
use crate::models::{BackupItem, BackupRun, ItemStatus, RemoteItem, RunState};
use crate::storage::file_io::write_json_atomic;

/// Run and item state guarded by the ledger lock
#[derive(Debug)]
pub struct LedgerState {
    pub run: BackupRun,
    pub items: BTreeMap<String, BackupItem>,
}

impl LedgerState {
    fn item_mut(&mut self, item_id: &str) -> VaultResult<&mut BackupItem> {
        self.items
            .get_mut(item_id)
            .ok_or_else(|| VaultError::Ledger(format!("Unknown item: {}", item_id)))
    }
}

/// Durable, incrementally updated record of one run
pub struct StatusLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

impl StatusLedger {
    /// Create a ledger for a run; the document lives in the run directory
    pub fn new(run: BackupRun) -> Self {
        Self {
            path: status_file(&run.directory),
            state: Mutex::new(LedgerState {
                run,
                items: BTreeMap::new(),
            }),
        }
    }

    /// Rebuild a ledger from a persisted document to resume the run
    ///
    /// Items that did not complete go back to `Pending` with a fresh retry
    /// budget. Completed items keep their record.
    pub fn resume(run_dir: &Path, export_suffix: &str) -> VaultResult<Self> {
        let doc = StatusDocument::load(&status_file(run_dir))?;

        let id = run_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut run = BackupRun::new(id, run_dir.to_path_buf(), doc.info.date);

        let mut items = BTreeMap::new();
        for (item_id, record) in doc.items {
            let remote = RemoteItem {
                id: item_id.clone(),
                title: record.title,
                item_type: record.item_type,
                tags: record.tags,
            };
            let mut item = BackupItem::new(remote, export_suffix);
            if record.status == ItemStatus::Complete {
                item.status = ItemStatus::Complete;
                item.retries = record.retries;
                item.backup_path = record.backup_path;
                run.backed_up_items += 1;
            }
            items.insert(item_id, item);
        }
        run.total_items = items.len();

        Ok(Self {
            path: status_file(run_dir),
            state: Mutex::new(LedgerState { run, items }),
        })
    }

    /// Path of the status document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the full current snapshot
    pub fn persist(&self) -> VaultResult<()> {
        let state = self.state.lock();
        self.write(&state)
    }

    /// Apply a mutation and persist the result before releasing the lock
    ///
    /// The mutation stays applied in memory even if the write fails; the
    /// next successful persist carries it.
    pub fn update<T>(&self, f: impl FnOnce(&mut LedgerState) -> VaultResult<T>) -> VaultResult<T> {
        let mut state = self.state.lock();
        let value = f(&mut state)?;
        self.write(&state)?;
        Ok(value)
    }

    /// Record discovered items as `Pending` and set the run total
    pub fn seed_items(&self, items: Vec<BackupItem>) -> VaultResult<()> {
        self.update(|state| {
            for item in items {
                state.items.insert(item.id().to_string(), item);
            }
            state.run.total_items = state.items.len();
            Ok(())
        })
    }

    /// Move an item to a new pipeline state
    pub fn set_status(&self, item_id: &str, status: ItemStatus) -> VaultResult<()> {
        self.update(|state| {
            state.item_mut(item_id)?.status = status;
            Ok(())
        })
    }

    /// Move an item to `Downloading` and record where it will land
    pub fn begin_download(&self, item_id: &str, destination: PathBuf) -> VaultResult<()> {
        self.update(|state| {
            let item = state.item_mut(item_id)?;
            item.status = ItemStatus::Downloading;
            item.backup_path = Some(destination);
            Ok(())
        })
    }

    /// Record the resolved path of a finished transfer
    pub fn set_backup_path(&self, item_id: &str, path: PathBuf) -> VaultResult<()> {
        self.update(|state| {
            state.item_mut(item_id)?.backup_path = Some(path);
            Ok(())
        })
    }

    /// Mark an item complete and count it towards the run
    ///
    /// Completing an item twice does not count it twice.
    pub fn mark_complete(&self, item_id: &str) -> VaultResult<()> {
        self.update(|state| {
            let item = state.item_mut(item_id)?;
            if item.status == ItemStatus::Complete {
                return Ok(());
            }
            item.status = ItemStatus::Complete;
            item.last_error = None;
            state.run.backed_up_items += 1;
            Ok(())
        })
    }

    /// Count a failed attempt and decide whether the item gets another one
    ///
    /// Returns `true` when the item should be re-enqueued. Once `max_retries`
    /// attempts have failed the item becomes `Failed` for good.
    pub fn record_failure(&self, item_id: &str, error: &str, max_retries: u32) -> VaultResult<bool> {
        self.update(|state| {
            let item = state.item_mut(item_id)?;
            if item.status.is_terminal() {
                return Ok(false);
            }
            item.retries = (item.retries + 1).min(max_retries);
            item.last_error = Some(error.to_string());
            if item.retries < max_retries {
                item.status = ItemStatus::Pending;
                Ok(true)
            } else {
                item.status = ItemStatus::Failed;
                Ok(false)
            }
        })
    }

    /// Close the run with a final state and measured size
    pub fn finalize(&self, state_after: RunState, total_size_bytes: u64) -> VaultResult<()> {
        self.update(|state| {
            state.run.state = state_after;
            state.run.total_size_bytes = total_size_bytes;
            state.run.end_time = Some(Local::now().naive_local());
            Ok(())
        })
    }

    /// Clone of one item's current state
    pub fn item(&self, item_id: &str) -> Option<BackupItem> {
        self.state.lock().items.get(item_id).cloned()
    }

    /// Clone of the run's current state
    pub fn run(&self) -> BackupRun {
        self.state.lock().run.clone()
    }

    /// Ids of items not yet in a terminal state
    pub fn pending_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .items
            .values()
            .filter(|item| !item.status.is_terminal())
            .map(|item| item.id().to_string())
            .collect()
    }

    /// Current snapshot, as it would be persisted
    pub fn snapshot(&self) -> StatusDocument {
        let state = self.state.lock();
        StatusDocument::capture(&state.run, state.items.values())
    }

    fn write(&self, state: &LedgerState) -> VaultResult<()> {
        let doc = StatusDocument::capture(&state.run, state.items.values());
        write_json_atomic(&self.path, &doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn ledger_in(dir: &Path) -> StatusLedger {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let run_dir = dir.join("backup_2024-04-01");
        fs::create_dir_all(&run_dir).unwrap();
        StatusLedger::new(BackupRun::new("backup_2024-04-01", run_dir, start))
    }

    fn item(id: &str) -> BackupItem {
        BackupItem::new(RemoteItem::new(id, id.to_uppercase(), "Web Map", ["maps"]), "_backup")
    }

    #[test]
    fn test_persist_writes_status_file() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger_in(temp.path());

        ledger.persist().unwrap();

        let doc = StatusDocument::load(ledger.path()).unwrap();
        assert_eq!(doc.info.state, RunState::Running);
        assert!(doc.items.is_empty());
    }

    #[test]
    fn test_seed_sets_total_and_pending() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger_in(temp.path());

        ledger.seed_items(vec![item("a"), item("b")]).unwrap();

        let doc = StatusDocument::load(ledger.path()).unwrap();
        assert_eq!(doc.info.total_items, 2);
        assert_eq!(doc.count_status(ItemStatus::Pending), 2);
    }

    #[test]
    fn test_every_transition_is_persisted() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger_in(temp.path());
        ledger.seed_items(vec![item("a")]).unwrap();

        ledger.set_status("a", ItemStatus::Backing).unwrap();
        let doc = StatusDocument::load(ledger.path()).unwrap();
        assert_eq!(doc.items["a"].status, ItemStatus::Backing);

        let dest = temp.path().join("maps");
        ledger.begin_download("a", dest.clone()).unwrap();
        let doc = StatusDocument::load(ledger.path()).unwrap();
        assert_eq!(doc.items["a"].status, ItemStatus::Downloading);
        assert_eq!(doc.items["a"].backup_path, Some(dest));

        ledger.mark_complete("a").unwrap();
        let doc = StatusDocument::load(ledger.path()).unwrap();
        assert_eq!(doc.items["a"].status, ItemStatus::Complete);
        assert_eq!(doc.info.backed_up_items, 1);
    }

    #[test]
    fn test_record_failure_until_exhausted() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger_in(temp.path());
        ledger.seed_items(vec![item("a")]).unwrap();

        assert!(ledger.record_failure("a", "boom 1", 3).unwrap());
        assert!(ledger.record_failure("a", "boom 2", 3).unwrap());
        assert!(!ledger.record_failure("a", "boom 3", 3).unwrap());

        let failed = ledger.item("a").unwrap();
        assert_eq!(failed.status, ItemStatus::Failed);
        assert_eq!(failed.retries, 3);
        assert_eq!(failed.last_error.as_deref(), Some("boom 3"));

        // terminal items are never handed back
        assert!(!ledger.record_failure("a", "boom 4", 3).unwrap());
        assert_eq!(ledger.item("a").unwrap().retries, 3);
    }

    #[test]
    fn test_mark_complete_counts_once() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger_in(temp.path());
        ledger.seed_items(vec![item("a")]).unwrap();

        ledger.mark_complete("a").unwrap();
        ledger.mark_complete("a").unwrap();

        assert_eq!(ledger.run().backed_up_items, 1);
    }

    #[test]
    fn test_unknown_item_is_an_error() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger_in(temp.path());

        let err = ledger.set_status("ghost", ItemStatus::Backing).unwrap_err();
        assert!(matches!(err, VaultError::Ledger(_)));
    }

    #[test]
    fn test_persist_is_byte_identical_when_unchanged() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger_in(temp.path());
        ledger
            .seed_items(vec![item("c"), item("a"), item("b")])
            .unwrap();

        ledger.persist().unwrap();
        let first = fs::read(ledger.path()).unwrap();
        ledger.persist().unwrap();
        let second = fs::read(ledger.path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_finalize_sets_success() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger_in(temp.path());
        ledger.seed_items(vec![item("a")]).unwrap();
        ledger.mark_complete("a").unwrap();

        ledger.finalize(RunState::Complete, 1234).unwrap();

        let doc = StatusDocument::load(ledger.path()).unwrap();
        assert!(doc.info.success);
        assert_eq!(doc.info.size, 1234);
        assert!(doc.info.end_date.is_some());
    }

    #[test]
    fn test_resume_resets_unfinished_items() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger_in(temp.path());
        ledger.seed_items(vec![item("a"), item("b"), item("c")]).unwrap();
        ledger.mark_complete("a").unwrap();
        ledger.record_failure("b", "boom", 1).unwrap();
        ledger.set_status("c", ItemStatus::Downloading).unwrap();

        let run_dir = ledger.run().directory;
        let resumed = StatusLedger::resume(&run_dir, "_backup").unwrap();

        let run = resumed.run();
        assert_eq!(run.total_items, 3);
        assert_eq!(run.backed_up_items, 1);
        assert_eq!(run.state, RunState::Running);

        let mut pending = resumed.pending_ids();
        pending.sort();
        assert_eq!(pending, vec!["b", "c"]);
        assert_eq!(resumed.item("b").unwrap().retries, 0);
    }
}
