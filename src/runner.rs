//! Backup run orchestration
//!
//! A run goes through these steps, in order:
//!
//! 1. make sure the archive root exists
//! 2. enforce retention over the existing generations
//! 3. create this run's directory and write the first status document
//! 4. search the provider, filter by type, seed the ledger
//! 5. drain the work queue
//! 6. measure the run directory and write the final status document
//!
//! Failing steps 1-3 aborts before any run directory exists. A fatal error
//! after step 3 still leaves a status document with state `failed`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use walkdir::WalkDir;

use crate::archive::{DatePattern, RetentionManager, RetentionReport};
use crate::config::Settings;
use crate::error::{VaultError, VaultResult};
use crate::ledger::StatusLedger;
use crate::models::{BackupItem, BackupRun, RemoteItem, RunState};
use crate::pipeline::{BackupPipeline, PipelineOptions};
use crate::provider::ContentProvider;
use crate::queue::{CancelToken, QueueEngine, QueueSummary};

/// Result of a finished run
#[derive(Debug)]
pub struct RunOutcome {
    /// Final run state as persisted
    pub run: BackupRun,
    /// What the work queue did
    pub summary: QueueSummary,
    /// Retention pass of this run; `None` when resuming
    pub retention: Option<RetentionReport>,
}

/// Drives backup runs against one provider
pub struct BackupRunner<'a> {
    settings: Settings,
    archive_root: PathBuf,
    provider: &'a dyn ContentProvider,
    cancel: CancelToken,
}

impl<'a> BackupRunner<'a> {
    /// Create a runner
    pub fn new(
        settings: Settings,
        archive_root: impl Into<PathBuf>,
        provider: &'a dyn ContentProvider,
    ) -> Self {
        Self {
            settings,
            archive_root: archive_root.into(),
            provider,
            cancel: CancelToken::new(),
        }
    }

    /// Token that stops the current run from taking new items
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Start a new run
    pub fn run(&self) -> VaultResult<RunOutcome> {
        self.settings.validate()?;

        fs::create_dir_all(&self.archive_root).map_err(|e| {
            VaultError::Io(format!(
                "Failed to create archive root {}: {}",
                self.archive_root.display(),
                e
            ))
        })?;

        let pattern = DatePattern::compile(&self.settings.date_format)?;
        let start = Local::now().naive_local();
        let id = pattern.directory_name(&self.settings.directory_prefix, start);
        if self.archive_root.join(&id).exists() {
            return Err(VaultError::Config(format!(
                "Run directory {} already exists; date format '{}' is too coarse to start another run now",
                id, self.settings.date_format
            )));
        }

        let retention = RetentionManager::new(
            &self.archive_root,
            &self.settings.directory_prefix,
            pattern,
            self.settings.archive_number,
        )
        .enforce()?;

        let ledger = self.create_run(id, start)?;
        log::info!("Started backup run in {}", ledger.run().directory.display());

        let items = match self.discover() {
            Ok(items) => items,
            Err(e) => return Err(self.fail(&ledger, e)),
        };

        let seeded: Vec<BackupItem> = items
            .into_iter()
            .map(|remote| BackupItem::new(remote, &self.settings.export_suffix))
            .collect();
        if let Err(e) = ledger.seed_items(seeded) {
            return Err(self.fail(&ledger, e));
        }

        let mut outcome = self.drive(&ledger)?;
        outcome.retention = Some(retention);
        Ok(outcome)
    }

    /// Continue an interrupted run from its status document
    pub fn resume(&self, run_dir: &Path) -> VaultResult<RunOutcome> {
        self.settings.validate()?;

        let ledger = StatusLedger::resume(run_dir, &self.settings.export_suffix)?;
        ledger.persist()?;
        log::info!(
            "Resuming backup run in {} ({} items left)",
            run_dir.display(),
            ledger.pending_ids().len()
        );

        self.drive(&ledger)
    }

    /// Create the run directory and write the first status document
    fn create_run(&self, id: String, start: NaiveDateTime) -> VaultResult<StatusLedger> {
        let run_dir = self.archive_root.join(&id);

        fs::create_dir(&run_dir).map_err(|e| {
            VaultError::Io(format!(
                "Failed to create run directory {}: {}",
                run_dir.display(),
                e
            ))
        })?;

        let ledger = StatusLedger::new(BackupRun::new(id, run_dir, start));
        ledger.persist()?;
        Ok(ledger)
    }

    /// Search the provider and keep the items this archive backs up
    fn discover(&self) -> VaultResult<Vec<RemoteItem>> {
        let found = self.provider.search(&self.settings.backup_tags)?;
        let total = found.len();

        let mut seen = HashSet::new();
        let items: Vec<RemoteItem> = found
            .into_iter()
            .filter(|item| self.settings.accepts_type(&item.item_type))
            .filter(|item| seen.insert(item.id.clone()))
            .collect();

        log::info!(
            "Search for [{}] returned {} items, {} selected",
            self.settings.backup_tags.join(", "),
            total,
            items.len()
        );

        if items.is_empty() {
            return Err(VaultError::NoItems {
                tags: self.settings.backup_tags.join(", "),
            });
        }
        Ok(items)
    }

    /// Drain the queue and write the final document
    fn drive(&self, ledger: &StatusLedger) -> VaultResult<RunOutcome> {
        let run_dir = ledger.run().directory;
        let pipeline = BackupPipeline::new(
            self.provider,
            ledger,
            &run_dir,
            PipelineOptions::from(&self.settings),
        );

        let engine = QueueEngine::from_settings(&self.settings);
        let summary = engine.run(ledger, ledger.pending_ids(), &pipeline, &self.cancel);

        let state = if summary.cancelled {
            RunState::Aborted
        } else {
            RunState::Complete
        };
        ledger.finalize(state, directory_size(&run_dir))?;

        let run = ledger.run();
        if run.overall_success() {
            log::info!("Backed up all {} items", run.total_items);
        } else {
            log::warn!(
                "Backed up {} of {} items",
                run.backed_up_items,
                run.total_items
            );
        }

        Ok(RunOutcome {
            run,
            summary,
            retention: None,
        })
    }

    /// Record a fatal error in the status document and hand it back
    fn fail(&self, ledger: &StatusLedger, err: VaultError) -> VaultError {
        log::error!("Backup run failed: {}", err);
        let run_dir = ledger.run().directory;
        if let Err(e) = ledger.finalize(RunState::Failed, directory_size(&run_dir)) {
            log::error!("Failed to record run failure: {}", e);
        }
        err
    }
}

/// Total size in bytes of the files under `path`
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::status_file;
    use crate::ledger::StatusDocument;
    use crate::models::ItemStatus;
    use crate::provider::{ArtifactHandle, DeleteOutcome, ProviderError};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// In-memory provider; items listed in `broken` fail every download
    struct MemoryProvider {
        items: Vec<RemoteItem>,
        broken: Vec<String>,
        downloads: Mutex<HashMap<String, u32>>,
    }

    impl MemoryProvider {
        fn new(items: Vec<RemoteItem>) -> Self {
            Self {
                items,
                broken: Vec::new(),
                downloads: Mutex::new(HashMap::new()),
            }
        }
    }

    impl ContentProvider for MemoryProvider {
        fn search(&self, tags: &[String]) -> Result<Vec<RemoteItem>, ProviderError> {
            Ok(self
                .items
                .iter()
                .filter(|i| tags.iter().any(|t| i.tags.contains(t)))
                .cloned()
                .collect())
        }

        fn export(
            &self,
            _item: &RemoteItem,
            target_title: &str,
        ) -> Result<ArtifactHandle, ProviderError> {
            Ok(ArtifactHandle::export(target_title, target_title))
        }

        fn download(
            &self,
            artifact: &ArtifactHandle,
            destination_dir: &Path,
        ) -> Result<PathBuf, ProviderError> {
            *self.downloads.lock().entry(artifact.id.clone()).or_insert(0) += 1;
            if self.broken.contains(&artifact.id) {
                return Err(ProviderError::Request("503".into()));
            }
            let path = destination_dir.join(format!("{}.json", artifact.name));
            fs::write(&path, "{}").map_err(|e| ProviderError::Request(e.to_string()))?;
            Ok(path)
        }

        fn delete_by_name(&self, _name: &str) -> Result<DeleteOutcome, ProviderError> {
            Ok(DeleteOutcome::Deleted)
        }
    }

    fn settings() -> Settings {
        Settings {
            backup_tags: vec!["backup".into()],
            directory_tags: vec!["parks".into(), "roads".into()],
            date_format: "%Y-%m-%d_%H-%M-%S".into(),
            archive_number: 2,
            max_concurrency: 2,
            max_retries: 2,
            ..Settings::default()
        }
    }

    fn run_dirs(root: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs
    }

    #[test]
    fn test_full_run() {
        let temp = TempDir::new().unwrap();
        let provider = MemoryProvider::new(vec![
            RemoteItem::new("a", "Parks", "Web Map", ["backup", "parks"]),
            RemoteItem::new("b", "Roads", "Web Map", ["backup", "roads"]),
            RemoteItem::new("c", "Other", "Web Map", ["unrelated"]),
        ]);
        let runner = BackupRunner::new(settings(), temp.path(), &provider);

        let outcome = runner.run().unwrap();

        assert!(outcome.run.overall_success());
        assert_eq!(outcome.run.total_items, 2);
        assert!(outcome.run.total_size_bytes > 0);

        let doc = StatusDocument::load(&status_file(&outcome.run.directory)).unwrap();
        assert!(doc.info.success);
        assert_eq!(doc.info.state, RunState::Complete);
        assert_eq!(doc.items["a"].status, ItemStatus::Complete);
        assert!(outcome.run.directory.join("parks").join("Parks.json").exists());
        assert!(outcome.run.directory.join("roads").join("Roads.json").exists());
    }

    #[test]
    fn test_failed_item_clears_overall_success() {
        let temp = TempDir::new().unwrap();
        let mut provider = MemoryProvider::new(vec![
            RemoteItem::new("a", "Parks", "Web Map", ["backup", "parks"]),
            RemoteItem::new("b", "Roads", "Web Map", ["backup", "roads"]),
        ]);
        provider.broken = vec!["b".into()];
        let runner = BackupRunner::new(settings(), temp.path(), &provider);

        let outcome = runner.run().unwrap();

        assert!(!outcome.run.overall_success());
        assert_eq!(outcome.run.backed_up_items, 1);
        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(provider.downloads.lock()["b"], 2);

        let doc = StatusDocument::load(&status_file(&outcome.run.directory)).unwrap();
        assert!(!doc.info.success);
        assert_eq!(doc.items["b"].status, ItemStatus::Failed);
        assert_eq!(doc.items["b"].retries, 2);
    }

    #[test]
    fn test_no_items_aborts_with_status_document() {
        let temp = TempDir::new().unwrap();
        let provider = MemoryProvider::new(vec![RemoteItem::new("c", "Other", "Web Map", ["unrelated"])]);
        let runner = BackupRunner::new(settings(), temp.path(), &provider);

        let err = runner.run().unwrap_err();
        assert!(matches!(err, VaultError::NoItems { .. }));

        let dirs = run_dirs(temp.path());
        assert_eq!(dirs.len(), 1);
        let contents: Vec<_> = fs::read_dir(&dirs[0]).unwrap().collect();
        assert_eq!(contents.len(), 1);

        let doc = StatusDocument::load(&status_file(&dirs[0])).unwrap();
        assert_eq!(doc.info.state, RunState::Failed);
        assert!(doc.items.is_empty());
    }

    #[test]
    fn test_type_filter_applies_before_seeding() {
        let temp = TempDir::new().unwrap();
        let provider = MemoryProvider::new(vec![
            RemoteItem::new("a", "Parks", "Web Map", ["backup"]),
            RemoteItem::new("b", "Roads", "Feature Service", ["backup"]),
        ]);
        let mut settings = settings();
        settings.backup_types = vec!["Feature Service".into()];
        let runner = BackupRunner::new(settings, temp.path(), &provider);

        let outcome = runner.run().unwrap();

        assert_eq!(outcome.run.total_items, 1);
        let doc = StatusDocument::load(&status_file(&outcome.run.directory)).unwrap();
        assert!(doc.items.contains_key("b"));
        assert!(!doc.items.contains_key("a"));
    }

    #[test]
    fn test_retention_runs_before_new_directory() {
        let temp = TempDir::new().unwrap();
        for name in [
            "backup_2024-01-01_00-00-00",
            "backup_2024-02-01_00-00-00",
            "backup_2024-03-01_00-00-00",
        ] {
            fs::create_dir_all(temp.path().join(name)).unwrap();
        }
        let provider = MemoryProvider::new(vec![RemoteItem::new("a", "Parks", "Web Map", ["backup"])]);
        let runner = BackupRunner::new(settings(), temp.path(), &provider);

        let outcome = runner.run().unwrap();

        let retention = outcome.retention.unwrap();
        assert_eq!(
            retention.evicted,
            vec![temp.path().join("backup_2024-01-01_00-00-00")]
        );
        let dirs = run_dirs(temp.path());
        assert_eq!(dirs.len(), 3);
        assert!(dirs.contains(&outcome.run.directory));
        assert!(dirs.contains(&temp.path().join("backup_2024-02-01_00-00-00")));
    }

    #[test]
    fn test_second_run_in_same_period_is_rejected_before_retention() {
        let temp = TempDir::new().unwrap();
        for name in ["backup_2024-01-01", "backup_2024-02-01"] {
            fs::create_dir_all(temp.path().join(name)).unwrap();
        }
        let provider = MemoryProvider::new(vec![RemoteItem::new("a", "Parks", "Web Map", ["backup"])]);
        let mut settings = settings();
        settings.date_format = "%Y-%m-%d".into();
        settings.archive_number = 1;

        let first = BackupRunner::new(settings.clone(), temp.path(), &provider)
            .run()
            .unwrap();
        assert!(first.run.overall_success());
        assert!(temp.path().join("backup_2024-02-01").exists());

        let err = BackupRunner::new(settings, temp.path(), &provider)
            .run()
            .unwrap_err();

        assert!(err.is_config());
        assert!(err.to_string().contains("already exists"));
        // nothing evicted, the earlier run untouched
        assert!(temp.path().join("backup_2024-02-01").exists());
        let doc = StatusDocument::load(&status_file(&first.run.directory)).unwrap();
        assert_eq!(doc.info.state, RunState::Complete);
    }

    #[test]
    fn test_resume_finishes_remaining_items() {
        let temp = TempDir::new().unwrap();
        let mut provider = MemoryProvider::new(vec![
            RemoteItem::new("a", "Parks", "Web Map", ["backup", "parks"]),
            RemoteItem::new("b", "Roads", "Web Map", ["backup", "roads"]),
        ]);
        provider.broken = vec!["b".into()];
        let first = BackupRunner::new(settings(), temp.path(), &provider)
            .run()
            .unwrap();
        assert!(!first.run.overall_success());

        provider.broken.clear();
        let resumed = BackupRunner::new(settings(), temp.path(), &provider)
            .resume(&first.run.directory)
            .unwrap();

        assert!(resumed.run.overall_success());
        assert_eq!(resumed.summary.attempts, 1);
        assert_eq!(provider.downloads.lock()["a"], 1);
    }

    #[test]
    fn test_cancelled_run_is_aborted() {
        let temp = TempDir::new().unwrap();
        let provider = MemoryProvider::new(vec![RemoteItem::new("a", "Parks", "Web Map", ["backup"])]);
        let runner = BackupRunner::new(settings(), temp.path(), &provider);
        runner.cancel_token().cancel();

        let outcome = runner.run().unwrap();

        assert_eq!(outcome.run.state, RunState::Aborted);
        assert!(!outcome.run.overall_success());
        let doc = StatusDocument::load(&status_file(&outcome.run.directory)).unwrap();
        assert_eq!(doc.info.state, RunState::Aborted);
        assert_eq!(doc.items["a"].status, ItemStatus::Pending);
    }

    #[test]
    fn test_invalid_settings_rejected_before_any_work() {
        let temp = TempDir::new().unwrap();
        let provider = MemoryProvider::new(Vec::new());
        let mut settings = settings();
        settings.max_retries = 0;
        let runner = BackupRunner::new(settings, temp.path().join("archive"), &provider);

        assert!(runner.run().unwrap_err().is_config());
        assert!(!temp.path().join("archive").exists());
    }

    #[test]
    fn test_directory_size() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::write(temp.path().join("a").join("one"), [0u8; 10]).unwrap();
        fs::write(temp.path().join("two"), [0u8; 5]).unwrap();

        assert_eq!(directory_size(temp.path()), 15);
    }
}
