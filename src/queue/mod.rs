//! Work-queue engine
//!
//! A fixed pool of worker threads drains one shared `WorkQueue` of item ids.
//! Each worker hands an item to an `ItemProcessor`, then applies the retry
//! policy through the ledger:
//!
//! - success: the item becomes `Complete` and counts towards the run
//! - failure with attempts left: the item goes back to the end of the queue
//! - failure with no attempts left: the item becomes `Failed` and is dropped
//!
//! Each worker pauses `request_delay` between two items. With a single
//! worker this is a global rate limit.
//!
//! A processor that panics fails that attempt like any other error; the
//! worker keeps running.

mod work_queue;

pub use work_queue::{CancelToken, WorkQueue};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::Settings;
use crate::error::ItemError;
use crate::ledger::StatusLedger;
use crate::models::ItemStatus;

/// Runs one attempt for one item
pub trait ItemProcessor: Sync {
    fn process(&self, item_id: &str) -> Result<(), ItemError>;
}

/// Run one attempt; a panicking processor counts as a failed attempt
fn attempt<P: ItemProcessor>(processor: &P, item_id: &str) -> Result<(), ItemError> {
    panic::catch_unwind(AssertUnwindSafe(|| processor.process(item_id))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ItemError::Panicked(message))
    })
}

/// What a queue run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSummary {
    /// Items that reached `Complete`
    pub completed: usize,
    /// Items that exhausted their retries
    pub failed: usize,
    /// Pipeline invocations, retries included
    pub attempts: usize,
    /// Whether cancellation stopped the run before it drained
    pub cancelled: bool,
}

/// Bounded-concurrency driver for the backup pipeline
#[derive(Debug, Clone)]
pub struct QueueEngine {
    max_concurrency: usize,
    request_delay: Duration,
    max_retries: u32,
}

impl QueueEngine {
    pub fn new(max_concurrency: usize, request_delay: Duration, max_retries: u32) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            request_delay,
            max_retries: max_retries.max(1),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.max_concurrency,
            settings.request_delay(),
            settings.max_retries,
        )
    }

    /// Process every item until the queue drains or `cancel` is set
    ///
    /// Blocks until every dispatched attempt has returned.
    pub fn run<P: ItemProcessor>(
        &self,
        ledger: &StatusLedger,
        item_ids: Vec<String>,
        processor: &P,
        cancel: &CancelToken,
    ) -> QueueSummary {
        let workers = self.max_concurrency.min(item_ids.len()).max(1);
        let queue = WorkQueue::new(item_ids);

        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let attempts = AtomicUsize::new(0);

        log::info!(
            "Processing {} items with {} workers (max {} attempts each)",
            queue.len(),
            workers,
            self.max_retries
        );

        thread::scope(|scope| {
            for worker in 0..workers {
                let queue = &queue;
                let (completed, failed, attempts) = (&completed, &failed, &attempts);
                scope.spawn(move || {
                    let mut first = true;
                    while let Some(item_id) = queue.pop(cancel) {
                        if !first && !self.request_delay.is_zero() {
                            thread::sleep(self.request_delay);
                        }
                        first = false;

                        attempts.fetch_add(1, Ordering::Relaxed);
                        log::trace!("worker {} picked {}", worker, item_id);

                        match attempt(processor, &item_id) {
                            Ok(()) => {
                                if let Err(e) = ledger.mark_complete(&item_id) {
                                    log::error!("Failed to persist completion of {}: {}", item_id, e);
                                }
                                completed.fetch_add(1, Ordering::Relaxed);
                                queue.task_done(None);
                            }
                            Err(err) => {
                                if self.retry_after_failure(ledger, &item_id, &err) {
                                    queue.task_done(Some(item_id));
                                } else {
                                    failed.fetch_add(1, Ordering::Relaxed);
                                    queue.task_done(None);
                                }
                            }
                        }
                    }
                });
            }
        });

        let summary = QueueSummary {
            completed: completed.into_inner(),
            failed: failed.into_inner(),
            attempts: attempts.into_inner(),
            cancelled: cancel.is_cancelled() && !queue.is_drained(),
        };
        log::info!(
            "Queue finished: {} complete, {} failed, {} attempts{}",
            summary.completed,
            summary.failed,
            summary.attempts,
            if summary.cancelled { " (cancelled)" } else { "" }
        );
        summary
    }

    /// Count a failed attempt; `true` when the item should run again
    fn retry_after_failure(&self, ledger: &StatusLedger, item_id: &str, err: &ItemError) -> bool {
        let retry = match ledger.record_failure(item_id, &err.to_string(), self.max_retries) {
            Ok(retry) => retry,
            Err(e) => {
                log::error!("Failed to persist failure of {}: {}", item_id, e);
                // the in-memory decision survives a failed write
                ledger
                    .item(item_id)
                    .map_or(false, |item| item.status == ItemStatus::Pending)
            }
        };

        let retries = ledger.item(item_id).map_or(0, |item| item.retries);
        if retry {
            log::warn!(
                "Attempt {}/{} for {} failed, requeueing: {}",
                retries,
                self.max_retries,
                item_id,
                err
            );
        } else {
            log::error!(
                "Giving up on {} after {} attempts: {}",
                item_id,
                retries,
                err
            );
        }
        retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackupItem, BackupRun, RemoteItem, RunState};
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;

    /// Fails each item a fixed number of times before succeeding
    struct FlakyProcessor {
        failures_before_success: HashMap<String, u32>,
        seen: Mutex<HashMap<String, u32>>,
    }

    impl FlakyProcessor {
        fn new(plan: &[(&str, u32)]) -> Self {
            Self {
                failures_before_success: plan.iter().map(|(id, n)| (id.to_string(), *n)).collect(),
                seen: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self, id: &str) -> u32 {
            self.seen.lock().get(id).copied().unwrap_or(0)
        }
    }

    impl ItemProcessor for FlakyProcessor {
        fn process(&self, item_id: &str) -> Result<(), ItemError> {
            let mut seen = self.seen.lock();
            let count = seen.entry(item_id.to_string()).or_insert(0);
            *count += 1;
            let allowed = self.failures_before_success.get(item_id).copied().unwrap_or(0);
            if *count <= allowed {
                Err(ItemError::Destination {
                    path: item_id.to_string(),
                    reason: format!("attempt {}", count),
                })
            } else {
                Ok(())
            }
        }
    }

    /// Always succeeds, after a short pause to overlap workers
    struct SlowProcessor;

    impl ItemProcessor for SlowProcessor {
        fn process(&self, _item_id: &str) -> Result<(), ItemError> {
            thread::sleep(Duration::from_millis(2));
            Ok(())
        }
    }

    fn ledger_with(dir: &Path, ids: &[String]) -> StatusLedger {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let run_dir = dir.join("backup_2024-04-01");
        let ledger = StatusLedger::new(BackupRun::new("backup_2024-04-01", run_dir, start));
        ledger
            .seed_items(
                ids.iter()
                    .map(|id| BackupItem::new(RemoteItem::new(id.as_str(), id.as_str(), "Web Map", ["t"]), "_b"))
                    .collect(),
            )
            .unwrap();
        ledger
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("item-{:02}", i)).collect()
    }

    #[test]
    fn test_succeeds_on_last_attempt() {
        let temp = TempDir::new().unwrap();
        let ids = vec!["a".to_string()];
        let ledger = ledger_with(temp.path(), &ids);
        let processor = FlakyProcessor::new(&[("a", 2)]);

        let summary = QueueEngine::new(1, Duration::ZERO, 3).run(&ledger, ids, &processor, &CancelToken::new());

        let item = ledger.item("a").unwrap();
        assert_eq!(item.status, ItemStatus::Complete);
        assert_eq!(item.retries, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.attempts, 3);
    }

    #[test]
    fn test_exhausted_item_fails_without_blocking_others() {
        let temp = TempDir::new().unwrap();
        let ids = vec!["bad".to_string(), "good".to_string()];
        let ledger = ledger_with(temp.path(), &ids);
        let processor = FlakyProcessor::new(&[("bad", u32::MAX)]);

        let summary = QueueEngine::new(2, Duration::ZERO, 3).run(&ledger, ids, &processor, &CancelToken::new());

        let bad = ledger.item("bad").unwrap();
        assert_eq!(bad.status, ItemStatus::Failed);
        assert_eq!(bad.retries, 3);
        assert!(bad.last_error.is_some());
        assert_eq!(processor.calls("bad"), 3);
        assert_eq!(ledger.item("good").unwrap().status, ItemStatus::Complete);
        assert_eq!(summary, QueueSummary { completed: 1, failed: 1, attempts: 4, cancelled: false });
        assert_eq!(ledger.run().backed_up_items, 1);
    }

    #[test]
    fn test_concurrent_counter_has_no_lost_updates() {
        let temp = TempDir::new().unwrap();
        let ids = ids(40);
        let ledger = ledger_with(temp.path(), &ids);

        let summary = QueueEngine::new(4, Duration::ZERO, 3).run(&ledger, ids.clone(), &SlowProcessor, &CancelToken::new());

        assert_eq!(summary.completed, 40);
        assert_eq!(ledger.run().backed_up_items, 40);
        for id in &ids {
            assert_eq!(ledger.item(id).unwrap().status, ItemStatus::Complete);
        }
        let doc = ledger.snapshot();
        assert_eq!(doc.info.backed_up_items, 40);
    }

    #[test]
    fn test_retries_interleave_with_concurrency() {
        let temp = TempDir::new().unwrap();
        let ids = ids(12);
        let ledger = ledger_with(temp.path(), &ids);
        let plan: Vec<(&str, u32)> = ids.iter().map(|id| (id.as_str(), 1)).collect();
        let processor = FlakyProcessor::new(&plan);

        let summary = QueueEngine::new(4, Duration::ZERO, 2).run(&ledger, ids.clone(), &processor, &CancelToken::new());

        assert_eq!(summary.completed, 12);
        assert_eq!(summary.attempts, 24);
        for id in &ids {
            assert_eq!(ledger.item(id).unwrap().retries, 1);
        }
    }

    #[test]
    fn test_cancelled_before_start_processes_nothing() {
        let temp = TempDir::new().unwrap();
        let ids = ids(5);
        let ledger = ledger_with(temp.path(), &ids);
        let cancel = CancelToken::new();
        cancel.cancel();

        let summary = QueueEngine::new(2, Duration::ZERO, 3).run(&ledger, ids, &SlowProcessor, &cancel);

        assert_eq!(summary.attempts, 0);
        assert!(summary.cancelled);
        assert_eq!(ledger.run().state, RunState::Running);
    }

    #[test]
    fn test_cancel_mid_run_lets_in_flight_finish() {
        struct CancelAfterFirst<'a> {
            cancel: &'a CancelToken,
        }

        impl ItemProcessor for CancelAfterFirst<'_> {
            fn process(&self, _item_id: &str) -> Result<(), ItemError> {
                self.cancel.cancel();
                Ok(())
            }
        }

        let temp = TempDir::new().unwrap();
        let ids = ids(5);
        let ledger = ledger_with(temp.path(), &ids);
        let cancel = CancelToken::new();
        let processor = CancelAfterFirst { cancel: &cancel };

        let summary = QueueEngine::new(1, Duration::ZERO, 3).run(&ledger, ids, &processor, &cancel);

        assert_eq!(summary.completed, 1);
        assert!(summary.cancelled);
        assert_eq!(ledger.pending_ids().len(), 4);
    }

    #[test]
    fn test_panicking_attempt_is_a_failure() {
        struct PanicsOnA;

        impl ItemProcessor for PanicsOnA {
            fn process(&self, item_id: &str) -> Result<(), ItemError> {
                if item_id == "a" {
                    panic!("provider blew up");
                }
                thread::sleep(Duration::from_millis(200));
                Ok(())
            }
        }

        let temp = TempDir::new().unwrap();
        let ids = vec!["a".to_string(), "b".to_string()];
        let ledger = ledger_with(temp.path(), &ids);

        let summary = QueueEngine::new(2, Duration::ZERO, 2).run(&ledger, ids, &PanicsOnA, &CancelToken::new());

        assert_eq!(summary, QueueSummary { completed: 1, failed: 1, attempts: 3, cancelled: false });
        let a = ledger.item("a").unwrap();
        assert_eq!(a.status, ItemStatus::Failed);
        assert!(a.last_error.unwrap().contains("provider blew up"));
        assert_eq!(ledger.item("b").unwrap().status, ItemStatus::Complete);
    }

    #[test]
    fn test_no_delay_after_last_item() {
        let temp = TempDir::new().unwrap();
        let ids = ids(1);
        let ledger = ledger_with(temp.path(), &ids);

        let started = std::time::Instant::now();
        QueueEngine::new(1, Duration::from_millis(300), 1).run(&ledger, ids, &SlowProcessor, &CancelToken::new());

        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn test_request_delay_spaces_items() {
        let temp = TempDir::new().unwrap();
        let ids = ids(3);
        let ledger = ledger_with(temp.path(), &ids);

        let started = std::time::Instant::now();
        QueueEngine::new(1, Duration::from_millis(30), 1).run(&ledger, ids, &SlowProcessor, &CancelToken::new());

        // two pauses between three items on a single worker
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
