//! Backup run model
//!
//! Run-level facts: which directory the run writes into, when it started and
//! ended, and the aggregate counters reported in the status document.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Items are still being processed
    #[default]
    Running,
    /// The queue drained
    Complete,
    /// Cancelled before the queue drained
    Aborted,
    /// A fatal error stopped the run
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Complete => write!(f, "Complete"),
            Self::Aborted => write!(f, "Aborted"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// A single backup run
#[derive(Debug, Clone)]
pub struct BackupRun {
    /// Run identifier: the prefix plus the rendered start timestamp
    pub id: String,
    /// Directory the run writes into
    pub directory: PathBuf,
    /// When the run started (local time)
    pub start_time: NaiveDateTime,
    /// When the run was finalized
    pub end_time: Option<NaiveDateTime>,
    /// Items seeded into the queue
    pub total_items: usize,
    /// Items that reached `Complete`
    pub backed_up_items: usize,
    /// Bytes under the run directory, measured at finalization
    pub total_size_bytes: u64,
    /// Lifecycle state
    pub state: RunState,
}

impl BackupRun {
    /// Create a run that has just started
    pub fn new(id: impl Into<String>, directory: PathBuf, start_time: NaiveDateTime) -> Self {
        Self {
            id: id.into(),
            directory,
            start_time,
            end_time: None,
            total_items: 0,
            backed_up_items: 0,
            total_size_bytes: 0,
            state: RunState::Running,
        }
    }

    /// True iff every seeded item reached `Complete`
    pub fn overall_success(&self) -> bool {
        self.state == RunState::Complete
            && self.total_items > 0
            && self.backed_up_items == self.total_items
    }
}
