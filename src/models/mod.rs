//! Core data models for ItemVault
//!
//! This module contains the data structures shared by the pipeline, the
//! work queue and the status ledger: remote items, their per-run state, and
//! the run itself.

pub mod item;
pub mod run;

pub use item::{BackupItem, ItemStatus, RemoteItem};
pub use run::{BackupRun, RunState};
