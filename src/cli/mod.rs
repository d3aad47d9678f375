//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the backup runner.

pub mod interrupt;
pub mod prune;
pub mod run;
pub mod status;

pub use prune::{handle_prune_command, PruneArgs};
pub use run::{handle_run_command, RunArgs};
pub use status::{handle_status_command, StatusArgs};
