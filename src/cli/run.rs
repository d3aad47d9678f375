//! Run CLI command
//!
//! Starts a backup run (or resumes one) against the local catalog provider.

use std::path::PathBuf;

use clap::Args;

use super::interrupt::cancel_on_interrupt;
use crate::config::Settings;
use crate::display::{format_retention_report, format_size};
use crate::error::{VaultError, VaultResult};
use crate::models::RunState;
use crate::provider::CatalogProvider;
use crate::runner::{BackupRunner, RunOutcome};

/// Arguments of `itemvault run`
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Catalog directory to back up (overrides `catalog_dir`)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Resume the run stored in this directory instead of starting a new one
    #[arg(long)]
    pub resume: Option<PathBuf>,
}

/// Handle `itemvault run`
///
/// Returns whether every item was backed up.
pub fn handle_run_command(
    settings: &Settings,
    archive_root: PathBuf,
    args: RunArgs,
) -> VaultResult<bool> {
    let catalog_dir = args
        .catalog
        .or_else(|| settings.catalog_dir.clone())
        .ok_or_else(|| {
            VaultError::Config("No catalog configured; pass --catalog or set catalog_dir".into())
        })?;
    let provider = CatalogProvider::open(catalog_dir)?;
    let runner = BackupRunner::new(settings.clone(), archive_root, &provider);
    cancel_on_interrupt(runner.cancel_token())?;

    let outcome = match args.resume {
        Some(run_dir) => runner.resume(&run_dir)?,
        None => runner.run()?,
    };

    print_outcome(&outcome);

    if outcome.run.state == RunState::Aborted {
        return Err(VaultError::Aborted(format!(
            "{} of {} items backed up before cancellation",
            outcome.run.backed_up_items, outcome.run.total_items
        )));
    }
    Ok(outcome.run.overall_success())
}

fn print_outcome(outcome: &RunOutcome) {
    if let Some(report) = &outcome.retention {
        print!("{}", format_retention_report(report));
        println!();
    }

    let run = &outcome.run;
    println!("Backup Run Complete");
    println!("===================");
    println!("Directory: {}", run.directory.display());
    println!("State:     {}", run.state);
    println!(
        "Items:     {} of {} backed up, {} failed",
        run.backed_up_items, run.total_items, outcome.summary.failed
    );
    println!("Attempts:  {}", outcome.summary.attempts);
    println!("Size:      {}", format_size(run.total_size_bytes));
}
