//! Prune CLI command
//!
//! Applies the retention policy to the archive root without starting a run.

use std::path::Path;

use clap::Args;

use crate::archive::{DatePattern, RetentionManager};
use crate::config::Settings;
use crate::display::{format_retention_plan, format_retention_report};
use crate::error::VaultResult;

/// Arguments of `itemvault prune`
#[derive(Args, Debug, Default)]
pub struct PruneArgs {
    /// Show what would be deleted without deleting
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Handle `itemvault prune`
pub fn handle_prune_command(
    settings: &Settings,
    archive_root: &Path,
    args: PruneArgs,
) -> VaultResult<()> {
    settings.validate()?;
    let pattern = DatePattern::compile(&settings.date_format)?;
    let manager = RetentionManager::new(
        archive_root,
        &settings.directory_prefix,
        pattern,
        settings.archive_number,
    );

    if args.dry_run {
        let planned = manager.plan()?;
        print!("{}", format_retention_plan(&planned, settings.archive_number));
        return Ok(());
    }

    let report = manager.enforce()?;
    print!("{}", format_retention_report(&report));
    Ok(())
}
