//! Status CLI command
//!
//! Shows the status document of a run directory.

use std::path::{Path, PathBuf};

use clap::Args;

use crate::archive::{DatePattern, RetentionManager};
use crate::config::paths::status_file;
use crate::config::Settings;
use crate::display::format_status;
use crate::error::{VaultError, VaultResult};
use crate::ledger::StatusDocument;

/// Arguments of `itemvault status`
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Run directory (use 'latest' for the newest run in the archive)
    #[arg(default_value = "latest")]
    pub run: String,
}

/// Handle `itemvault status`
pub fn handle_status_command(
    settings: &Settings,
    archive_root: &Path,
    args: StatusArgs,
) -> VaultResult<()> {
    let run_dir = resolve_run_dir(settings, archive_root, &args.run)?;
    let doc = StatusDocument::load(&status_file(&run_dir))?;
    print!("{}", format_status(&doc));
    Ok(())
}

/// Resolve a run identifier to a run directory
fn resolve_run_dir(settings: &Settings, archive_root: &Path, run: &str) -> VaultResult<PathBuf> {
    if run.eq_ignore_ascii_case("latest") {
        let pattern = DatePattern::compile(&settings.date_format)?;
        let manager = RetentionManager::new(
            archive_root,
            &settings.directory_prefix,
            pattern,
            settings.archive_number,
        );
        return manager
            .list_entries()?
            .into_iter()
            .filter(|e| e.is_eligible())
            .max_by_key(|e| e.parsed_date)
            .map(|e| e.path)
            .ok_or_else(|| {
                VaultError::Storage(format!("No runs found in {}", archive_root.display()))
            });
    }

    let path = PathBuf::from(run);
    if path.is_dir() {
        return Ok(path);
    }

    let in_archive = archive_root.join(run);
    if in_archive.is_dir() {
        return Ok(in_archive);
    }

    Err(VaultError::Storage(format!("Run not found: {}", run)))
}
