use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;

use itemvault::cli::{
    handle_prune_command, handle_run_command, handle_status_command, PruneArgs, RunArgs,
    StatusArgs,
};
use itemvault::config::{Settings, VaultPaths};

#[derive(Parser)]
#[command(
    name = "itemvault",
    version,
    about = "Tag-driven backup of remote content items",
    long_about = "ItemVault discovers items by tag, exports and downloads each one \
                  into a timestamped run directory and keeps a status document \
                  for every run. Old runs are pruned by a retention policy."
)]
struct Cli {
    /// Settings file (JSON, or YAML with a .yaml/.yml extension)
    #[arg(short, long, global = true, env = "ITEMVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Archive root (overrides `archive_root` from the settings)
    #[arg(long, global = true)]
    archive_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a backup run
    Run(RunArgs),

    /// Apply the retention policy to the archive root
    Prune(PruneArgs),

    /// Show the status document of a run
    Status(StatusArgs),

    /// Write the default settings file
    Init,

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = VaultPaths::new()?;
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load_or_create(&paths)?,
    };
    let archive_root = cli
        .archive_root
        .clone()
        .unwrap_or_else(|| settings.archive_root(&paths));

    match cli.command {
        Some(Commands::Run(args)) => {
            let success = handle_run_command(&settings, archive_root, args)?;
            if !success {
                anyhow::bail!("Backup run finished with failed items");
            }
        }
        Some(Commands::Prune(args)) => {
            handle_prune_command(&settings, &archive_root, args)?;
        }
        Some(Commands::Status(args)) => {
            handle_status_command(&settings, &archive_root, args)?;
        }
        Some(Commands::Init) => {
            println!("Initializing ItemVault at: {}", paths.base_dir().display());
            settings.validate()?;
            settings.save(&paths)?;
            println!("Settings written to {}", paths.settings_file().display());
            println!();
            println!("Set 'catalog_dir' and 'backup_tags' there, then run 'itemvault run'.");
        }
        Some(Commands::Config) => {
            println!("ItemVault Configuration");
            println!("=======================");
            println!("Config directory: {}", paths.base_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!("Archive root:     {}", archive_root.display());
            println!();
            println!("Settings:");
            println!("  Directory prefix: {}", settings.directory_prefix);
            println!("  Date format:      {}", settings.date_format);
            println!("  Runs kept:        {}", settings.archive_number);
            println!("  Backup tags:      {}", settings.backup_tags.join(", "));
            println!("  Directory tags:   {}", settings.directory_tags.join(", "));
            println!("  Max concurrency:  {}", settings.max_concurrency);
            println!("  Max retries:      {}", settings.max_retries);
            println!("  Request delay:    {} ms", settings.request_delay_ms);
        }
        None => {
            println!("ItemVault - Tag-driven backup of remote content items");
            println!();
            println!("Run 'itemvault --help' for usage information.");
            println!("Run 'itemvault run --catalog <dir>' to start a backup.");
        }
    }

    Ok(())
}
