//! User settings for ItemVault
//!
//! Holds everything a backup run needs: where the archive lives, how run
//! directories are named, how many generations to retain, how items are
//! classified, and how hard the work queue may push the remote service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::VaultPaths;
use crate::archive::DatePattern;
use crate::error::VaultError;
use crate::storage::file_io::write_json_atomic;

/// User settings for ItemVault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Root directory holding one subdirectory per backup run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_root: Option<PathBuf>,

    /// Literal prefix of every run directory name
    #[serde(default = "default_directory_prefix")]
    pub directory_prefix: String,

    /// strftime-style template embedded after the prefix
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Number of prior run directories kept by retention
    #[serde(default = "default_archive_number")]
    pub archive_number: usize,

    /// Tags searched for on the remote repository
    #[serde(default)]
    pub backup_tags: Vec<String>,

    /// Item types to back up (empty means every type)
    #[serde(default)]
    pub backup_types: Vec<String>,

    /// Item types that must be exported server-side before download
    #[serde(default)]
    pub export_types: Vec<String>,

    /// Tags that map an item to a destination subdirectory, in priority order
    #[serde(default)]
    pub directory_tags: Vec<String>,

    /// Destination for items carrying none of the directory tags
    #[serde(default = "default_uncategorized_tag")]
    pub uncategorized_tag: String,

    /// Suffix appended to the title of server-side export copies
    #[serde(default = "default_export_suffix")]
    pub export_suffix: String,

    /// Number of concurrent workers
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Pause each worker takes between two items, in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Attempts allowed per item before it is marked failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delete server-side export copies once the item has been handled
    #[serde(default = "default_delete_exports")]
    pub delete_exports: bool,

    /// Directory backing the local catalog provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_dir: Option<PathBuf>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_directory_prefix() -> String {
    "backup_".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d_%H-%M-%S".to_string()
}

fn default_archive_number() -> usize {
    5
}

fn default_uncategorized_tag() -> String {
    "uncategorized".to_string()
}

fn default_export_suffix() -> String {
    "_backup".to_string()
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_delete_exports() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            archive_root: None,
            directory_prefix: default_directory_prefix(),
            date_format: default_date_format(),
            archive_number: default_archive_number(),
            backup_tags: Vec::new(),
            backup_types: Vec::new(),
            export_types: Vec::new(),
            directory_tags: Vec::new(),
            uncategorized_tag: default_uncategorized_tag(),
            export_suffix: default_export_suffix(),
            max_concurrency: default_max_concurrency(),
            request_delay_ms: 0,
            max_retries: default_max_retries(),
            delete_exports: default_delete_exports(),
            catalog_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &VaultPaths) -> Result<Self, VaultError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            Self::load_from(&settings_path)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Load settings from an explicit file
    ///
    /// `.yaml` and `.yml` files are read as YAML, anything else as JSON.
    pub fn load_from(path: &Path) -> Result<Self, VaultError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VaultError::Io(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        let is_yaml = path
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml");

        if is_yaml {
            serde_yaml::from_str(&contents).map_err(|e| {
                VaultError::Config(format!("Failed to parse settings file: {}", e))
            })
        } else {
            serde_json::from_str(&contents).map_err(|e| {
                VaultError::Config(format!("Failed to parse settings file: {}", e))
            })
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &VaultPaths) -> Result<(), VaultError> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    /// Reject settings a run cannot work with
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.max_concurrency == 0 {
            return Err(VaultError::Config(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(VaultError::Config("max_retries must be at least 1".into()));
        }
        if self.directory_prefix.is_empty() {
            return Err(VaultError::Config(
                "directory_prefix cannot be empty".into(),
            ));
        }
        DatePattern::compile(&self.date_format)?;
        Ok(())
    }

    /// Archive root, falling back to the config directory
    pub fn archive_root(&self, paths: &VaultPaths) -> PathBuf {
        self.archive_root
            .clone()
            .unwrap_or_else(|| paths.default_archive_root())
    }

    /// Per-worker pause between items
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Whether items of this type are backed up at all
    pub fn accepts_type(&self, item_type: &str) -> bool {
        self.backup_types.is_empty() || self.backup_types.iter().any(|t| t == item_type)
    }
}
