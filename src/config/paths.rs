//! Path management for ItemVault
//!
//! Provides XDG-compliant path resolution for the configuration directory,
//! plus the well-known names used inside the archive.
//!
//! ## Path Resolution Order
//!
//! 1. `ITEMVAULT_CONFIG_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/itemvault` or `~/.config/itemvault`
//! 3. Windows: `%APPDATA%\itemvault`

use std::path::{Path, PathBuf};

use crate::error::VaultError;

/// File name of the status document written into every run directory
pub const STATUS_FILE_NAME: &str = "status.json";

/// Manages all paths used by ItemVault
#[derive(Debug, Clone)]
pub struct VaultPaths {
    /// Base directory for ItemVault configuration
    base_dir: PathBuf,
}

impl VaultPaths {
    /// Create a new VaultPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, VaultError> {
        let base_dir = if let Ok(custom) = std::env::var("ITEMVAULT_CONFIG_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create VaultPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.config/itemvault/ or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Default archive root when the settings do not name one
    pub fn default_archive_root(&self) -> PathBuf {
        self.base_dir.join("archive")
    }

    /// Ensure the configuration directory exists
    pub fn ensure_directories(&self) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| VaultError::Io(format!("Failed to create config directory: {}", e)))?;
        Ok(())
    }
}

/// Path of the status document inside a run directory
pub fn status_file(run_dir: &Path) -> PathBuf {
    run_dir.join(STATUS_FILE_NAME)
}

/// Resolve the default config directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, VaultError> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) => PathBuf::from(xdg),
        Err(_) => {
            let home = std::env::var("HOME").map_err(|_| {
                VaultError::Config("HOME environment variable not set".into())
            })?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("itemvault"))
}

/// Resolve the default config directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, VaultError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| VaultError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("itemvault"))
}
