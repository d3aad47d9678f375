//! Configuration module for ItemVault
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Settings persistence (JSON, or YAML when supplied explicitly)

pub mod paths;
pub mod settings;

pub use paths::VaultPaths;
pub use settings::Settings;
