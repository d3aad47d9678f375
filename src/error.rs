//! Custom error types for ItemVault
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions. Run-level failures are `VaultError`;
//! failures scoped to a single item's attempt are `ItemError` and only ever
//! drive the retry policy.

use thiserror::Error;

use crate::provider::ProviderError;

/// The main error type for ItemVault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Storage errors (atomic writes, document reads)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Retention could not list or inspect the archive root
    #[error("Retention error: {0}")]
    Retention(String),

    /// The content provider failed outside of a per-item attempt
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The backup query matched nothing after filtering
    #[error("No items found matching tags [{tags}]")]
    NoItems { tags: String },

    /// Status ledger errors
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// The run was cancelled before the queue drained
    #[error("Run aborted: {0}")]
    Aborted(String),
}

impl VaultError {
    /// Whether this error aborts the whole run.
    ///
    /// Cancellation is an orderly stop, everything else reaching the run
    /// level is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Aborted(_))
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for ItemVault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// A recoverable failure of one pipeline attempt for one item
#[derive(Error, Debug)]
pub enum ItemError {
    /// The destination directory could not be created
    #[error("Failed to create destination {path}: {reason}")]
    Destination { path: String, reason: String },

    /// Server-side export failed
    #[error("Export failed: {0}")]
    Export(ProviderError),

    /// Transfer of the artifact failed
    #[error("Download failed: {0}")]
    Download(ProviderError),

    /// The item vanished from the ledger
    #[error("Item not tracked by ledger: {0}")]
    Untracked(String),

    /// The attempt panicked
    #[error("Attempt panicked: {0}")]
    Panicked(String),
}
