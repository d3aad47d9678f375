//! ItemVault - Tag-driven backup of remote content items
//!
//! This library discovers items on a content provider by tag, exports and
//! downloads each one into a timestamped run directory, and keeps a live
//! status document for the run. Old run directories are evicted by a
//! retention policy before every new run.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Items and runs
//! - `storage`: JSON file storage layer
//! - `archive`: Run directory naming and retention
//! - `ledger`: The status document of a run
//! - `provider`: Content provider boundary and the local catalog provider
//! - `pipeline`: Per-item backup steps
//! - `queue`: Bounded worker pool with retries
//! - `runner`: Run orchestration
//!
//! # Example
//!
//! ```rust,ignore
//! use itemvault::config::{VaultPaths, Settings};
//! use itemvault::provider::CatalogProvider;
//! use itemvault::runner::BackupRunner;
//!
//! let paths = VaultPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let provider = CatalogProvider::open("/srv/catalog")?;
//! let outcome = BackupRunner::new(settings.clone(), settings.archive_root(&paths), &provider).run()?;
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod queue;
pub mod runner;
pub mod storage;

pub use error::VaultError;
