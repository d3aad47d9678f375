//! Archive root management for ItemVault
//!
//! The archive root holds one dated directory per backup run. This module
//! names those directories and evicts old ones.
//!
//! # Example
//!
//! ```rust,ignore
//! use itemvault::archive::{DatePattern, RetentionManager};
//!
//! let pattern = DatePattern::compile("%Y-%m-%d_%H-%M-%S")?;
//! let manager = RetentionManager::new(root, "backup_", pattern, 5);
//! let report = manager.enforce()?;
//! ```

mod date_pattern;
mod retention;

pub use date_pattern::DatePattern;
pub use retention::{enforce_retention, RetentionEntry, RetentionManager, RetentionReport};
