//! Display formatting for terminal output
//!
//! Provides utilities for formatting status documents and retention results
//! for terminal display.

pub mod retention;
pub mod status;

pub use retention::{format_retention_plan, format_retention_report};
pub use status::{format_size, format_status};
