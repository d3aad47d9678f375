//! Storage layer for ItemVault
//!
//! Provides JSON file storage with atomic writes and automatic directory
//! creation.

pub mod file_io;

pub use file_io::{read_json_required, write_json_atomic};
