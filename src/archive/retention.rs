//! Retention manager for the archive root
//!
//! Every run lives in its own `<prefix><timestamp>` directory under the
//! archive root. Retention keeps the newest `keep_count` generations whose
//! names parse and deletes the rest, oldest first. Directories whose names
//! do not parse are never touched.
//!
//! Retention runs before the directory of the current run is created, so the
//! run being started is never an eviction candidate.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use super::date_pattern::DatePattern;
use crate::error::{VaultError, VaultResult};

/// One subdirectory of the archive root, computed fresh on every pass
#[derive(Debug, Clone)]
pub struct RetentionEntry {
    /// Directory name
    pub directory_name: String,
    /// Full path to the directory
    pub path: PathBuf,
    /// Timestamp embedded in the name, if it parses
    pub parsed_date: Option<NaiveDateTime>,
}

impl RetentionEntry {
    /// Whether this entry may be evicted at all
    pub fn is_eligible(&self) -> bool {
        self.parsed_date.is_some()
    }
}

/// Outcome of a retention pass
#[derive(Debug, Default)]
pub struct RetentionReport {
    /// Directories deleted, in eviction order
    pub evicted: Vec<PathBuf>,
    /// Eligible directories still on disk
    pub retained: Vec<PathBuf>,
    /// Names skipped because their timestamp does not parse
    pub unparsable: Vec<String>,
    /// Why eviction stopped early, if it did
    pub halted: Option<String>,
}

impl RetentionReport {
    /// Whether the pass reached the configured bound
    pub fn completed(&self) -> bool {
        self.halted.is_none()
    }
}

/// Evicts old run directories from an archive root
pub struct RetentionManager {
    root: PathBuf,
    prefix: String,
    pattern: DatePattern,
    keep_count: usize,
}

impl RetentionManager {
    /// Create a new RetentionManager
    pub fn new(
        root: impl Into<PathBuf>,
        prefix: impl Into<String>,
        pattern: DatePattern,
        keep_count: usize,
    ) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            pattern,
            keep_count,
        }
    }

    /// List the immediate subdirectories of the root, sorted by name
    ///
    /// Failing to list the root is fatal for the run.
    pub fn list_entries(&self) -> VaultResult<Vec<RetentionEntry>> {
        let read_dir = fs::read_dir(&self.root).map_err(|e| {
            VaultError::Retention(format!(
                "Failed to list archive root {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| {
                VaultError::Retention(format!("Failed to read directory entry: {}", e))
            })?;

            let file_type = entry.file_type().map_err(|e| {
                VaultError::Retention(format!(
                    "Failed to inspect {}: {}",
                    entry.path().display(),
                    e
                ))
            })?;
            if !file_type.is_dir() {
                continue;
            }

            let directory_name = entry.file_name().to_string_lossy().to_string();
            let parsed_date = self.pattern.parse(&directory_name, &self.prefix);
            if parsed_date.is_none() {
                log::debug!(
                    "Retention ignores '{}': no {}{} timestamp",
                    directory_name,
                    self.prefix,
                    self.pattern.template()
                );
            }

            entries.push(RetentionEntry {
                directory_name,
                path: entry.path(),
                parsed_date,
            });
        }

        entries.sort_by(|a, b| a.directory_name.cmp(&b.directory_name));
        Ok(entries)
    }

    /// Entries a retention pass would evict, oldest first, without deleting
    pub fn plan(&self) -> VaultResult<Vec<RetentionEntry>> {
        let mut eligible: Vec<RetentionEntry> = self
            .list_entries()?
            .into_iter()
            .filter(RetentionEntry::is_eligible)
            .collect();

        let mut planned = Vec::new();
        while eligible.len() > self.keep_count {
            match oldest_index(&eligible) {
                Some(index) => planned.push(eligible.remove(index)),
                None => break,
            }
        }
        Ok(planned)
    }

    /// Delete the oldest eligible directories until at most `keep_count` remain
    ///
    /// A deletion failure stops the pass instead of skipping to the next
    /// entry; the report carries the reason.
    pub fn enforce(&self) -> VaultResult<RetentionReport> {
        let mut report = RetentionReport::default();
        let mut eligible = Vec::new();

        for entry in self.list_entries()? {
            if entry.is_eligible() {
                eligible.push(entry);
            } else {
                report.unparsable.push(entry.directory_name);
            }
        }

        while eligible.len() > self.keep_count {
            let Some(index) = oldest_index(&eligible) else {
                let reason = format!(
                    "{} generations exceed the limit of {} but none is evictable",
                    eligible.len(),
                    self.keep_count
                );
                log::warn!("Retention stopped: {}", reason);
                report.halted = Some(reason);
                break;
            };

            let victim = &eligible[index];
            if let Err(e) = fs::remove_dir_all(&victim.path) {
                let reason = format!("Failed to delete {}: {}", victim.path.display(), e);
                log::error!("Retention stopped: {}", reason);
                report.halted = Some(reason);
                break;
            }

            log::info!("Evicted old backup generation {}", victim.directory_name);
            report.evicted.push(eligible.remove(index).path);
        }

        report.retained = eligible.into_iter().map(|e| e.path).collect();
        Ok(report)
    }
}

/// Enforce retention on `root` in one call
pub fn enforce_retention(
    root: &Path,
    prefix: &str,
    date_format: &str,
    keep_count: usize,
) -> VaultResult<RetentionReport> {
    let pattern = DatePattern::compile(date_format)?;
    RetentionManager::new(root, prefix, pattern, keep_count).enforce()
}

/// Index of the oldest dated entry; ties go to the first one listed
fn oldest_index(entries: &[RetentionEntry]) -> Option<usize> {
    let mut oldest: Option<(usize, NaiveDateTime)> = None;
    for (index, entry) in entries.iter().enumerate() {
        let Some(date) = entry.parsed_date else {
            continue;
        };
        match oldest {
            Some((_, current)) if date >= current => {}
            _ => oldest = Some((index, date)),
        }
    }
    oldest.map(|(index, _)| index)
}
