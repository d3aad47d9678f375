//! JSON documents on disk
//!
//! Writes go through a sibling temp file that is synced and renamed over the
//! target, so a reader sees either the previous document or the new one,
//! never a partial write.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::VaultError;

/// Suffix of the temp file written next to the target
const TEMP_SUFFIX: &str = ".tmp";

fn storage_error(action: &str, path: &Path, err: impl std::fmt::Display) -> VaultError {
    VaultError::Storage(format!("Failed to {} {}: {}", action, path.display(), err))
}

/// Read a JSON document; a missing file is an error
pub fn read_json_required<T, P>(path: P) -> Result<T, VaultError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(VaultError::Storage(format!(
                "File not found: {}",
                path.display()
            )))
        }
        Err(e) => return Err(storage_error("open", path, e)),
    };

    serde_json::from_reader(BufReader::new(file)).map_err(|e| storage_error("parse", path, e))
}

/// Replace `path` with the pretty-printed JSON of `data`
///
/// Callers must serialize writers of the same path; the temp file name is
/// fixed per target.
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), VaultError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| storage_error("create directory", parent, e))?;
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = write_synced(&temp_path, data) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        storage_error("replace", path, e)
    })
}

fn write_synced<T: Serialize>(temp_path: &Path, data: &T) -> Result<(), VaultError> {
    let file = File::create(temp_path).map_err(|e| storage_error("create", temp_path, e))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| storage_error("serialize into", temp_path, e))?;
    writer
        .flush()
        .map_err(|e| storage_error("flush", temp_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| storage_error("sync", temp_path, e))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}
