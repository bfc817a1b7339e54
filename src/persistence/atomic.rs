//! Crash-safe JSON file writes.
//!
//! Every state file is replaced with the write-to-temp-then-rename pattern:
//!
//! 1. Write to `<path>.tmp`
//! 2. fsync the temp file
//! 3. Rename over `<path>`
//! 4. fsync the parent directory
//!
//! Readers therefore see either the previous or the new contents, never a
//! partial write. The directory fsync is what makes the rename itself survive
//! power loss on POSIX filesystems.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{PersistenceError, Result};

/// Syncs a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory so that entries created or renamed in it are durable.
///
/// Only meaningful for directory paths.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Serializes `value` as pretty JSON and atomically replaces `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_bytes_atomic(path, &serde_json::to_vec_pretty(value)?)
}

/// Like [`write_json_atomic`] but without indentation, for documents that
/// are large and rewritten often.
pub fn write_json_atomic_compact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_bytes_atomic(path, &serde_json::to_vec(value)?)
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(path);
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(bytes)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&tmp, path)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// Reads and parses a JSON file, returning `None` if it doesn't exist.
///
/// Malformed JSON is an error: a state file that can't be parsed must not be
/// silently replaced by an empty one.
pub fn read_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistenceError::Io(e)),
    }
}
