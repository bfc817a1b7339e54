//! File-backed cursor store.
//!
//! All cursors live in one `cursors.json` document. Reads go to disk every
//! time so an inspection endpoint sees exactly what a restarted worker would
//! resume from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::atomic::{read_json_if_exists, write_json_atomic};
use super::{CursorStore, PersistenceError, Result, SCHEMA_VERSION};
use crate::types::CursorName;

/// File name of the cursor document inside the state directory.
pub const CURSORS_FILE: &str = "cursors.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedCursors {
    schema_version: u32,
    cursors: BTreeMap<CursorName, u64>,
}

impl PersistedCursors {
    fn empty() -> Self {
        PersistedCursors {
            schema_version: SCHEMA_VERSION,
            cursors: BTreeMap::new(),
        }
    }
}

/// Cursor store persisted to `<state_dir>/cursors.json`.
#[derive(Debug)]
pub struct FileCursorStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileCursorStore {
    /// Creates a store rooted at `state_dir`. The file is created lazily on
    /// the first write.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        FileCursorStore {
            path: state_dir.as_ref().join(CURSORS_FILE),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<PersistedCursors> {
        let Some(doc) = read_json_if_exists::<PersistedCursors>(&self.path)? else {
            return Ok(PersistedCursors::empty());
        };
        if doc.schema_version != SCHEMA_VERSION {
            return Err(PersistenceError::SchemaMismatch {
                file: CURSORS_FILE,
                expected: SCHEMA_VERSION,
                got: doc.schema_version,
            });
        }
        Ok(doc)
    }
}

impl CursorStore for FileCursorStore {
    fn get_cursor(&self, name: &CursorName) -> Result<u64> {
        Ok(self.load()?.cursors.get(name).copied().unwrap_or(0))
    }

    fn set_cursor(&self, name: &CursorName, value: u64) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| PersistenceError::Poisoned)?;

        let mut doc = self.load()?;
        let current = doc.cursors.get(name).copied().unwrap_or(0);
        if value < current {
            return Err(PersistenceError::CursorRegression {
                name: name.clone(),
                current,
                requested: value,
            });
        }
        if value == current && doc.cursors.contains_key(name) {
            return Ok(());
        }

        doc.cursors.insert(name.clone(), value);
        write_json_atomic(&self.path, &doc)?;
        debug!(cursor = %name, value, "Persisted cursor");
        Ok(())
    }
}
