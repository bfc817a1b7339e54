//! Durable storage for scan progress and fetched records.
//!
//! The scan core talks to storage only through the [`CursorStore`] and
//! [`RecordStore`] traits. The file-backed implementations here keep their
//! state as JSON documents in a single state directory.
//!
//! # File Layout
//!
//! ```text
//! <state_dir>/
//!   cursors.json   # { "schema_version": 1, "cursors": { "<name>": <id> } }
//!   records.json   # { "schema_version": 1, "records": [ { "id": .., ... } ] }
//! ```
//!
//! # Crash Safety
//!
//! Both files are replaced atomically (see [`atomic`]), so a crash at any
//! point leaves either the previous or the new version on disk. The scan
//! driver writes the cursor once per round, after the round's records are
//! upserted, so a crash re-processes at most one page.

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{CursorName, Record, RecordId};

pub mod atomic;
pub mod cursor;
pub mod records;

pub use cursor::FileCursorStore;
pub use records::FileRecordStore;

/// Current on-disk schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors that can occur while reading or writing state files.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema version mismatch.
    #[error("schema version mismatch in {file}: expected {expected}, got {got}")]
    SchemaMismatch {
        file: &'static str,
        expected: u32,
        got: u32,
    },

    /// A cursor write would have moved the watermark backwards.
    #[error("cursor {name} cannot move backwards from {current} to {requested}")]
    CursorRegression {
        name: CursorName,
        current: u64,
        requested: u64,
    },

    /// The in-memory state lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Durable named watermarks.
///
/// The scan worker is the only writer for its cursor name, so implementations
/// need atomicity against concurrent readers but not writer coordination.
pub trait CursorStore: Send + Sync {
    /// Returns the persisted value, or `0` if the cursor was never set.
    fn get_cursor(&self, name: &CursorName) -> Result<u64>;

    /// Durably persists a new value. Values lower than the current one are
    /// rejected with [`PersistenceError::CursorRegression`].
    fn set_cursor(&self, name: &CursorName, value: u64) -> Result<()>;
}

/// Storage for records keyed by source id.
pub trait RecordStore: Send + Sync {
    /// Inserts or merges every record (see [`Record::merge`]).
    ///
    /// Idempotent: upserting the same or overlapping pages repeatedly yields
    /// the same stored state as upserting them once.
    fn bulk_upsert(&self, records: &[Record]) -> Result<()>;

    /// Returns when the record was last refreshed. `None` if the record is
    /// unknown or has never been refreshed.
    fn get_updated_at(&self, id: RecordId) -> Result<Option<DateTime<Utc>>>;

    /// Returns the highest stored id, if any record is stored.
    fn max_id(&self) -> Result<Option<RecordId>>;

    /// Returns the stored record.
    fn get(&self, id: RecordId) -> Result<Option<Record>>;
}

impl<T: CursorStore + ?Sized> CursorStore for Arc<T> {
    fn get_cursor(&self, name: &CursorName) -> Result<u64> {
        (**self).get_cursor(name)
    }

    fn set_cursor(&self, name: &CursorName, value: u64) -> Result<()> {
        (**self).set_cursor(name, value)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn bulk_upsert(&self, records: &[Record]) -> Result<()> {
        (**self).bulk_upsert(records)
    }

    fn get_updated_at(&self, id: RecordId) -> Result<Option<DateTime<Utc>>> {
        (**self).get_updated_at(id)
    }

    fn max_id(&self) -> Result<Option<RecordId>> {
        (**self).max_id()
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>> {
        (**self).get(id)
    }
}
