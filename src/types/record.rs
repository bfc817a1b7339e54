//! The user record as fetched from the source and held in the record store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RecordId;

/// One entity from the external source.
///
/// `updated_at` is the time this worker last refreshed the record's detail.
/// Records that have only ever been seen in a listing page carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Display name (the GitHub login). Not unique over time.
    pub identifier: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// A record as it appears in a listing page, never refreshed.
    pub fn listed(id: impl Into<RecordId>, identifier: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            identifier: identifier.into(),
            updated_at: None,
        }
    }

    /// Returns this record stamped as refreshed at `at`.
    pub fn refreshed_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Folds an incoming copy of the same record into this one.
    ///
    /// The identifier follows the incoming copy; `updated_at` keeps the later
    /// of the two. The merge is idempotent and order-independent for
    /// `updated_at`, so replaying a page never moves a refresh stamp backwards.
    pub fn merge(&mut self, incoming: &Record) {
        debug_assert_eq!(self.id, incoming.id);
        self.identifier.clone_from(&incoming.identifier);
        self.updated_at = self.updated_at.max(incoming.updated_at);
    }
}
