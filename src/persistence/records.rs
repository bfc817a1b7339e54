//! File-backed record store.
//!
//! Records are held in memory and the whole set is rewritten atomically to
//! `records.json` whenever an upsert changes it. Upserts that change nothing
//! (a replayed page) skip the write.
//!
//! Every changing upsert costs a write proportional to the whole store, so
//! the file is kept compact. That is fine for tens of thousands of records;
//! a store covering a large share of the id space needs an append log or an
//! embedded database behind [`RecordStore`] instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::atomic::{read_json_if_exists, write_json_atomic_compact};
use super::{PersistenceError, RecordStore, Result, SCHEMA_VERSION};
use crate::types::{Record, RecordId};

/// File name of the record document inside the state directory.
pub const RECORDS_FILE: &str = "records.json";

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecords {
    schema_version: u32,
    /// Sorted ascending by id.
    records: Vec<Record>,
}

/// Record store persisted to `<state_dir>/records.json`.
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    records: Mutex<BTreeMap<RecordId, Record>>,
}

impl FileRecordStore {
    /// Opens the store, loading any existing records from `state_dir`.
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self> {
        let path = state_dir.as_ref().join(RECORDS_FILE);
        let mut records = BTreeMap::new();

        if let Some(doc) = read_json_if_exists::<PersistedRecords>(&path)? {
            if doc.schema_version != SCHEMA_VERSION {
                return Err(PersistenceError::SchemaMismatch {
                    file: RECORDS_FILE,
                    expected: SCHEMA_VERSION,
                    got: doc.schema_version,
                });
            }
            for record in doc.records {
                records.insert(record.id, record);
            }
        }

        info!(path = %path.display(), count = records.len(), "Opened record store");
        Ok(FileRecordStore {
            path,
            records: Mutex::new(records),
        })
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<RecordId, Record>>> {
        self.records.lock().map_err(|_| PersistenceError::Poisoned)
    }

    fn persist(&self, records: &BTreeMap<RecordId, Record>) -> Result<()> {
        let doc = PersistedRecords {
            schema_version: SCHEMA_VERSION,
            records: records.values().cloned().collect(),
        };
        write_json_atomic_compact(&self.path, &doc)
    }
}

impl RecordStore for FileRecordStore {
    fn bulk_upsert(&self, incoming: &[Record]) -> Result<()> {
        let mut records = self.lock()?;
        let mut changed = 0usize;

        for record in incoming {
            match records.get_mut(&record.id) {
                Some(existing) => {
                    let before = existing.clone();
                    existing.merge(record);
                    if *existing != before {
                        changed += 1;
                    }
                }
                None => {
                    records.insert(record.id, record.clone());
                    changed += 1;
                }
            }
        }

        if changed > 0 {
            self.persist(&records)?;
        }
        debug!(upserted = incoming.len(), changed, "Bulk upsert");
        Ok(())
    }

    fn get_updated_at(&self, id: RecordId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock()?.get(&id).and_then(|r| r.updated_at))
    }

    fn max_id(&self) -> Result<Option<RecordId>> {
        Ok(self.lock()?.keys().next_back().copied())
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self.lock()?.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::arb_page;
    use chrono::Duration;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn empty_store_has_no_max_id() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::open(dir.path()).unwrap();
        assert_eq!(store.max_id().unwrap(), None);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn upsert_then_lookup() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::open(dir.path()).unwrap();
        let now = Utc::now();

        store
            .bulk_upsert(&[
                Record::listed(3, "c"),
                Record::listed(1, "a").refreshed_at(now),
            ])
            .unwrap();

        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.max_id().unwrap(), Some(RecordId(3)));
        assert_eq!(store.get_updated_at(RecordId(1)).unwrap(), Some(now));
        assert_eq!(store.get_updated_at(RecordId(3)).unwrap(), None);
        assert_eq!(store.get_updated_at(RecordId(99)).unwrap(), None);
    }

    #[test]
    fn listing_does_not_clear_refresh_stamp() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::open(dir.path()).unwrap();
        let stamp = Utc::now() - Duration::hours(2);

        store
            .bulk_upsert(&[Record::listed(1, "a").refreshed_at(stamp)])
            .unwrap();
        store.bulk_upsert(&[Record::listed(1, "renamed")]).unwrap();

        let stored = store.get(RecordId(1)).unwrap().unwrap();
        assert_eq!(stored.identifier, "renamed");
        assert_eq!(stored.updated_at, Some(stamp));
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let now = Utc::now();
        {
            let store = FileRecordStore::open(dir.path()).unwrap();
            store
                .bulk_upsert(&[Record::listed(5, "e").refreshed_at(now)])
                .unwrap();
        }

        let reopened = FileRecordStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get(RecordId(5)).unwrap(),
            Some(Record::listed(5, "e").refreshed_at(now))
        );
    }

    #[test]
    fn unchanged_upsert_skips_write() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::open(dir.path()).unwrap();

        store.bulk_upsert(&[]).unwrap();
        assert!(!dir.path().join(RECORDS_FILE).exists());

        store.bulk_upsert(&[Record::listed(1, "a")]).unwrap();
        assert!(dir.path().join(RECORDS_FILE).exists());
    }

    #[test]
    fn records_file_is_written_compact() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::open(dir.path()).unwrap();

        store
            .bulk_upsert(&[
                Record::listed(1, "a").refreshed_at(Utc::now()),
                Record::listed(2, "b"),
            ])
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join(RECORDS_FILE)).unwrap();
        assert!(text.starts_with(r#"{"schema_version":"#));
        assert!(!text.contains('\n'));
        assert!(!text.contains(' '));
    }

    proptest! {
        /// Upserting overlapping pages twice yields the same state as once.
        #[test]
        fn bulk_upsert_is_idempotent(first in arb_page(), second in arb_page()) {
            let once_dir = tempdir().unwrap();
            let once = FileRecordStore::open(once_dir.path()).unwrap();
            once.bulk_upsert(&first).unwrap();
            once.bulk_upsert(&second).unwrap();

            let twice_dir = tempdir().unwrap();
            let twice = FileRecordStore::open(twice_dir.path()).unwrap();
            twice.bulk_upsert(&first).unwrap();
            twice.bulk_upsert(&second).unwrap();
            twice.bulk_upsert(&first).unwrap();
            twice.bulk_upsert(&second).unwrap();

            let ids: Vec<RecordId> = first.iter().chain(&second).map(|r| r.id).collect();
            for id in ids {
                prop_assert_eq!(once.get(id).unwrap(), twice.get(id).unwrap());
            }
            prop_assert_eq!(once.len().unwrap(), twice.len().unwrap());
            prop_assert_eq!(once.max_id().unwrap(), twice.max_id().unwrap());
        }
    }
}
