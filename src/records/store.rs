use parking_lot::RwLock;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{Record, RecordSource, SnapshotFile, validate_name};
use crate::error::{SnapshotError, StoreError};

/// The canonical record set.
///
/// Every access, reads included, goes through one readers/writer lock over
/// the whole set. Mutations hold the write lock until the snapshot has been
/// written, so a caller that sees `Ok` can rely on the change being on disk.
pub struct RecordStore {
    records: RwLock<Vec<Record>>,
    snapshot: Option<SnapshotFile>,
}

impl RecordStore {
    /// A store with no durable copy.
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            snapshot: None,
        }
    }

    /// Opens the store backed by `<data_dir>/records.json`.
    ///
    /// A missing snapshot yields an empty store; an unreadable or malformed
    /// one is an error.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, SnapshotError> {
        let snapshot = SnapshotFile::new(data_dir);
        let records = match snapshot.load() {
            Ok(records) => {
                info!(
                    "Loaded {} records from {}",
                    records.len(),
                    snapshot.path().display()
                );
                records
            }
            Err(SnapshotError::NotFound(path)) => {
                info!("No snapshot at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            records: RwLock::new(records),
            snapshot: Some(snapshot),
        })
    }

    pub fn snapshot(&self) -> Option<&SnapshotFile> {
        self.snapshot.as_ref()
    }

    /// Appends a record and persists. Duplicate names are allowed; names
    /// that could never be queried are rejected.
    ///
    /// Returns the updated set.
    pub fn add(&self, name: &str, ip: IpAddr) -> Result<Vec<Record>, StoreError> {
        validate_name(name).map_err(StoreError::Validation)?;

        let mut records = self.records.write();
        records.push(Record::new(name, ip));
        info!("Added record {} -> {}", name, ip);

        self.persist(&records)?;
        Ok(records.clone())
    }

    /// Removes every record whose name matches `name` and persists.
    ///
    /// Deleting a name with no records is not an error.
    pub fn delete(&self, name: &str) -> Result<Vec<Record>, StoreError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|record| !record.matches(name));
        let removed = before - records.len();

        if removed == 0 {
            debug!("Delete of {} matched no records", name);
        } else {
            info!("Deleted {} record(s) named {}", removed, name);
        }

        self.persist(&records)?;
        Ok(records.clone())
    }

    /// Address of the first record, in set order, whose name matches.
    pub fn lookup(&self, name: &str) -> Option<IpAddr> {
        let records = self.records.read();
        records
            .iter()
            .find(|record| record.matches(name))
            .map(|record| record.ip)
    }

    /// The current set in insertion order.
    pub fn list(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    // Called with the write lock held.
    fn persist(&self, records: &[Record]) -> Result<(), StoreError> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        snapshot.save(records).map_err(|e| {
            warn!("Record set changed in memory but was not persisted: {}", e);
            StoreError::Persist(e)
        })
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl RecordSource for RecordStore {
    fn lookup(&self, name: &str) -> Option<IpAddr> {
        RecordStore::lookup(self, name)
    }
}
