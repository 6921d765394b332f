use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Record;
use crate::error::SnapshotError;

pub const SNAPSHOT_FILE_NAME: &str = "records.json";

/// On-disk document: `{"entries":[{"name":..,"ip":..}]}`
#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    entries: Vec<Record>,
}

/// The durable copy of the record set, `records.json` inside the data directory.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(SNAPSHOT_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole record set. A missing file is reported as
    /// `SnapshotError::NotFound` so callers can start empty.
    pub fn load(&self) -> Result<Vec<Record>, SnapshotError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound(self.path.clone()));
            }
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let document: SnapshotDocument =
            serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Parse {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            "Loaded {} records from {} ({} bytes)",
            document.entries.len(),
            self.path.display(),
            bytes.len()
        );
        Ok(document.entries)
    }

    /// Replaces the snapshot with `records`.
    ///
    /// Writes a sibling temporary file, syncs it, then renames it over the
    /// target, so the previous snapshot survives a failed write.
    pub fn save(&self, records: &[Record]) -> Result<(), SnapshotError> {
        #[derive(Serialize)]
        struct SnapshotRef<'a> {
            entries: &'a [Record],
        }

        let serialized = serde_json::to_vec(&SnapshotRef { entries: records })
            .map_err(SnapshotError::Serialize)?;

        let temp_path = self.temp_path();
        let io_err = |source| SnapshotError::Io {
            path: temp_path.clone(),
            source,
        };

        let mut file = open_private(&temp_path).map_err(io_err)?;
        file.write_all(&serialized).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            SnapshotError::Io {
                path: self.path.clone(),
                source,
            }
        })?;

        debug!(
            "Saved {} records to {} ({} bytes)",
            records.len(),
            self.path.display(),
            serialized.len()
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path());
        assert!(matches!(snapshot.load(), Err(SnapshotError::NotFound(_))));
    }

    #[test]
    fn test_load_existing_document() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SNAPSHOT_FILE_NAME),
            br#"{"entries":[{"name":"boop","ip":"127.0.0.1"}]}"#,
        )
        .unwrap();

        let records = SnapshotFile::new(dir.path()).load().unwrap();
        assert_eq!(
            records,
            vec![Record::new("boop", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)))]
        );
    }

    #[test]
    fn test_load_malformed_document() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SNAPSHOT_FILE_NAME), b"{\"entries\": [").unwrap();
        assert!(matches!(
            SnapshotFile::new(dir.path()).load(),
            Err(SnapshotError::Parse { .. })
        ));

        fs::write(
            dir.path().join(SNAPSHOT_FILE_NAME),
            br#"{"entries":[{"name":"boop","ip":"not-an-ip"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            SnapshotFile::new(dir.path()).load(),
            Err(SnapshotError::Parse { .. })
        ));
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let dir = tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path());
        let records = vec![
            Record::new("b", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            Record::new("a", IpAddr::V6(Ipv6Addr::LOCALHOST)),
            Record::new("b", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3))),
        ];

        snapshot.save(&records).unwrap();
        assert_eq!(snapshot.load().unwrap(), records);
        assert!(!snapshot.temp_path().exists());
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path());
        snapshot
            .save(&[Record::new("old", IpAddr::V4(Ipv4Addr::LOCALHOST))])
            .unwrap();
        snapshot.save(&[]).unwrap();

        let raw = fs::read_to_string(snapshot.path()).unwrap();
        assert_eq!(raw, r#"{"entries":[]}"#);
    }

    #[test]
    fn test_failed_save_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path());
        let records = vec![Record::new("keep", IpAddr::V4(Ipv4Addr::LOCALHOST))];
        snapshot.save(&records).unwrap();

        // A directory in the way of the temporary file makes the write fail.
        fs::create_dir(snapshot.temp_path()).unwrap();
        let result = snapshot.save(&[]);
        assert!(matches!(result, Err(SnapshotError::Io { .. })));
        assert_eq!(snapshot.load().unwrap(), records);
    }

    #[cfg(unix)]
    #[test]
    fn test_snapshot_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path());
        snapshot.save(&[]).unwrap();
        let mode = fs::metadata(snapshot.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
