//! JSON backing file for the duplicate store.
//!
//! The file is a single JSON object mapping hex digests to the UTC time the
//! digest was first seen:
//!
//! ```json
//! {
//!   "3f2a...e1": "2024-01-01T10:09:00.000000Z"
//! }
//! ```
//!
//! The file is rewritten wholesale on every write. Writes go to a sibling
//! temp file which is synced and then renamed over the target, so a crash
//! mid-write leaves the previous file intact.
//!
//! Readers also accept timestamps without an offset (`2024-01-01T10:09:00.123456`),
//! interpreted as UTC.

use crate::models::{DuplicateRecord, RowDigest};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Maximum backing file size (64 MiB).
/// Larger files are treated as corrupt rather than read into memory.
const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Suffix appended to the file name for in-progress writes.
const TEMP_SUFFIX: &str = ".tmp";

/// Handle to the duplicate store's backing file.
#[derive(Debug, Clone)]
pub struct HashStoreFile {
    path: PathBuf,
}

impl HashStoreFile {
    /// Creates a handle for the given path. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the backing file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads all records from disk.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageLoad`] if the file cannot be read, is too
    /// large, is not a JSON object of strings, or contains an invalid digest
    /// or timestamp.
    pub fn read(&self) -> Result<Option<HashMap<RowDigest, DuplicateRecord>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let metadata = fs::metadata(&self.path).map_err(|e| self.load_error(e))?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(self.load_error(format!(
                "file exceeds maximum size of {MAX_FILE_SIZE} bytes"
            )));
        }

        let json = fs::read_to_string(&self.path).map_err(|e| self.load_error(e))?;
        let raw: BTreeMap<String, String> =
            serde_json::from_str(&json).map_err(|e| self.load_error(e))?;

        let mut records = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let digest: RowDigest = key.parse().map_err(|e| self.load_error(e))?;
            let first_seen_at = parse_timestamp(&value)
                .ok_or_else(|| self.load_error(format!("invalid timestamp '{value}' for {key}")))?;
            records.insert(digest, DuplicateRecord::new(digest, first_seen_at));
        }

        Ok(Some(records))
    }

    /// Atomically replaces the file with the given records.
    ///
    /// Creates the parent directory if it does not exist. Keys are written in
    /// sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWrite`] if any step of the write fails. The
    /// previous file, if any, is left untouched in that case.
    pub fn write<'a, I>(&self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a DuplicateRecord>,
    {
        let serialized: BTreeMap<String, String> = records
            .into_iter()
            .map(|r| (r.digest.to_hex(), format_timestamp(r.first_seen_at)))
            .collect();

        let json =
            serde_json::to_string_pretty(&serialized).map_err(|e| self.write_error(e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }

        let temp_path = self.temp_path();
        if let Err(e) = write_synced(&temp_path, json.as_bytes()) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.write_error(e));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.write_error(e));
        }

        Ok(())
    }

    /// Deletes the backing file.
    ///
    /// Returns `Ok(false)` if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWrite`] if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        fs::remove_file(&self.path).map_err(|e| self.write_error(e))?;
        Ok(true)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(TEMP_SUFFIX);
        self.path.with_file_name(name)
    }

    fn load_error(&self, cause: impl ToString) -> Error {
        Error::StorageLoad {
            path: self.path.clone(),
            cause: cause.to_string(),
        }
    }

    fn write_error(&self, cause: impl ToString) -> Error {
        Error::StorageWrite {
            path: self.path.clone(),
            cause: cause.to_string(),
        }
    }
}

/// Writes `data` to `path` and syncs it to disk.
fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Formats a timestamp as RFC 3339 UTC with microsecond precision.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses an RFC 3339 timestamp, or a naive ISO-8601 one taken as UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| value.parse::<NaiveDateTime>().ok().map(|ts| ts.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::deduplication::{DeduplicationConfig, DuplicateStore};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(byte: u8, minute: u32) -> DuplicateRecord {
        DuplicateRecord::new(
            RowDigest::from_bytes([byte; 32]),
            Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap(),
        )
    }

    #[test]
    fn test_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let file = HashStoreFile::new(dir.path().join("hashes.json"));
        assert!(file.read().unwrap().is_none());
        assert!(!file.exists());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let file = HashStoreFile::new(dir.path().join("hashes.json"));
        let records = [record(1, 0), record(2, 5)];

        file.write(&records).unwrap();
        let loaded = file.read().unwrap().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&records[0].digest], records[0]);
        assert_eq!(loaded[&records[1].digest], records[1]);
    }

    #[test]
    fn test_write_creates_parent_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state").join("hashes.json");
        let file = HashStoreFile::new(&path);

        file.write(&[record(3, 1)]).unwrap();

        assert!(path.is_file());
        assert!(!path.with_file_name("hashes.json.tmp").exists());
    }

    #[test]
    fn test_file_format_is_digest_to_timestamp_object() {
        let dir = TempDir::new().unwrap();
        let file = HashStoreFile::new(dir.path().join("hashes.json"));
        file.write(&[record(0xab, 9)]).unwrap();

        let json = fs::read_to_string(file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(
            object[&"ab".repeat(32)],
            serde_json::json!("2024-01-01T10:09:00.000000Z")
        );
    }

    #[test]
    fn test_reads_naive_timestamps_as_utc() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hashes.json");
        let key = "cd".repeat(32);
        fs::write(
            &path,
            format!(r#"{{"{key}": "2024-01-01T10:09:00.123456", "{}": "2024-01-01T10:10:00"}}"#, "ef".repeat(32)),
        )
        .unwrap();

        let loaded = HashStoreFile::new(&path).read().unwrap().unwrap();
        let digest: RowDigest = key.parse().unwrap();
        assert_eq!(
            loaded[&digest].first_seen_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 9, 0).unwrap()
                + chrono::TimeDelta::microseconds(123_456)
        );
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_malformed_json_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hashes.json");
        fs::write(&path, "{not json").unwrap();

        let err = HashStoreFile::new(&path).read().unwrap_err();
        assert!(matches!(err, Error::StorageLoad { .. }));
    }

    #[test]
    fn test_bad_digest_key_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hashes.json");
        fs::write(&path, r#"{"xyz": "2024-01-01T10:00:00Z"}"#).unwrap();

        assert!(HashStoreFile::new(&path).read().is_err());
    }

    #[test]
    fn test_bad_timestamp_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hashes.json");
        fs::write(&path, format!(r#"{{"{}": "yesterday"}}"#, "00".repeat(32))).unwrap();

        assert!(HashStoreFile::new(&path).read().is_err());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let file = HashStoreFile::new(dir.path().join("hashes.json"));
        assert!(!file.remove().unwrap());

        file.write(&[record(1, 0)]).unwrap();
        assert!(file.remove().unwrap());
        assert!(!file.exists());
    }

    #[test]
    fn test_write_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        // Parent "directory" is a regular file.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let file = HashStoreFile::new(blocker.join("hashes.json"));

        let err = file.write(&[record(1, 0)]).unwrap_err();
        assert!(matches!(err, Error::StorageWrite { .. }));
    }

    #[test]
    fn test_oversized_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hashes.json");
        File::create(&path)
            .unwrap()
            .set_len(MAX_FILE_SIZE + 1)
            .unwrap();

        let err = HashStoreFile::new(&path).read().unwrap_err();
        assert!(matches!(err, Error::StorageLoad { ref cause, .. } if cause.contains("maximum size")));

        let config = DeduplicationConfig::default().with_storage_path(&path);
        assert!(DuplicateStore::load(&config).is_empty());
    }
}
