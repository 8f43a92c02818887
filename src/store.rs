use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use xxhash_rust::xxh64::xxh64;

use crate::config::Config;
use crate::source::{SnapshotRecord, SnapshotStore, SourceError};

const BLOB_DIR: &str = "blobs";
const HISTORY_DIR: &str = "history";

/// Custom error types for the snapshot store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),
}

impl From<StoreError> for SourceError {
    fn from(e: StoreError) -> Self {
        SourceError::FetchFailed(e.to_string())
    }
}

/// One snapshot in a file's history index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub hash: String,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    pub file_path: PathBuf,
}

/// Content-addressable local snapshot store.
///
/// Blobs are keyed by the XXHash64 of their content, so identical snapshots
/// share storage. Each tracked file has a JSON index of its snapshots, oldest
/// first, named after the hash of the file path.
pub struct DiskSnapshotStore {
    blobs_dir: PathBuf,
    history_dir: PathBuf,
    enabled: bool,
    /// Paths handed in are taken relative to this directory
    base: Option<PathBuf>,
}

impl DiskSnapshotStore {
    /// Open the store under the configured data directory
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let data_dir = config.snapshot_dir();
        let store = Self::open(data_dir)?;
        Ok(Self {
            enabled: config.settings.snapshots_enabled,
            ..store
        })
    }

    /// Open (and create if needed) a store rooted at `data_dir`
    pub fn open(data_dir: PathBuf) -> Result<Self, StoreError> {
        let blobs_dir = data_dir.join(BLOB_DIR);
        let history_dir = data_dir.join(HISTORY_DIR);

        fs::create_dir_all(&blobs_dir)?;
        fs::create_dir_all(&history_dir)?;
        info!("Snapshot store at {:?}", data_dir);

        Ok(Self {
            blobs_dir,
            history_dir,
            enabled: true,
            base: None,
        })
    }

    /// Key snapshots by `base.join(path)` so equal relative paths in
    /// different directories keep separate histories
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Calculate XXHash64 of content and return as hex string
    fn calculate_hash(content: &str) -> String {
        let hash = xxh64(content.as_bytes(), 0);
        format!("{:016x}", hash)
    }

    fn index_path(&self, file_path: &Path) -> PathBuf {
        let key = xxh64(file_path.to_string_lossy().as_bytes(), 0);
        self.history_dir.join(format!("{:016x}.json", key))
    }

    /// Save blob to storage if it doesn't already exist (deduplication)
    fn save_blob(&self, hash: &str, content: &str) -> Result<(), StoreError> {
        let blob_path = self.blobs_dir.join(hash);

        if !blob_path.exists() {
            fs::write(blob_path, content)?;
        }

        Ok(())
    }

    fn load_blob(&self, hash: &str) -> Result<String, StoreError> {
        let blob_path = self.blobs_dir.join(hash);

        if !blob_path.exists() {
            return Err(StoreError::InvalidHash(format!(
                "Blob not found for hash: {}",
                hash
            )));
        }

        Ok(fs::read_to_string(blob_path)?)
    }

    /// Load the snapshot index of a file, oldest first
    pub fn load_index(&self, file_path: &Path) -> Result<Vec<SnapshotEntry>, StoreError> {
        let index_path = self.index_path(&self.resolve(file_path));

        if !index_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(index_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_index(&self, file_path: &Path, entries: &[SnapshotEntry]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(self.index_path(&self.resolve(file_path)), content)?;
        Ok(())
    }

    /// Record a snapshot of `file_path`.
    ///
    /// Returns the snapshot timestamp, or `None` when the content is identical
    /// to the newest snapshot already stored.
    pub fn save(&self, file_path: &Path, content: &str) -> Result<Option<i64>, StoreError> {
        let hash = Self::calculate_hash(content);
        let mut index = self.load_index(file_path)?;

        if index.last().is_some_and(|latest| latest.hash == hash) {
            debug!(path = ?file_path, "snapshot unchanged, skipped");
            return Ok(None);
        }

        self.save_blob(&hash, content)?;

        // Timestamps double as snapshot ids and must stay unique per file
        let now = Utc::now().timestamp_millis();
        let timestamp = match index.last() {
            Some(latest) if latest.timestamp >= now => latest.timestamp + 1,
            _ => now,
        };

        index.push(SnapshotEntry {
            hash,
            timestamp,
            file_path: self.resolve(file_path),
        });
        self.save_index(file_path, &index)?;

        Ok(Some(timestamp))
    }
}

impl SnapshotStore for DiskSnapshotStore {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn snapshots(&self, path: &Path) -> Result<Vec<SnapshotRecord>, SourceError> {
        let key = self.resolve(path);
        let index = self.load_index(path)?;
        index
            .iter()
            .rev()
            .filter(|entry| entry.file_path == key)
            .map(|entry| -> Result<SnapshotRecord, SourceError> {
                Ok(SnapshotRecord {
                    path: entry.file_path.clone(),
                    timestamp: entry.timestamp,
                    data: self.load_blob(&entry.hash)?,
                })
            })
            .collect()
    }

    fn snapshot(&self, path: &Path, timestamp: i64) -> Result<Option<SnapshotRecord>, SourceError> {
        let key = self.resolve(path);
        let index = self.load_index(path)?;
        match index
            .iter()
            .find(|entry| entry.timestamp == timestamp && entry.file_path == key)
        {
            Some(entry) => Ok(Some(SnapshotRecord {
                path: entry.file_path.clone(),
                timestamp,
                data: self.load_blob(&entry.hash)?,
            })),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn setup_test_store() -> (DiskSnapshotStore, PathBuf) {
        let test_dir = std::env::temp_dir().join(format!("test_store_{}", Uuid::new_v4()));
        let store = DiskSnapshotStore::open(test_dir.clone()).unwrap();
        (store, test_dir)
    }

    fn cleanup_test_dir(test_dir: &Path) {
        let _ = fs::remove_dir_all(test_dir);
    }

    #[test]
    fn test_hash_calculation() {
        let hash1 = DiskSnapshotStore::calculate_hash("Hello, World!");
        let hash2 = DiskSnapshotStore::calculate_hash("Hello, World!");
        let hash3 = DiskSnapshotStore::calculate_hash("Different content");

        assert_eq!(hash1, hash2, "Same content should produce same hash");
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16, "Hash should be 16 hex characters");
    }

    #[test]
    fn test_snapshots_are_newest_first() {
        let (store, test_dir) = setup_test_store();
        let path = Path::new("notes/today.md");

        let t1 = store.save(path, "first").unwrap().unwrap();
        let t2 = store.save(path, "second").unwrap().unwrap();
        let t3 = store.save(path, "third").unwrap().unwrap();
        assert!(t1 < t2 && t2 < t3, "timestamps must be strictly increasing");

        let records = store.snapshots(path).unwrap();
        let data: Vec<&str> = records.iter().map(|r| r.data.as_str()).collect();
        assert_eq!(data, vec!["third", "second", "first"]);
        assert_eq!(records[0].timestamp, t3);

        cleanup_test_dir(&test_dir);
    }

    #[test]
    fn test_unchanged_content_is_not_recorded() {
        let (store, test_dir) = setup_test_store();
        let path = Path::new("a.md");

        assert!(store.save(path, "same").unwrap().is_some());
        assert!(store.save(path, "same").unwrap().is_none());
        assert_eq!(store.load_index(path).unwrap().len(), 1);

        // Reverting to earlier content is a new snapshot sharing the old blob
        store.save(path, "changed").unwrap();
        store.save(path, "same").unwrap();
        assert_eq!(store.load_index(path).unwrap().len(), 3);
        assert_eq!(fs::read_dir(test_dir.join(BLOB_DIR)).unwrap().count(), 2);

        cleanup_test_dir(&test_dir);
    }

    #[test]
    fn test_files_do_not_share_history() {
        let (store, test_dir) = setup_test_store();

        store.save(Path::new("a.md"), "a1").unwrap();
        store.save(Path::new("b.md"), "b1").unwrap();

        assert_eq!(store.snapshots(Path::new("a.md")).unwrap().len(), 1);
        assert_eq!(store.snapshots(Path::new("b.md")).unwrap()[0].data, "b1");
        assert!(store.snapshots(Path::new("c.md")).unwrap().is_empty());

        cleanup_test_dir(&test_dir);
    }

    #[test]
    fn test_base_separates_equal_relative_paths() {
        let (store, test_dir) = setup_test_store();
        let first = DiskSnapshotStore::open(test_dir.clone()).unwrap().with_base("/vault/one");
        let second = store.with_base("/vault/two");

        first.save(Path::new("notes.md"), "one").unwrap();
        second.save(Path::new("notes.md"), "two").unwrap();

        let records = first.snapshots(Path::new("notes.md")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, "one");
        assert_eq!(records[0].path, PathBuf::from("/vault/one/notes.md"));
        assert_eq!(second.snapshots(Path::new("notes.md")).unwrap()[0].data, "two");

        cleanup_test_dir(&test_dir);
    }

    #[test]
    fn test_lookup_by_timestamp() {
        let (store, test_dir) = setup_test_store();
        let path = Path::new("a.md");

        let ts = store.save(path, "content").unwrap().unwrap();
        assert_eq!(store.snapshot(path, ts).unwrap().unwrap().data, "content");
        assert!(store.snapshot(path, ts + 1000).unwrap().is_none());

        // A missing blob surfaces as a fetch failure
        fs::remove_dir_all(test_dir.join(BLOB_DIR)).unwrap();
        assert!(matches!(
            store.snapshot(path, ts),
            Err(SourceError::FetchFailed(_))
        ));

        cleanup_test_dir(&test_dir);
    }
}
