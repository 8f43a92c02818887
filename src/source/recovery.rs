use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FileReader, SourceError, VersionPage};
use crate::version::{BackendKind, VersionDescriptor, VersionId};

/// A periodic snapshot of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub path: PathBuf,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    pub data: String,
}

/// Read access to the local periodic-snapshot store
pub trait SnapshotStore: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// All snapshots of `path`, newest first
    fn snapshots(&self, path: &Path) -> Result<Vec<SnapshotRecord>, SourceError>;

    /// The snapshot of `path` taken at `timestamp`, if any
    fn snapshot(&self, path: &Path, timestamp: i64) -> Result<Option<SnapshotRecord>, SourceError> {
        Ok(self
            .snapshots(path)?
            .into_iter()
            .find(|record| record.timestamp == timestamp))
    }
}

pub struct RecoverySource {
    store: Arc<dyn SnapshotStore>,
    reader: Arc<dyn FileReader>,
    path: PathBuf,
}

impl RecoverySource {
    pub fn new(store: Arc<dyn SnapshotStore>, reader: Arc<dyn FileReader>, path: PathBuf) -> Self {
        Self {
            store,
            reader,
            path,
        }
    }

    /// Disk state first, then every snapshot of the file, newest first
    pub fn list_versions(&self) -> Result<VersionPage, SourceError> {
        if !self.store.is_enabled() {
            return Err(SourceError::Unavailable(BackendKind::Recovery));
        }

        let records = self.store.snapshots(&self.path)?;
        let mut descriptors = Vec::with_capacity(records.len() + 1);
        descriptors.push(VersionDescriptor::disk_state(Utc::now()));
        descriptors.extend(records.iter().map(describe));

        Ok(VersionPage {
            descriptors,
            more: false,
        })
    }

    pub fn fetch_content(&self, descriptor: &VersionDescriptor) -> Result<String, SourceError> {
        match descriptor.id {
            VersionId::Disk => Ok(self.reader.read(&self.path)?),
            VersionId::Snapshot(ts) => self
                .store
                .snapshot(&self.path, ts)?
                .map(|record| record.data)
                .ok_or_else(|| SourceError::FetchFailed(format!("snapshot {ts} no longer exists"))),
            ref other => Err(SourceError::FetchFailed(format!(
                "{other:?} is not a recovery snapshot"
            ))),
        }
    }
}

fn describe(record: &SnapshotRecord) -> VersionDescriptor {
    let timestamp = DateTime::<Utc>::from_timestamp_millis(record.timestamp).unwrap_or_default();
    VersionDescriptor {
        id: VersionId::Snapshot(record.timestamp),
        timestamp,
        size_bytes: Some(record.data.len() as u64),
        label: timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        is_disk_state: false,
        device: None,
        commit: None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::{FakeReader, FakeSnapshots};
    use super::*;

    fn record(path: &str, timestamp: i64, data: &str) -> SnapshotRecord {
        SnapshotRecord {
            path: PathBuf::from(path),
            timestamp,
            data: data.to_string(),
        }
    }

    fn source(records: Vec<SnapshotRecord>) -> (RecoverySource, Arc<FakeReader>) {
        let reader = Arc::new(FakeReader::new("on disk\n"));
        let store = Arc::new(FakeSnapshots {
            enabled: true,
            records,
        });
        (
            RecoverySource::new(store, reader.clone(), PathBuf::from("notes.md")),
            reader,
        )
    }

    #[test]
    fn disk_state_leads_the_timeline() {
        let (source, _) = source(vec![
            record("notes.md", 3_000, "third"),
            record("other.md", 2_500, "unrelated"),
            record("notes.md", 2_000, "second"),
        ]);
        let page = source.list_versions().unwrap();
        assert_eq!(page.descriptors.len(), 3);
        assert!(page.descriptors[0].is_disk_state);
        assert_eq!(page.descriptors[1].id, VersionId::Snapshot(3_000));
        assert_eq!(page.descriptors[2].id, VersionId::Snapshot(2_000));
        assert!(!page.more);
    }

    #[test]
    fn disk_content_is_read_live() {
        let (source, reader) = source(vec![record("notes.md", 1_000, "old")]);
        let page = source.list_versions().unwrap();
        assert_eq!(source.fetch_content(&page.descriptors[0]).unwrap(), "on disk\n");
        reader.set("edited\n");
        assert_eq!(source.fetch_content(&page.descriptors[0]).unwrap(), "edited\n");
        assert_eq!(source.fetch_content(&page.descriptors[1]).unwrap(), "old");
    }

    #[test]
    fn vanished_snapshot_fails_fetch() {
        let (source, _) = source(vec![record("notes.md", 1_000, "old")]);
        let mut ghost = source.list_versions().unwrap().descriptors[1].clone();
        ghost.id = VersionId::Snapshot(42);
        assert!(matches!(
            source.fetch_content(&ghost),
            Err(SourceError::FetchFailed(_))
        ));
    }
}
