use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{SourceError, VersionPage};
use crate::version::{BackendKind, VersionDescriptor, VersionId};

/// A history entry as reported by the sync server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncItem {
    pub uid: u64,
    /// Milliseconds since the epoch
    pub ts: i64,
    pub size: u64,
    pub device: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncHistory {
    pub items: Vec<SyncItem>,
    pub more: bool,
}

/// Read access to the cloud sync log
pub trait SyncClient: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Newest-first page of history older than `after_uid`
    fn get_history(&self, path: &Path, after_uid: Option<u64>) -> Result<SyncHistory, SourceError>;

    fn content_for_version(&self, uid: u64) -> Result<Vec<u8>, SourceError>;
}

pub struct SyncSource {
    client: Arc<dyn SyncClient>,
    path: PathBuf,
}

impl SyncSource {
    pub fn new(client: Arc<dyn SyncClient>, path: PathBuf) -> Self {
        Self { client, path }
    }

    pub fn list_versions(&self, after_uid: Option<u64>) -> Result<VersionPage, SourceError> {
        if !self.client.is_enabled() {
            return Err(SourceError::Unavailable(BackendKind::Sync));
        }

        let history = self.client.get_history(&self.path, after_uid)?;
        Ok(VersionPage {
            descriptors: history.items.iter().map(describe).collect(),
            more: history.more,
        })
    }

    pub fn fetch_content(&self, descriptor: &VersionDescriptor) -> Result<String, SourceError> {
        if !self.client.is_enabled() {
            return Err(SourceError::Unavailable(BackendKind::Sync));
        }

        match descriptor.id {
            VersionId::Sync(uid) => {
                let bytes = self.client.content_for_version(uid)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            ref other => Err(SourceError::FetchFailed(format!(
                "{other:?} is not a sync version"
            ))),
        }
    }
}

fn describe(item: &SyncItem) -> VersionDescriptor {
    VersionDescriptor {
        id: VersionId::Sync(item.uid),
        timestamp: DateTime::<Utc>::from_timestamp_millis(item.ts).unwrap_or_default(),
        size_bytes: Some(item.size),
        label: item.device.clone(),
        is_disk_state: false,
        device: Some(item.device.clone()),
        commit: None,
    }
}
