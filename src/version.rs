//! Backend-agnostic version descriptors.
//!
//! Every backend's history is normalized into an ordered, newest-first list of
//! [`VersionDescriptor`]s. The id is only meaningful to the adapter that
//! produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constant::DISK_STATE_LABEL;

/// The three kinds of history backends a session can run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sync,
    Recovery,
    Git,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Recovery, BackendKind::Git, BackendKind::Sync];

    pub fn title(self) -> &'static str {
        match self {
            BackendKind::Sync => "Sync Diff",
            BackendKind::Recovery => "File Recovery Diff",
            BackendKind::Git => "Git Diff",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Sync => "sync",
            BackendKind::Recovery => "recovery",
            BackendKind::Git => "git",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(BackendKind::Sync),
            "recovery" => Ok(BackendKind::Recovery),
            "git" => Ok(BackendKind::Git),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// One of the two independently navigable comparison slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Side::Left),
            "right" | "r" => Ok(Side::Right),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Adapter-specific identity of a version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionId {
    /// The file's live content
    Disk,
    /// Numeric uid assigned by the sync server
    Sync(u64),
    /// Snapshot timestamp in milliseconds since the epoch
    Snapshot(i64),
    /// Full commit hash
    Commit(String),
}

/// Commit metadata carried by git descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub date: String,
    pub refs: String,
    pub message: String,
    pub body: String,
    /// Path of the file as of this commit
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub id: VersionId,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub label: String,
    pub is_disk_state: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
}

impl VersionDescriptor {
    /// The synthetic entry for the file's current on-disk content
    pub fn disk_state(now: DateTime<Utc>) -> Self {
        Self {
            id: VersionId::Disk,
            timestamp: now,
            size_bytes: None,
            label: DISK_STATE_LABEL.to_string(),
            is_disk_state: true,
            device: None,
            commit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("Git".parse::<BackendKind>().unwrap(), BackendKind::Git);
        assert_eq!(" sync ".parse::<BackendKind>().unwrap(), BackendKind::Sync);
        assert!("svn".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Recovery.to_string(), "recovery");
    }

    #[test]
    fn side_parses_short_names() {
        assert_eq!("l".parse::<Side>().unwrap(), Side::Left);
        assert_eq!("Right".parse::<Side>().unwrap(), Side::Right);
        assert!("middle".parse::<Side>().is_err());
        assert_eq!(Side::Left.to_string(), "left");
    }

    #[test]
    fn disk_state_descriptor_is_flagged() {
        let d = VersionDescriptor::disk_state(Utc::now());
        assert!(d.is_disk_state);
        assert_eq!(d.id, VersionId::Disk);
        assert_eq!(d.label, DISK_STATE_LABEL);
    }
}
