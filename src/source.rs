//! Version sources: one adapter per history backend behind a single contract.
//!
//! A [`VersionSource`] lists a file's history as newest-first
//! [`VersionDescriptor`]s and fetches the text of any listed version. The
//! backends themselves (sync server, snapshot store, git) are consumed through
//! the narrow collaborator traits re-exported here.

pub mod git;
pub mod recovery;
pub mod sync;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::constant::MIN_TIMELINE_LEN;
use crate::version::{BackendKind, VersionDescriptor};

pub use git::{GitBackend, GitCli, GitSource};
pub use recovery::{RecoverySource, SnapshotRecord, SnapshotStore};
pub use sync::{SyncClient, SyncHistory, SyncItem, SyncSource};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("{0} backend is not available")]
    Unavailable(BackendKind),

    #[error("{kind} backend has {found} usable entries, at least 2 are needed")]
    Empty { kind: BackendKind, found: usize },

    #[error("Failed to fetch content: {0}")]
    FetchFailed(String),
}

impl From<io::Error> for SourceError {
    fn from(e: io::Error) -> Self {
        SourceError::FetchFailed(e.to_string())
    }
}

/// One page (or the whole) of a file's history
#[derive(Debug, Clone, Default)]
pub struct VersionPage {
    pub descriptors: Vec<VersionDescriptor>,
    pub more: bool,
}

/// Live read of the file's current content
pub trait FileReader: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// Reads files relative to a root directory
pub struct FsReader {
    root: PathBuf,
}

impl FsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<String> {
        let bytes = fs::read(self.root.join(path))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ============================================================================
// Tagged adapter
// ============================================================================

pub enum VersionSource {
    Sync(SyncSource),
    Recovery(RecoverySource),
    Git(GitSource),
}

impl VersionSource {
    pub fn kind(&self) -> BackendKind {
        match self {
            VersionSource::Sync(_) => BackendKind::Sync,
            VersionSource::Recovery(_) => BackendKind::Recovery,
            VersionSource::Git(_) => BackendKind::Git,
        }
    }

    /// Only the sync backend hands out history in pages
    pub fn is_paginated(&self) -> bool {
        matches!(self, VersionSource::Sync(_))
    }

    /// List versions. `after_uid` is the oldest uid already known and is
    /// ignored by the non-paginated backends.
    ///
    /// The first page of any backend must hold at least two entries,
    /// otherwise `Empty` is returned.
    pub fn list_versions(&self, after_uid: Option<u64>) -> Result<VersionPage, SourceError> {
        let page = match self {
            VersionSource::Sync(source) => source.list_versions(after_uid)?,
            VersionSource::Recovery(source) => source.list_versions()?,
            VersionSource::Git(source) => source.list_versions()?,
        };

        if after_uid.is_none() && page.descriptors.len() < MIN_TIMELINE_LEN {
            return Err(SourceError::Empty {
                kind: self.kind(),
                found: page.descriptors.len(),
            });
        }

        Ok(page)
    }

    pub fn fetch_content(&self, descriptor: &VersionDescriptor) -> Result<String, SourceError> {
        let result = match self {
            VersionSource::Sync(source) => source.fetch_content(descriptor),
            VersionSource::Recovery(source) => source.fetch_content(descriptor),
            VersionSource::Git(source) => source.fetch_content(descriptor),
        };
        if let Err(e) = &result {
            warn!(backend = %self.kind(), id = ?descriptor.id, "fetch failed: {e}");
        }
        result
    }
}

// ============================================================================
// Collaborators and availability
// ============================================================================

/// Which backends can currently be switched to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability {
    pub sync: bool,
    pub recovery: bool,
    pub git: bool,
}

impl Availability {
    pub fn is_available(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Sync => self.sync,
            BackendKind::Recovery => self.recovery,
            BackendKind::Git => self.git,
        }
    }
}

/// The external services a session can draw history from
#[derive(Clone)]
pub struct Collaborators {
    pub sync: Option<Arc<dyn SyncClient>>,
    pub snapshots: Option<Arc<dyn SnapshotStore>>,
    pub git: Option<Arc<dyn GitBackend>>,
    pub reader: Arc<dyn FileReader>,
}

impl Collaborators {
    pub fn new(reader: Arc<dyn FileReader>) -> Self {
        Self {
            sync: None,
            snapshots: None,
            git: None,
            reader,
        }
    }

    pub fn with_sync(mut self, client: Arc<dyn SyncClient>) -> Self {
        self.sync = Some(client);
        self
    }

    pub fn with_snapshots(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn with_git(mut self, git: Arc<dyn GitBackend>) -> Self {
        self.git = Some(git);
        self
    }

    /// Check one backend, leaving the others alone
    pub fn is_available(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Sync => self.sync.as_ref().is_some_and(|c| c.is_enabled()),
            BackendKind::Recovery => self.snapshots.as_ref().is_some_and(|s| s.is_enabled()),
            BackendKind::Git => self.git.as_ref().is_some_and(|g| g.is_installed()),
        }
    }

    /// Query every backend; the result is never cached
    pub fn availability(&self) -> Availability {
        Availability {
            sync: self.is_available(BackendKind::Sync),
            recovery: self.is_available(BackendKind::Recovery),
            git: self.is_available(BackendKind::Git),
        }
    }

    /// Build the adapter for `kind` over the file at `path`
    pub fn source_for(&self, kind: BackendKind, path: &Path) -> Result<VersionSource, SourceError> {
        let path = path.to_path_buf();
        let reader = Arc::clone(&self.reader);
        match kind {
            BackendKind::Sync => self
                .sync
                .as_ref()
                .map(|client| VersionSource::Sync(SyncSource::new(Arc::clone(client), path))),
            BackendKind::Recovery => self.snapshots.as_ref().map(|store| {
                VersionSource::Recovery(RecoverySource::new(Arc::clone(store), reader, path))
            }),
            BackendKind::Git => self
                .git
                .as_ref()
                .map(|git| VersionSource::Git(GitSource::new(Arc::clone(git), reader, path))),
        }
        .ok_or(SourceError::Unavailable(kind))
    }
}

// ============================================================================
// Remediation guides
// ============================================================================

/// What to tell the user when a backend has nothing to compare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
    pub kind: BackendKind,
    pub title: &'static str,
    pub intro: &'static str,
    pub steps: &'static [&'static str],
}

impl Remediation {
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Sync => Self {
                kind,
                title: "Sync not available",
                intro: "To use Sync version history:",
                steps: &[
                    "Enable sync for this vault",
                    "Set up and connect to your remote vault",
                    "Make sure this file has been synced",
                ],
            },
            BackendKind::Git => Self {
                kind,
                title: "Git not available",
                intro: "To use Git version history:",
                steps: &[
                    "Install git and enable git integration",
                    "Initialize a git repository in your vault",
                    "Commit changes to create version history",
                ],
            },
            BackendKind::Recovery => Self {
                kind,
                title: "No recovery snapshots",
                intro: "File Recovery saves periodic snapshots of your files.",
                steps: &[
                    "Enable periodic file snapshots",
                    "Edit and save the file to create snapshots",
                ],
            },
        }
    }
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", self.intro)?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, step)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use std::sync::atomic::Ordering;

    fn collaborators() -> Collaborators {
        Collaborators::new(Arc::new(FakeReader::new("live\n")))
    }

    #[test]
    fn missing_collaborator_is_unavailable() {
        let c = collaborators();
        let err = c
            .source_for(BackendKind::Git, Path::new("notes.md"))
            .err()
            .unwrap();
        assert_eq!(err, SourceError::Unavailable(BackendKind::Git));
        assert_eq!(c.availability(), Availability::default());
    }

    #[test]
    fn availability_follows_collaborator_flags() {
        let mut git = FakeGit::with_commits(&["c1"]);
        git.installed = false;
        let c = collaborators()
            .with_git(Arc::new(git))
            .with_sync(Arc::new(FakeSync::with_versions(3, 10)));
        let availability = c.availability();
        assert!(availability.is_available(BackendKind::Sync));
        assert!(!availability.is_available(BackendKind::Git));
        assert!(!availability.is_available(BackendKind::Recovery));
    }

    #[test]
    fn checking_one_backend_leaves_git_alone() {
        let git = Arc::new(FakeGit::with_commits(&["c1"]));
        let c = collaborators()
            .with_git(git.clone())
            .with_sync(Arc::new(FakeSync::with_versions(3, 10)));

        assert!(c.is_available(BackendKind::Sync));
        assert!(!c.is_available(BackendKind::Recovery));
        assert_eq!(git.install_checks.load(Ordering::SeqCst), 0);

        assert!(c.is_available(BackendKind::Git));
        assert_eq!(git.install_checks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fs_reader_decodes_invalid_utf8_lossily() {
        let root = std::env::temp_dir().join(format!("test_reader_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("notes.md"), b"caf\xe9 au lait\n").unwrap();

        let text = FsReader::new(&root).read(Path::new("notes.md")).unwrap();
        assert_eq!(text, "caf\u{fffd} au lait\n");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn single_sync_item_is_empty() {
        let c = collaborators().with_sync(Arc::new(FakeSync::with_versions(1, 10)));
        let source = c.source_for(BackendKind::Sync, Path::new("notes.md")).unwrap();
        let err = source.list_versions(None).unwrap_err();
        assert_eq!(
            err,
            SourceError::Empty {
                kind: BackendKind::Sync,
                found: 1
            }
        );
    }

    #[test]
    fn later_pages_may_be_short() {
        let c = collaborators().with_sync(Arc::new(FakeSync::with_versions(3, 2)));
        let source = c.source_for(BackendKind::Sync, Path::new("notes.md")).unwrap();
        let first = source.list_versions(None).unwrap();
        assert_eq!(first.descriptors.len(), 2);
        assert!(first.more);
        let second = source.list_versions(Some(99)).unwrap();
        assert_eq!(second.descriptors.len(), 1);
        assert!(!second.more);
    }

    #[test]
    fn remediation_lists_numbered_steps() {
        let guide = Remediation::for_backend(BackendKind::Recovery).to_string();
        assert!(guide.starts_with("No recovery snapshots"));
        assert!(guide.contains("  1. Enable periodic file snapshots"));
        assert!(guide.contains("  2. "));
    }
}
