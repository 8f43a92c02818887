//! Requests the session hands out and the answers it takes back.
//!
//! The session never blocks on a backend. Each operation returns [`Job`]s;
//! whoever runs them feeds the resulting [`Completion`]s back into
//! `DiffSession::apply`, in any order.

use std::fmt;
use std::sync::Arc;

use crate::source::{Remediation, SourceError, VersionPage, VersionSource};
use crate::version::{Side, VersionDescriptor};

/// What a job's answer will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// First listing of a backend session
    Timeline,
    /// Content for one side; `seq` orders requests for that side
    Content { side: Side, seq: u64 },
    /// An older page of sync history
    LoadMore,
}

/// Identifies the session generation and purpose of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub generation: u64,
    pub purpose: Purpose,
}

#[derive(Debug, Clone)]
pub enum Work {
    List { after_uid: Option<u64> },
    Fetch { descriptor: VersionDescriptor },
}

/// One adapter call waiting to be executed
pub struct Job {
    pub ticket: Ticket,
    pub work: Work,
    source: Arc<VersionSource>,
}

impl Job {
    pub(crate) fn new(ticket: Ticket, work: Work, source: Arc<VersionSource>) -> Self {
        Self {
            ticket,
            work,
            source,
        }
    }

    /// Perform the adapter call. May block on disk, process or network I/O.
    pub fn run(self) -> Completion {
        let outcome = match &self.work {
            Work::List { after_uid } => Outcome::Listed(self.source.list_versions(*after_uid)),
            Work::Fetch { descriptor } => Outcome::Fetched(self.source.fetch_content(descriptor)),
        };
        Completion {
            ticket: self.ticket,
            outcome,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("ticket", &self.ticket)
            .field("work", &self.work)
            .field("backend", &self.source.kind())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Listed(Result<VersionPage, SourceError>),
    Fetched(Result<String, SourceError>),
}

/// The answer to a [`Job`]
#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: Ticket,
    pub outcome: Outcome,
}

/// Why a backend cannot be compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unavailable {
    pub error: SourceError,
    pub guide: Remediation,
}

/// What changed after applying a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The completion belonged to an older request and was dropped
    Stale,
    /// Timeline listed; initial contents are being fetched
    TimelineLoaded { len: usize },
    /// One initial side resolved, the other is still pending
    Pending,
    /// Both sides resolved for the first time
    Ready,
    /// The backend has nothing to compare
    Unavailable(Unavailable),
    ContentChanged(Side),
    ContentFailed { side: Side, error: SourceError },
    VersionsAppended { count: usize, more: bool },
    LoadMoreFailed(SourceError),
}
