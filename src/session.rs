//! The comparison session: two cursors over one backend's timeline.
//!
//! A `DiffSession` is a state machine driven by user operations and by the
//! completions of the jobs those operations hand out:
//!
//! ```text
//! Uninitialized -> Loading -> Ready
//!                     \-> Unavailable
//! ```
//!
//! Every backend switch bumps the session generation; completions carrying an
//! older generation are dropped. Within a generation, each side's content
//! requests are numbered and only the latest one dispatched may write into the
//! cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::ContentCache;
use crate::constant::MIN_TIMELINE_LEN;
use crate::diff;
use crate::messages::{
    Completion, Job, Outcome, Purpose, SessionUpdate, Ticket, Unavailable, Work,
};
use crate::pagination::{PaginationController, PaginationCursor};
use crate::source::{
    Availability, Collaborators, Remediation, SourceError, VersionPage, VersionSource,
};
use crate::timeline::{OutOfRange, TimelinePair};
use crate::version::{BackendKind, Side, VersionDescriptor};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),

    #[error("No backend session is loaded")]
    NotReady,

    #[error("{0} history is not paginated")]
    PaginationUnsupported(BackendKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Loading,
    Ready,
    Unavailable,
}

/// Keyboard navigation: left/right pick a side, up/down move through it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Left,
    Right,
    Up,
    Down,
}

/// Result of applying a completion
pub struct Applied {
    pub update: SessionUpdate,
    pub jobs: Vec<Job>,
}

impl Applied {
    fn update(update: SessionUpdate) -> Self {
        Self {
            update,
            jobs: Vec::new(),
        }
    }
}

struct Loaded {
    timelines: TimelinePair,
    cache: ContentCache,
    pagination: Option<PaginationController>,
    /// Latest content request dispatched per side
    seq: [u64; 2],
    ready: bool,
}

impl Loaded {
    fn seq_mut(&mut self, side: Side) -> &mut u64 {
        &mut self.seq[slot(side)]
    }
}

enum State {
    Uninitialized,
    Listing,
    Active(Box<Loaded>),
    Unavailable(Unavailable),
}

pub struct DiffSession {
    path: PathBuf,
    collaborators: Collaborators,
    kind: Option<BackendKind>,
    generation: u64,
    source: Option<Arc<VersionSource>>,
    state: State,
    focus: Side,
}

impl DiffSession {
    pub fn new(path: impl Into<PathBuf>, collaborators: Collaborators) -> Self {
        Self {
            path: path.into(),
            collaborators,
            kind: None,
            generation: 0,
            source: None,
            state: State::Uninitialized,
            focus: Side::Left,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> Option<BackendKind> {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn focused_side(&self) -> Side {
        self.focus
    }

    /// Check every backend for the switcher
    pub fn availability(&self) -> Availability {
        self.collaborators.availability()
    }

    pub fn status(&self) -> SessionStatus {
        match &self.state {
            State::Uninitialized => SessionStatus::Uninitialized,
            State::Listing => SessionStatus::Loading,
            State::Active(loaded) if loaded.ready => SessionStatus::Ready,
            State::Active(_) => SessionStatus::Loading,
            State::Unavailable(_) => SessionStatus::Unavailable,
        }
    }

    // ========================================================================
    // Backend lifecycle
    // ========================================================================

    /// Start a fresh session on `kind`, discarding all previous state
    pub fn initialize(&mut self, kind: BackendKind) -> Vec<Job> {
        self.generation += 1;
        self.kind = Some(kind);
        self.source = None;
        self.state = State::Uninitialized;
        info!(backend = %kind, generation = self.generation, path = ?self.path, "initializing");

        if !self.collaborators.is_available(kind) {
            self.become_unavailable(SourceError::Unavailable(kind));
            return Vec::new();
        }

        let source = match self.collaborators.source_for(kind, &self.path) {
            Ok(source) => Arc::new(source),
            Err(e) => {
                self.become_unavailable(e);
                return Vec::new();
            }
        };

        self.state = State::Listing;
        self.source = Some(Arc::clone(&source));
        vec![Job::new(
            self.ticket(Purpose::Timeline),
            Work::List { after_uid: None },
            source,
        )]
    }

    /// Switch to another backend. Switching to the current one does nothing.
    pub fn switch_backend(&mut self, kind: BackendKind) -> Vec<Job> {
        if self.kind == Some(kind) {
            debug!(backend = %kind, "already on backend, switch ignored");
            return Vec::new();
        }
        self.initialize(kind)
    }

    /// Re-run initialization of the current backend
    pub fn reload(&mut self) -> Vec<Job> {
        match self.kind {
            Some(kind) => self.initialize(kind),
            None => Vec::new(),
        }
    }

    fn become_unavailable(&mut self, error: SourceError) {
        let Some(kind) = self.kind else {
            return;
        };
        warn!(backend = %kind, "no comparison possible: {error}");
        self.source = None;
        self.state = State::Unavailable(Unavailable {
            error,
            guide: Remediation::for_backend(kind),
        });
    }

    fn ticket(&self, purpose: Purpose) -> Ticket {
        Ticket {
            generation: self.generation,
            purpose,
        }
    }

    // ========================================================================
    // User operations
    // ========================================================================

    /// Make `index` active on `side` and fetch its content. The other side
    /// is left alone; selecting the same version on both sides is allowed.
    pub fn select_version(&mut self, side: Side, index: usize) -> Result<Job, SessionError> {
        let loaded = self.loaded_mut()?;
        let descriptor = loaded.timelines.side_mut(side).select(index)?.clone();
        self.dispatch_fetch(side, descriptor)
    }

    /// Move `side` by `delta` versions; `None` when the move would leave the
    /// timeline, in which case nothing changes
    pub fn navigate(&mut self, side: Side, delta: isize) -> Result<Option<Job>, SessionError> {
        let loaded = self.loaded_mut()?;
        let Some(descriptor) = loaded.timelines.side_mut(side).move_by(delta).cloned() else {
            return Ok(None);
        };
        self.dispatch_fetch(side, descriptor).map(Some)
    }

    /// Up moves the focused side to a newer version, down to an older one
    pub fn handle_key(&mut self, key: NavKey) -> Result<Option<Job>, SessionError> {
        match key {
            NavKey::Left => {
                self.focus = Side::Left;
                Ok(None)
            }
            NavKey::Right => {
                self.focus = Side::Right;
                Ok(None)
            }
            NavKey::Up => self.navigate(self.focus, -1),
            NavKey::Down => self.navigate(self.focus, 1),
        }
    }

    /// Fetch the active version of `side` again, e.g. after a failed fetch
    pub fn retry(&mut self, side: Side) -> Result<Job, SessionError> {
        let descriptor = self.loaded()?.timelines.side(side).active().clone();
        self.dispatch_fetch(side, descriptor)
    }

    /// Request the next page of older versions.
    ///
    /// Returns `None` while a page is already loading or once the history
    /// is exhausted.
    pub fn load_more(&mut self) -> Result<Option<Job>, SessionError> {
        let kind = self.kind.ok_or(SessionError::NotReady)?;
        let source = self.source.clone().ok_or(SessionError::NotReady)?;
        let ticket = self.ticket(Purpose::LoadMore);
        let loaded = self.loaded_mut()?;
        let pagination = loaded
            .pagination
            .as_mut()
            .ok_or(SessionError::PaginationUnsupported(kind))?;

        Ok(pagination.begin().map(|after_uid| {
            Job::new(
                ticket,
                Work::List {
                    after_uid: Some(after_uid),
                },
                source,
            )
        }))
    }

    fn dispatch_fetch(
        &mut self,
        side: Side,
        descriptor: VersionDescriptor,
    ) -> Result<Job, SessionError> {
        let source = self.source.clone().ok_or(SessionError::NotReady)?;
        let generation = self.generation;
        let loaded = self.loaded_mut()?;

        let seq = loaded.seq_mut(side);
        *seq += 1;
        let seq = *seq;
        loaded.cache.invalidate(side);

        debug!(%side, seq, id = ?descriptor.id, "fetching content");
        Ok(Job::new(
            Ticket {
                generation,
                purpose: Purpose::Content { side, seq },
            },
            Work::Fetch { descriptor },
            source,
        ))
    }

    // ========================================================================
    // Completions
    // ========================================================================

    /// Fold a finished job into the session
    pub fn apply(&mut self, completion: Completion) -> Applied {
        let Completion { ticket, outcome } = completion;
        if ticket.generation != self.generation {
            debug!(
                stale = ticket.generation,
                current = self.generation,
                "dropping completion from a previous session"
            );
            return Applied::update(SessionUpdate::Stale);
        }

        match (ticket.purpose, outcome) {
            (Purpose::Timeline, Outcome::Listed(result)) => self.apply_timeline(result),
            (Purpose::Content { side, seq }, Outcome::Fetched(result)) => {
                Applied::update(self.apply_content(side, seq, result))
            }
            (Purpose::LoadMore, Outcome::Listed(result)) => {
                Applied::update(self.apply_page(result))
            }
            (purpose, _) => {
                warn!(?purpose, "completion does not match its ticket");
                Applied::update(SessionUpdate::Stale)
            }
        }
    }

    fn apply_timeline(&mut self, result: Result<VersionPage, SourceError>) -> Applied {
        if !matches!(self.state, State::Listing) {
            return Applied::update(SessionUpdate::Stale);
        }
        let (Some(kind), Some(source)) = (self.kind, self.source.clone()) else {
            return Applied::update(SessionUpdate::Stale);
        };

        let page = match result {
            Ok(page) if page.descriptors.len() >= MIN_TIMELINE_LEN => page,
            Ok(page) => {
                return self.unavailable_update(SourceError::Empty {
                    kind,
                    found: page.descriptors.len(),
                });
            }
            Err(e) => return self.unavailable_update(e),
        };

        let pagination = source
            .is_paginated()
            .then(|| PaginationController::new(&page.descriptors, page.more));
        let len = page.descriptors.len();
        let timelines = match TimelinePair::new(page.descriptors) {
            Ok(timelines) => timelines,
            Err(_) => return self.unavailable_update(SourceError::Empty { kind, found: len }),
        };
        info!(backend = %kind, versions = len, "timeline loaded");

        self.state = State::Active(Box::new(Loaded {
            timelines,
            cache: ContentCache::default(),
            pagination,
            seq: [0; 2],
            ready: false,
        }));

        let mut jobs = Vec::with_capacity(2);
        for side in [Side::Left, Side::Right] {
            if let Ok(job) = self.retry(side) {
                jobs.push(job);
            }
        }
        Applied {
            update: SessionUpdate::TimelineLoaded { len },
            jobs,
        }
    }

    fn apply_content(
        &mut self,
        side: Side,
        seq: u64,
        result: Result<String, SourceError>,
    ) -> SessionUpdate {
        let State::Active(loaded) = &mut self.state else {
            return SessionUpdate::Stale;
        };
        if loaded.seq[slot(side)] != seq {
            debug!(%side, seq, latest = loaded.seq[slot(side)], "dropping superseded content");
            return SessionUpdate::Stale;
        }

        match result {
            Ok(text) => {
                loaded.cache.set(side, text);
                if loaded.ready {
                    SessionUpdate::ContentChanged(side)
                } else if loaded.cache.diff_input().is_some() {
                    loaded.ready = true;
                    info!("session ready");
                    SessionUpdate::Ready
                } else {
                    SessionUpdate::Pending
                }
            }
            Err(error) if loaded.ready => SessionUpdate::ContentFailed { side, error },
            Err(error) => self.unavailable_update(error).update,
        }
    }

    fn apply_page(&mut self, result: Result<VersionPage, SourceError>) -> SessionUpdate {
        let State::Active(loaded) = &mut self.state else {
            return SessionUpdate::Stale;
        };
        let Loaded {
            timelines,
            pagination,
            ..
        } = &mut **loaded;
        let Some(pagination) = pagination.as_mut() else {
            return SessionUpdate::Stale;
        };

        match pagination.finish(result, timelines) {
            Ok(count) => SessionUpdate::VersionsAppended {
                count,
                more: pagination.has_more(),
            },
            Err(e) => {
                warn!("loading older versions failed: {e}");
                SessionUpdate::LoadMoreFailed(e)
            }
        }
    }

    fn unavailable_update(&mut self, error: SourceError) -> Applied {
        self.become_unavailable(error);
        match &self.state {
            State::Unavailable(unavailable) => {
                Applied::update(SessionUpdate::Unavailable(unavailable.clone()))
            }
            _ => Applied::update(SessionUpdate::Stale),
        }
    }

    // ========================================================================
    // Views
    // ========================================================================

    fn loaded(&self) -> Result<&Loaded, SessionError> {
        match &self.state {
            State::Active(loaded) => Ok(&**loaded),
            _ => Err(SessionError::NotReady),
        }
    }

    fn loaded_mut(&mut self) -> Result<&mut Loaded, SessionError> {
        match &mut self.state {
            State::Active(loaded) => Ok(&mut **loaded),
            _ => Err(SessionError::NotReady),
        }
    }

    /// Both sides' descriptor lists with their active indices
    pub fn timelines(&self) -> Option<&TimelinePair> {
        self.loaded().ok().map(|loaded| &loaded.timelines)
    }

    pub fn active_index(&self, side: Side) -> Option<usize> {
        self.timelines().map(|t| t.side(side).active_index())
    }

    /// Resolved content of `side`; `None` while its fetch is outstanding
    pub fn content(&self, side: Side) -> Option<&str> {
        self.loaded().ok()?.cache.get(side)
    }

    /// Content of the focused side, for rendering a single version
    pub fn focused_content(&self) -> Option<&str> {
        self.content(self.focus)
    }

    /// `(left, right)` once both sides are resolved
    pub fn diff_input(&self) -> Option<(&str, &str)> {
        self.loaded().ok()?.cache.diff_input()
    }

    /// Unified diff of the current pair, named after the file
    pub fn unified_diff(&self, context_lines: usize) -> Option<String> {
        let (left, right) = self.diff_input()?;
        let name = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(diff::unified(&name, left, right, context_lines))
    }

    /// Whether a "load more" affordance should be shown
    pub fn has_more(&self) -> bool {
        self.loaded()
            .ok()
            .and_then(|loaded| loaded.pagination.as_ref())
            .is_some_and(|p| p.has_more())
    }

    /// Where the next page of older versions starts, on paginated backends
    pub fn pagination_cursor(&self) -> Option<PaginationCursor> {
        self.loaded()
            .ok()
            .and_then(|loaded| loaded.pagination.as_ref())
            .map(|p| p.cursor())
    }

    pub fn is_loading_more(&self) -> bool {
        self.loaded()
            .ok()
            .and_then(|loaded| loaded.pagination.as_ref())
            .is_some_and(|p| p.is_loading())
    }

    /// Why the current backend cannot be compared, if it can't
    pub fn unavailable(&self) -> Option<&Unavailable> {
        match &self.state {
            State::Unavailable(unavailable) => Some(unavailable),
            _ => None,
        }
    }
}

fn slot(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}
