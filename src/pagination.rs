//! Loading older sync history into an open session.

use tracing::{debug, info};

use crate::source::{SourceError, VersionPage};
use crate::timeline::TimelinePair;
use crate::version::{VersionDescriptor, VersionId};

/// Where the next page of history starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    /// uid of the oldest version loaded so far
    pub last_loaded_id: u64,
    pub has_more: bool,
}

/// Serializes "load more" requests and appends their pages to both sides.
///
/// At most one page request is outstanding; further requests are ignored
/// until it finishes.
#[derive(Debug, Clone)]
pub struct PaginationController {
    cursor: PaginationCursor,
    in_flight: bool,
}

impl PaginationController {
    /// Cursor after the first page of a paginated timeline
    pub fn new(first_page: &[VersionDescriptor], more: bool) -> Self {
        let last_loaded_id = oldest_uid(first_page).unwrap_or_default();
        Self {
            cursor: PaginationCursor {
                last_loaded_id,
                has_more: more && !first_page.is_empty(),
            },
            in_flight: false,
        }
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.cursor
    }

    pub fn has_more(&self) -> bool {
        self.cursor.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Claim the next page. Returns the paging token, or `None` when a page
    /// is already being loaded or the history is exhausted.
    pub fn begin(&mut self) -> Option<u64> {
        if self.in_flight {
            debug!("load more already in flight, ignored");
            return None;
        }
        if !self.cursor.has_more {
            return None;
        }
        self.in_flight = true;
        Some(self.cursor.last_loaded_id)
    }

    /// Apply the outcome of the page request claimed by [`begin`](Self::begin).
    ///
    /// On success the page is appended to both sides and the number of new
    /// versions returned; on failure nothing but the in-flight flag changes,
    /// so the request can simply be issued again.
    pub fn finish(
        &mut self,
        result: Result<VersionPage, SourceError>,
        timelines: &mut TimelinePair,
    ) -> Result<usize, SourceError> {
        self.in_flight = false;
        let page = result?;

        timelines.append(&page.descriptors);
        if let Some(uid) = oldest_uid(&page.descriptors) {
            self.cursor.last_loaded_id = uid;
        }
        self.cursor.has_more = page.more && !page.descriptors.is_empty();

        info!(
            loaded = page.descriptors.len(),
            total = timelines.len(),
            more = self.cursor.has_more,
            "loaded older versions"
        );
        Ok(page.descriptors.len())
    }
}

fn oldest_uid(descriptors: &[VersionDescriptor]) -> Option<u64> {
    descriptors.iter().rev().find_map(|d| match d.id {
        VersionId::Sync(uid) => Some(uid),
        _ => None,
    })
}
