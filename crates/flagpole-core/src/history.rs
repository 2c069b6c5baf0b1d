//! The accumulated version history behind the history panel.
//!
//! The buffer only ever grows until it is replaced wholesale with
//! [`History::default`]. Which pages get requested is decided by the
//! [`PaginationStrategy`] the buffer was started with.

use crate::{
  controller::RequestId,
  model::{PageRequest, Version, VersionPage, VersionWindow},
};

/// Versions fetched per history page.
pub const HISTORY_PAGE_SIZE: u32 = 10;

// ─── Strategy ────────────────────────────────────────────────────────────────

/// How history pages are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationStrategy {
  /// Plain newest-first paging from page 0.
  #[default]
  NewestFirst,
  /// Paging pinned to a deep-linked version; the anchor is passed through
  /// to the backend on every page request.
  AnchoredOn(u32),
}

impl PaginationStrategy {
  pub fn anchor(self) -> Option<u32> {
    match self {
      Self::NewestFirst => None,
      Self::AnchoredOn(v) => Some(v),
    }
  }

  pub fn page_request(self, page_index: u32) -> PageRequest {
    PageRequest {
      page_index,
      page_size: HISTORY_PAGE_SIZE,
      anchor: self.anchor(),
    }
  }
}

// ─── Buffer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct History {
  versions:    Vec<Version>,
  next_page:   u32,
  has_more:    bool,
  fetched_any: bool,
  pending:     Option<RequestId>,
  strategy:    PaginationStrategy,
}

impl History {
  pub fn versions(&self) -> &[Version] { &self.versions }

  pub fn is_empty(&self) -> bool { self.versions.is_empty() }

  pub fn len(&self) -> usize { self.versions.len() }

  /// The page index the next request will ask for.
  pub fn next_page(&self) -> u32 { self.next_page }

  /// Whether the backend reported more pages after the last one received.
  pub fn has_more(&self) -> bool { self.has_more }

  pub fn strategy(&self) -> PaginationStrategy { self.strategy }

  pub fn pending(&self) -> Option<RequestId> { self.pending }

  pub fn is_loading(&self) -> bool { self.pending.is_some() }

  /// A first page may always be requested; after that only while the
  /// backend says there is more.
  pub fn can_request(&self) -> bool { !self.fetched_any || self.has_more }

  /// The query for the next page under the current strategy.
  pub fn next_request(&self) -> PageRequest {
    self.strategy.page_request(self.next_page)
  }

  /// Mark `id` as the one outstanding request for this buffer.
  pub fn begin(&mut self, id: RequestId) { self.pending = Some(id); }

  /// Whether a reply with `id` answers the outstanding request.
  pub fn is_pending(&self, id: RequestId) -> bool { self.pending == Some(id) }

  /// The outstanding request failed; nothing else changes.
  pub fn abandon(&mut self) { self.pending = None; }

  /// Append a received page and advance the cursor.
  pub fn append_page(&mut self, page: VersionPage) {
    self.versions.extend(page.items);
    self.next_page += 1;
    self.has_more = page.page_number + 1 < page.total_pages;
    self.fetched_any = true;
    self.pending = None;
  }

  /// Replace the whole buffer with a window anchored on `anchor`. Later
  /// pages stay anchored.
  pub fn replace_with_window(&mut self, window: VersionWindow, anchor: u32) {
    self.has_more = window.versions.len() < window.total_count;
    self.versions = window.versions;
    self.next_page = 0;
    self.fetched_any = true;
    self.pending = None;
    self.strategy = PaginationStrategy::AnchoredOn(anchor);
  }

  /// Index of `version` in the buffer (0 is the newest entry).
  pub fn position_of(&self, version: u32) -> Option<usize> {
    self.versions.iter().position(|v| v.version == version)
  }

  pub fn find(&self, version: u32) -> Option<&Version> {
    self.versions.iter().find(|v| v.version == version)
  }
}
