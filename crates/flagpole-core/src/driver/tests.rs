//! End-to-end `Session` tests against an in-memory backend.

use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use thiserror::Error;

use super::*;
use crate::{
  context::{MemoryContextStore, persist_context, restore_context},
  error::Error,
  model::{
    EnvironmentInfo, PageParams, PageRequest, ProjectInfo, PublishRequest,
    SegmentPage, Serve, TargetingContent, TargetingSnapshot, ToggleInfo,
    UserInfo, VersionPage, VersionWindow,
  },
  view_state::ViewState,
};

// ─── Mock backend ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("mock transport failure")]
struct MockError;

struct MockBackend {
  /// Newest first.
  versions:      Vec<Version>,
  toggle_exists: bool,
  offline:       bool,
  page_requests: Mutex<Vec<PageRequest>>,
}

impl MockBackend {
  fn with_versions(count: u32) -> Self {
    Self {
      versions:      (1..=count).rev().map(version).collect(),
      toggle_exists: true,
      offline:       false,
      page_requests: Mutex::new(Vec::new()),
    }
  }

  fn page_requests(&self) -> Vec<PageRequest> {
    self.page_requests.lock().unwrap().clone()
  }

  fn check(&self) -> Result<(), MockError> {
    if self.offline { Err(MockError) } else { Ok(()) }
  }
}

fn version(n: u32) -> Version {
  Version {
    version:      n,
    content:      TargetingContent {
      default_serve: Serve::Select { select: n as usize % 2 },
      ..Default::default()
    },
    disabled:     false,
    created_by:   "dave".into(),
    created_time: Utc.timestamp_opt(1_700_000_000 + n as i64, 0).unwrap(),
    comment:      None,
  }
}

impl TargetingService for MockBackend {
  type Error = MockError;

  async fn current_targeting(
    &self,
    _: &ToggleRef,
  ) -> Result<Envelope<TargetingSnapshot>, MockError> {
    self.check()?;
    let latest = &self.versions[0];
    Ok(Envelope::ok(TargetingSnapshot {
      version:       latest.version,
      content:       latest.content.clone(),
      disabled:      latest.disabled,
      modified_by:   Some(latest.created_by.clone()),
      modified_time: Some(latest.created_time),
    }))
  }

  async fn toggle_info(&self, toggle: &ToggleRef) -> Result<Envelope<ToggleInfo>, MockError> {
    self.check()?;
    if !self.toggle_exists {
      return Ok(Envelope::not_found("toggle not found"));
    }
    Ok(Envelope::ok(ToggleInfo {
      name: "New checkout".into(),
      key: toggle.toggle_key.clone(),
      return_type: "boolean".into(),
      ..Default::default()
    }))
  }

  async fn publish_targeting(
    &self,
    _: &ToggleRef,
    _: &PublishRequest,
  ) -> Result<Envelope<()>, MockError> {
    self.check()?;
    Ok(Envelope::ok(()))
  }

  async fn version_page(
    &self,
    _: &ToggleRef,
    request: PageRequest,
  ) -> Result<Envelope<VersionPage>, MockError> {
    self.check()?;
    self.page_requests.lock().unwrap().push(request);
    let size = request.page_size as usize;
    let total_pages = self.versions.len().div_ceil(size) as u32;
    let items = self
      .versions
      .iter()
      .skip(request.page_index as usize * size)
      .take(size)
      .cloned()
      .collect();
    Ok(Envelope::ok(VersionPage {
      items,
      page_number: request.page_index,
      total_pages,
    }))
  }

  async fn version_window(
    &self,
    _: &ToggleRef,
    anchor: u32,
  ) -> Result<Envelope<VersionWindow>, MockError> {
    self.check()?;
    let Some(at) = self.versions.iter().position(|v| v.version == anchor) else {
      return Ok(Envelope::not_found("no such version"));
    };
    let start = at.saturating_sub(2);
    Ok(Envelope::ok(VersionWindow {
      versions:    self.versions[start..(at + 3).min(self.versions.len())].to_vec(),
      total_count: self.versions.len(),
    }))
  }

  async fn segments(&self, _: &str, _: PageParams) -> Result<Envelope<SegmentPage>, MockError> {
    self.check()?;
    Ok(Envelope::ok(SegmentPage::default()))
  }

  async fn project_info(&self, _: &str) -> Result<Envelope<ProjectInfo>, MockError> {
    self.check()?;
    Ok(Envelope::ok(ProjectInfo::default()))
  }

  async fn environment(&self, _: &str, _: &str) -> Result<Envelope<EnvironmentInfo>, MockError> {
    self.check()?;
    Ok(Envelope::ok(EnvironmentInfo::default()))
  }

  async fn user_info(&self) -> Result<Envelope<UserInfo>, MockError> {
    self.check()?;
    Ok(Envelope::ok(UserInfo::default()))
  }
}

fn toggle() -> ToggleRef { ToggleRef::new("shop", "prod", "new_checkout") }

fn session(backend: MockBackend) -> Session<MockBackend, MemoryContextStore> {
  Session::new(backend, MemoryContextStore::new())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn initialize_goes_live_and_persists_context() {
  let mut s = session(MockBackend::with_versions(25));
  s.initialize(toggle(), None).await;

  assert_eq!(*s.controller.view_state(), ViewState::Live { latest: 25 });
  assert_eq!(s.editor(), Some(&version(25).seed()));
  assert_eq!(s.controller.toggle_info().map(|i| i.name.as_str()), Some("New checkout"));
  assert!(s.controller.segments().is_some());
  assert!(s.notices().is_empty());
  assert_eq!(
    restore_context(s.context()).await.unwrap(),
    Some(("shop".to_string(), "prod".to_string()))
  );
}

#[tokio::test]
async fn missing_toggle_clears_persisted_context() {
  let mut backend = MockBackend::with_versions(3);
  backend.toggle_exists = false;
  let mut s = session(backend);
  persist_context(s.context(), "old", "staging").await.unwrap();

  s.initialize(toggle(), None).await;

  assert!(s.not_found());
  assert_eq!(restore_context(s.context()).await.unwrap(), None);
  assert!(s.controller.toggle().is_none());
}

#[tokio::test]
async fn paging_through_all_history() {
  let mut s = session(MockBackend::with_versions(25));
  s.initialize(toggle(), None).await;

  s.open_history_panel().await;
  assert_eq!(s.controller.history().len(), 10);
  assert!(s.controller.history().has_more());

  s.load_more_history().await.unwrap();
  assert_eq!(s.controller.history().len(), 20);
  s.load_more_history().await.unwrap();
  assert_eq!(s.controller.history().len(), 25);
  assert!(!s.controller.history().has_more());

  assert!(matches!(s.load_more_history().await, Err(Error::HistoryExhausted)));

  let indices: Vec<u32> = s.service().page_requests().iter().map(|r| r.page_index).collect();
  assert_eq!(indices, vec![0, 1, 2]);
  let numbers: Vec<u32> = s.controller.history().versions().iter().map(|v| v.version).collect();
  assert_eq!(numbers, (1..=25).rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn deep_link_anchors_selection_and_paging() {
  let mut s = session(MockBackend::with_versions(25));
  s.initialize(toggle(), Some(20)).await;

  let state = s.controller.view_state();
  assert_eq!(state.selected_version(), 20);
  assert_eq!(state.latest_version(), 25);
  assert!(state.editing_disabled());
  assert_eq!(s.editor(), Some(&version(20).seed()));
  assert!(s.controller.panel_open());

  s.load_more_history().await.unwrap();
  assert_eq!(s.service().page_requests()[0].anchor, Some(20));
}

#[tokio::test]
async fn reviewing_and_returning_through_session() {
  let mut s = session(MockBackend::with_versions(5));
  s.initialize(toggle(), None).await;
  s.open_history_panel().await;

  let v2 = s.controller.history().find(2).cloned().unwrap();
  s.review(&v2, &true).await;
  assert!(s.controller.view_state().is_pending());
  assert_eq!(s.editor(), Some(&version(5).seed()));

  s.confirm_pending_review().await.unwrap();
  assert_eq!(s.editor(), Some(&version(2).seed()));
  assert!(s.controller.view_state().editing_disabled());

  s.exit_historical_view().await;
  assert_eq!(*s.controller.view_state(), ViewState::Live { latest: 5 });
  assert_eq!(s.editor(), Some(&version(5).seed()));
}

#[tokio::test]
async fn save_then_reopen_starts_from_newest_page() {
  let mut fresh = session(MockBackend::with_versions(25));
  fresh.initialize(toggle(), None).await;
  fresh.open_history_panel().await;
  let first_ever = fresh.service().page_requests()[0];

  let mut s = session(MockBackend::with_versions(25));
  s.initialize(toggle(), Some(20)).await;
  s.reset_after_save().await.unwrap();
  assert!(s.controller.history().is_empty());
  assert!(!s.controller.view_state().editing_disabled());

  s.open_history_panel().await;
  assert_eq!(s.service().page_requests().last().copied(), Some(first_ever));
}

#[tokio::test]
async fn transport_failure_is_surfaced_and_state_kept() {
  let mut backend = MockBackend::with_versions(5);
  backend.offline = true;
  let mut s = session(backend);

  s.initialize(toggle(), None).await;

  assert_eq!(*s.controller.view_state(), ViewState::Loading);
  assert!(s.editor().is_none());
  assert!(
    s.notices()
      .iter()
      .any(|n| n == "could not load targeting: mock transport failure"),
    "{:?}",
    s.notices()
  );
}
