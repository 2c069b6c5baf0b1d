//! The targeting page controller.
//!
//! A synchronous state machine: every operation updates the controller and
//! returns the [`Effect`]s the host must carry out (service calls, editor
//! reloads, notifications, context persistence). Service calls come back as
//! [`Reply`] values through [`TargetingController::apply`].
//!
//! Replies are matched against the [`RequestId`] they were issued with.
//! Opening another toggle (or closing the page) bumps the generation, so a
//! late reply for the old page is dropped; history replies must additionally
//! answer the buffer's single outstanding request.

use tracing::{debug, info, warn};

use crate::{
  envelope::Outcome,
  error::{Error, Result},
  history::History,
  model::{
    EditorSeed, ModifyInfo, PageParams, PageRequest, SegmentPage,
    TargetingSnapshot, ToggleInfo, ToggleRef, Version, VersionPage,
    VersionWindow,
  },
  view_state::ViewState,
};

/// Segments fetched alongside the targeting for rule editing.
pub const SEGMENT_PAGE: PageParams = PageParams { page_index: 0, page_size: 10 };

// ─── Dirty capability ────────────────────────────────────────────────────────

/// Implemented by whatever owns the edit buffer.
pub trait DirtyCheck {
  /// `true` while the buffer holds changes that were not persisted.
  fn is_dirty(&self) -> bool;
}

impl DirtyCheck for bool {
  fn is_dirty(&self) -> bool { *self }
}

// ─── Requests & replies ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
  /// Bumped whenever the page switches toggle or closes.
  pub generation: u64,
  pub seq:        u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
  ToggleInfo(ToggleRef),
  CurrentTargeting(ToggleRef),
  Segments { project_key: String, page: PageParams },
  VersionPage { toggle: ToggleRef, request: PageRequest },
  VersionWindow { toggle: ToggleRef, anchor: u32 },
}

impl RequestKind {
  pub fn label(&self) -> &'static str {
    match self {
      Self::ToggleInfo(_) => "toggle info",
      Self::CurrentTargeting(_) => "targeting",
      Self::Segments { .. } => "segments",
      Self::VersionPage { .. } => "version page",
      Self::VersionWindow { .. } => "version window",
    }
  }
}

/// A service call the host must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub id:   RequestId,
  pub kind: RequestKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
  ToggleInfo(Outcome<ToggleInfo>),
  CurrentTargeting(Outcome<TargetingSnapshot>),
  Segments(Outcome<SegmentPage>),
  VersionPage(Outcome<VersionPage>),
  VersionWindow { anchor: u32, outcome: Outcome<VersionWindow> },
}

/// The completion of a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
  pub id:      RequestId,
  pub payload: ReplyPayload,
}

// ─── Effects ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
  /// Issue a service call and feed the result back through `apply`.
  Request(Request),
  /// Replace the editor's buffer with a clone of this content.
  LoadEditor(EditorSeed),
  /// Show a transient, non-blocking message.
  Notify(String),
  /// Remember the project/environment as the last-viewed context.
  PersistContext {
    project_key:     String,
    environment_key: String,
  },
  /// Forget the persisted context.
  ClearPersistedContext,
  /// Leave the page for the not-found view.
  NavigateNotFound,
}

// ─── Controller ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TargetingController {
  toggle:      Option<ToggleRef>,
  generation:  u64,
  seq:         u64,
  view:        ViewState,
  history:     History,
  panel_open:  bool,
  /// Whether the next review must ask before discarding unsaved edits.
  guard_armed: bool,
  /// Set while the view waits on a refetch to return to the latest version.
  exit_requested: bool,
  /// The editor shows a deep-linked version; a later targeting reply only
  /// moves `latest`.
  selection_pinned: bool,
  editor_seed: Option<EditorSeed>,
  toggle_info: Option<ToggleInfo>,
  modify_info: Option<ModifyInfo>,
  segments:    Option<SegmentPage>,
}

impl TargetingController {
  pub fn new() -> Self { Self::default() }

  // ── Accessors ─────────────────────────────────────────────────────────

  pub fn toggle(&self) -> Option<&ToggleRef> { self.toggle.as_ref() }

  pub fn generation(&self) -> u64 { self.generation }

  pub fn view_state(&self) -> &ViewState { &self.view }

  pub fn history(&self) -> &History { &self.history }

  pub fn panel_open(&self) -> bool { self.panel_open }

  pub fn editor_seed(&self) -> Option<&EditorSeed> { self.editor_seed.as_ref() }

  pub fn toggle_info(&self) -> Option<&ToggleInfo> { self.toggle_info.as_ref() }

  pub fn modify_info(&self) -> Option<&ModifyInfo> { self.modify_info.as_ref() }

  pub fn segments(&self) -> Option<&SegmentPage> { self.segments.as_ref() }

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Open `toggle`, discarding all state of the previous one. `deep_link`
  /// is a version referenced from outside (e.g. `--current-version`).
  pub fn initialize(
    &mut self,
    toggle: ToggleRef,
    deep_link: Option<u32>,
  ) -> Vec<Effect> {
    *self = Self {
      generation: self.generation + 1,
      guard_armed: true,
      ..Self::default()
    };
    info!(
      project = %toggle.project_key,
      environment = %toggle.environment_key,
      toggle = %toggle.toggle_key,
      "opening toggle"
    );
    self.toggle = Some(toggle.clone());

    let mut effects = vec![
      Effect::PersistContext {
        project_key:     toggle.project_key.clone(),
        environment_key: toggle.environment_key.clone(),
      },
      self.request(RequestKind::ToggleInfo(toggle.clone())),
      self.request(RequestKind::CurrentTargeting(toggle.clone())),
      self.request(RequestKind::Segments {
        project_key: toggle.project_key.clone(),
        page:        SEGMENT_PAGE,
      }),
    ];
    if let Some(anchor) = deep_link {
      effects.push(self.request_window(toggle, anchor));
    }
    effects
  }

  /// The page goes away. Every reply still in flight will be dropped.
  pub fn close(&mut self) {
    *self = Self {
      generation: self.generation + 1,
      ..Self::default()
    };
  }

  // ── History panel ─────────────────────────────────────────────────────

  /// Show or hide the history panel; an empty history triggers the first
  /// page load.
  pub fn open_history_panel(&mut self) -> Vec<Effect> {
    self.panel_open = !self.panel_open;
    let wants_first_page = self.history.is_empty()
      && !self.history.is_loading()
      && self.history.can_request();
    match self.toggle.clone() {
      Some(toggle) if wants_first_page => vec![self.request_page(toggle)],
      _ => Vec::new(),
    }
  }

  /// Request the next history page.
  ///
  /// Calling this after the last page arrived is a caller error
  /// ([`Error::HistoryExhausted`]). A call while a page is still in flight
  /// is ignored.
  pub fn load_more_history(&mut self) -> Result<Vec<Effect>> {
    let toggle = self.toggle.clone().ok_or(Error::NoToggle)?;
    if self.history.is_loading() {
      debug!("history page already in flight; ignoring load-more");
      return Ok(Vec::new());
    }
    if !self.history.can_request() {
      return Err(Error::HistoryExhausted);
    }
    Ok(vec![self.request_page(toggle)])
  }

  /// Load a window of history around `version` and select it once it
  /// arrives. Later pages stay anchored on `version`.
  pub fn open_history_anchored_on(&mut self, version: u32) -> Result<Vec<Effect>> {
    let toggle = self.toggle.clone().ok_or(Error::NoToggle)?;
    Ok(vec![self.request_window(toggle, version)])
  }

  // ── Reviewing ─────────────────────────────────────────────────────────

  /// Show `version` in the editor. With unsaved edits the first such
  /// navigation is parked in [`ViewState::PendingConfirmation`] instead.
  pub fn review_history_version(
    &mut self,
    version: &Version,
    editor: &impl DirtyCheck,
  ) -> Vec<Effect> {
    match &self.view {
      ViewState::Loading => {
        debug!("review requested before targeting loaded; ignoring");
        return Vec::new();
      }
      ViewState::PendingConfirmation { .. } => {
        debug!("review requested while a confirmation is open; ignoring");
        return Vec::new();
      }
      ViewState::Live { .. } | ViewState::ReviewingHistory { .. } => {}
    }

    if version.version == self.view.selected_version() {
      return Vec::new();
    }
    self.exit_requested = false;

    if self.guard_armed && editor.is_dirty() {
      info!(version = version.version, "unsaved changes; asking before review");
      self.view = ViewState::PendingConfirmation {
        selected: self.view.selected_version(),
        latest:   self.view.latest_version(),
        staged:   Box::new(version.clone()),
      };
      return Vec::new();
    }

    self.apply_version(version.clone())
  }

  /// Apply the version parked by the unsaved-changes prompt.
  pub fn confirm_pending_review(&mut self) -> Result<Vec<Effect>> {
    let ViewState::PendingConfirmation { selected, latest, staged } =
      std::mem::take(&mut self.view)
    else {
      return Err(Error::NothingStaged);
    };
    self.view = ViewState::showing(selected, latest);
    Ok(self.apply_version(*staged))
  }

  /// Drop the parked version and keep the current view.
  pub fn cancel_pending_review(&mut self) {
    if let ViewState::PendingConfirmation { selected, latest, .. } = self.view {
      self.view = ViewState::showing(selected, latest);
    }
  }

  /// Go back to the latest version.
  pub fn exit_historical_view(&mut self) -> Vec<Effect> {
    if !matches!(self.view, ViewState::ReviewingHistory { .. }) {
      return Vec::new();
    }
    let latest = self.view.latest_version();
    if let Some(version) = self.history.find(latest).cloned() {
      return self.apply_version(version);
    }

    // The latest version is not in the buffer (an anchored window can miss
    // it). Stay read-only until the source answers.
    if self.exit_requested {
      return Vec::new();
    }
    match self.toggle.clone() {
      Some(toggle) => {
        self.exit_requested = true;
        vec![self.request(RequestKind::CurrentTargeting(toggle))]
      }
      None => Vec::new(),
    }
  }

  // ── Resets ────────────────────────────────────────────────────────────

  /// A new version was persisted: refetch it, empty the history and forget
  /// any anchor so the next panel open starts from the newest page.
  pub fn reset_after_save(&mut self) -> Result<Vec<Effect>> {
    let toggle = self.toggle.clone().ok_or(Error::NoToggle)?;
    if !matches!(self.view, ViewState::Loading) {
      self.view = ViewState::Live { latest: self.view.latest_version() };
    }
    self.guard_armed = true;
    self.exit_requested = false;
    self.selection_pinned = false;
    self.history = History::default();
    self.panel_open = false;
    Ok(vec![self.request(RequestKind::CurrentTargeting(toggle))])
  }

  /// The operator switched away from the targeting tab.
  pub fn leave_targeting_tab(&mut self) -> Result<Vec<Effect>> {
    self.reset_after_save()
  }

  // ── Replies ───────────────────────────────────────────────────────────

  /// Fold a service reply into the state.
  pub fn apply(&mut self, reply: Reply) -> Vec<Effect> {
    if reply.id.generation != self.generation {
      debug!(
        reply = reply.id.generation,
        current = self.generation,
        "dropping reply for a closed page"
      );
      return Vec::new();
    }

    match reply.payload {
      ReplyPayload::ToggleInfo(outcome) => self.on_toggle_info(outcome),
      ReplyPayload::CurrentTargeting(outcome) => self.on_targeting(outcome),
      ReplyPayload::Segments(outcome) => match outcome {
        Outcome::Ok(page) => {
          self.segments = Some(page);
          Vec::new()
        }
        Outcome::NotFound(message) => {
          vec![Effect::Notify(message.unwrap_or_else(|| "segments not found".into()))]
        }
        Outcome::Failed(message) => vec![Effect::Notify(message)],
      },
      ReplyPayload::VersionPage(outcome) => {
        if !self.history.is_pending(reply.id) {
          debug!(seq = reply.id.seq, "dropping superseded history page");
          return Vec::new();
        }
        match outcome {
          Outcome::Ok(page) => {
            self.history.append_page(page);
            Vec::new()
          }
          other => {
            self.history.abandon();
            vec![Effect::Notify(failure_message(other, "could not load versions"))]
          }
        }
      }
      ReplyPayload::VersionWindow { anchor, outcome } => {
        if !self.history.is_pending(reply.id) {
          debug!(seq = reply.id.seq, "dropping superseded history window");
          return Vec::new();
        }
        match outcome {
          Outcome::Ok(window) => self.on_window(anchor, window),
          other => {
            self.history.abandon();
            vec![Effect::Notify(failure_message(other, "could not load versions"))]
          }
        }
      }
    }
  }

  fn on_toggle_info(&mut self, outcome: Outcome<ToggleInfo>) -> Vec<Effect> {
    match outcome {
      Outcome::Ok(info) => {
        self.toggle_info = Some(info);
        Vec::new()
      }
      Outcome::NotFound(_) => {
        warn!(toggle = ?self.toggle, "toggle not found");
        self.close();
        vec![Effect::ClearPersistedContext, Effect::NavigateNotFound]
      }
      Outcome::Failed(message) => vec![Effect::Notify(message)],
    }
  }

  fn on_targeting(&mut self, outcome: Outcome<TargetingSnapshot>) -> Vec<Effect> {
    let exiting = std::mem::take(&mut self.exit_requested);
    let snapshot = match outcome {
      Outcome::Ok(snapshot) => snapshot,
      other => {
        return vec![Effect::Notify(failure_message(other, "could not load targeting"))];
      }
    };

    self.modify_info = Some(snapshot.modify_info());
    let latest = snapshot.version;
    let reload = exiting
      || (!self.selection_pinned
        && matches!(self.view, ViewState::Loading | ViewState::Live { .. }));

    if !reload {
      // A deep-linked or reviewed selection stays on screen.
      let selected = self.view.selected_version();
      self.view = match std::mem::take(&mut self.view) {
        ViewState::Live { .. } => ViewState::showing(selected, latest.max(selected)),
        other => other.with_latest(latest),
      };
      if !self.view.is_pending() {
        self.guard_armed = !self.view.is_historical_view();
      }
      return Vec::new();
    }

    self.view = ViewState::Live { latest };
    self.guard_armed = true;
    self.selection_pinned = false;
    let seed = snapshot.seed();
    self.editor_seed = Some(seed.clone());
    vec![Effect::LoadEditor(seed)]
  }

  fn on_window(&mut self, anchor: u32, window: VersionWindow) -> Vec<Effect> {
    let newest = window.versions.first().map(|v| v.version);
    let located = window.versions.iter().find(|v| v.version == anchor).cloned();
    self.history.replace_with_window(window, anchor);

    let Some(version) = located else {
      warn!(anchor, "anchored version missing from its window");
      return Vec::new();
    };

    // The window's head is only the newest version when nothing newer is
    // known yet.
    let latest = self
      .view
      .latest_version()
      .max(newest.unwrap_or(version.version))
      .max(version.version);
    self.view = ViewState::showing(version.version, latest);
    self.guard_armed = version.version == latest;
    self.selection_pinned = true;
    self.exit_requested = false;
    let seed = version.seed();
    self.editor_seed = Some(seed.clone());
    vec![Effect::LoadEditor(seed)]
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  fn next_id(&mut self) -> RequestId {
    self.seq += 1;
    RequestId {
      generation: self.generation,
      seq:        self.seq,
    }
  }

  fn request(&mut self, kind: RequestKind) -> Effect {
    Effect::Request(Request { id: self.next_id(), kind })
  }

  fn request_page(&mut self, toggle: ToggleRef) -> Effect {
    let id = self.next_id();
    let request = self.history.next_request();
    self.history.begin(id);
    Effect::Request(Request {
      id,
      kind: RequestKind::VersionPage { toggle, request },
    })
  }

  fn request_window(&mut self, toggle: ToggleRef, anchor: u32) -> Effect {
    let id = self.next_id();
    self.history.begin(id);
    self.panel_open = true;
    Effect::Request(Request {
      id,
      kind: RequestKind::VersionWindow { toggle, anchor },
    })
  }

  fn apply_version(&mut self, version: Version) -> Vec<Effect> {
    let latest = self.view.latest_version();
    self.view = ViewState::showing(version.version, latest);
    self.guard_armed = version.version == latest;
    self.selection_pinned = false;
    self.exit_requested = false;
    let seed = version.seed();
    self.editor_seed = Some(seed.clone());
    vec![Effect::LoadEditor(seed)]
  }
}

fn failure_message<T>(outcome: Outcome<T>, fallback: &str) -> String {
  match outcome {
    Outcome::Ok(_) => fallback.to_string(),
    Outcome::NotFound(message) => message.unwrap_or_else(|| fallback.to_string()),
    Outcome::Failed(message) => message,
  }
}
