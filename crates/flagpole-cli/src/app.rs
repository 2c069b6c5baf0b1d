//! Application state machine and event dispatcher.
//!
//! Keys become controller operations; the effects they return are carried
//! out here. Service calls run on spawned tasks and come back through an
//! unbounded channel as [`AppEvent`]s, which the event loop drains between
//! frames.

use std::{future::Future, sync::Arc};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use flagpole_core::{
  context::{self, ContextStore},
  controller::{DirtyCheck, Effect, Reply, TargetingController},
  driver::{self, classify},
  envelope::{Envelope, Outcome},
  history_view::{HistoryListModel, click_target, should_load_more},
  model::{EnvironmentInfo, ProjectInfo, Segment, ToggleRef, UserInfo},
  service::TargetingService,
};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use strum::IntoEnumIterator;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::editor::TargetingEditor;

// ─── Events ───────────────────────────────────────────────────────────────────

/// Completion of work spawned by the app.
#[derive(Debug)]
pub enum AppEvent {
  Reply(Reply),
  Published {
    generation: u64,
    outcome:    Outcome<()>,
  },
  User(Outcome<UserInfo>),
  Project(Outcome<ProjectInfo>),
  Environment(Outcome<EnvironmentInfo>),
}

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  Console,
  /// The toggle does not exist.
  NotFound,
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumIter,
)]
pub enum Tab {
  #[default]
  Targeting,
  Segments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
  Editor,
  History,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App<S, C> {
  pub screen: Screen,
  pub tab:    Tab,
  focus:      Focus,

  pub controller: TargetingController,
  pub editor:     TargetingEditor,

  /// Cursor position within the history list.
  pub history_cursor: usize,

  /// Cursor position within the *filtered* segment list.
  pub segment_cursor: usize,
  pub filter:         String,
  pub filter_active:  bool,

  /// Publish comment being typed; `Some` while the prompt is open.
  pub comment:    Option<String>,
  pub publishing: bool,
  /// Tab was pressed once over unsaved edits; the next Tab discards them.
  leave_armed:    bool,

  pub user:        Option<UserInfo>,
  pub project:     Option<ProjectInfo>,
  pub environment: Option<EnvironmentInfo>,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  service: Arc<S>,
  context: Arc<C>,
  tx:      mpsc::UnboundedSender<AppEvent>,
  rx:      mpsc::UnboundedReceiver<AppEvent>,
}

impl<S, C> App<S, C>
where
  S: TargetingService + 'static,
  C: ContextStore + 'static,
{
  pub fn new(service: S, context: C) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      screen: Screen::Console,
      tab: Tab::default(),
      focus: Focus::Editor,
      controller: TargetingController::new(),
      editor: TargetingEditor::new(),
      history_cursor: 0,
      segment_cursor: 0,
      filter: String::new(),
      filter_active: false,
      comment: None,
      publishing: false,
      leave_armed: false,
      user: None,
      project: None,
      environment: None,
      status_msg: String::new(),
      service: Arc::new(service),
      context: Arc::new(context),
      tx,
      rx,
    }
  }

  /// Keyboard focus, falling back to the editor when the panel is closed.
  pub fn focus(&self) -> Focus {
    if self.controller.panel_open() { self.focus } else { Focus::Editor }
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  /// Open `toggle` and start the header lookups.
  pub async fn open(&mut self, toggle: ToggleRef, deep_link: Option<u32>) {
    self.screen = Screen::Console;
    self.tab = Tab::Targeting;
    self.focus = Focus::Editor;
    self.history_cursor = 0;
    self.editor = TargetingEditor::new();
    self.comment = None;
    self.publishing = false;

    let effects = self.controller.initialize(toggle.clone(), deep_link);
    self.run(effects).await;
    if deep_link.is_some() {
      self.focus = Focus::History;
    }

    self.spawn_call(
      |s| async move { s.user_info().await },
      "could not load user",
      AppEvent::User,
    );
    let project_key = toggle.project_key.clone();
    self.spawn_call(
      move |s| async move { s.project_info(&project_key).await },
      "could not load project",
      AppEvent::Project,
    );
    let ToggleRef { project_key, environment_key, .. } = toggle;
    self.spawn_call(
      move |s| async move { s.environment(&project_key, &environment_key).await },
      "could not load environment",
      AppEvent::Environment,
    );
  }

  // ── Effects ───────────────────────────────────────────────────────────────

  /// Carry out controller effects. Service calls are spawned; everything
  /// else is applied before returning.
  pub async fn run(&mut self, effects: Vec<Effect>) {
    for effect in effects {
      match effect {
        Effect::Request(request) => {
          let service = self.service.clone();
          let tx = self.tx.clone();
          tokio::spawn(async move {
            let reply = driver::execute(&*service, request).await;
            let _ = tx.send(AppEvent::Reply(reply));
          });
        }
        Effect::LoadEditor(seed) => self.editor.load(seed),
        Effect::Notify(message) => self.status_msg = message,
        Effect::PersistContext { project_key, environment_key } => {
          if let Err(e) =
            context::persist_context(&*self.context, &project_key, &environment_key).await
          {
            warn!(error = %e, "failed to persist project context");
          }
        }
        Effect::ClearPersistedContext => {
          if let Err(e) = context::clear_context(&*self.context).await {
            warn!(error = %e, "failed to clear project context");
          }
        }
        Effect::NavigateNotFound => {
          info!("toggle not found; leaving the targeting page");
          self.screen = Screen::NotFound;
        }
      }
    }
  }

  /// Run a one-off service call and post its outcome as an event.
  fn spawn_call<T, Fut>(
    &self,
    call: impl FnOnce(Arc<S>) -> Fut + Send + 'static,
    fallback: &'static str,
    wrap: impl FnOnce(Outcome<T>) -> AppEvent + Send + 'static,
  ) where
    T: Send + 'static,
    Fut: Future<Output = Result<Envelope<T>, S::Error>> + Send + 'static,
  {
    let service = self.service.clone();
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let outcome = classify(call(service).await, fallback);
      let _ = tx.send(wrap(outcome));
    });
  }

  // ── Events ────────────────────────────────────────────────────────────────

  /// Apply every event that has already arrived. Returns whether any did.
  pub async fn pump(&mut self) -> bool {
    let mut any = false;
    while let Ok(event) = self.rx.try_recv() {
      self.handle_event(event).await;
      any = true;
    }
    any
  }

  /// Wait for the next event.
  pub async fn next_event(&mut self) -> Option<AppEvent> { self.rx.recv().await }

  pub async fn handle_event(&mut self, event: AppEvent) {
    match event {
      AppEvent::Reply(reply) => {
        let was_empty = self.controller.history().is_empty();
        let effects = self.controller.apply(reply);
        self.run(effects).await;
        if was_empty && !self.controller.history().is_empty() {
          self.history_cursor = self.history_model_selected().unwrap_or(0);
        }
        self.clamp_history_cursor();
      }
      AppEvent::Published { generation, outcome } => {
        if generation != self.controller.generation() {
          debug!("dropping publish result for a closed toggle");
          return;
        }
        self.publishing = false;
        match outcome {
          Outcome::Ok(()) => {
            info!("targeting published");
            self.status_msg = "Published.".into();
            match self.controller.reset_after_save() {
              Ok(effects) => self.run(effects).await,
              Err(e) => warn!(error = %e, "reset after publish failed"),
            }
            self.history_cursor = 0;
          }
          Outcome::NotFound(message) => {
            self.status_msg = message.unwrap_or_else(|| "toggle not found".into());
          }
          Outcome::Failed(message) => self.status_msg = message,
        }
      }
      AppEvent::User(outcome) => {
        if let Outcome::Ok(user) = outcome {
          self.user = Some(user);
        }
      }
      AppEvent::Project(outcome) => {
        if let Outcome::Ok(project) = outcome {
          self.project = Some(project);
        }
      }
      AppEvent::Environment(outcome) => {
        if let Outcome::Ok(environment) = outcome {
          self.environment = Some(environment);
        }
      }
    }
  }

  // ── Derived views ─────────────────────────────────────────────────────────

  pub fn history_model(&self) -> HistoryListModel<'_> {
    let view = self.controller.view_state();
    HistoryListModel::build(
      self.controller.history(),
      view.latest_version(),
      view.selected_version(),
    )
  }

  fn history_model_selected(&self) -> Option<usize> { self.history_model().selected_index() }

  fn clamp_history_cursor(&mut self) {
    let len = self.controller.history().len();
    self.history_cursor = self.history_cursor.min(len.saturating_sub(1));
  }

  /// Segments that match the current filter query.
  pub fn filtered_segments(&self) -> Vec<&Segment> {
    let Some(page) = self.controller.segments() else {
      return Vec::new();
    };
    if self.filter.is_empty() {
      return page.items.iter().collect();
    }
    let matcher = SkimMatcherV2::default();
    page
      .items
      .iter()
      .filter(|s| {
        matcher.fuzzy_match(&s.name, &self.filter).is_some()
          || matcher.fuzzy_match(&s.key, &self.filter).is_some()
      })
      .collect()
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    if self.screen == Screen::NotFound {
      return Ok(!matches!(key.code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter));
    }
    if self.controller.view_state().is_pending() {
      self.handle_confirm_key(key).await?;
      return Ok(true);
    }
    if self.comment.is_some() {
      self.handle_comment_key(key);
      return Ok(true);
    }
    if self.filter_active {
      self.handle_filter_key(key);
      return Ok(true);
    }

    let leave_armed = std::mem::take(&mut self.leave_armed);
    match key.code {
      KeyCode::Char('q') => return Ok(false),
      KeyCode::Tab => {
        self.next_tab(leave_armed).await;
        return Ok(true);
      }
      _ => {}
    }

    match self.tab {
      Tab::Targeting => self.handle_targeting_key(key).await?,
      Tab::Segments => self.handle_segments_key(key),
    }
    Ok(true)
  }

  /// Leaving the targeting tab reloads the latest targeting, so unsaved
  /// edits need a second Tab press.
  async fn next_tab(&mut self, leave_armed: bool) {
    let next = Tab::iter()
      .cycle()
      .skip_while(|t| *t != self.tab)
      .nth(1)
      .unwrap_or_default();
    if self.tab == Tab::Targeting && next != Tab::Targeting {
      if self.editor.is_dirty() && !leave_armed {
        self.leave_armed = true;
        self.status_msg = "Unsaved changes; press Tab again to discard them.".into();
        return;
      }
      match self.controller.leave_targeting_tab() {
        Ok(effects) => self.run(effects).await,
        Err(e) => debug!(error = %e, "nothing to reset on tab switch"),
      }
      self.history_cursor = 0;
    }
    self.tab = next;
  }

  async fn handle_confirm_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
    match key.code {
      KeyCode::Char('y') | KeyCode::Enter => {
        let effects = self.controller.confirm_pending_review()?;
        self.run(effects).await;
      }
      KeyCode::Char('n') | KeyCode::Esc => self.controller.cancel_pending_review(),
      _ => {}
    }
    Ok(())
  }

  fn handle_comment_key(&mut self, key: KeyEvent) {
    let Some(comment) = self.comment.as_mut() else {
      return;
    };
    match key.code {
      KeyCode::Esc => self.comment = None,
      KeyCode::Enter => {
        let comment = self.comment.take();
        self.publish(comment);
      }
      KeyCode::Backspace => {
        comment.pop();
      }
      KeyCode::Char(c) => comment.push(c),
      _ => {}
    }
  }

  fn handle_filter_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
      }
      KeyCode::Enter => self.filter_active = false,
      KeyCode::Backspace => {
        self.filter.pop();
      }
      KeyCode::Char(c) => self.filter.push(c),
      _ => {}
    }
    self.segment_cursor = 0;
  }

  async fn handle_targeting_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
    match key.code {
      KeyCode::Char('H') => {
        let effects = self.controller.open_history_panel();
        self.run(effects).await;
        self.focus = Focus::History;
        self.history_cursor = self.history_model_selected().unwrap_or(0);
        return Ok(());
      }
      KeyCode::Right | KeyCode::Char('l') if self.controller.panel_open() => {
        self.focus = Focus::History;
        return Ok(());
      }
      KeyCode::Left | KeyCode::Char('h') => {
        self.focus = Focus::Editor;
        return Ok(());
      }
      KeyCode::Esc if self.controller.view_state().is_historical_view() => {
        let effects = self.controller.exit_historical_view();
        self.run(effects).await;
        return Ok(());
      }
      _ => {}
    }

    match self.focus() {
      Focus::Editor => self.handle_editor_key(key),
      Focus::History => self.handle_history_key(key).await?,
    }
    Ok(())
  }

  fn handle_editor_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Down | KeyCode::Char('j') => return self.editor.cursor_down(),
      KeyCode::Up | KeyCode::Char('k') => return self.editor.cursor_up(),
      KeyCode::Char('d' | 's' | 'u' | 'p') | KeyCode::Enter | KeyCode::Char(' ') => {}
      _ => return,
    }

    let view = self.controller.view_state();
    if view.editing_disabled() {
      self.status_msg = format!(
        "Viewing version {}; press Esc to return to the latest.",
        view.selected_version()
      );
      return;
    }
    if !self.editor.is_loaded() {
      return;
    }

    match key.code {
      KeyCode::Char('d') => self.editor.toggle_disabled(),
      KeyCode::Char('s') => self.editor.cycle_default_serve(),
      KeyCode::Char('u') => self.editor.discard(),
      KeyCode::Enter | KeyCode::Char(' ') => {
        self.editor.cycle_rule_serve();
      }
      KeyCode::Char('p') if self.publishing => {
        self.status_msg = "A publish is already in progress.".into();
      }
      KeyCode::Char('p') if !self.editor.is_dirty() => {
        self.status_msg = "Nothing to publish.".into();
      }
      KeyCode::Char('p') => self.comment = Some(String::new()),
      _ => {}
    }
  }

  async fn handle_history_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
    let len = self.controller.history().len();
    match key.code {
      KeyCode::Down | KeyCode::Char('j') => {
        if self.history_cursor + 1 < len {
          self.history_cursor += 1;
        }
        let history = self.controller.history();
        if should_load_more(
          self.history_cursor,
          len,
          history.has_more(),
          history.is_loading(),
        ) {
          let effects = self.controller.load_more_history()?;
          self.run(effects).await;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.history_cursor = self.history_cursor.saturating_sub(1);
      }
      KeyCode::Enter => {
        let target = {
          let model = self.history_model();
          model
            .rows
            .get(self.history_cursor)
            .and_then(click_target)
            .cloned()
        };
        if let Some(version) = target {
          let effects = self.controller.review_history_version(&version, &self.editor);
          self.run(effects).await;
        }
      }
      KeyCode::Esc => self.focus = Focus::Editor,
      _ => {}
    }
    Ok(())
  }

  fn handle_segments_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.filtered_segments().len();
        if self.segment_cursor + 1 < len {
          self.segment_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.segment_cursor = self.segment_cursor.saturating_sub(1);
      }
      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.segment_cursor = 0;
      }
      _ => {}
    }
  }

  // ── Publishing ────────────────────────────────────────────────────────────

  fn publish(&mut self, comment: Option<String>) {
    let (Some(toggle), Some(request)) = (
      self.controller.toggle().cloned(),
      self.editor.publish_request(comment),
    ) else {
      self.status_msg = "Nothing to publish.".into();
      return;
    };

    info!(toggle = %toggle.toggle_key, "publishing targeting");
    self.publishing = true;
    self.status_msg = "Publishing…".into();
    let generation = self.controller.generation();
    self.spawn_call(
      move |s| async move { s.publish_targeting(&toggle, &request).await },
      "could not publish",
      move |outcome| AppEvent::Published { generation, outcome },
    );
  }
}
