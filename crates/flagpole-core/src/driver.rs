//! Carrying out controller effects against real collaborators.
//!
//! [`execute`] performs a single [`Request`]. [`Session`] is a headless host
//! that runs effects to completion one after another; interactive hosts
//! (the terminal console) spawn `execute` calls instead and feed replies back
//! as they arrive.

use tracing::{debug, warn};

use crate::{
  context::{self, ContextStore},
  controller::{
    DirtyCheck, Effect, Reply, ReplyPayload, Request, RequestKind,
    TargetingController,
  },
  envelope::{Envelope, Outcome},
  error::Result,
  model::{EditorSeed, ToggleRef, Version},
  service::TargetingService,
};

/// Perform one service call. Transport failures become
/// [`Outcome::Failed`].
pub async fn execute<S: TargetingService>(service: &S, request: Request) -> Reply {
  let Request { id, kind } = request;
  debug!(seq = id.seq, kind = kind.label(), "executing request");

  let payload = match kind {
    RequestKind::ToggleInfo(toggle) => ReplyPayload::ToggleInfo(classify(
      service.toggle_info(&toggle).await,
      "could not load toggle info",
    )),
    RequestKind::CurrentTargeting(toggle) => ReplyPayload::CurrentTargeting(classify(
      service.current_targeting(&toggle).await,
      "could not load targeting",
    )),
    RequestKind::Segments { project_key, page } => ReplyPayload::Segments(classify(
      service.segments(&project_key, page).await,
      "could not load segments",
    )),
    RequestKind::VersionPage { toggle, request } => ReplyPayload::VersionPage(classify(
      service.version_page(&toggle, request).await,
      "could not load versions",
    )),
    RequestKind::VersionWindow { toggle, anchor } => ReplyPayload::VersionWindow {
      anchor,
      outcome: classify(
        service.version_window(&toggle, anchor).await,
        "could not load versions",
      ),
    },
  };

  Reply { id, payload }
}

/// Fold a service result into an [`Outcome`], logging transport failures.
/// `fallback` prefixes the transport error and stands in for a missing
/// server message.
pub fn classify<T, E: std::error::Error>(
  result: Result<Envelope<T>, E>,
  fallback: &str,
) -> Outcome<T> {
  match result {
    Ok(envelope) => envelope.into_outcome(fallback),
    Err(e) => {
      warn!(error = %e, "{fallback}");
      Outcome::Failed(format!("{fallback}: {e}"))
    }
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// A controller wired to a service and a context store, with every effect
/// applied before an operation returns.
pub struct Session<S, C> {
  pub controller: TargetingController,
  service:        S,
  context:        C,
  editor:         Option<EditorSeed>,
  notices:        Vec<String>,
  not_found:      bool,
}

impl<S: TargetingService, C: ContextStore> Session<S, C> {
  pub fn new(service: S, context: C) -> Self {
    Self {
      controller: TargetingController::new(),
      service,
      context,
      editor: None,
      notices: Vec::new(),
      not_found: false,
    }
  }

  pub fn service(&self) -> &S { &self.service }

  pub fn context(&self) -> &C { &self.context }

  /// The content most recently loaded into the editor.
  pub fn editor(&self) -> Option<&EditorSeed> { self.editor.as_ref() }

  /// Messages surfaced so far, oldest first.
  pub fn notices(&self) -> &[String] { &self.notices }

  /// Whether the toggle turned out not to exist.
  pub fn not_found(&self) -> bool { self.not_found }

  pub async fn initialize(&mut self, toggle: ToggleRef, deep_link: Option<u32>) {
    self.not_found = false;
    let effects = self.controller.initialize(toggle, deep_link);
    self.run(effects).await;
  }

  pub async fn open_history_panel(&mut self) {
    let effects = self.controller.open_history_panel();
    self.run(effects).await;
  }

  pub async fn load_more_history(&mut self) -> Result<()> {
    let effects = self.controller.load_more_history()?;
    self.run(effects).await;
    Ok(())
  }

  pub async fn review(&mut self, version: &Version, editor: &impl DirtyCheck) {
    let effects = self.controller.review_history_version(version, editor);
    self.run(effects).await;
  }

  pub async fn confirm_pending_review(&mut self) -> Result<()> {
    let effects = self.controller.confirm_pending_review()?;
    self.run(effects).await;
    Ok(())
  }

  pub async fn exit_historical_view(&mut self) {
    let effects = self.controller.exit_historical_view();
    self.run(effects).await;
  }

  pub async fn reset_after_save(&mut self) -> Result<()> {
    let effects = self.controller.reset_after_save()?;
    self.run(effects).await;
    Ok(())
  }

  /// Apply `effects`, and everything they lead to, in order.
  pub async fn run(&mut self, effects: Vec<Effect>) {
    let mut queue = std::collections::VecDeque::from(effects);
    while let Some(effect) = queue.pop_front() {
      match effect {
        Effect::Request(request) => {
          let reply = execute(&self.service, request).await;
          queue.extend(self.controller.apply(reply));
        }
        Effect::LoadEditor(seed) => self.editor = Some(seed),
        Effect::Notify(message) => self.notices.push(message),
        Effect::PersistContext { project_key, environment_key } => {
          if let Err(e) =
            context::persist_context(&self.context, &project_key, &environment_key).await
          {
            warn!(error = %e, "failed to persist project context");
          }
        }
        Effect::ClearPersistedContext => {
          if let Err(e) = context::clear_context(&self.context).await {
            warn!(error = %e, "failed to clear project context");
          }
        }
        Effect::NavigateNotFound => self.not_found = true,
      }
    }
  }
}

#[cfg(test)]
mod tests;
