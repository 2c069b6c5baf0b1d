//! The targeting editor: a seed loaded by the controller plus the
//! operator's draft on top of it.

use flagpole_core::{
  controller::DirtyCheck,
  model::{EditorSeed, PublishRequest, Serve, TargetingContent},
};

#[derive(Debug, Default)]
pub struct TargetingEditor {
  seed:   Option<EditorSeed>,
  draft:  EditorSeed,
  /// Rule under the editor cursor.
  cursor: usize,
}

impl TargetingEditor {
  pub fn new() -> Self { Self::default() }

  /// Replace both the seed and the draft, dropping any unsaved edits.
  pub fn load(&mut self, seed: EditorSeed) {
    self.draft = seed.clone();
    self.seed = Some(seed);
    self.cursor = self.cursor.min(self.draft.content.rules.len().saturating_sub(1));
  }

  pub fn is_loaded(&self) -> bool { self.seed.is_some() }

  pub fn draft(&self) -> &EditorSeed { &self.draft }

  pub fn cursor(&self) -> usize { self.cursor }

  // ── Navigation ──────────────────────────────────────────────────────────

  pub fn cursor_down(&mut self) {
    if self.cursor + 1 < self.draft.content.rules.len() {
      self.cursor += 1;
    }
  }

  pub fn cursor_up(&mut self) { self.cursor = self.cursor.saturating_sub(1); }

  // ── Edits ───────────────────────────────────────────────────────────────

  /// Flip whether the toggle serves its disabled variation.
  pub fn toggle_disabled(&mut self) {
    if self.is_loaded() {
      self.draft.disabled = !self.draft.disabled;
    }
  }

  pub fn cycle_default_serve(&mut self) {
    let TargetingContent { default_serve, variations, .. } = &mut self.draft.content;
    *default_serve = next_serve(default_serve, variations.len());
  }

  /// Cycle the serve of the rule under the cursor. Returns `false` when
  /// there is no such rule.
  pub fn cycle_rule_serve(&mut self) -> bool {
    let TargetingContent { rules, variations, .. } = &mut self.draft.content;
    let count = variations.len();
    match rules.get_mut(self.cursor) {
      Some(rule) => {
        rule.serve = next_serve(&rule.serve, count);
        true
      }
      None => false,
    }
  }

  /// Throw the draft away and go back to the seed.
  pub fn discard(&mut self) {
    if let Some(seed) = &self.seed {
      self.draft = seed.clone();
    }
  }

  /// What publishing the draft would send, or `None` when there is nothing
  /// to publish.
  pub fn publish_request(&self, comment: Option<String>) -> Option<PublishRequest> {
    self.is_dirty().then(|| PublishRequest {
      content: self.draft.content.clone(),
      disabled: self.draft.disabled,
      comment: comment.filter(|c| !c.trim().is_empty()),
    })
  }
}

impl DirtyCheck for TargetingEditor {
  fn is_dirty(&self) -> bool {
    self.seed.as_ref().is_some_and(|seed| *seed != self.draft)
  }
}

/// The next single-variation serve; a split collapses to the first
/// variation.
fn next_serve(serve: &Serve, variations: usize) -> Serve {
  if variations == 0 {
    return serve.clone();
  }
  match serve {
    Serve::Select { select } => Serve::Select { select: (select + 1) % variations },
    Serve::Split { .. } => Serve::Select { select: 0 },
  }
}
