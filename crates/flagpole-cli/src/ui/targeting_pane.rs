//! Targeting pane: the editor's view of the draft.

use flagpole_core::{
  context::ContextStore,
  controller::DirtyCheck,
  model::{Condition, Serve, Variation},
  service::TargetingService,
};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, Focus};

// ─── Public entry ─────────────────────────────────────────────────────────────

/// Render the targeting pane into `area`.
pub fn draw<S, C>(f: &mut Frame, area: Rect, app: &App<S, C>)
where
  S: TargetingService + 'static,
  C: ContextStore + 'static,
{
  let view = app.controller.view_state();
  let focused = app.focus() == Focus::Editor;

  let title = match view.selected_version() {
    0 => " Targeting ".to_string(),
    n => format!(" Targeting · v{n} "),
  };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));

  let inner = block.inner(area);
  f.render_widget(block, area);

  if !app.editor.is_loaded() {
    let hint = Paragraph::new("Loading targeting…").style(Style::default().fg(Color::DarkGray));
    f.render_widget(hint, inner);
    return;
  }

  let mut lines: Vec<Line> = Vec::new();

  if view.is_historical_view() {
    lines.push(Line::from(Span::styled(
      format!(
        "Viewing version {}. Read-only; Esc returns to the latest (v{}).",
        view.selected_version(),
        view.latest_version()
      ),
      Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow),
    )));
    lines.push(Line::from(""));
  } else if app.editor.is_dirty() {
    lines.push(Line::from(Span::styled(
      "● unsaved changes",
      Style::default().fg(Color::Yellow),
    )));
    lines.push(Line::from(""));
  }

  let draft = app.editor.draft();
  let content = &draft.content;
  let variations = content.variations.as_slice();

  let (status, status_color) = if draft.disabled {
    ("disabled", Color::Red)
  } else {
    ("enabled", Color::Green)
  };
  lines.push(Line::from(vec![
    label("status"),
    Span::styled(status, Style::default().fg(status_color)),
  ]));
  lines.push(Line::from(""));

  if draft.disabled {
    lines.push(Line::from(vec![
      label("serve"),
      Span::raw(describe_serve(&content.disabled_serve, variations)),
    ]));
  } else {
    lines.push(Line::from(Span::styled(
      "Rules",
      Style::default().add_modifier(Modifier::BOLD),
    )));
    if content.rules.is_empty() {
      lines.push(Line::from(Span::styled(
        "  (no rules)",
        Style::default().fg(Color::DarkGray),
      )));
    }
    for (i, rule) in content.rules.iter().enumerate() {
      let cursor = focused && i == app.editor.cursor();
      let style = if cursor {
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD)
      } else {
        Style::default()
      };
      let name = rule.name.as_deref().unwrap_or("(unnamed)");
      lines.push(Line::from(vec![
        Span::styled(format!("  {name}"), style),
        Span::styled(
          format!("  → {}", describe_serve(&rule.serve, variations)),
          Style::default().fg(Color::Cyan),
        ),
      ]));
      for condition in &rule.conditions {
        lines.push(Line::from(Span::styled(
          format!("      {}", describe_condition(condition)),
          Style::default().fg(Color::DarkGray),
        )));
      }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
      label("default"),
      Span::raw(describe_serve(&content.default_serve, variations)),
    ]));
    lines.push(Line::from(vec![
      label("when off"),
      Span::raw(describe_serve(&content.disabled_serve, variations)),
    ]));
  }

  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled(
    "Variations",
    Style::default().add_modifier(Modifier::BOLD),
  )));
  for (i, variation) in variations.iter().enumerate() {
    lines.push(Line::from(vec![
      Span::styled(format!("  {i} "), Style::default().fg(Color::DarkGray)),
      Span::raw(format!("{} = {}", variation.name, variation.value)),
    ]));
  }

  f.render_widget(Paragraph::new(lines), inner);
}

// ─── Formatting helpers ───────────────────────────────────────────────────────

fn label(text: &str) -> Span<'static> {
  Span::styled(
    format!("{text:<10}"),
    Style::default()
      .fg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  )
}

/// `on`, or `on 50% / off 50%` for a split.
fn describe_serve(serve: &Serve, variations: &[Variation]) -> String {
  let name = |i: usize| {
    variations
      .get(i)
      .map(|v| v.name.clone())
      .unwrap_or_else(|| format!("#{i}"))
  };
  match serve {
    Serve::Select { select } => name(*select),
    Serve::Split { split } => split
      .iter()
      .enumerate()
      .map(|(i, weight)| format!("{} {}%", name(i), *weight as f64 / 100.0))
      .collect::<Vec<_>>()
      .join(" / "),
  }
}

fn describe_condition(condition: &Condition) -> String {
  format!(
    "{} {} [{}]",
    condition.subject,
    condition.predicate,
    condition.objects.join(", ")
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn variations() -> Vec<Variation> {
    vec![
      Variation { value: "false".into(), name: "off".into(), description: None },
      Variation { value: "true".into(), name: "on".into(), description: None },
    ]
  }

  #[test]
  fn serve_names_the_variation() {
    assert_eq!(describe_serve(&Serve::Select { select: 1 }, &variations()), "on");
    assert_eq!(describe_serve(&Serve::Select { select: 7 }, &variations()), "#7");
  }

  #[test]
  fn split_shows_percentages() {
    let split = Serve::Split { split: vec![2500, 7500] };
    assert_eq!(describe_serve(&split, &variations()), "off 25% / on 75%");
  }

  #[test]
  fn condition_reads_as_a_sentence() {
    let condition = Condition {
      kind:      "string".into(),
      subject:   "city".into(),
      predicate: "is one of".into(),
      objects:   vec!["Paris".into(), "Rome".into()],
    };
    assert_eq!(describe_condition(&condition), "city is one of [Paris, Rome]");
  }
}
