//! History pane, right of the targeting editor.

use chrono::Utc;
use flagpole_core::{
  context::ContextStore,
  history_view::{Footer, HistoryRow, since},
  service::TargetingService,
};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::app::{App, Focus};

/// Render the version history into `area`.
pub fn draw<S, C>(f: &mut Frame, area: Rect, app: &App<S, C>)
where
  S: TargetingService + 'static,
  C: ContextStore + 'static,
{
  let model = app.history_model();
  let focused = app.focus() == Focus::History;

  let block = Block::default()
    .title(format!(" History ({}) ", model.rows.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));

  let mut inner = block.inner(area);
  f.render_widget(block, area);

  // Footer on the last line of the pane.
  if inner.height > 1 {
    let footer_area = Rect {
      x:      inner.x,
      y:      inner.y + inner.height - 1,
      width:  inner.width,
      height: 1,
    };
    inner.height -= 1;
    let footer = match model.footer {
      Footer::Empty => "No versions yet.",
      Footer::Loading => "Loading…",
      Footer::LoadMore => "↓ more",
      Footer::End => "",
    };
    f.render_widget(
      Paragraph::new(footer).style(Style::default().fg(Color::DarkGray)),
      footer_area,
    );
  }

  let now = Utc::now();
  let items: Vec<ListItem> = model.rows.iter().map(|row| row_item(row, now)).collect();

  let mut state = ListState::default();
  state.select((!model.rows.is_empty()).then_some(app.history_cursor));

  let highlight = if focused {
    Style::default()
      .bg(Color::Blue)
      .fg(Color::White)
      .add_modifier(Modifier::BOLD)
  } else {
    Style::default()
  };

  f.render_stateful_widget(
    List::new(items).highlight_style(highlight).highlight_symbol(""),
    inner,
    &mut state,
  );
}

fn row_item(row: &HistoryRow<'_>, now: chrono::DateTime<Utc>) -> ListItem<'static> {
  let v = row.version;
  let marker = if row.selected { "▶ " } else { "  " };
  let number_style = if row.selected {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
  } else {
    Style::default()
  };

  let mut head = vec![
    Span::styled(format!("{marker}v{}", v.version), number_style),
    Span::raw(format!("  {}", v.created_by)),
    Span::styled(
      format!("  {}", since(v.created_time, now)),
      Style::default().fg(Color::DarkGray),
    ),
  ];
  if row.current {
    head.push(Span::styled("  current", Style::default().fg(Color::Green)));
  }

  let mut lines = vec![Line::from(head)];
  if let Some(comment) = v.comment.as_deref().filter(|c| !c.is_empty()) {
    lines.push(Line::from(Span::styled(
      format!("    {comment}"),
      Style::default().fg(Color::DarkGray),
    )));
  }
  ListItem::new(lines)
}
