//! Console rendering. Each pane lives in its own module.

pub mod history_list;
pub mod segments;
pub mod targeting_pane;

use chrono::Utc;
use flagpole_core::{context::ContextStore, history_view::since, service::TargetingService};
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
};
use strum::IntoEnumIterator;

use crate::app::{App, Focus, Screen, Tab};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw<S, C>(f: &mut Frame, app: &App<S, C>)
where
  S: TargetingService + 'static,
  C: ContextStore + 'static,
{
  let area = f.area();

  // Vertical stack: header, tabs, body, status bar.
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Length(1), // tabs
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(area);

  draw_header(f, rows[0], app);
  draw_tabs(f, rows[1], app);
  draw_body(f, rows[2], app);
  draw_status(f, rows[3], app);

  if let Some(staged) = app.controller.view_state().staged() {
    draw_confirm(f, area, staged.version);
  } else if let Some(comment) = &app.comment {
    draw_comment(f, area, comment);
  }
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header<S, C>(f: &mut Frame, area: Rect, app: &App<S, C>)
where
  S: TargetingService + 'static,
  C: ContextStore + 'static,
{
  let toggle = match (app.controller.toggle_info(), app.controller.toggle()) {
    (Some(info), _) => format!("{} ({})", info.name, info.key),
    (None, Some(toggle)) => toggle.toggle_key.clone(),
    (None, None) => String::new(),
  };
  let scope = match (&app.project, &app.environment) {
    (Some(p), Some(e)) => format!("{} / {}", p.name, e.name),
    _ => app
      .controller
      .toggle()
      .map(|t| format!("{} / {}", t.project_key, t.environment_key))
      .unwrap_or_default(),
  };

  let left = Span::styled(
    format!(" flagpole  {toggle}  {scope}"),
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );

  let mut right = String::new();
  if let Some(info) = app.controller.modify_info() {
    if let (Some(by), Some(at)) = (&info.modified_by, info.modified_time) {
      right.push_str(&format!("modified by {by} {}", since(at, Utc::now())));
    }
  }
  if let Some(user) = &app.user {
    right.push_str(&format!("  {}", user.account));
  }
  let right = Span::styled(format!("{right} "), Style::default().fg(Color::Gray));

  // Simple left-right header: pad the middle.
  let pad = area
    .width
    .saturating_sub(left.content.chars().count() as u16)
    .saturating_sub(right.content.chars().count() as u16);

  let line = Line::from(vec![left, Span::raw(" ".repeat(pad as usize)), right]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

fn draw_tabs<S, C>(f: &mut Frame, area: Rect, app: &App<S, C>)
where
  S: TargetingService + 'static,
  C: ContextStore + 'static,
{
  let titles = Tab::iter().map(|t| format!(" {t} "));
  let selected = Tab::iter().position(|t| t == app.tab).unwrap_or(0);
  let mut history = " History [H] ".to_string();
  if app.controller.panel_open() {
    history = " History [H] ▾ ".to_string();
  }

  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Min(0), Constraint::Length(history.chars().count() as u16)])
    .split(area);

  f.render_widget(
    Tabs::new(titles)
      .select(selected)
      .style(Style::default().fg(Color::DarkGray))
      .highlight_style(
        Style::default()
          .fg(Color::Cyan)
          .add_modifier(Modifier::BOLD),
      ),
    cols[0],
  );
  if app.tab == Tab::Targeting {
    f.render_widget(
      Paragraph::new(history).style(Style::default().fg(Color::Black).bg(Color::Cyan)),
      cols[1],
    );
  }
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body<S, C>(f: &mut Frame, area: Rect, app: &App<S, C>)
where
  S: TargetingService + 'static,
  C: ContextStore + 'static,
{
  if app.screen == Screen::NotFound {
    draw_not_found(f, area);
    return;
  }

  match app.tab {
    Tab::Segments => segments::draw(f, area, app),
    Tab::Targeting if app.controller.panel_open() => {
      // Targeting on the left (65%), history on the right (35%).
      let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);
      targeting_pane::draw(f, cols[0], app);
      history_list::draw(f, cols[1], app);
    }
    Tab::Targeting => targeting_pane::draw(f, area, app),
  }
}

fn draw_not_found(f: &mut Frame, area: Rect) {
  let block = Block::default()
    .title(" Not found ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(
    Paragraph::new(vec![
      Line::from("This toggle does not exist, or you cannot see it."),
      Line::from(""),
      Line::from(Span::styled(
        "The remembered project and environment were cleared. Press q to quit.",
        Style::default().fg(Color::DarkGray),
      )),
    ]),
    inner,
  );
}

// ─── Overlays ─────────────────────────────────────────────────────────────────

/// A `width` × `height` rectangle centred in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect {
    x: area.x + (area.width - width) / 2,
    y: area.y + (area.height - height) / 2,
    width,
    height,
  }
}

fn draw_confirm(f: &mut Frame, area: Rect, version: u32) {
  let rect = centered(area, 56, 7);
  let block = Block::default()
    .title(" Unsaved changes ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow));
  let inner = block.inner(rect);
  f.render_widget(Clear, rect);
  f.render_widget(block, rect);
  f.render_widget(
    Paragraph::new(vec![
      Line::from(format!(
        "Viewing version {version} discards your unsaved edits."
      )),
      Line::from(""),
      Line::from(Span::styled(
        "[y] view version   [n] keep editing",
        Style::default().fg(Color::DarkGray),
      )),
    ])
    .wrap(Wrap { trim: true }),
    inner,
  );
}

fn draw_comment(f: &mut Frame, area: Rect, comment: &str) {
  let rect = centered(area, 60, 5);
  let block = Block::default()
    .title(" Publish: comment (optional) ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Cyan));
  let inner = block.inner(rect);
  f.render_widget(Clear, rect);
  f.render_widget(block, rect);
  f.render_widget(
    Paragraph::new(vec![
      Line::from(Span::styled(
        format!("{comment}_"),
        Style::default().fg(Color::Yellow),
      )),
      Line::from(""),
      Line::from(Span::styled(
        "Enter publish  Esc cancel",
        Style::default().fg(Color::DarkGray),
      )),
    ]),
    inner,
  );
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status<S, C>(f: &mut Frame, area: Rect, app: &App<S, C>)
where
  S: TargetingService + 'static,
  C: ContextStore + 'static,
{
  let view = app.controller.view_state();
  let (mode_label, hints) = if app.screen == Screen::NotFound {
    ("NOT FOUND", "q quit")
  } else if view.is_pending() {
    ("CONFIRM", "y view version  n keep editing")
  } else if app.comment.is_some() {
    ("PUBLISH", "Type a comment  Enter publish  Esc cancel")
  } else {
    match app.tab {
      Tab::Segments if app.filter_active => ("SEARCH", "Type to filter  Esc clear  Enter done"),
      Tab::Segments => ("SEGMENTS", "↑↓/jk navigate  / search  Tab targeting  q quit"),
      Tab::Targeting if app.focus() == Focus::History => (
        "HISTORY",
        "↑↓/jk navigate  Enter view  h editor  Esc back  H hide  q quit",
      ),
      Tab::Targeting if view.is_historical_view() => (
        "REVIEW",
        "Esc latest  H history  l history list  Tab segments  q quit",
      ),
      Tab::Targeting => (
        "EDIT",
        "jk rule  Enter serve  s default  d disable  u undo  p publish  H history",
      ),
    }
  };

  let status = if app.status_msg.is_empty() {
    hints.to_string()
  } else {
    app.status_msg.clone()
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(format!("  {status}"), Style::default().fg(Color::DarkGray));

  let line = Line::from(vec![mode_span, hint_span]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
