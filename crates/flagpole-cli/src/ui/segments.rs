//! Segments tab: the project's segments, fuzzy-filterable.

use flagpole_core::{context::ContextStore, service::TargetingService};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::app::App;

/// Render the segment list into `area`.
pub fn draw<S, C>(f: &mut Frame, area: Rect, app: &App<S, C>)
where
  S: TargetingService + 'static,
  C: ContextStore + 'static,
{
  let filtered = app.filtered_segments();
  let total = app
    .controller
    .segments()
    .map(|page| page.total_elements)
    .unwrap_or_default();

  // Title with count.
  let title = if app.filter_active || !app.filter.is_empty() {
    format!(" Segments ({}/{}) ", filtered.len(), total)
  } else {
    format!(" Segments ({total}) ")
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let items: Vec<ListItem> = filtered
    .iter()
    .map(|segment| {
      let mut spans = vec![
        Span::raw(segment.name.clone()),
        Span::styled(format!("  {}", segment.key), Style::default().fg(Color::DarkGray)),
      ];
      if let Some(description) = &segment.description {
        spans.push(Span::styled(
          format!("  {description}"),
          Style::default().fg(Color::DarkGray),
        ));
      }
      ListItem::new(Line::from(spans))
    })
    .collect();

  let mut inner_area = block.inner(area);
  f.render_widget(block, area);

  // Filter bar at the bottom of the inner area.
  if (app.filter_active || !app.filter.is_empty()) && inner_area.height > 2 {
    let filter_area = Rect {
      x:      inner_area.x,
      y:      inner_area.y + inner_area.height - 1,
      width:  inner_area.width,
      height: 1,
    };
    inner_area.height = inner_area.height.saturating_sub(1);

    let filter_text = if app.filter_active {
      format!("/{}_", app.filter)
    } else {
      format!("/{}", app.filter)
    };
    f.render_widget(
      Paragraph::new(filter_text).style(Style::default().fg(Color::Yellow)),
      filter_area,
    );
  }

  let mut state = ListState::default();
  state.select((!filtered.is_empty()).then_some(app.segment_cursor));

  f.render_stateful_widget(
    List::new(items)
      .highlight_style(
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol(""),
    inner_area,
    &mut state,
  );
}
