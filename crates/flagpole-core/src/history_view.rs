//! What the history list shows, independent of how it is drawn.
//!
//! The list keeps no state of its own beyond scroll position: rows come out
//! in the caller's order, flagged as selected and/or current.

use chrono::{DateTime, Utc};

use crate::{history::History, model::Version};

/// One rendered entry of the history list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRow<'a> {
  pub version:  &'a Version,
  /// Shown in the editor right now.
  pub selected: bool,
  /// The newest version; badged regardless of selection.
  pub current:  bool,
}

/// What goes underneath the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Footer {
  /// No versions and nothing on the way.
  Empty,
  /// A page fetch is outstanding.
  Loading,
  /// More pages exist; reaching the end loads the next one.
  LoadMore,
  /// Everything has been loaded.
  End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryListModel<'a> {
  pub rows:   Vec<HistoryRow<'a>>,
  pub footer: Footer,
}

impl<'a> HistoryListModel<'a> {
  pub fn build(history: &'a History, latest: u32, selected: u32) -> Self {
    let rows = history
      .versions()
      .iter()
      .map(|version| HistoryRow {
        version,
        selected: version.version == selected,
        current: version.version == latest,
      })
      .collect::<Vec<_>>();

    let footer = if history.is_loading() {
      Footer::Loading
    } else if rows.is_empty() {
      Footer::Empty
    } else if history.has_more() {
      Footer::LoadMore
    } else {
      Footer::End
    };

    Self { rows, footer }
  }

  pub fn selected_index(&self) -> Option<usize> {
    self.rows.iter().position(|r| r.selected)
  }
}

/// The version a click on `row` should review, or `None` when the row is
/// already selected.
pub fn click_target<'a>(row: &HistoryRow<'a>) -> Option<&'a Version> {
  (!row.selected).then_some(row.version)
}

/// Whether moving the cursor to `cursor` (of `len` rows) reached the scroll
/// boundary and should pull the next page.
pub fn should_load_more(cursor: usize, len: usize, has_more: bool, loading: bool) -> bool {
  has_more && !loading && len > 0 && cursor + 1 >= len
}

/// Relative time in the "3 minutes ago" style.
pub fn since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let secs = (now - then).num_seconds();
  if secs < 0 {
    return "in the future".to_string();
  }

  let plural = |n: i64, unit: &str| {
    if n == 1 {
      format!("a {unit} ago")
    } else {
      format!("{n} {unit}s ago")
    }
  };

  match secs {
    0..45 => "a few seconds ago".to_string(),
    45..3_600 => plural(((secs + 30) / 60).max(1), "minute"),
    3_600..86_400 => plural(((secs + 1_800) / 3_600).max(1), "hour"),
    86_400..2_592_000 => plural(((secs + 43_200) / 86_400).max(1), "day"),
    2_592_000..31_536_000 => plural(((secs + 1_296_000) / 2_592_000).max(1), "month"),
    _ => plural(((secs + 15_768_000) / 31_536_000).max(1), "year"),
  }
}
