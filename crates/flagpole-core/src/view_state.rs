//! Editor availability as one tagged state instead of loose flags.

use crate::model::Version;

/// Which version the editor shows and whether it may be edited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
  /// Nothing has been loaded for the current toggle yet.
  #[default]
  Loading,
  /// Editing the latest version.
  Live { latest: u32 },
  /// Looking at an older version; edits are blocked.
  ReviewingHistory { selected: u32, latest: u32 },
  /// A review request is parked behind the unsaved-changes prompt.
  /// `selected`/`latest` are what is on screen until the operator answers.
  PendingConfirmation {
    selected: u32,
    latest:   u32,
    staged:   Box<Version>,
  },
}

impl ViewState {
  /// `Live` when `selected == latest`, `ReviewingHistory` otherwise.
  pub fn showing(selected: u32, latest: u32) -> Self {
    if selected == latest {
      Self::Live { latest }
    } else {
      Self::ReviewingHistory { selected, latest }
    }
  }

  /// Version number currently in the editor (0 while loading).
  pub fn selected_version(&self) -> u32 {
    match self {
      Self::Loading => 0,
      Self::Live { latest } => *latest,
      Self::ReviewingHistory { selected, .. }
      | Self::PendingConfirmation { selected, .. } => *selected,
    }
  }

  /// Newest known version number (0 while loading).
  pub fn latest_version(&self) -> u32 {
    match self {
      Self::Loading => 0,
      Self::Live { latest }
      | Self::ReviewingHistory { latest, .. }
      | Self::PendingConfirmation { latest, .. } => *latest,
    }
  }

  pub fn is_historical_view(&self) -> bool {
    self.selected_version() != self.latest_version()
  }

  /// Edits are blocked exactly while a non-latest version is shown.
  pub fn editing_disabled(&self) -> bool { self.is_historical_view() }

  pub fn is_pending(&self) -> bool {
    matches!(self, Self::PendingConfirmation { .. })
  }

  pub fn staged(&self) -> Option<&Version> {
    match self {
      Self::PendingConfirmation { staged, .. } => Some(staged),
      _ => None,
    }
  }

  /// The same on-screen selection with a new latest version.
  pub(crate) fn with_latest(self, latest: u32) -> Self {
    match self {
      Self::Loading | Self::Live { .. } => Self::Live { latest },
      Self::ReviewingHistory { selected, .. } => Self::showing(selected, latest),
      Self::PendingConfirmation { selected, staged, .. } => {
        Self::PendingConfirmation { selected, latest, staged }
      }
    }
  }
}
