//! Error types for `flagpole-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// `load_more_history` was called after the last page had been received.
  #[error("no more history pages to load")]
  HistoryExhausted,

  #[error("no history version is waiting for confirmation")]
  NothingStaged,

  #[error("no toggle is open")]
  NoToggle,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
