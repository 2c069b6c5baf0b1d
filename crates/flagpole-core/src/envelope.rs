//! The uniform response envelope every service call returns.

use serde::{Deserialize, Serialize};

/// Result code the backend uses for a missing resource.
pub const NOT_FOUND: u16 = 404;

/// `{ success, data?, message?, code? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
  pub success: bool,
  #[serde(default)]
  pub data:    Option<T>,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub code:    Option<u16>,
}

impl<T> Envelope<T> {
  pub fn ok(data: T) -> Self {
    Self {
      success: true,
      data:    Some(data),
      message: None,
      code:    Some(200),
    }
  }

  pub fn failed(code: u16, message: impl Into<String>) -> Self {
    Self {
      success: false,
      data:    None,
      message: Some(message.into()),
      code:    Some(code),
    }
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    Self::failed(NOT_FOUND, message)
  }

  pub fn is_not_found(&self) -> bool {
    !self.success && self.code == Some(NOT_FOUND)
  }

  /// Classify the envelope. `fallback` is the message used when a failed
  /// envelope carries none.
  pub fn into_outcome(self, fallback: &str) -> Outcome<T> {
    let not_found = self.is_not_found();
    match (self.success, self.data) {
      (true, Some(data)) => Outcome::Ok(data),
      _ if not_found => Outcome::NotFound(self.message),
      _ => Outcome::Failed(self.message.unwrap_or_else(|| fallback.to_string())),
    }
  }
}

/// What the controller actually cares about in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
  Ok(T),
  NotFound(Option<String>),
  Failed(String),
}

impl<T> Outcome<T> {
  pub fn is_ok(&self) -> bool { matches!(self, Self::Ok(_)) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn success_with_data_is_ok() {
    assert_eq!(Envelope::ok(5).into_outcome("x"), Outcome::Ok(5));
  }

  #[test]
  fn success_without_data_is_failed() {
    let env: Envelope<u32> = Envelope {
      success: true,
      data:    None,
      message: None,
      code:    Some(200),
    };
    assert_eq!(env.into_outcome("empty"), Outcome::Failed("empty".into()));
  }

  #[test]
  fn not_found_code_is_classified() {
    let env: Envelope<u32> = Envelope::not_found("toggle gone");
    assert!(env.is_not_found());
    assert_eq!(
      env.into_outcome("x"),
      Outcome::NotFound(Some("toggle gone".into()))
    );
  }

  #[test]
  fn other_failures_keep_server_message_or_fallback() {
    let env: Envelope<u32> = Envelope::failed(500, "boom");
    assert_eq!(env.into_outcome("x"), Outcome::Failed("boom".into()));

    let env: Envelope<u32> = Envelope {
      success: false,
      data:    None,
      message: None,
      code:    Some(503),
    };
    assert_eq!(
      env.into_outcome("could not load"),
      Outcome::Failed("could not load".into())
    );
  }
}
