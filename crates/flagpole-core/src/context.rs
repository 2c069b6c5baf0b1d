//! The persisted project context: the last-viewed `projectKey` and
//! `environmentKey`, kept in a durable key/value store.
//!
//! Other parts of the console read this pair to restore where the operator
//! left off. It is written whenever a toggle is opened and cleared when the
//! toggle turns out not to exist.

use std::{
  collections::HashMap,
  convert::Infallible,
  future::Future,
  sync::Mutex,
};

pub const PROJECT_KEY: &str = "projectKey";
pub const ENVIRONMENT_KEY: &str = "environmentKey";

/// A durable string key/value store.
pub trait ContextStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  fn set<'a>(
    &'a self,
    key: &'a str,
    value: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn remove<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Remember `project_key` / `environment_key` as the last-viewed context.
pub async fn persist_context<C: ContextStore>(
  store: &C,
  project_key: &str,
  environment_key: &str,
) -> Result<(), C::Error> {
  store.set(PROJECT_KEY, project_key).await?;
  store.set(ENVIRONMENT_KEY, environment_key).await
}

pub async fn clear_context<C: ContextStore>(store: &C) -> Result<(), C::Error> {
  store.remove(PROJECT_KEY).await?;
  store.remove(ENVIRONMENT_KEY).await
}

/// The remembered `(project, environment)` pair, if both halves are present.
pub async fn restore_context<C: ContextStore>(
  store: &C,
) -> Result<Option<(String, String)>, C::Error> {
  let project = store.get(PROJECT_KEY).await?;
  let environment = store.get(ENVIRONMENT_KEY).await?;
  Ok(project.zip(environment))
}

// ─── In-memory store ─────────────────────────────────────────────────────────

/// Process-local [`ContextStore`]; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryContextStore {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryContextStore {
  pub fn new() -> Self { Self::default() }

  fn with<R>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> R) -> R {
    // A poisoned map is still a valid map.
    let mut guard = match self.entries.lock() {
      Ok(g) => g,
      Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard)
  }
}

impl ContextStore for MemoryContextStore {
  type Error = Infallible;

  async fn get(&self, key: &str) -> Result<Option<String>, Infallible> {
    Ok(self.with(|m| m.get(key).cloned()))
  }

  async fn set(&self, key: &str, value: &str) -> Result<(), Infallible> {
    self.with(|m| m.insert(key.to_string(), value.to_string()));
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<(), Infallible> {
    self.with(|m| m.remove(key));
    Ok(())
  }
}
