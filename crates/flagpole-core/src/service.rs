//! The `TargetingService` trait: the REST service layer as seen by the
//! controller.
//!
//! Implemented by `flagpole-cli`'s HTTP client. Every call yields the uniform
//! [`Envelope`]; a transport failure is reported through `Self::Error`
//! instead.

use std::future::Future;

use crate::{
  envelope::Envelope,
  model::{
    EnvironmentInfo, PageParams, PageRequest, ProjectInfo, PublishRequest,
    SegmentPage, TargetingSnapshot, ToggleInfo, ToggleRef, UserInfo,
    VersionPage, VersionWindow,
  },
};

/// Abstraction over the feature-flag backend.
///
/// All methods return `Send` futures so implementations can be driven from
/// spawned tokio tasks.
pub trait TargetingService: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Toggle ────────────────────────────────────────────────────────────

  /// The current (latest) targeting of a toggle.
  fn current_targeting<'a>(
    &'a self,
    toggle: &'a ToggleRef,
  ) -> impl Future<Output = Result<Envelope<TargetingSnapshot>, Self::Error>>
  + Send
  + 'a;

  /// Toggle metadata. A missing toggle comes back with the `NOT_FOUND`
  /// code.
  fn toggle_info<'a>(
    &'a self,
    toggle: &'a ToggleRef,
  ) -> impl Future<Output = Result<Envelope<ToggleInfo>, Self::Error>> + Send + 'a;

  /// Persist a new targeting version.
  fn publish_targeting<'a>(
    &'a self,
    toggle: &'a ToggleRef,
    request: &'a PublishRequest,
  ) -> impl Future<Output = Result<Envelope<()>, Self::Error>> + Send + 'a;

  // ── History ───────────────────────────────────────────────────────────

  /// One page of versions, newest first.
  fn version_page<'a>(
    &'a self,
    toggle: &'a ToggleRef,
    request: PageRequest,
  ) -> impl Future<Output = Result<Envelope<VersionPage>, Self::Error>> + Send + 'a;

  /// A window of versions anchored on `anchor`.
  fn version_window<'a>(
    &'a self,
    toggle: &'a ToggleRef,
    anchor: u32,
  ) -> impl Future<Output = Result<Envelope<VersionWindow>, Self::Error>>
  + Send
  + 'a;

  // ── Project data ──────────────────────────────────────────────────────

  fn segments<'a>(
    &'a self,
    project_key: &'a str,
    page: PageParams,
  ) -> impl Future<Output = Result<Envelope<SegmentPage>, Self::Error>> + Send + 'a;

  fn project_info<'a>(
    &'a self,
    project_key: &'a str,
  ) -> impl Future<Output = Result<Envelope<ProjectInfo>, Self::Error>> + Send + 'a;

  fn environment<'a>(
    &'a self,
    project_key: &'a str,
    environment_key: &'a str,
  ) -> impl Future<Output = Result<Envelope<EnvironmentInfo>, Self::Error>>
  + Send
  + 'a;

  fn user_info(
    &self,
  ) -> impl Future<Output = Result<Envelope<UserInfo>, Self::Error>> + Send + '_;
}
