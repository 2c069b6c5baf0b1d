//! Async HTTP client for the feature-flag admin REST API.
//!
//! Every call is turned into an [`Envelope`]: `success` is a 2xx status,
//! `code` is the status itself, `data` is the decoded body and `message` is
//! the body's `message` field on failure. Only transport and decoding
//! problems surface as [`ClientError`].

use std::time::Duration;

use flagpole_core::{
  envelope::Envelope,
  model::{
    EnvironmentInfo, PageParams, PageRequest, ProjectInfo, PublishRequest,
    SegmentPage, TargetingSnapshot, ToggleInfo, ToggleRef, UserInfo,
    VersionPage, VersionWindow,
  },
  service::TargetingService,
};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

/// Connection settings for the admin API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  /// Sent as a bearer token when present.
  pub token:    Option<String>,
}

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("failed to build HTTP client: {0}")]
  Build(#[source] reqwest::Error),

  #[error("{path}: {source}")]
  Http {
    path:   String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{path}: malformed response: {source}")]
  Decode {
    path:   String,
    #[source]
    source: serde_json::Error,
  },
}

/// The part of an error body we read.
#[derive(Deserialize)]
struct ErrorBody {
  #[serde(default)]
  message: Option<String>,
}

/// Async HTTP client for the admin API.
///
/// Clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(ClientError::Build)?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.config.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  fn toggle_path(toggle: &ToggleRef) -> String {
    format!(
      "/projects/{}/environments/{}/toggles/{}",
      toggle.project_key, toggle.environment_key, toggle.toggle_key
    )
  }

  /// Send `req` and fold the response into an envelope.
  async fn exchange<T: DeserializeOwned>(
    &self,
    path: &str,
    req: RequestBuilder,
  ) -> Result<Envelope<T>, ClientError> {
    let http = |source: reqwest::Error| ClientError::Http { path: path.to_string(), source };

    let resp = self.auth(req).send().await.map_err(http)?;
    let status = resp.status();
    let body = resp.bytes().await.map_err(http)?;
    debug!(path, status = status.as_u16(), bytes = body.len(), "response");

    if !status.is_success() {
      let message = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message);
      return Ok(Envelope {
        success: false,
        data: None,
        message,
        code: Some(status.as_u16()),
      });
    }

    let raw: &[u8] = if body.is_empty() { b"null" } else { &body };
    let data = serde_json::from_slice(raw).map_err(|source| ClientError::Decode {
      path: path.to_string(),
      source,
    })?;
    Ok(Envelope {
      success: true,
      data:    Some(data),
      message: None,
      code:    Some(status.as_u16()),
    })
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ClientError> {
    self.exchange(path, self.client.get(self.url(path))).await
  }
}

// ─── TargetingService impl ───────────────────────────────────────────────────

impl TargetingService for ApiClient {
  type Error = ClientError;

  // ── Toggle ──────────────────────────────────────────────────────────────

  /// `GET /api/projects/{p}/environments/{e}/toggles/{t}/targeting`
  async fn current_targeting(
    &self,
    toggle: &ToggleRef,
  ) -> Result<Envelope<TargetingSnapshot>, ClientError> {
    self.get(&format!("{}/targeting", Self::toggle_path(toggle))).await
  }

  /// `GET /api/projects/{p}/environments/{e}/toggles/{t}`
  async fn toggle_info(&self, toggle: &ToggleRef) -> Result<Envelope<ToggleInfo>, ClientError> {
    self.get(&Self::toggle_path(toggle)).await
  }

  /// `PATCH /api/projects/{p}/environments/{e}/toggles/{t}/targeting`
  async fn publish_targeting(
    &self,
    toggle: &ToggleRef,
    request: &PublishRequest,
  ) -> Result<Envelope<()>, ClientError> {
    let path = format!("{}/targeting", Self::toggle_path(toggle));
    let envelope: Envelope<serde::de::IgnoredAny> = self
      .exchange(&path, self.client.patch(self.url(&path)).json(request))
      .await?;
    Ok(Envelope {
      success: envelope.success,
      data:    envelope.data.map(|_| ()),
      message: envelope.message,
      code:    envelope.code,
    })
  }

  // ── History ─────────────────────────────────────────────────────────────

  /// `GET /api/projects/{p}/environments/{e}/toggles/{t}/targeting/versions`
  async fn version_page(
    &self,
    toggle: &ToggleRef,
    request: PageRequest,
  ) -> Result<Envelope<VersionPage>, ClientError> {
    let path = format!("{}/targeting/versions", Self::toggle_path(toggle));
    self
      .exchange(&path, self.client.get(self.url(&path)).query(&request))
      .await
  }

  /// `GET /api/projects/{p}/environments/{e}/toggles/{t}/targeting/versions/{v}`
  async fn version_window(
    &self,
    toggle: &ToggleRef,
    anchor: u32,
  ) -> Result<Envelope<VersionWindow>, ClientError> {
    self
      .get(&format!("{}/targeting/versions/{anchor}", Self::toggle_path(toggle)))
      .await
  }

  // ── Project data ────────────────────────────────────────────────────────

  /// `GET /api/projects/{p}/segments?pageIndex&pageSize`
  async fn segments(
    &self,
    project_key: &str,
    page: PageParams,
  ) -> Result<Envelope<SegmentPage>, ClientError> {
    let path = format!("/projects/{project_key}/segments");
    self
      .exchange(&path, self.client.get(self.url(&path)).query(&page))
      .await
  }

  async fn project_info(&self, project_key: &str) -> Result<Envelope<ProjectInfo>, ClientError> {
    self.get(&format!("/projects/{project_key}")).await
  }

  async fn environment(
    &self,
    project_key: &str,
    environment_key: &str,
  ) -> Result<Envelope<EnvironmentInfo>, ClientError> {
    self
      .get(&format!("/projects/{project_key}/environments/{environment_key}"))
      .await
  }

  async fn user_info(&self) -> Result<Envelope<UserInfo>, ClientError> {
    self.get("/users/info").await
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
  };

  use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
  };
  use flagpole_core::{envelope::NOT_FOUND, model::TargetingContent};
  use serde_json::{Value, json};
  use tokio::net::TcpListener;

  use super::*;

  #[derive(Clone, Default)]
  struct Seen {
    queries:   Arc<Mutex<Vec<HashMap<String, String>>>>,
    published: Arc<Mutex<Vec<Value>>>,
    auth:      Arc<Mutex<Vec<Option<String>>>>,
  }

  const TOGGLE_PATH: &str =
    "/api/projects/{p}/environments/{e}/toggles/{t}";

  async fn toggle_handler(
    State(seen): State<Seen>,
    Path((_, _, t)): Path<(String, String, String)>,
    headers: HeaderMap,
  ) -> (StatusCode, Json<Value>) {
    let auth = headers
      .get("authorization")
      .and_then(|v| v.to_str().ok())
      .map(str::to_string);
    seen.auth.lock().unwrap().push(auth);
    if t == "ghost" {
      return (StatusCode::NOT_FOUND, Json(json!({ "message": "toggle missing" })));
    }
    (StatusCode::OK, Json(json!({ "name": "Checkout", "key": t, "returnType": "boolean" })))
  }

  async fn versions_handler(
    State(seen): State<Seen>,
    Query(query): Query<HashMap<String, String>>,
  ) -> Json<Value> {
    seen.queries.lock().unwrap().push(query);
    Json(json!({
      "content": [{ "version": 12, "createdBy": "erin", "createdTime": "2024-05-01T12:00:00Z" }],
      "number": 1,
      "totalPages": 2
    }))
  }

  async fn window_handler(Path((_, _, _, v)): Path<(String, String, String, u32)>) -> Json<Value> {
    Json(json!({
      "versions": [{ "version": v, "createdBy": "erin", "createdTime": "2024-05-01T12:00:00Z" }],
      "total": 30
    }))
  }

  async fn publish_handler(State(seen): State<Seen>, Json(body): Json<Value>) -> StatusCode {
    seen.published.lock().unwrap().push(body);
    StatusCode::OK
  }

  async fn segments_handler(
    State(seen): State<Seen>,
    Query(query): Query<HashMap<String, String>>,
  ) -> (StatusCode, Json<Value>) {
    seen.queries.lock().unwrap().push(query);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "code": "boom" })))
  }

  async fn start(seen: Seen) -> SocketAddr {
    let app = Router::new()
      .route(TOGGLE_PATH, get(toggle_handler))
      .route(
        &format!("{TOGGLE_PATH}/targeting"),
        get(|| async { Json(json!({ "version": 12, "disabled": true })) })
          .patch(publish_handler),
      )
      .route(&format!("{TOGGLE_PATH}/targeting/versions"), get(versions_handler))
      .route(&format!("{TOGGLE_PATH}/targeting/versions/{{v}}"), get(window_handler))
      .route("/api/projects/{p}/segments", get(segments_handler))
      .route("/api/users/info", get(|| async { "not json" }))
      .with_state(seen);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    addr
  }

  fn client(addr: SocketAddr, token: Option<&str>) -> ApiClient {
    ApiClient::new(ApiConfig {
      base_url: format!("http://{addr}/"),
      token:    token.map(str::to_string),
    })
    .unwrap()
  }

  fn toggle(key: &str) -> ToggleRef { ToggleRef::new("shop", "prod", key) }

  #[tokio::test]
  async fn success_becomes_ok_envelope() {
    let addr = start(Seen::default()).await;
    let env = client(addr, None).toggle_info(&toggle("checkout")).await.unwrap();
    assert!(env.success);
    assert_eq!(env.code, Some(200));
    assert_eq!(env.data.unwrap().name, "Checkout");
  }

  #[tokio::test]
  async fn missing_toggle_carries_not_found_and_message() {
    let addr = start(Seen::default()).await;
    let env = client(addr, None).toggle_info(&toggle("ghost")).await.unwrap();
    assert!(env.is_not_found());
    assert_eq!(env.code, Some(NOT_FOUND));
    assert_eq!(env.message.as_deref(), Some("toggle missing"));
  }

  #[tokio::test]
  async fn bearer_token_is_sent_when_configured() {
    let seen = Seen::default();
    let addr = start(seen.clone()).await;
    client(addr, Some("s3cret")).toggle_info(&toggle("checkout")).await.unwrap();
    client(addr, None).toggle_info(&toggle("checkout")).await.unwrap();
    assert_eq!(
      *seen.auth.lock().unwrap(),
      vec![Some("Bearer s3cret".to_string()), None]
    );
  }

  #[tokio::test]
  async fn version_page_sends_paging_and_anchor() {
    let seen = Seen::default();
    let addr = start(seen.clone()).await;
    let c = client(addr, None);

    let page = c
      .version_page(&toggle("checkout"), PageRequest {
        page_index: 1,
        page_size:  10,
        anchor:     Some(7),
      })
      .await
      .unwrap()
      .data
      .unwrap();
    assert_eq!(page.page_number, 1);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items[0].version, 12);

    c.version_page(&toggle("checkout"), PageRequest {
      page_index: 0,
      page_size:  10,
      anchor:     None,
    })
    .await
    .unwrap();

    let queries = seen.queries.lock().unwrap();
    assert_eq!(queries[0].get("pageIndex").map(String::as_str), Some("1"));
    assert_eq!(queries[0].get("pageSize").map(String::as_str), Some("10"));
    assert_eq!(queries[0].get("version").map(String::as_str), Some("7"));
    assert!(!queries[1].contains_key("version"));
  }

  #[tokio::test]
  async fn version_window_reads_total() {
    let addr = start(Seen::default()).await;
    let window = client(addr, None)
      .version_window(&toggle("checkout"), 9)
      .await
      .unwrap()
      .data
      .unwrap();
    assert_eq!(window.total_count, 30);
    assert_eq!(window.versions[0].version, 9);
  }

  #[tokio::test]
  async fn current_targeting_defaults_missing_fields() {
    let addr = start(Seen::default()).await;
    let snapshot = client(addr, None)
      .current_targeting(&toggle("checkout"))
      .await
      .unwrap()
      .data
      .unwrap();
    assert_eq!(snapshot.version, 12);
    assert!(snapshot.disabled);
    assert_eq!(snapshot.content, TargetingContent::default());
  }

  #[tokio::test]
  async fn publish_sends_body_and_accepts_empty_response() {
    let seen = Seen::default();
    let addr = start(seen.clone()).await;
    let request = PublishRequest {
      content:  TargetingContent::default(),
      disabled: false,
      comment:  Some("enable for beta".into()),
    };
    let env = client(addr, None)
      .publish_targeting(&toggle("checkout"), &request)
      .await
      .unwrap();
    assert!(env.success);
    assert_eq!(env.data, Some(()));
    let published = seen.published.lock().unwrap();
    assert_eq!(published[0]["comment"], "enable for beta");
    assert_eq!(published[0]["disabled"], false);
  }

  #[tokio::test]
  async fn server_error_without_message_keeps_status() {
    let seen = Seen::default();
    let addr = start(seen.clone()).await;
    let env = client(addr, None)
      .segments("shop", PageParams { page_index: 0, page_size: 10 })
      .await
      .unwrap();
    assert!(!env.success);
    assert_eq!(env.code, Some(500));
    assert_eq!(env.message, None);
    let queries = seen.queries.lock().unwrap();
    assert_eq!(queries[0].get("pageSize").map(String::as_str), Some("10"));
  }

  #[tokio::test]
  async fn undecodable_body_is_a_client_error() {
    let addr = start(Seen::default()).await;
    let err = client(addr, None).user_info().await.unwrap_err();
    assert!(matches!(err, ClientError::Decode { ref path, .. } if path == "/users/info"));
  }

  #[tokio::test]
  async fn unreachable_server_is_a_client_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = client(addr, None).user_info().await.unwrap_err();
    assert!(matches!(err, ClientError::Http { .. }));
  }
}
