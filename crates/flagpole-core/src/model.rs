//! Wire and domain types for toggles, targeting content and versions.
//!
//! Field names follow the backend's JSON (`camelCase`). Versions are
//! immutable once fetched; anything the editor touches is a clone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Addressing ──────────────────────────────────────────────────────────────

/// Identifies one toggle inside one environment of one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRef {
  pub project_key:     String,
  pub environment_key: String,
  pub toggle_key:      String,
}

impl ToggleRef {
  pub fn new(
    project_key: impl Into<String>,
    environment_key: impl Into<String>,
    toggle_key: impl Into<String>,
  ) -> Self {
    Self {
      project_key:     project_key.into(),
      environment_key: environment_key.into(),
      toggle_key:      toggle_key.into(),
    }
  }
}

/// Parse a version number that arrived as text (deep links, prompts).
///
/// Versions start at 1, so `"0"`, negative numbers and anything non-numeric
/// yield `None`.
pub fn parse_version(raw: &str) -> Option<u32> {
  raw.trim().parse::<u32>().ok().filter(|v| *v >= 1)
}

// ─── Targeting content ───────────────────────────────────────────────────────

/// Which variation (or weighted split of variations) a rule serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Serve {
  Select { select: usize },
  Split { split: Vec<u32> },
}

impl Default for Serve {
  fn default() -> Self { Self::Select { select: 0 } }
}

/// One predicate of a targeting rule, e.g. `city is one of [Paris, Rome]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Condition {
  #[serde(rename = "type")]
  pub kind:      String,
  pub subject:   String,
  pub predicate: String,
  pub objects:   Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetingRule {
  pub name:       Option<String>,
  pub conditions: Vec<Condition>,
  pub serve:      Serve,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Variation {
  pub value:       String,
  pub name:        String,
  pub description: Option<String>,
}

/// The rule set of one toggle version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetingContent {
  pub rules:          Vec<TargetingRule>,
  pub disabled_serve: Serve,
  pub default_serve:  Serve,
  pub variations:     Vec<Variation>,
}

/// What the editor is (re)loaded with: rules plus the disabled flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSeed {
  pub content:  TargetingContent,
  pub disabled: bool,
}

// ─── Current targeting & versions ────────────────────────────────────────────

/// Payload of the "current targeting" endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingSnapshot {
  pub version:       u32,
  #[serde(default)]
  pub content:       TargetingContent,
  #[serde(default)]
  pub disabled:      bool,
  #[serde(default)]
  pub modified_by:   Option<String>,
  #[serde(default)]
  pub modified_time: Option<DateTime<Utc>>,
}

impl TargetingSnapshot {
  pub fn seed(&self) -> EditorSeed {
    EditorSeed {
      content:  self.content.clone(),
      disabled: self.disabled,
    }
  }

  pub fn modify_info(&self) -> ModifyInfo {
    ModifyInfo {
      modified_by:   self.modified_by.clone(),
      modified_time: self.modified_time,
    }
  }
}

/// Who last changed the targeting, and when.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyInfo {
  pub modified_by:   Option<String>,
  pub modified_time: Option<DateTime<Utc>>,
}

/// An immutable, numbered snapshot of a toggle's targeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
  pub version:      u32,
  #[serde(default)]
  pub content:      TargetingContent,
  #[serde(default)]
  pub disabled:     bool,
  #[serde(default)]
  pub created_by:   String,
  pub created_time: DateTime<Utc>,
  #[serde(default)]
  pub comment:      Option<String>,
}

impl Version {
  pub fn seed(&self) -> EditorSeed {
    EditorSeed {
      content:  self.content.clone(),
      disabled: self.disabled,
    }
  }
}

/// One page of history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPage {
  #[serde(rename = "content", default)]
  pub items:       Vec<Version>,
  #[serde(rename = "number")]
  pub page_number: u32,
  pub total_pages: u32,
}

/// A window of history centred on an anchor version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionWindow {
  #[serde(default)]
  pub versions:    Vec<Version>,
  #[serde(rename = "total")]
  pub total_count: usize,
}

// ─── Paging parameters ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
  pub page_index: u32,
  pub page_size:  u32,
}

/// Query for one history page. `anchor` keeps pagination pinned to a
/// deep-linked version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
  pub page_index: u32,
  pub page_size:  u32,
  #[serde(rename = "version", skip_serializing_if = "Option::is_none")]
  pub anchor:     Option<u32>,
}

// ─── Toggle metadata & segments ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToggleInfo {
  pub name:        String,
  pub key:         String,
  pub description: Option<String>,
  pub return_type: String,
  pub tags:        Vec<String>,
  pub permanent:   bool,
  pub archived:    bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Segment {
  pub name:        String,
  pub key:         String,
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentPage {
  #[serde(rename = "content")]
  pub items:          Vec<Segment>,
  pub total_elements: u64,
  #[serde(rename = "number")]
  pub page_number:    u32,
  pub total_pages:    u32,
}

// ─── Publishing ──────────────────────────────────────────────────────────────

/// Body of the publish call that creates a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
  pub content:  TargetingContent,
  pub disabled: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment:  Option<String>,
}

// ─── Project & user lookups ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
  pub account: String,
  pub role:    String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentInfo {
  pub key:            String,
  pub name:           String,
  pub server_sdk_key: Option<String>,
  pub client_sdk_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectInfo {
  pub key:          String,
  pub name:         String,
  pub description:  Option<String>,
  pub environments: Vec<EnvironmentInfo>,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn parse_version_coerces_text() {
    assert_eq!(parse_version("3"), Some(3));
    assert_eq!(parse_version(" 12 "), Some(12));
    assert_eq!(parse_version("0"), None);
    assert_eq!(parse_version("-1"), None);
    assert_eq!(parse_version("latest"), None);
    assert_eq!(parse_version(""), None);
  }

  #[test]
  fn version_page_reads_server_field_names() {
    let raw = json!({
      "content": [{
        "version": 4,
        "content": {
          "rules": [{
            "name": "beta users",
            "conditions": [{
              "type": "string",
              "subject": "city",
              "predicate": "is one of",
              "objects": ["Paris"]
            }],
            "serve": { "select": 1 }
          }],
          "disabledServe": { "select": 0 },
          "defaultServe": { "split": [5000, 5000] },
          "variations": [
            { "value": "false", "name": "off" },
            { "value": "true", "name": "on" }
          ]
        },
        "disabled": false,
        "createdBy": "alice",
        "createdTime": "2024-03-01T10:00:00Z",
        "comment": "ship it"
      }],
      "number": 0,
      "totalPages": 3
    });

    let page: VersionPage = serde_json::from_value(raw).unwrap();
    assert_eq!(page.page_number, 0);
    assert_eq!(page.total_pages, 3);
    let v = &page.items[0];
    assert_eq!(v.version, 4);
    assert_eq!(v.created_by, "alice");
    assert_eq!(v.comment.as_deref(), Some("ship it"));
    assert_eq!(v.content.rules[0].conditions[0].kind, "string");
    assert_eq!(v.content.rules[0].serve, Serve::Select { select: 1 });
    assert_eq!(v.content.default_serve, Serve::Split { split: vec![5000, 5000] });
  }

  #[test]
  fn version_window_reads_total() {
    let raw = json!({ "versions": [], "total": 10 });
    let window: VersionWindow = serde_json::from_value(raw).unwrap();
    assert!(window.versions.is_empty());
    assert_eq!(window.total_count, 10);
  }

  #[test]
  fn page_request_omits_missing_anchor() {
    let plain = PageRequest { page_index: 1, page_size: 10, anchor: None };
    assert_eq!(
      serde_json::to_value(plain).unwrap(),
      json!({ "pageIndex": 1, "pageSize": 10 })
    );

    let anchored = PageRequest { anchor: Some(7), ..plain };
    assert_eq!(
      serde_json::to_value(anchored).unwrap(),
      json!({ "pageIndex": 1, "pageSize": 10, "version": 7 })
    );
  }
}
