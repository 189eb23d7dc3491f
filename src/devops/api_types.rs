//! Wire types for the upstream REST API.
//!
//! Only the fields the aggregators consume are modeled; resource listings
//! that pass straight through to the frontend stay as raw JSON so nothing
//! the upstream returns gets dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard upstream response envelope: a `value` array, with pagination
/// carried out-of-band in a response header.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueList<T> {
  // `default = "Vec::new"` rather than plain `default`: the latter makes the
  // derive demand `T: Default`, which the wire types do not implement.
  #[serde(default = "Vec::new")]
  pub value: Vec<T>,
}

/// A project as the dashboard sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
  pub id: String,
  pub name: String,
}

/// A git repository. The fields the summarizer needs are lifted out;
/// everything else is kept for passthrough listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, Value>,
}

impl Repository {
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or("UnknownRepo")
  }
}

/// A build (pipeline run).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
  #[serde(default)]
  pub start_time: Option<String>,
  #[serde(default)]
  pub finish_time: Option<String>,
  #[serde(default)]
  pub result: Option<String>,
}

/// A release deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
  #[serde(default)]
  pub deployment_status: Option<String>,
  #[serde(default)]
  pub release_environment: Option<NamedRef>,
  #[serde(default)]
  pub release: Option<ReleaseRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRef {
  #[serde(default)]
  pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRef {
  #[serde(default)]
  pub environment_name: Option<String>,
}

impl Deployment {
  /// Environment display name: the expanded release environment first, then
  /// the legacy field on the release itself.
  pub fn environment_name(&self) -> Option<&str> {
    self
      .release_environment
      .as_ref()
      .and_then(|e| e.name.as_deref())
      .or_else(|| self.release.as_ref().and_then(|r| r.environment_name.as_deref()))
  }
}

/// Author name of a raw commit record.
pub fn commit_author_name(commit: &Value) -> Option<String> {
  commit
    .pointer("/author/name")
    .and_then(Value::as_str)
    .map(String::from)
}

/// Author date of a raw commit record, used for recency sorting.
pub fn commit_author_date(commit: &Value) -> Option<&str> {
  commit.pointer("/author/date").and_then(Value::as_str)
}
