//! Authenticated client for the upstream REST API.
//!
//! Pagination is driven by an opaque continuation token returned in a
//! response header; `pages` exposes it as a lazy, single-pass stream and
//! `fetch_all` drains it in page order. There is no automatic retry: a call
//! either returns a fully drained sequence or fails as a whole.

use futures::stream::{self, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::devops::api_types::{Build, Deployment, Project, Repository, ValueList};
use crate::error::{AppError, Result};
use crate::metrics::window::TimeWindow;

/// Response header carrying the pagination cursor.
const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";

/// Hard cap on pages drained per fetch, so a misbehaving upstream that keeps
/// handing out tokens cannot loop us forever.
pub const MAX_PAGES: usize = 100;

const CORE_API_VERSION: &str = "7.1-preview.1";
const BUILD_API_VERSION: &str = "7.0";
const RELEASE_API_VERSION: &str = "7.0";
const TEAMS_API_VERSION: &str = "7.1-preview.3";
const MEMBERS_API_VERSION: &str = "7.1-preview.1";

/// Commit page size; generous enough for a week of activity per repo.
const COMMITS_TOP: &str = "50";

#[derive(Clone)]
pub struct DevOpsClient {
  http: reqwest::Client,
  /// Organization base URL, e.g. https://dev.azure.com/MyOrg
  base: Url,
  /// Base URL for the release-management APIs (separate vsrm host on the
  /// hosted service, same host everywhere else).
  release_base: Url,
  pat: String,
}

impl DevOpsClient {
  pub fn new(config: &Config) -> Result<Self> {
    let pat = Config::credential()?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.upstream.timeout_secs))
      .build()
      .map_err(|e| AppError::Unexpected(format!("failed to build HTTP client: {}", e)))?;

    let base = Url::parse(config.org_url()).map_err(|e| {
      AppError::ConfigurationMissing(format!("invalid org_url '{}': {}", config.org_url(), e))
    })?;
    let release_base = release_base_for(&base, config.org_name()?)?;

    Ok(Self {
      http,
      base,
      release_base,
      pat,
    })
  }

  /// Fetch one page: the decoded `value` array plus the continuation token,
  /// if the upstream signalled more results.
  pub async fn fetch_page<T: DeserializeOwned>(&self, url: Url) -> Result<(Vec<T>, Option<String>)> {
    debug!(%url, "GET upstream");

    let response = self
      .http
      .get(url.clone())
      .basic_auth("", Some(&self.pat))
      .send()
      .await?;

    let status = response.status();
    let token = response
      .headers()
      .get(CONTINUATION_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(String::from);

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(AppError::UpstreamHttp {
        status: status.as_u16(),
        body,
      });
    }

    let list: ValueList<T> = response
      .json()
      .await
      .map_err(|e| AppError::Unexpected(format!("failed to decode response from {}: {}", url, e)))?;

    Ok((list.value, token))
  }

  /// Lazy stream of pages. Single-pass, not restartable; terminates when the
  /// upstream stops returning a token, when a token repeats, or at
  /// `MAX_PAGES`.
  pub fn pages<T>(&self, base: Url) -> impl Stream<Item = Result<Vec<T>>> + '_
  where
    T: DeserializeOwned,
  {
    struct PageState {
      base: Url,
      token: Option<String>,
      drained: usize,
      done: bool,
    }

    let state = PageState {
      base,
      token: None,
      drained: 0,
      done: false,
    };

    stream::try_unfold(state, move |mut state| async move {
      if state.done {
        return Ok(None);
      }
      if state.drained >= MAX_PAGES {
        warn!(url = %state.base, pages = state.drained, "pagination cap reached, stopping drain");
        return Ok(None);
      }

      let url = match &state.token {
        Some(token) => {
          let mut url = state.base.clone();
          url.query_pairs_mut().append_pair("continuationToken", token);
          url
        }
        None => state.base.clone(),
      };

      let (records, next_token) = self.fetch_page::<T>(url).await?;
      state.drained += 1;

      match next_token {
        Some(token) if state.token.as_deref() == Some(token.as_str()) => {
          warn!(url = %state.base, "upstream repeated a continuation token, stopping drain");
          state.done = true;
        }
        Some(token) => state.token = Some(token),
        None => state.done = true,
      }

      Ok(Some((records, state)))
    })
  }

  /// Drain all pages, concatenating records in page order.
  pub async fn fetch_all<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
    let pages = self.pages(url);
    futures::pin_mut!(pages);

    let mut all = Vec::new();
    while let Some(page) = pages.try_next().await? {
      all.extend(page);
    }
    Ok(all)
  }

  /// List the organization's projects.
  pub async fn projects(&self) -> Result<Vec<Project>> {
    let mut url = url_under(&self.base, &["_apis", "projects"])?;
    url
      .query_pairs_mut()
      .append_pair("api-version", CORE_API_VERSION);
    self.fetch_all(url).await
  }

  /// List git repositories in a project.
  pub async fn repositories(&self, project: &str) -> Result<Vec<Repository>> {
    let mut url = url_under(&self.base, &[project, "_apis", "git", "repositories"])?;
    url
      .query_pairs_mut()
      .append_pair("api-version", CORE_API_VERSION);
    self.fetch_all(url).await
  }

  /// List build pipeline definitions in a project. Raw passthrough.
  pub async fn pipelines(&self, project: &str) -> Result<Vec<Value>> {
    let mut url = url_under(&self.base, &[project, "_apis", "pipelines"])?;
    url
      .query_pairs_mut()
      .append_pair("api-version", CORE_API_VERSION);
    self.fetch_all(url).await
  }

  /// List release pipeline definitions in a project. Raw passthrough.
  pub async fn release_definitions(&self, project: &str) -> Result<Vec<Value>> {
    let mut url = url_under(&self.release_base, &[project, "_apis", "release", "definitions"])?;
    url
      .query_pairs_mut()
      .append_pair("api-version", RELEASE_API_VERSION);
    self.fetch_all(url).await
  }

  /// List teams in a project. Raw passthrough.
  pub async fn teams(&self, project: &str) -> Result<Vec<Value>> {
    let mut url = url_under(&self.base, &[project, "_apis", "teams"])?;
    url
      .query_pairs_mut()
      .append_pair("api-version", TEAMS_API_VERSION);
    self.fetch_all(url).await
  }

  /// List members of a team. Raw passthrough.
  pub async fn team_members(&self, project: &str, team_id: &str) -> Result<Vec<Value>> {
    let mut url = url_under(&self.base, &[project, "_apis", "teams", team_id, "members"])?;
    url
      .query_pairs_mut()
      .append_pair("api-version", MEMBERS_API_VERSION);
    self.fetch_all(url).await
  }

  /// Builds that finished inside the window, newest first.
  pub async fn builds(&self, project: &str, window: &TimeWindow) -> Result<Vec<Build>> {
    let mut url = url_under(&self.base, &[project, "_apis", "build", "builds"])?;
    url
      .query_pairs_mut()
      .append_pair("api-version", BUILD_API_VERSION)
      .append_pair("minTime", &window.start_iso())
      .append_pair("maxTime", &window.end_iso())
      .append_pair("queryOrder", "finishTimeDescending");
    self.fetch_all(url).await
  }

  /// Release deployments completed inside the window, with the release
  /// environment expanded so it can be classified.
  pub async fn deployments(&self, project: &str, window: &TimeWindow) -> Result<Vec<Deployment>> {
    let mut url = url_under(&self.release_base, &[project, "_apis", "release", "deployments"])?;
    url
      .query_pairs_mut()
      .append_pair("api-version", RELEASE_API_VERSION)
      .append_pair("minCompletedTime", &window.start_iso())
      .append_pair("maxCompletedTime", &window.end_iso())
      .append_pair("$expand", "releaseEnvironment");
    self.fetch_all(url).await
  }

  /// Commits to one repository inside the window, each tagged with the
  /// repository name so cross-repo listings stay attributable.
  pub async fn commits(
    &self,
    project: &str,
    repo: &Repository,
    window: &TimeWindow,
  ) -> Result<Vec<Value>> {
    let mut url = url_under(
      &self.base,
      &[project, "_apis", "git", "repositories", &repo.id, "commits"],
    )?;
    url
      .query_pairs_mut()
      .append_pair("api-version", CORE_API_VERSION)
      .append_pair("searchCriteria.fromDate", &window.start_iso())
      .append_pair("searchCriteria.toDate", &window.end_iso())
      .append_pair("$top", COMMITS_TOP);

    let mut commits: Vec<Value> = self.fetch_all(url).await?;
    for commit in &mut commits {
      if let Some(obj) = commit.as_object_mut() {
        obj.insert(
          "repositoryName".to_string(),
          Value::String(repo.display_name().to_string()),
        );
      }
    }
    Ok(commits)
  }
}

/// Append path segments to a base URL.
fn url_under(base: &Url, segments: &[&str]) -> Result<Url> {
  let mut url = base.clone();
  url
    .path_segments_mut()
    .map_err(|_| AppError::ConfigurationMissing("org_url cannot be a base URL".to_string()))?
    .extend(segments);
  Ok(url)
}

/// Where the release-management APIs live.
///
/// The hosted service serves them from a dedicated vsrm host; on-premise
/// installations (and test doubles) serve everything from one host.
fn release_base_for(base: &Url, org_name: &str) -> Result<Url> {
  if base.host_str() == Some("dev.azure.com") {
    Url::parse(&format!("https://vsrm.dev.azure.com/{}", org_name))
      .map_err(|e| AppError::ConfigurationMissing(format!("bad organization name: {}", e)))
  } else {
    Ok(base.clone())
  }
}
