//! HTTP handlers for the dashboard API.
//!
//! Every cached endpoint goes through the same `cached(key, ttl, compute)`
//! wrapper; the TTL is the only thing that varies per route.

use actix_web::{web, HttpResponse};
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::devops::cache::ResourceKey;
use crate::error::Result;
use crate::metrics::window::Period;
use crate::server::AppState;

/// Summary/metrics endpoints: minutes-scale freshness.
fn metrics_ttl() -> Duration {
  Duration::minutes(5)
}

/// Relatively static resource listings.
fn listing_ttl() -> Duration {
  Duration::minutes(10)
}

/// The expensive full-organization traversal.
fn overview_ttl() -> Duration {
  Duration::hours(1)
}

pub async fn health() -> HttpResponse {
  HttpResponse::Ok().json(json!({
    "status": "healthy",
    "message": "API is running."
  }))
}

/// Reports whether connection settings are present, never their values.
pub async fn env_check(state: web::Data<AppState>) -> HttpResponse {
  HttpResponse::Ok().json(json!({
    "org_url_configured": !state.config.org_url().is_empty(),
    "credential_configured": Config::credential_is_set(),
  }))
}

pub async fn list_projects(state: web::Data<AppState>) -> Result<HttpResponse> {
  let projects = state.summarizer.client().projects().await?;
  Ok(HttpResponse::Ok().json(projects))
}

pub async fn pipeline_counts(
  state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse> {
  let project = path.into_inner();
  let counts = state.summarizer.pipeline_counts(&project).await?;
  Ok(HttpResponse::Ok().json(counts))
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
  period: Option<String>,
}

pub async fn project_metrics(
  state: web::Data<AppState>,
  path: web::Path<String>,
  query: web::Query<MetricsQuery>,
) -> Result<HttpResponse> {
  let project = path.into_inner();
  let period = Period::parse(query.period.as_deref().unwrap_or("7d"));

  let key = ResourceKey::Metrics {
    project: project.clone(),
    period: period.label(),
  };

  let summarizer = state.summarizer.clone();
  let metrics = state
    .cache
    .cached(&key.cache_hash(), metrics_ttl(), || async move {
      summarizer.project_metrics(&project, period).await
    })
    .await?;

  Ok(HttpResponse::Ok().json(metrics))
}

#[derive(Debug, Deserialize)]
pub struct RecentCommitsQuery {
  limit: Option<usize>,
}

pub async fn recent_commits(
  state: web::Data<AppState>,
  path: web::Path<String>,
  query: web::Query<RecentCommitsQuery>,
) -> Result<HttpResponse> {
  let project = path.into_inner();
  let limit = query.limit.unwrap_or(10);
  info!(project, limit, "fetching recent commits");

  let commits = state.summarizer.recent_commits(&project, limit).await?;
  Ok(HttpResponse::Ok().json(commits))
}

pub async fn devops_info(state: web::Data<AppState>) -> Result<HttpResponse> {
  let key = ResourceKey::OrgOverview;

  let summarizer = state.summarizer.clone();
  let overview = state
    .cache
    .cached(&key.cache_hash(), overview_ttl(), || async move {
      summarizer.org_overview().await
    })
    .await?;

  Ok(HttpResponse::Ok().json(overview))
}

pub async fn project_repos(
  state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse> {
  let project = path.into_inner();
  let key = ResourceKey::Repositories {
    project: project.clone(),
  };

  let summarizer = state.summarizer.clone();
  let repos = state
    .cache
    .cached(&key.cache_hash(), listing_ttl(), || async move {
      summarizer.client().repositories(&project).await
    })
    .await?;

  Ok(HttpResponse::Ok().json(repos))
}

pub async fn project_pipelines(
  state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse> {
  let project = path.into_inner();
  let key = ResourceKey::Pipelines {
    project: project.clone(),
  };

  let summarizer = state.summarizer.clone();
  let pipelines = state
    .cache
    .cached(&key.cache_hash(), listing_ttl(), || async move {
      summarizer.client().pipelines(&project).await
    })
    .await?;

  Ok(HttpResponse::Ok().json(pipelines))
}

pub async fn project_releases(
  state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse> {
  let project = path.into_inner();
  let key = ResourceKey::ReleaseDefinitions {
    project: project.clone(),
  };

  let summarizer = state.summarizer.clone();
  let releases = state
    .cache
    .cached(&key.cache_hash(), listing_ttl(), || async move {
      summarizer.client().release_definitions(&project).await
    })
    .await?;

  Ok(HttpResponse::Ok().json(releases))
}

pub async fn project_teams(
  state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse> {
  let project = path.into_inner();
  let key = ResourceKey::Teams {
    project: project.clone(),
  };

  let summarizer = state.summarizer.clone();
  let teams = state
    .cache
    .cached(&key.cache_hash(), listing_ttl(), || async move {
      summarizer.client().teams(&project).await
    })
    .await?;

  Ok(HttpResponse::Ok().json(teams))
}

pub async fn team_members(
  state: web::Data<AppState>,
  path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
  let (project, team_id) = path.into_inner();
  let key = ResourceKey::TeamMembers {
    project: project.clone(),
    team_id: team_id.clone(),
  };

  let summarizer = state.summarizer.clone();
  let members = state
    .cache
    .cached(&key.cache_hash(), listing_ttl(), || async move {
      summarizer.client().team_members(&project, &team_id).await
    })
    .await?;

  Ok(HttpResponse::Ok().json(members))
}

pub async fn deployments_by_environment(state: web::Data<AppState>) -> Result<HttpResponse> {
  let rows = state.summarizer.deployments_by_environment().await?;
  Ok(HttpResponse::Ok().json(rows))
}

pub async fn project_deployments_by_environment(
  state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse> {
  let project = path.into_inner();
  let key = ResourceKey::DeploymentsByEnvironment {
    project: project.clone(),
  };

  let summarizer = state.summarizer.clone();
  let breakdown = state
    .cache
    .cached(&key.cache_hash(), metrics_ttl(), || async move {
      summarizer.project_deployments_by_environment(&project).await
    })
    .await?;

  Ok(HttpResponse::Ok().json(breakdown))
}

pub async fn activity_summary(state: web::Data<AppState>) -> Result<HttpResponse> {
  let summary = state.summarizer.activity_summary().await?;
  Ok(HttpResponse::Ok().json(summary))
}
