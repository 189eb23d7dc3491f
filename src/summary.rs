//! Time-window summarizer: orchestrates upstream fetches and aggregators
//! across projects and named periods.
//!
//! Multi-project traversals tolerate partial failure: one project/period
//! combination failing is logged and contributes zero, so the response still
//! reflects every project that could be fetched. Only the initial project
//! listing is fatal - without it there is nothing to traverse.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::devops::api_types::{commit_author_date, commit_author_name, Project};
use crate::devops::client::DevOpsClient;
use crate::error::Result;
use crate::metrics::aggregate::{
  self, classify_environments, Contributor, DEFAULT_TOP_N, ENV_PRODUCTION, ENV_STAGING, ENV_TEST,
};
use crate::metrics::window::{Period, TimeWindow, SUMMARY_PERIODS};

/// Totals for one named period, summed across the organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
  pub pipeline_runs: u64,
  pub releases: u64,
  pub commits: u64,
}

/// Organization-wide activity, in the fixed period order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
  pub daily: PeriodTotals,
  pub weekly: PeriodTotals,
  pub monthly: PeriodTotals,
}

impl ActivitySummary {
  fn slot_mut(&mut self, period: Period) -> &mut PeriodTotals {
    match period {
      Period::Daily => &mut self.daily,
      Period::Weekly => &mut self.weekly,
      _ => &mut self.monthly,
    }
  }
}

/// Build and release pipeline counts for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineCounts {
  pub project_name: String,
  pub build_pipeline_count: usize,
  pub release_pipeline_count: usize,
}

/// The full metrics bundle for one project and period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetrics {
  pub project_name: String,
  pub pipeline_count: usize,
  pub release_count: usize,
  pub repository_count: usize,
  pub commit_count: u64,
  pub pipeline_run_avg: f64,
  pub release_avg: f64,
  pub top_committers: Vec<Contributor>,
  pub release_success_rate: Option<f64>,
  pub total_build_count: usize,
  pub build_success_rate: Option<f64>,
  pub avg_build_duration_secs: Option<f64>,
}

/// Monthly deployment counts per canonical environment for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentRow {
  pub project: String,
  #[serde(rename = "Test")]
  pub test: u64,
  #[serde(rename = "Staging")]
  pub staging: u64,
  #[serde(rename = "Production")]
  pub production: u64,
}

/// Per-project breakdown plus deployment frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEnvironmentBreakdown {
  #[serde(flatten)]
  pub row: EnvironmentRow,
  pub deployment_frequency: f64,
}

/// One project's slice of the organization tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
  pub project_id: String,
  pub project_name: String,
  pub repositories: Vec<String>,
  pub build_pipelines: Vec<String>,
  pub release_pipelines: Vec<String>,
}

/// Orchestrates upstream fetches and aggregation.
#[derive(Clone)]
pub struct Summarizer {
  client: DevOpsClient,
  max_concurrency: usize,
}

impl Summarizer {
  pub fn new(config: &Config) -> Result<Self> {
    Ok(Self {
      client: DevOpsClient::new(config)?,
      max_concurrency: config.upstream.max_concurrency.max(1),
    })
  }

  pub fn client(&self) -> &DevOpsClient {
    &self.client
  }

  /// Daily/weekly/monthly pipeline, release and commit totals across every
  /// project in the organization.
  pub async fn activity_summary(&self) -> Result<ActivitySummary> {
    let projects = self.client.projects().await?;
    let now = Utc::now();
    info!(projects = projects.len(), "aggregating activity summary");

    // Bounded fan-out across projects, preserving upstream project order.
    let per_project: Vec<ActivitySummary> = stream::iter(projects.iter())
      .map(|project| self.project_activity(project, now))
      .buffered(self.max_concurrency)
      .collect()
      .await;

    let mut summary = ActivitySummary::default();
    for contribution in per_project {
      for period in SUMMARY_PERIODS {
        let slot = summary.slot_mut(period);
        let part = match period {
          Period::Daily => contribution.daily,
          Period::Weekly => contribution.weekly,
          _ => contribution.monthly,
        };
        slot.pipeline_runs += part.pipeline_runs;
        slot.releases += part.releases;
        slot.commits += part.commits;
      }
    }
    Ok(summary)
  }

  /// One project's contribution to the activity summary. Every count is
  /// best-effort: a failed fetch logs and contributes zero.
  async fn project_activity(&self, project: &Project, now: DateTime<Utc>) -> ActivitySummary {
    let mut contribution = ActivitySummary::default();

    for period in SUMMARY_PERIODS {
      let window = period.window(now);
      let slot = contribution.slot_mut(period);

      slot.pipeline_runs = match self.client.builds(&project.name, &window).await {
        Ok(builds) => builds.len() as u64,
        Err(err) => {
          error!(project = %project.name, period = %period.label(), %err,
                 "failed to fetch builds, counting zero");
          0
        }
      };

      slot.releases = match self.client.deployments(&project.name, &window).await {
        Ok(deployments) => deployments.len() as u64,
        Err(err) => {
          error!(project = %project.name, period = %period.label(), %err,
                 "failed to fetch deployments, counting zero");
          0
        }
      };

      slot.commits = self.commits_count(&project.name, &window).await;
    }

    contribution
  }

  /// Commits across all repositories of a project, inside a window.
  ///
  /// Best-effort by contract: any internal failure is logged at error level
  /// and reported as zero rather than propagated.
  pub async fn commits_count(&self, project: &str, window: &TimeWindow) -> u64 {
    match self.try_commits_count(project, window).await {
      Ok(count) => count,
      Err(err) => {
        error!(project, %err, "failed to count commits, treating as zero");
        0
      }
    }
  }

  async fn try_commits_count(&self, project: &str, window: &TimeWindow) -> Result<u64> {
    let repos = self.client.repositories(project).await?;
    let mut total = 0u64;
    for repo in &repos {
      let commits = self.client.commits(project, repo, window).await?;
      total += commits.len() as u64;
    }
    Ok(total)
  }

  /// Build and release pipeline definition counts for one project.
  pub async fn pipeline_counts(&self, project: &str) -> Result<PipelineCounts> {
    let build_pipelines = self.client.pipelines(project).await?;
    let release_pipelines = self.client.release_definitions(project).await?;
    Ok(PipelineCounts {
      project_name: project.to_string(),
      build_pipeline_count: build_pipelines.len(),
      release_pipeline_count: release_pipelines.len(),
    })
  }

  /// The full metrics bundle for one project over a period.
  pub async fn project_metrics(&self, project: &str, period: Period) -> Result<ProjectMetrics> {
    let now = Utc::now();
    let window = period.window(now);
    let window_days = window.length_days();

    let pipelines = self.client.pipelines(project).await?;
    let release_definitions = self.client.release_definitions(project).await?;
    let repos = self.client.repositories(project).await?;

    let builds = self.client.builds(project, &window).await?;
    let deployments = self.client.deployments(project, &window).await?;

    // Commit count stays best-effort; the committer ranking needs the raw
    // commits, so those fetches propagate failure like the rest.
    let commit_count = self.commits_count(project, &window).await;

    let mut all_commits: Vec<Value> = Vec::new();
    for repo in &repos {
      all_commits.extend(self.client.commits(project, repo, &window).await?);
    }

    let top_committers = aggregate::top_contributors(
      all_commits.iter().map(commit_author_name),
      DEFAULT_TOP_N,
    );

    Ok(ProjectMetrics {
      project_name: project.to_string(),
      pipeline_count: pipelines.len(),
      release_count: release_definitions.len(),
      repository_count: repos.len(),
      commit_count,
      pipeline_run_avg: aggregate::rate_per_day(builds.len(), window_days),
      release_avg: aggregate::rate_per_day(deployments.len(), window_days),
      top_committers,
      release_success_rate: aggregate::success_rate(
        deployments.iter().map(|d| d.deployment_status.as_deref()),
      ),
      total_build_count: builds.len(),
      build_success_rate: aggregate::success_rate(builds.iter().map(|b| b.result.as_deref())),
      avg_build_duration_secs: aggregate::average_duration_secs(
        builds
          .iter()
          .map(|b| (b.start_time.as_deref(), b.finish_time.as_deref())),
      ),
    })
  }

  /// Monthly deployment counts by environment for every project.
  /// Partial-failure tolerant: a project whose deployments cannot be fetched
  /// contributes a zero row.
  pub async fn deployments_by_environment(&self) -> Result<Vec<EnvironmentRow>> {
    let projects = self.client.projects().await?;
    let now = Utc::now();
    let window = Period::Monthly.window(now);

    let rows: Vec<EnvironmentRow> = stream::iter(projects.iter())
      .map(|project| async move {
        match self.client.deployments(&project.name, &window).await {
          Ok(deployments) => {
            environment_row(&project.name, deployments.iter().map(|d| d.environment_name()))
          }
          Err(err) => {
            error!(project = %project.name, %err,
                   "failed to fetch deployments, reporting zero row");
            environment_row(&project.name, std::iter::empty())
          }
        }
      })
      .buffered(self.max_concurrency)
      .collect()
      .await;

    Ok(rows)
  }

  /// Monthly environment breakdown plus deployment frequency for one project.
  pub async fn project_deployments_by_environment(
    &self,
    project: &str,
  ) -> Result<ProjectEnvironmentBreakdown> {
    let now = Utc::now();
    let window = Period::Monthly.window(now);
    let deployments = self.client.deployments(project, &window).await?;

    let frequency = if deployments.is_empty() {
      // Legacy dashboard contract: an empty month reports 0.0 here, unlike
      // the null convention the success-rate metrics use.
      0.0
    } else {
      aggregate::rate_per_day(deployments.len(), window.length_days())
    };

    Ok(ProjectEnvironmentBreakdown {
      row: environment_row(project, deployments.iter().map(|d| d.environment_name())),
      deployment_frequency: frequency,
    })
  }

  /// Most recent commits across all of a project's repositories, newest
  /// first. Per-repo failures are logged and skipped.
  pub async fn recent_commits(&self, project: &str, limit: usize) -> Result<Vec<Value>> {
    let repos = self.client.repositories(project).await?;
    let window = TimeWindow::last_days(Utc::now(), 7);

    let mut all_commits: Vec<Value> = Vec::new();
    for repo in &repos {
      match self.client.commits(project, repo, &window).await {
        Ok(commits) => all_commits.extend(commits),
        Err(err) => {
          warn!(project, repo = repo.display_name(), %err,
                "failed to fetch commits for repo, skipping");
        }
      }
    }

    all_commits.sort_by(|a, b| {
      let a_date = commit_author_date(a).unwrap_or("");
      let b_date = commit_author_date(b).unwrap_or("");
      b_date.cmp(a_date)
    });
    all_commits.truncate(limit);
    Ok(all_commits)
  }

  /// Full organization tree: every project with its repository, build
  /// pipeline and release pipeline names. A failed sub-fetch records an
  /// error string in that slot instead of failing the tree.
  pub async fn org_overview(&self) -> Result<Vec<ProjectInfo>> {
    let projects = self.client.projects().await?;
    info!(projects = projects.len(), "building organization overview");

    let infos: Vec<ProjectInfo> = stream::iter(projects.iter())
      .map(|project| self.project_info(project))
      .buffered(self.max_concurrency)
      .collect()
      .await;

    Ok(infos)
  }

  async fn project_info(&self, project: &Project) -> ProjectInfo {
    let repositories = match self.client.repositories(&project.name).await {
      Ok(repos) => repos.iter().map(|r| r.display_name().to_string()).collect(),
      Err(err) => {
        error!(project = %project.name, %err, "failed to fetch repositories");
        vec![format!("Error fetching repositories: {}", err)]
      }
    };

    let build_pipelines = match self.client.pipelines(&project.name).await {
      Ok(pipelines) => names_of(&pipelines),
      Err(err) => {
        error!(project = %project.name, %err, "failed to fetch build pipelines");
        vec![format!("Error fetching build pipelines: {}", err)]
      }
    };

    let release_pipelines = match self.client.release_definitions(&project.name).await {
      Ok(definitions) => names_of(&definitions),
      Err(err) => {
        error!(project = %project.name, %err, "failed to fetch release pipelines");
        vec![format!("Error fetching release pipelines: {}", err)]
      }
    };

    ProjectInfo {
      project_id: project.id.clone(),
      project_name: project.name.clone(),
      repositories,
      build_pipelines,
      release_pipelines,
    }
  }
}

fn names_of(records: &[Value]) -> Vec<String> {
  records
    .iter()
    .filter_map(|r| r.get("name").and_then(Value::as_str).map(String::from))
    .collect()
}

fn environment_row<'a, I>(project: &str, names: I) -> EnvironmentRow
where
  I: IntoIterator<Item = Option<&'a str>>,
{
  let counts = classify_environments(names);
  EnvironmentRow {
    project: project.to_string(),
    test: counts.get(ENV_TEST).copied().unwrap_or(0),
    staging: counts.get(ENV_STAGING).copied().unwrap_or(0),
    production: counts.get(ENV_PRODUCTION).copied().unwrap_or(0),
  }
}
