//! Cache keys for upstream-derived resources.

use sha2::{Digest, Sha256};

/// Logical identity of a cacheable resource: resource kind, project, and
/// window descriptor where one applies.
#[derive(Clone, Debug)]
pub enum ResourceKey {
  /// Full metrics bundle for one project and period
  Metrics { project: String, period: String },
  /// Repository listing for a project
  Repositories { project: String },
  /// Build pipeline listing for a project
  Pipelines { project: String },
  /// Release pipeline listing for a project
  ReleaseDefinitions { project: String },
  /// Team listing for a project
  Teams { project: String },
  /// Roster of one team
  TeamMembers { project: String, team_id: String },
  /// Per-project monthly deployment breakdown by environment
  DeploymentsByEnvironment { project: String },
  /// Whole-organization tree of projects, repos and pipelines
  OrgOverview,
}

impl ResourceKey {
  /// Deterministic storage key: sha256 of the composite descriptor, so keys
  /// stay fixed-length no matter what project names contain.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.descriptor().as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Readable composite descriptor, used for hashing and logging.
  pub fn descriptor(&self) -> String {
    match self {
      Self::Metrics { project, period } => format!("metrics:{}:{}", project, period),
      Self::Repositories { project } => format!("repos:{}", project),
      Self::Pipelines { project } => format!("pipelines:{}", project),
      Self::ReleaseDefinitions { project } => format!("releases:{}", project),
      Self::Teams { project } => format!("teams:{}", project),
      Self::TeamMembers { project, team_id } => {
        format!("team-members:{}:{}", project, team_id)
      }
      Self::DeploymentsByEnvironment { project } => format!("deployments-env:{}", project),
      Self::OrgOverview => "org-overview".to_string(),
    }
  }
}
