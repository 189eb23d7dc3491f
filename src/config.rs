use crate::error::{AppError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub devops: DevOpsConfig,
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub upstream: UpstreamConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevOpsConfig {
  /// Organization base URL, e.g. https://dev.azure.com/MyOrg
  pub org_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_bind")]
  pub bind: String,
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: default_bind(),
      port: default_port(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
  /// Per-request timeout for upstream calls, in seconds.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Concurrent upstream fan-out cap during multi-project aggregation.
  #[serde(default = "default_max_concurrency")]
  pub max_concurrency: usize,
}

impl Default for UpstreamConfig {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
      max_concurrency: default_max_concurrency(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Override for the sqlite cache path (default: data dir).
  pub path: Option<PathBuf>,
  /// Disable the durable tier entirely.
  #[serde(default)]
  pub disabled: bool,
}

fn default_bind() -> String {
  "0.0.0.0".to_string()
}

fn default_port() -> u16 {
  5000
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_max_concurrency() -> usize {
  4
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./devboard.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/devboard/config.yaml
  /// 4. AZURE_DEVOPS_ORG_URL environment variable (file-less deployments)
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(AppError::ConfigurationMissing(format!(
          "config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Self::from_env(),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("devboard.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("devboard").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      AppError::ConfigurationMissing(format!(
        "failed to read config file {}: {}",
        path.display(),
        e
      ))
    })?;

    let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
      AppError::ConfigurationMissing(format!(
        "failed to parse config file {}: {}",
        path.display(),
        e
      ))
    })?;

    Ok(config)
  }

  /// Build a config purely from environment variables.
  fn from_env() -> Result<Self> {
    let org_url = std::env::var("AZURE_DEVOPS_ORG_URL").map_err(|_| {
      AppError::ConfigurationMissing(
        "no config file found and AZURE_DEVOPS_ORG_URL is not set.\n\
         Create one at ~/.config/devboard/config.yaml (see config.example.yaml)."
          .to_string(),
      )
    })?;

    Ok(Self {
      devops: DevOpsConfig { org_url },
      server: ServerConfig::default(),
      upstream: UpstreamConfig::default(),
      cache: CacheConfig::default(),
    })
  }

  /// Get the personal access token from environment variables.
  ///
  /// Checks DEVBOARD_PAT first, then AZURE_DEVOPS_PAT as fallback.
  pub fn credential() -> Result<String> {
    std::env::var("DEVBOARD_PAT")
      .or_else(|_| std::env::var("AZURE_DEVOPS_PAT"))
      .map_err(|_| {
        AppError::ConfigurationMissing(
          "personal access token not found. Set DEVBOARD_PAT or AZURE_DEVOPS_PAT.".to_string(),
        )
      })
  }

  /// Whether a credential is present, without exposing it.
  pub fn credential_is_set() -> bool {
    Self::credential().is_ok()
  }

  /// Organization base URL without a trailing slash.
  pub fn org_url(&self) -> &str {
    self.devops.org_url.trim_end_matches('/')
  }

  /// Organization name, i.e. the last path segment of the org URL.
  ///
  /// The release APIs live on a separate vsrm host that wants the bare name.
  pub fn org_name(&self) -> Result<&str> {
    self
      .org_url()
      .rsplit('/')
      .next()
      .filter(|s| !s.is_empty())
      .ok_or_else(|| {
        AppError::ConfigurationMissing(format!(
          "could not derive organization name from org_url '{}'",
          self.devops.org_url
        ))
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn org_name_is_last_segment() {
    let config = Config {
      devops: DevOpsConfig {
        org_url: "https://dev.azure.com/MyOrg/".to_string(),
      },
      server: ServerConfig::default(),
      upstream: UpstreamConfig::default(),
      cache: CacheConfig::default(),
    };
    assert_eq!(config.org_url(), "https://dev.azure.com/MyOrg");
    assert_eq!(config.org_name().unwrap(), "MyOrg");
  }

  #[test]
  fn parses_minimal_yaml() {
    let config: Config = serde_yaml::from_str("devops:\n  org_url: https://dev.azure.com/Acme\n")
      .expect("minimal config should parse");
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.upstream.timeout_secs, 30);
    assert_eq!(config.upstream.max_concurrency, 4);
    assert!(!config.cache.disabled);
  }
}
