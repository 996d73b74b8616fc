//! Publication configuration
//!
//! Stored in `~/.config/chartops/config.yaml`. Every field has a default, so
//! a missing file behaves like an empty one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{GitOpsError, Result};

/// Configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartOpsConfig {
    /// Base directory for staged chart workspaces
    #[serde(default = "default_chart_working_dir")]
    pub chart_working_dir: PathBuf,

    /// Base directory for local clones of GitOps repositories
    #[serde(default = "default_clone_root")]
    pub clone_root: PathBuf,

    /// Prefix for generated per-app repository names
    #[serde(default)]
    pub gitops_repo_prefix: String,

    /// Email of the active GitOps integration, used as commit author fallback
    #[serde(default)]
    pub gitops_email: Option<String>,

    /// Author email used when no user or GitOps email is available
    #[serde(default = "default_bot_email")]
    pub bot_email: String,

    /// Message of the publish commit
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Directory holding bare repositories for the local hosting backend
    #[serde(default)]
    pub hosting_root: Option<PathBuf>,

    /// How applications consume the published chart
    #[serde(default)]
    pub deployment_app_type: DeploymentAppType,
}

fn default_base_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chartops")
}

fn default_chart_working_dir() -> PathBuf {
    default_base_dir().join("charts")
}

fn default_clone_root() -> PathBuf {
    default_base_dir().join("git")
}

fn default_bot_email() -> String {
    "devtron-bot@devtron.ai".to_string()
}

fn default_commit_message() -> String {
    "first commit".to_string()
}

impl Default for ChartOpsConfig {
    fn default() -> Self {
        Self {
            chart_working_dir: default_chart_working_dir(),
            clone_root: default_clone_root(),
            gitops_repo_prefix: String::new(),
            gitops_email: None,
            bot_email: default_bot_email(),
            commit_message: default_commit_message(),
            hosting_root: None,
            deployment_app_type: DeploymentAppType::default(),
        }
    }
}

impl ChartOpsConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| GitOpsError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("chartops").join("config.yaml"))
    }
}

/// How an application is deployed from its chart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentAppType {
    /// GitOps controller watching the published repository
    #[default]
    #[serde(rename = "argo_cd")]
    ArgoCd,

    /// Direct Helm release
    #[serde(rename = "helm")]
    Helm,
}

impl DeploymentAppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArgoCd => "argo_cd",
            Self::Helm => "helm",
        }
    }

    pub fn is_helm(&self) -> bool {
        matches!(self, Self::Helm)
    }

    pub fn is_acd(&self) -> bool {
        matches!(self, Self::ArgoCd)
    }
}

impl FromStr for DeploymentAppType {
    type Err = GitOpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argo_cd" => Ok(Self::ArgoCd),
            "helm" => Ok(Self::Helm),
            other => Err(GitOpsError::InvalidConfig {
                message: format!("unknown deployment app type '{other}' (expected argo_cd or helm)"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ChartOpsConfig::default();
        assert_eq!(config.commit_message, "first commit");
        assert_eq!(config.bot_email, "devtron-bot@devtron.ai");
        assert!(config.gitops_repo_prefix.is_empty());
        assert!(config.deployment_app_type.is_acd());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let yaml = r#"
gitopsRepoPrefix: platform
gitopsEmail: gitops@example.com
deploymentAppType: helm
"#;
        let config: ChartOpsConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.gitops_repo_prefix, "platform");
        assert_eq!(config.gitops_email.as_deref(), Some("gitops@example.com"));
        assert!(config.deployment_app_type.is_helm());
        assert_eq!(config.commit_message, "first commit");
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.yaml");

        let mut config = ChartOpsConfig::default();
        config.gitops_repo_prefix = "team".to_string();
        config.hosting_root = Some(temp.path().join("remotes"));
        config.save_to(&path).unwrap();

        let loaded = ChartOpsConfig::load_from(&path).unwrap();
        assert_eq!(loaded.gitops_repo_prefix, "team");
        assert_eq!(loaded.hosting_root, Some(temp.path().join("remotes")));
    }

    #[test]
    fn test_deployment_app_type_parse() {
        assert_eq!("helm".parse::<DeploymentAppType>().unwrap(), DeploymentAppType::Helm);
        assert_eq!(
            "argo_cd".parse::<DeploymentAppType>().unwrap(),
            DeploymentAppType::ArgoCd
        );
        assert!("flux".parse::<DeploymentAppType>().is_err());
        assert_eq!(DeploymentAppType::Helm.as_str(), "helm");
    }
}
