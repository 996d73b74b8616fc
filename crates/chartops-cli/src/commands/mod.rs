//! CLI commands

pub mod package;
pub mod publish;
pub mod values;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chartops_core::ChartMetadata;
use chartops_git::{
    ChartOpsConfig, ChartPublicationPipeline, GitCli, LocalHosting, StaticUserDirectory,
};

use crate::error::{CliError, Result};

/// User id the CLI acts as when `--author` is given
pub const CLI_USER_ID: i32 = 1;

/// Load the config file given on the command line, or the default one
pub fn load_config(path: Option<&Path>) -> Result<ChartOpsConfig> {
    let config = match path {
        Some(path) => ChartOpsConfig::load_from(path),
        None => ChartOpsConfig::load(),
    };
    let config = config.map_err(|e| CliError::Config {
        message: e.to_string(),
    })?;
    tracing::debug!(
        working_dir = %config.chart_working_dir.display(),
        clone_root = %config.clone_root.display(),
        "configuration loaded"
    );
    Ok(config)
}

/// Chart metadata for packaging: the reference chart's descriptor with the
/// name and version optionally overridden
pub fn resolve_metadata(
    reference: &Path,
    name: Option<&str>,
    version: Option<&str>,
) -> Result<ChartMetadata> {
    let mut metadata = ChartMetadata::from_file(reference.join(chartops_core::CHART_FILE))?;
    if let Some(name) = name {
        metadata.name = name.to_string();
    }
    if let Some(version) = version {
        metadata.version = version.to_string();
    }
    if metadata.version.is_empty() {
        return Err(CliError::usage(
            "chart version is empty; pass --chart-version or set it in Chart.yaml",
        ));
    }
    Ok(metadata)
}

/// Pipeline over bare repositories under `hosting_root`, authoring commits
/// as `author` when given
pub fn build_pipeline(
    config: &ChartOpsConfig,
    hosting_root: PathBuf,
    author: Option<&str>,
) -> ChartPublicationPipeline {
    let hosting = LocalHosting::new(hosting_root, config.clone_root.join("scratch"));
    let git = GitCli::new(&config.clone_root);

    let mut users = StaticUserDirectory::new();
    if let Some(email) = author {
        users = users.with_user(CLI_USER_ID, email);
    }

    ChartPublicationPipeline::from_config(config, Arc::new(hosting), Arc::new(git), Arc::new(users))
}
