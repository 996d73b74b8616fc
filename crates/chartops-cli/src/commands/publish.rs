//! Publish command - package a reference chart and push it to a GitOps repository

use console::style;
use std::path::{Path, PathBuf};

use chartops_git::{ChartOpsConfig, ChartPublishRequest, PublishTarget};

use super::{CLI_USER_ID, build_pipeline, resolve_metadata};
use crate::error::{CliError, Result};

/// Arguments of `chartops publish`
#[derive(Debug)]
pub struct PublishArgs<'a> {
    pub path: &'a Path,
    pub name: Option<&'a str>,
    pub version: Option<&'a str>,
    pub base_template: Option<&'a str>,
    pub app: Option<&'a str>,
    pub env: Option<&'a str>,
    pub repo: Option<&'a str>,
    pub hosting_root: Option<&'a Path>,
    pub author: Option<&'a str>,
    pub json: bool,
}

fn target(args: &PublishArgs<'_>, chart_name: &str) -> Result<PublishTarget> {
    match (args.base_template, args.app, args.env) {
        (Some(base), None, None) => Ok(PublishTarget::SharedTemplate {
            repo_name: args.repo.unwrap_or(base).to_string(),
            base_template: base.to_string(),
        }),
        (None, Some(app), Some(env)) => Ok(PublishTarget::AppProxy {
            app_name: app.to_string(),
            env_name: env.to_string(),
            repo_name: args.repo.map(str::to_string),
        }),
        (None, None, None) => Ok(PublishTarget::SharedTemplate {
            repo_name: args.repo.unwrap_or(chart_name).to_string(),
            base_template: chart_name.to_string(),
        }),
        _ => Err(CliError::usage(
            "use either --base-template, or --app together with --env",
        )),
    }
}

pub async fn run(config: &ChartOpsConfig, args: PublishArgs<'_>) -> Result<()> {
    let metadata = resolve_metadata(args.path, args.name, args.version)?;
    let target = target(&args, &metadata.name)?;

    let hosting_root: PathBuf = args
        .hosting_root
        .map(Path::to_path_buf)
        .or_else(|| config.hosting_root.clone())
        .ok_or_else(|| {
            CliError::usage("no hosting root configured; pass --hosting-root or set hostingRoot")
        })?;

    let pipeline = build_pipeline(config, hosting_root, args.author);
    let request = ChartPublishRequest {
        reference_chart_dir: args.path.to_path_buf(),
        version: metadata.version.clone(),
        metadata,
        user_id: CLI_USER_ID,
        target,
    };

    let artifact = pipeline.publish(&request).await?;

    if args.json {
        let mut output = serde_json::to_value(&artifact)?;
        if matches!(request.target, PublishTarget::AppProxy { .. }) {
            output["valuesJson"] = serde_json::Value::String(artifact.values_json()?);
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let status = if artifact.committed {
        style("Published").green().bold()
    } else {
        style("Up to date").yellow().bold()
    };
    println!("{} {}", status, artifact.chart_location);
    println!("  {} {}", style("Repository").dim(), artifact.repo_url);

    Ok(())
}
