//! Values command - show the default values and overrides of a reference chart

use console::style;
use std::path::Path;

use chartops_git::ChartOpsConfig;

use super::{build_pipeline, resolve_metadata};
use crate::error::Result;
use crate::util::or_dash;

pub fn run(
    config: &ChartOpsConfig,
    path: &Path,
    name: Option<&str>,
    version: Option<&str>,
    json: bool,
) -> Result<()> {
    let metadata = resolve_metadata(path, name, version)?;

    // nothing is pushed, so any hosting root will do
    let hosting_root = config
        .hosting_root
        .clone()
        .unwrap_or_else(|| config.clone_root.clone());
    let pipeline = build_pipeline(config, hosting_root, None);

    let values = pipeline.fetch_reference_values(&metadata, path)?;

    if json {
        let mut output = serde_json::to_value(&values)?;
        output["imageDescriptorTemplate"] = serde_json::Value::String(values.image_descriptor_template);
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} {} v{}",
        style("Reference chart").cyan().bold(),
        metadata.name,
        metadata.version
    );
    println!();
    println!("{}:", style("Default values").bold());
    println!("{}", values.values.trim_end());
    println!();
    println!("{}:", style("Overrides").bold());
    println!("  {} {}", style("app").dim(), or_dash(&values.app_overrides));
    println!("  {} {}", style("env").dim(), or_dash(&values.env_overrides));
    println!("  {} {}", style("release").dim(), or_dash(&values.release_overrides));
    println!("  {} {}", style("pipeline").dim(), or_dash(&values.pipeline_overrides));
    println!();
    println!("{}:", style("Image descriptor template").bold());
    println!("{}", values.image_descriptor_template.trim_end());

    Ok(())
}
