//! Package command - stamp and archive a reference chart

use console::style;
use std::path::Path;

use chartops_core::{ArchivePackager, StagedWorkspace, WorkspaceAllocator, list_archive};
use chartops_git::ChartOpsConfig;

use super::resolve_metadata;
use crate::error::{CliError, Result};
use crate::util::format_size;

pub fn run(
    config: &ChartOpsConfig,
    path: &Path,
    name: Option<&str>,
    version: Option<&str>,
    api_version: &str,
    output: &Path,
) -> Result<()> {
    let mut metadata = resolve_metadata(path, name, version)?;
    metadata.api_version = api_version.to_string();

    println!(
        "{} {} v{}",
        style("Packaging").cyan().bold(),
        metadata.name,
        metadata.version
    );

    // package a staged copy so the reference chart is left untouched
    let workspace = StagedWorkspace::create(&WorkspaceAllocator::new(&config.chart_working_dir))?;
    workspace.stage_from(path)?;
    let packaged = ArchivePackager::new().package(workspace.path(), &metadata)?;

    std::fs::create_dir_all(output)?;
    let file_name = packaged
        .archive_path
        .file_name()
        .ok_or_else(|| CliError::internal("archive path has no file name"))?;
    let created_path = output.join(file_name);
    std::fs::copy(&packaged.archive_path, &created_path)?;

    let size = format_size(std::fs::metadata(&created_path)?.len());
    println!(
        "  {} {}",
        style("Created").green().bold(),
        created_path.display()
    );
    println!("  {} {}", style("Size").dim(), size);

    println!();
    println!("{}:", style("Contents").bold());
    for entry in list_archive(&created_path)? {
        println!("  {}", entry.path);
    }

    Ok(())
}
