//! Version command - print the version declared by a chart

use std::path::Path;

use crate::error::Result;

pub fn run(path: &Path) -> Result<()> {
    let version = chartops_core::chart_version(path)?;
    println!("{version}");
    Ok(())
}
