//! Chart packaging
//!
//! Stamps the chart descriptor and writes a versioned `.tgz` archive using
//! the standard chart archive layout: every entry lives under a top-level
//! directory named after the chart.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Header};

use crate::chart::{CHART_FILE, ChartMetadata, LoadedChart, validate_chart_dir};
use crate::error::{CoreError, Result};

/// Result of packaging a staged chart
#[derive(Debug, Clone)]
pub struct PackagedChart {
    /// Path of the archive written into the staged directory
    pub archive_path: PathBuf,

    /// Raw default values text (empty when the chart declares none)
    pub values: String,

    /// Descriptor as stamped into the archive
    pub metadata: ChartMetadata,
}

/// Validates, stamps and archives staged chart directories
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchivePackager;

impl ArchivePackager {
    pub fn new() -> Self {
        Self
    }

    /// Package the chart staged at `staged_dir`.
    ///
    /// `metadata` replaces the chart's `Chart.yaml` wholesale before the tree
    /// is loaded, so the archive always carries the caller's name, version and
    /// api-version. Nothing outside `staged_dir` is touched.
    pub fn package(&self, staged_dir: &Path, metadata: &ChartMetadata) -> Result<PackagedChart> {
        validate_chart_dir(staged_dir)?;

        write_descriptor(staged_dir, metadata)?;

        let chart = LoadedChart::load(staged_dir).map_err(|e| match e {
            CoreError::InvalidChartLayout { .. } => e,
            other => CoreError::ArchiveBuildFailed {
                path: staged_dir.display().to_string(),
                message: other.to_string(),
            },
        })?;

        let archive_path = create_archive(&chart, staged_dir).map_err(|e| {
            CoreError::ArchiveBuildFailed {
                path: staged_dir.display().to_string(),
                message: e.to_string(),
            }
        })?;
        tracing::debug!(path = %archive_path.display(), "chart archive written");

        Ok(PackagedChart {
            archive_path,
            values: chart.values,
            metadata: chart.metadata,
        })
    }
}

fn write_descriptor(staged_dir: &Path, metadata: &ChartMetadata) -> Result<()> {
    let descriptor_err = |message: String| CoreError::DescriptorWriteFailed {
        path: staged_dir.display().to_string(),
        message,
    };

    let yaml = metadata.to_yaml().map_err(|e| descriptor_err(e.to_string()))?;
    std::fs::write(staged_dir.join(CHART_FILE), yaml).map_err(|e| descriptor_err(e.to_string()))
}

/// Write `<name>-<version>.tgz` for a loaded chart into `dest_dir`
///
/// Returns the path of the archive. A partially written archive is removed
/// on failure.
pub fn create_archive(chart: &LoadedChart, dest_dir: &Path) -> Result<PathBuf> {
    let output = dest_dir.join(chart.metadata.archive_name());

    match write_archive(chart, &output) {
        Ok(()) => Ok(output),
        Err(e) => {
            let _ = std::fs::remove_file(&output);
            Err(e)
        }
    }
}

fn write_archive(chart: &LoadedChart, output: &Path) -> Result<()> {
    let file = File::create(output)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    for rel in &chart.files {
        let content = std::fs::read(chart.root.join(rel))?;
        let entry_path = format!("{}/{}", chart.metadata.name, archive_path_of(rel));
        add_bytes_to_archive(&mut builder, &entry_path, &content)?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;
    Ok(())
}

/// Forward-slash form of a relative path
fn archive_path_of(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Add bytes to a tar archive with a given path
fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;

    Ok(())
}

/// Information about a file in an archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path within the archive
    pub path: String,
    /// File size in bytes
    pub size: u64,
}

/// List files in an archive
pub fn list_archive(archive_path: &Path) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        entries.push(ArchiveEntry {
            path: entry.path()?.to_string_lossy().to_string(),
            size: entry.header().size()?,
        });
    }

    Ok(entries)
}

/// Read a specific file from an archive
pub fn read_file_from_archive(archive_path: &Path, file_path: &str) -> Result<Vec<u8>> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_string_lossy() == file_path {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(content);
        }
    }

    Err(CoreError::Archive {
        message: format!("File not found in archive: {}", file_path),
    })
}

/// Read the stamped descriptor of a chart archive
pub fn read_descriptor_from_archive(archive_path: &Path, chart_name: &str) -> Result<ChartMetadata> {
    let content = read_file_from_archive(archive_path, &format!("{}/{}", chart_name, CHART_FILE))?;
    Ok(serde_yaml::from_slice(&content)?)
}

/// Decompress an archive and return the raw tar stream
pub fn decompress_archive(archive_path: &Path) -> Result<Vec<u8>> {
    let file = File::open(archive_path)?;
    let mut decoder = GzDecoder::new(file);
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes)?;
    Ok(bytes)
}
