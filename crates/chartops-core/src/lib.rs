//! chartops core - chart staging and packaging
//!
//! This crate provides the local half of the chart publication pipeline:
//! - `ChartMetadata`: the `Chart.yaml` descriptor
//! - `ArchivePackager`: descriptor stamping and `.tgz` packaging
//! - `ChartValues`: default values and override files of a reference chart
//! - `WorkspaceAllocator` / `StagedWorkspace`: self-cleaning temp directories

pub mod archive;
pub mod chart;
pub mod error;
pub mod overrides;
pub mod workspace;

pub use archive::{
    ArchiveEntry, ArchivePackager, PackagedChart, create_archive, decompress_archive,
    list_archive, read_descriptor_from_archive, read_file_from_archive,
};
pub use chart::{
    API_VERSION_V1, API_VERSION_V2, CHART_FILE, ChartMetadata, LoadedChart, VALUES_FILE,
    chart_version, is_chart_dir, validate_chart_dir,
};
pub use error::{CoreError, Result};
pub use overrides::{ChartValues, IMAGE_DESCRIPTOR_TEMPLATE_FILE, extract_overrides, yaml_to_json};
pub use workspace::{StagedWorkspace, WorkspaceAllocator, copy_dir, next_name, remove_dir_logged};
