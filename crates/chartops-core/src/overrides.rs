//! Override files shipped alongside a reference chart
//!
//! A reference chart may carry four optional override files at its top
//! level: `app-values`, `env-values`, `release-values` and `pipeline-values`
//! (`.yaml` or `.yml`, any case). They are surfaced as JSON text.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Image descriptor template file shipped with reference charts
pub const IMAGE_DESCRIPTOR_TEMPLATE_FILE: &str = ".image_descriptor_template.json";

/// Default values and override payloads of a reference chart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartValues {
    /// Default values (YAML)
    pub values: String,

    /// App-level overrides (JSON)
    pub app_overrides: String,

    /// Environment-level overrides (JSON)
    pub env_overrides: String,

    /// Release-level overrides (JSON)
    pub release_overrides: String,

    /// Pipeline-level overrides (JSON)
    pub pipeline_overrides: String,

    /// Image descriptor template (JSON), never serialized
    #[serde(skip)]
    pub image_descriptor_template: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverrideKind {
    App,
    Env,
    Release,
    Pipeline,
}

impl OverrideKind {
    fn from_file_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "app-values.yaml" | "app-values.yml" => Some(Self::App),
            "env-values.yaml" | "env-values.yml" => Some(Self::Env),
            "release-values.yaml" | "release-values.yml" => Some(Self::Release),
            "pipeline-values.yaml" | "pipeline-values.yml" => Some(Self::Pipeline),
            _ => None,
        }
    }
}

/// Convert YAML text to JSON text
pub fn yaml_to_json(yaml: &str) -> Result<String> {
    let value: serde_json::Value = serde_yaml::from_str(yaml)?;
    Ok(serde_json::to_string(&value)?)
}

/// Collect the override files found at the top level of `dir`.
///
/// Never fails: a directory that cannot be listed yields empty overrides, and
/// a file that cannot be read or converted is logged and treated as absent.
/// `values` and `image_descriptor_template` are left empty.
pub fn extract_overrides(dir: &Path) -> ChartValues {
    let mut values = ChartValues::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "failed reading directory");
            return values;
        }
    };

    for entry in entries.filter_map(|e| e.ok()) {
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(kind) = OverrideKind::from_file_name(&file_name) else {
            continue;
        };

        let Some(json) = read_override(&entry.path()) else {
            continue;
        };

        let slot = match kind {
            OverrideKind::App => &mut values.app_overrides,
            OverrideKind::Env => &mut values.env_overrides,
            OverrideKind::Release => &mut values.release_overrides,
            OverrideKind::Pipeline => &mut values.pipeline_overrides,
        };
        *slot = json;
    }

    values
}

fn read_override(path: &Path) -> Option<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!(file = %path.display(), error = %e, "failed reading data from file");
            return None;
        }
    };

    match yaml_to_json(&content) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(file = %path.display(), error = %e, "override file is not valid YAML");
            None
        }
    }
}
