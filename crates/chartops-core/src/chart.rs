//! Chart descriptor and chart directory loading

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Chart descriptor file name
pub const CHART_FILE: &str = "Chart.yaml";

/// Default values file name
pub const VALUES_FILE: &str = "values.yaml";

/// Descriptor api-version stamped on reference and shared-template charts
pub const API_VERSION_V1: &str = "v1";

/// Descriptor api-version stamped on per-app proxy charts
pub const API_VERSION_V2: &str = "v2";

/// Contents of `Chart.yaml`
///
/// Only the fields the publication pipeline reads or stamps are modelled;
/// unknown fields in a reference chart are dropped when the descriptor is
/// rewritten during packaging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Descriptor schema tag (v1 or v2)
    #[serde(default)]
    pub api_version: String,

    /// Chart name (required)
    #[serde(default)]
    pub name: String,

    /// Chart version
    #[serde(default)]
    pub version: String,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Application version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    /// Home URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    /// Icon URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Source URLs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    /// Keywords
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl ChartMetadata {
    /// Create metadata with a name and version; api-version is left for the
    /// packaging step to stamp.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Read a descriptor file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Render as descriptor YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Archive file name for this chart (`<name>-<version>.tgz`)
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.name, self.version)
    }
}

/// Check that `path` is a chart directory.
///
/// A chart directory exists, is a directory and carries a `Chart.yaml` that
/// parses and declares a non-empty name.
pub fn validate_chart_dir(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path)
        .map_err(|e| CoreError::invalid_layout(path, e.to_string()))?;
    if !meta.is_dir() {
        return Err(CoreError::invalid_layout(path, "not a directory"));
    }

    let chart_file = path.join(CHART_FILE);
    if !chart_file.is_file() {
        return Err(CoreError::invalid_layout(path, "Chart.yaml not found"));
    }

    let metadata = ChartMetadata::from_file(&chart_file)
        .map_err(|e| CoreError::invalid_layout(path, format!("cannot read Chart.yaml: {e}")))?;
    if metadata.name.trim().is_empty() {
        return Err(CoreError::invalid_layout(path, "Chart.yaml declares no name"));
    }

    Ok(())
}

/// Boolean form of [`validate_chart_dir`]
pub fn is_chart_dir(path: &Path) -> bool {
    validate_chart_dir(path).is_ok()
}

/// Read the version declared by the chart at `location`
pub fn chart_version(location: &Path) -> Result<String> {
    let meta = std::fs::metadata(location)?;
    if !meta.is_dir() {
        return Err(CoreError::invalid_layout(location, "not a directory"));
    }

    let chart_file = location.join(CHART_FILE);
    if !chart_file.exists() {
        return Err(CoreError::invalid_layout(
            location,
            "Chart.yaml file not present in the directory",
        ));
    }

    let metadata = ChartMetadata::from_file(&chart_file)
        .map_err(|e| CoreError::invalid_layout(location, format!("cannot read Chart.yaml: {e}")))?;
    Ok(metadata.version)
}

/// A chart directory loaded into memory for archiving
#[derive(Debug, Clone)]
pub struct LoadedChart {
    /// Parsed descriptor
    pub metadata: ChartMetadata,

    /// Root directory of the chart
    pub root: PathBuf,

    /// Files of the chart tree, relative to `root`, sorted
    pub files: Vec<PathBuf>,

    /// Raw default values (empty when the chart has no values.yaml)
    pub values: String,
}

impl LoadedChart {
    /// Load the chart tree rooted at `path`
    ///
    /// Archives sitting at the top level of the chart (left over from an
    /// earlier packaging run) are not part of the tree.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        validate_chart_dir(&root)?;

        let metadata = ChartMetadata::from_file(root.join(CHART_FILE))?;

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&root).min_depth(1) {
            let entry = entry.map_err(|e| CoreError::Archive {
                message: format!("cannot walk {}: {}", root.display(), e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_path_buf();

            if entry.depth() == 1 && is_archive(&rel) {
                continue;
            }
            files.push(rel);
        }
        files.sort();

        let values_path = root.join(VALUES_FILE);
        let values = if values_path.is_file() {
            std::fs::read_to_string(&values_path)?
        } else {
            String::new()
        };

        Ok(Self {
            metadata,
            root,
            files,
            values,
        })
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("tgz"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_chart(dir: &Path, chart_yaml: &str) {
        std::fs::write(dir.join(CHART_FILE), chart_yaml).unwrap();
        std::fs::write(dir.join(VALUES_FILE), "replicaCount: 1\n").unwrap();
        std::fs::create_dir_all(dir.join("templates")).unwrap();
        std::fs::write(
            dir.join("templates").join("deployment.yaml"),
            "apiVersion: apps/v1\nkind: Deployment\n",
        )
        .unwrap();
    }

    #[test]
    fn test_metadata_deserialize_ignores_unknown_fields() {
        let yaml = r#"
apiVersion: v2
name: reference-chart
version: 4.11.0
type: application
dependencies: []
"#;
        let meta: ChartMetadata = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(meta.api_version, "v2");
        assert_eq!(meta.name, "reference-chart");
        assert_eq!(meta.version, "4.11.0");
    }

    #[test]
    fn test_archive_name() {
        let meta = ChartMetadata::new("orders-svc", "1.0.0");
        assert_eq!(meta.archive_name(), "orders-svc-1.0.0.tgz");
    }

    #[test]
    fn test_validate_chart_dir() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path(), "apiVersion: v1\nname: demo\nversion: 0.1.0\n");
        assert!(is_chart_dir(temp.path()));
    }

    #[test]
    fn test_validate_chart_dir_missing_descriptor() {
        let temp = TempDir::new().unwrap();
        let err = validate_chart_dir(temp.path()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidChartLayout { .. }));
    }

    #[test]
    fn test_validate_chart_dir_without_name() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path(), "apiVersion: v1\nversion: 0.1.0\n");
        assert!(!is_chart_dir(temp.path()));
    }

    #[test]
    fn test_validate_chart_dir_on_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(!is_chart_dir(&file));
    }

    #[test]
    fn test_chart_version() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path(), "apiVersion: v1\nname: demo\nversion: 3.2.1\n");
        assert_eq!(chart_version(temp.path()).unwrap(), "3.2.1");
    }

    #[test]
    fn test_chart_version_missing_descriptor() {
        let temp = TempDir::new().unwrap();
        assert!(chart_version(temp.path()).is_err());
    }

    #[test]
    fn test_load_skips_top_level_archives() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path(), "apiVersion: v1\nname: demo\nversion: 0.1.0\n");
        std::fs::write(temp.path().join("demo-0.0.9.tgz"), b"stale").unwrap();

        let chart = LoadedChart::load(temp.path()).unwrap();
        let files: Vec<_> = chart.files.iter().map(|p| p.to_string_lossy().to_string()).collect();

        assert!(files.contains(&"Chart.yaml".to_string()));
        assert!(files.contains(&"values.yaml".to_string()));
        assert!(files.iter().any(|f| f.ends_with("deployment.yaml")));
        assert!(!files.iter().any(|f| f.ends_with(".tgz")));
        assert_eq!(chart.values, "replicaCount: 1\n");
    }

    #[test]
    fn test_load_without_values() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CHART_FILE),
            "apiVersion: v1\nname: bare\nversion: 0.1.0\n",
        )
        .unwrap();

        let chart = LoadedChart::load(temp.path()).unwrap();
        assert!(chart.values.is_empty());
        assert_eq!(chart.files, vec![PathBuf::from("Chart.yaml")]);
    }
}
