//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid chart layout at {path}: {message}")]
    InvalidChartLayout { path: String, message: String },

    #[error("Failed to write Chart.yaml in {path}: {message}")]
    DescriptorWriteFailed { path: String, message: String },

    #[error("Failed to build chart archive in {path}: {message}")]
    ArchiveBuildFailed { path: String, message: String },

    #[error("Failed to copy {from} to {to}: {message}")]
    StagingCopyFailed {
        from: String,
        to: String,
        message: String,
    },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn invalid_layout(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::InvalidChartLayout {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
