//! CLI error types with exit code handling
//!
//! Library errors are folded into a small set of diagnostics, each with its
//! own exit code.

use chartops_core::CoreError;
use chartops_git::GitOpsError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Reference chart or packaging problem
    #[error("Chart error: {message}")]
    #[diagnostic(code(chartops::cli::chart))]
    Chart {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Remote repository provisioning, clone or push failed
    #[error("Publish failed: {message}")]
    #[diagnostic(code(chartops::cli::publish))]
    Publish {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Configuration file could not be used
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartops::cli::config))]
    Config { message: String },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(chartops::cli::usage))]
    Usage { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartops::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(chartops::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Chart { .. } => exit_codes::CHART_ERROR,
            CliError::Publish { .. } => exit_codes::PUBLISH_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::internal(err.to_string())
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let help = match &err {
            CoreError::InvalidChartLayout { .. } => {
                Some("A chart directory needs a Chart.yaml with a non-empty name".to_string())
            }
            _ => None,
        };
        match err {
            CoreError::Io(e) => CliError::from(e),
            other => CliError::Chart {
                message: other.to_string(),
                help,
            },
        }
    }
}

impl From<GitOpsError> for CliError {
    fn from(err: GitOpsError) -> Self {
        match err {
            GitOpsError::Chart(core) => CliError::from(core),
            GitOpsError::InvalidConfig { message } => CliError::Config { message },
            err @ GitOpsError::InvalidTargetPath { .. } => CliError::usage(err.to_string()),
            GitOpsError::Io(e) => CliError::from(e),
            err @ GitOpsError::RepositoryCloneFailed { .. } => CliError::Publish {
                message: err.to_string(),
                help: Some("Check that the repository URL is reachable and git is installed".to_string()),
            },
            other => CliError::Publish {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
