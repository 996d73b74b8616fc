//! Error types for GitOps publication

use chartops_core::CoreError;
use thiserror::Error;

/// GitOps publication errors
#[derive(Debug, Error)]
pub enum GitOpsError {
    // ============ Local Chart Errors ============
    #[error(transparent)]
    Chart(#[from] CoreError),

    // ============ Remote Repository Errors ============
    #[error("Failed to provision repository {repo} (stage {stage}): {message}")]
    RepositoryProvisionFailed {
        repo: String,
        stage: String,
        message: String,
    },

    #[error("Failed to clone repository {repo} from {url}: {message}")]
    RepositoryCloneFailed {
        repo: String,
        url: String,
        message: String,
    },

    #[error("Invalid chart location '{path}': {reason}")]
    InvalidTargetPath { path: String, reason: String },

    #[error("Push to {repo} failed after retry (path {path}): {message}")]
    PublishRetryExhausted {
        repo: String,
        path: String,
        message: String,
    },

    // ============ Identity Errors ============
    #[error("Commit identity resolution degraded: {reason}")]
    IdentityResolutionDegraded { reason: String },

    // ============ Collaborator Errors ============
    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("Git hosting error: {message}")]
    Hosting { message: String },

    #[error("Lookup failed: {message}")]
    Lookup { message: String },

    // ============ Configuration Errors ============
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for GitOps operations
pub type Result<T> = std::result::Result<T, GitOpsError>;

impl GitOpsError {
    pub(crate) fn git(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            command: command.into(),
            message: message.into(),
        }
    }
}

impl From<serde_yaml::Error> for GitOpsError {
    fn from(e: serde_yaml::Error) -> Self {
        GitOpsError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for GitOpsError {
    fn from(e: serde_json::Error) -> Self {
        GitOpsError::Serialization(e.to_string())
    }
}
