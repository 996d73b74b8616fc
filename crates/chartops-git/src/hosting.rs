//! Git hosting backends
//!
//! The hosting client creates remote repositories. Creation is an upsert:
//! asking for a repository that already exists returns its URL with
//! `is_new == false`. Provisioning reports per-stage errors instead of
//! failing outright, mirroring hosting APIs that create the repository and
//! then configure it in several calls.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chartops_core::{next_name, remove_dir_logged};

use crate::error::{GitOpsError, Result};
use crate::identity::CommitIdentity;
use crate::working_copy::{GitCli, GitWorkingCopy};

/// Request to create (or look up) a remote repository
#[derive(Debug, Clone)]
pub struct CreateRepositoryRequest {
    pub name: String,
    pub description: String,
    pub author: CommitIdentity,
}

/// Outcome of provisioning a repository
#[derive(Debug, Clone, Default)]
pub struct RepositoryProvision {
    /// Clone URL; empty if provisioning failed before one was known
    pub url: String,

    /// Whether the repository was created by this call
    pub is_new: bool,

    /// Stage name -> error message for every stage that failed
    pub stage_errors: BTreeMap<String, String>,
}

impl RepositoryProvision {
    pub fn has_errors(&self) -> bool {
        !self.stage_errors.is_empty()
    }
}

/// Remote repository provisioning
#[async_trait]
pub trait GitHostingClient: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Create the repository if needed and return its coordinates
    async fn create_repository(&self, request: &CreateRepositoryRequest)
    -> Result<RepositoryProvision>;

    /// Commit a README to the repository; returns the commit id
    async fn create_readme(&self, repo_name: &str, author: &CommitIdentity) -> Result<String>;
}

/// Bare repositories under a local directory, addressed by `file://` URLs
#[derive(Debug, Clone)]
pub struct LocalHosting {
    root: PathBuf,
    git: GitCli,
}

impl LocalHosting {
    /// `root` holds the bare repositories; `scratch` hosts temporary clones
    pub fn new(root: impl Into<PathBuf>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            git: GitCli::new(scratch),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.git"))
    }

    fn repo_url(&self, name: &str) -> String {
        format!("file://{}", self.repo_path(name).display())
    }

    async fn write_readme(
        &self,
        dir: &Path,
        repo_name: &str,
        author: &CommitIdentity,
    ) -> Result<String> {
        let readme = format!("# {repo_name}\n\nManaged by chartops.\n");
        tokio::fs::write(dir.join("README.md"), readme).await?;
        self.git.commit_and_push(dir, "add README", author).await
    }
}

#[async_trait]
impl GitHostingClient for LocalHosting {
    fn name(&self) -> &str {
        "local"
    }

    async fn create_repository(
        &self,
        request: &CreateRepositoryRequest,
    ) -> Result<RepositoryProvision> {
        let path = self.repo_path(&request.name);
        let mut provision = RepositoryProvision {
            url: self.repo_url(&request.name),
            ..Default::default()
        };

        if path.join("HEAD").is_file() {
            tracing::debug!(repo = %request.name, "repository already exists");
            return Ok(provision);
        }

        if let Err(e) = tokio::fs::create_dir_all(&path).await {
            provision
                .stage_errors
                .insert("create_dir".to_string(), e.to_string());
            return Ok(provision);
        }

        let path_str = path.to_string_lossy();
        match self
            .git
            .run(None, &["init", "--quiet", "--bare", "-b", "main", &*path_str])
            .await
        {
            Ok(_) => provision.is_new = true,
            Err(e) => {
                provision
                    .stage_errors
                    .insert("init".to_string(), e.to_string());
                return Ok(provision);
            }
        }

        if !request.description.is_empty() {
            if let Err(e) = tokio::fs::write(path.join("description"), &request.description).await {
                provision
                    .stage_errors
                    .insert("describe".to_string(), e.to_string());
            }
        }

        tracing::info!(repo = %request.name, url = %provision.url, "repository created");
        Ok(provision)
    }

    async fn create_readme(&self, repo_name: &str, author: &CommitIdentity) -> Result<String> {
        let local_name = format!("{repo_name}-readme-{}", next_name());
        let dir = self.git.clone_repo(&self.repo_url(repo_name), &local_name).await?;

        let result = self.write_readme(&dir, repo_name, author).await;
        remove_dir_logged(&dir);
        result.map_err(|e| GitOpsError::Hosting {
            message: format!("cannot create README in {repo_name}: {e}"),
        })
    }
}
