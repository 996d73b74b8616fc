//! Publishing staged chart content into a GitOps repository
//!
//! The protocol is a small state machine. Each state has exactly one
//! transition function; [`RepositoryPublisher::publish`] drives it until it
//! reaches [`PublishState::Published`] or a transition fails.
//!
//! ```text
//! EnsureRepository -> EnsureLocalClone -> InspectTargetPath -+-> Published (healthy)
//!                                                            |
//!                                                            +-> CommitAndPush -> Published
//! ```
//!
//! The local clone is owned by a [`LocalClone`] guard carried in the states
//! that need it, so it is removed on every exit path: success, error, or the
//! publish future being dropped.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chartops_core::{CHART_FILE, copy_dir, next_name, remove_dir_logged};

use crate::error::{GitOpsError, Result};
use crate::hosting::{CreateRepositoryRequest, GitHostingClient};
use crate::identity::CommitIdentity;
use crate::naming::normalize_repo_name;
use crate::working_copy::GitWorkingCopy;

/// What to publish and where
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Target repository name (normalized before use)
    pub repo_name: String,
    /// Path inside the repository, e.g. `orders-svc/1.0.0`
    pub in_repo_path: String,
    /// Directory whose contents are published
    pub staged_dir: PathBuf,
    /// Commit author, also passed to repository creation
    pub identity: CommitIdentity,
    /// Description for a newly created repository
    pub description: String,
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub repo_url: String,
    /// `false` when the target path already held a healthy chart
    pub committed: bool,
}

/// Name and clone URL of the remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub name: String,
    pub url: String,
}

/// A local clone directory, removed when dropped
#[derive(Debug)]
pub struct LocalClone {
    local_name: String,
    path: PathBuf,
}

impl LocalClone {
    fn new(git: &dyn GitWorkingCopy, local_name: String) -> Self {
        let path = git.clone_directory(&local_name);
        Self { local_name, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl Drop for LocalClone {
    fn drop(&mut self) {
        remove_dir_logged(&self.path);
    }
}

/// State of the target path inside the clone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetInspection {
    /// Nothing at the path yet
    Absent,
    /// The path exists but holds no chart descriptor (an interrupted publish)
    Corrupted,
    /// A chart is already published there
    Healthy,
}

/// Classify the target path of a publish
pub fn inspect_target(target: &Path) -> TargetInspection {
    if !target.exists() {
        TargetInspection::Absent
    } else if target.join(CHART_FILE).is_file() {
        TargetInspection::Healthy
    } else {
        TargetInspection::Corrupted
    }
}

/// Check that `in_repo_path` stays inside the clone it is joined to
///
/// The path must be relative and made of plain segments: no root, drive
/// prefix or `..`. `.` segments are ignored.
pub fn validate_in_repo_path(in_repo_path: &str) -> Result<()> {
    let invalid = |reason: &str| GitOpsError::InvalidTargetPath {
        path: in_repo_path.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = 0;
    for component in Path::new(in_repo_path).components() {
        match component {
            Component::Normal(_) => segments += 1,
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("'..' segments are not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the repository root"));
            }
        }
    }
    if segments == 0 {
        return Err(invalid("must name a directory inside the repository"));
    }
    Ok(())
}

/// `in_repo_path` resolved inside `clone`
fn target_dir(clone: &LocalClone, in_repo_path: &str) -> Result<PathBuf> {
    validate_in_repo_path(in_repo_path)?;
    Ok(clone.path().join(in_repo_path))
}

/// States of the publish protocol
#[derive(Debug)]
pub enum PublishState {
    EnsureRepository,
    EnsureLocalClone {
        repo: RepoCoordinates,
    },
    InspectTargetPath {
        repo: RepoCoordinates,
        clone: LocalClone,
    },
    CommitAndPush {
        repo: RepoCoordinates,
        clone: LocalClone,
    },
    Published(PublishOutcome),
}

/// Drives the publish protocol against a hosting backend and a working copy
#[derive(Clone)]
pub struct RepositoryPublisher {
    hosting: Arc<dyn GitHostingClient>,
    git: Arc<dyn GitWorkingCopy>,
    commit_message: String,
}

impl RepositoryPublisher {
    pub fn new(
        hosting: Arc<dyn GitHostingClient>,
        git: Arc<dyn GitWorkingCopy>,
        commit_message: impl Into<String>,
    ) -> Self {
        Self {
            hosting,
            git,
            commit_message: commit_message.into(),
        }
    }

    pub fn hosting(&self) -> &Arc<dyn GitHostingClient> {
        &self.hosting
    }

    /// Publish `request.staged_dir` into `request.in_repo_path`
    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        validate_in_repo_path(&request.in_repo_path)?;

        let mut state = PublishState::EnsureRepository;
        loop {
            state = match self.step(request, state).await? {
                PublishState::Published(outcome) => {
                    tracing::info!(
                        repo_url = %outcome.repo_url,
                        path = %request.in_repo_path,
                        committed = outcome.committed,
                        "chart published"
                    );
                    return Ok(outcome);
                }
                next => next,
            };
        }
    }

    /// Run the transition out of `state`
    pub async fn step(&self, request: &PublishRequest, state: PublishState) -> Result<PublishState> {
        match state {
            PublishState::EnsureRepository => {
                let repo = self
                    .ensure_repository(&request.repo_name, &request.description, &request.identity)
                    .await?;
                Ok(PublishState::EnsureLocalClone { repo })
            }
            PublishState::EnsureLocalClone { repo } => {
                let clone = self.ensure_local_clone(&repo).await?;
                Ok(PublishState::InspectTargetPath { repo, clone })
            }
            PublishState::InspectTargetPath { repo, clone } => {
                self.inspect_target_path(request, repo, clone)
            }
            PublishState::CommitAndPush { repo, clone } => {
                self.commit_and_push(request, repo, clone).await
            }
            published @ PublishState::Published(_) => Ok(published),
        }
    }

    /// Create the repository if needed; any failed provisioning stage is fatal
    pub async fn ensure_repository(
        &self,
        repo_name: &str,
        description: &str,
        author: &CommitIdentity,
    ) -> Result<RepoCoordinates> {
        let name = normalize_repo_name(repo_name);
        let request = CreateRepositoryRequest {
            name: name.clone(),
            description: description.to_string(),
            author: author.clone(),
        };

        let provision_err = |stage: &str, message: String| GitOpsError::RepositoryProvisionFailed {
            repo: name.clone(),
            stage: stage.to_string(),
            message,
        };

        let provision = self
            .hosting
            .create_repository(&request)
            .await
            .map_err(|e| provision_err("create", e.to_string()))?;

        if let Some((stage, message)) = provision.stage_errors.iter().next() {
            tracing::error!(repo = %name, stage = %stage, error = %message, "repository provisioning failed");
            return Err(provision_err(stage, message.clone()));
        }
        if provision.url.is_empty() {
            return Err(provision_err("create", "hosting backend returned no URL".to_string()));
        }

        tracing::debug!(
            repo = %name,
            url = %provision.url,
            is_new = provision.is_new,
            backend = self.hosting.name(),
            "repository ensured"
        );
        Ok(RepoCoordinates {
            name,
            url: provision.url,
        })
    }

    async fn ensure_local_clone(&self, repo: &RepoCoordinates) -> Result<LocalClone> {
        let clone = LocalClone::new(self.git.as_ref(), format!("{}-{}", repo.name, next_name()));

        if clone.path().exists() {
            self.pull_or_reclone(repo, &clone).await?;
        } else {
            self.clone_into(repo, &clone).await?;
        }
        Ok(clone)
    }

    async fn clone_into(&self, repo: &RepoCoordinates, clone: &LocalClone) -> Result<()> {
        self.git
            .clone_repo(&repo.url, clone.local_name())
            .await
            .map_err(|e| GitOpsError::RepositoryCloneFailed {
                repo: repo.name.clone(),
                url: repo.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Pull; if that fails, discard the clone and clone again under the same name
    async fn pull_or_reclone(&self, repo: &RepoCoordinates, clone: &LocalClone) -> Result<()> {
        if let Err(e) = self.git.pull(clone.path()).await {
            tracing::warn!(
                repo = %repo.name,
                dir = %clone.path().display(),
                error = %e,
                "pull failed, cloning again"
            );
            remove_dir_logged(clone.path());
            self.clone_into(repo, clone).await?;
        }
        Ok(())
    }

    fn inspect_target_path(
        &self,
        request: &PublishRequest,
        repo: RepoCoordinates,
        clone: LocalClone,
    ) -> Result<PublishState> {
        let target = target_dir(&clone, &request.in_repo_path)?;

        match inspect_target(&target) {
            TargetInspection::Healthy => {
                tracing::debug!(path = %request.in_repo_path, "chart already present, nothing to commit");
                Ok(PublishState::Published(PublishOutcome {
                    repo_url: repo.url,
                    committed: false,
                }))
            }
            inspection => {
                if inspection == TargetInspection::Corrupted {
                    tracing::info!(
                        repo = %repo.name,
                        path = %request.in_repo_path,
                        "auto-healing, Chart.yaml missing from published path"
                    );
                }
                copy_dir(&request.staged_dir, &target)?;
                Ok(PublishState::CommitAndPush { repo, clone })
            }
        }
    }

    async fn commit_and_push(
        &self,
        request: &PublishRequest,
        repo: RepoCoordinates,
        clone: LocalClone,
    ) -> Result<PublishState> {
        let first = match self.push_once(request, &clone).await {
            Ok(()) => return Ok(published(repo)),
            Err(e) => e,
        };

        tracing::warn!(
            repo = %repo.name,
            path = %request.in_repo_path,
            error = %first,
            "push failed, pulling and retrying once"
        );

        self.pull_or_reclone(&repo, &clone).await?;
        copy_dir(&request.staged_dir, &target_dir(&clone, &request.in_repo_path)?)?;

        match self.push_once(request, &clone).await {
            Ok(()) => Ok(published(repo)),
            Err(second) => {
                tracing::error!(repo = %repo.name, error = %second, "push retry failed");
                Err(GitOpsError::PublishRetryExhausted {
                    repo: repo.name,
                    path: request.in_repo_path.clone(),
                    message: second.to_string(),
                })
            }
        }
    }

    async fn push_once(&self, request: &PublishRequest, clone: &LocalClone) -> Result<()> {
        let commit = self
            .git
            .commit_and_push(clone.path(), &self.commit_message, &request.identity)
            .await?;
        tracing::debug!(commit = %commit, author = %request.identity.email, "pushed");
        Ok(())
    }
}

fn published(repo: RepoCoordinates) -> PublishState {
    PublishState::Published(PublishOutcome {
        repo_url: repo.url,
        committed: true,
    })
}
