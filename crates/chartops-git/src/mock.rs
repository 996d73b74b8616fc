//! In-memory hosting and working-copy backends for testing
//!
//! `MockWorkingCopy` keeps each remote as a map of relative path -> bytes.
//! Clones and pulls materialize the remote under a real clone root so the
//! publisher's filesystem inspection works unchanged; a push snapshots the
//! clone back into the remote.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{GitOpsError, Result};
use crate::hosting::{CreateRepositoryRequest, GitHostingClient, RepositoryProvision};
use crate::identity::CommitIdentity;
use crate::working_copy::GitWorkingCopy;

type RemoteFiles = BTreeMap<PathBuf, Vec<u8>>;

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub repo_creates: usize,
    pub readmes: usize,
    pub clones: usize,
    pub pulls: usize,
    pub push_attempts: usize,
    pub pushes: usize,
}

/// Failures to inject; each counter fails that many upcoming calls
#[derive(Debug, Default, Clone)]
struct FailurePlan {
    clones: usize,
    pulls: usize,
    pushes: usize,
}

fn take_failure(remaining: &mut usize) -> bool {
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

/// In-memory git hosting
#[derive(Clone)]
pub struct MockHosting {
    /// name -> clone URL
    repos: Arc<RwLock<BTreeMap<String, String>>>,
    stage_errors: Arc<RwLock<BTreeMap<String, String>>>,
    operations: Arc<RwLock<OperationCounts>>,
}

impl MockHosting {
    pub fn new() -> Self {
        Self {
            repos: Arc::new(RwLock::new(BTreeMap::new())),
            stage_errors: Arc::new(RwLock::new(BTreeMap::new())),
            operations: Arc::new(RwLock::new(OperationCounts::default())),
        }
    }

    /// URL the mock hands out for `name`
    pub fn url_for(name: &str) -> String {
        format!("https://git.example.com/org/{name}.git")
    }

    /// Pre-register an existing repository
    pub fn with_repository(self, name: &str) -> Self {
        self.repos
            .write()
            .unwrap()
            .insert(name.to_string(), Self::url_for(name));
        self
    }

    /// Report `message` for `stage` on every subsequent provisioning call
    pub fn fail_stage(&self, stage: &str, message: &str) {
        self.stage_errors
            .write()
            .unwrap()
            .insert(stage.to_string(), message.to_string());
    }

    pub fn repository_names(&self) -> Vec<String> {
        self.repos.read().unwrap().keys().cloned().collect()
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }
}

impl Default for MockHosting {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitHostingClient for MockHosting {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_repository(
        &self,
        request: &CreateRepositoryRequest,
    ) -> Result<RepositoryProvision> {
        self.operations.write().unwrap().repo_creates += 1;

        let stage_errors = self.stage_errors.read().unwrap().clone();
        let mut repos = self.repos.write().unwrap();
        let is_new = !repos.contains_key(&request.name);
        let url = repos
            .entry(request.name.clone())
            .or_insert_with(|| Self::url_for(&request.name))
            .clone();

        Ok(RepositoryProvision {
            url,
            is_new,
            stage_errors,
        })
    }

    async fn create_readme(&self, repo_name: &str, _author: &CommitIdentity) -> Result<String> {
        self.operations.write().unwrap().readmes += 1;

        if !self.repos.read().unwrap().contains_key(repo_name) {
            return Err(GitOpsError::Hosting {
                message: format!("repository {repo_name} not found"),
            });
        }
        Ok(format!("readme-{repo_name}"))
    }
}

/// In-memory remotes with working copies on disk
#[derive(Clone)]
pub struct MockWorkingCopy {
    clone_root: PathBuf,
    /// URL -> remote content
    remotes: Arc<RwLock<HashMap<String, RemoteFiles>>>,
    /// clone directory -> URL
    origins: Arc<RwLock<HashMap<PathBuf, String>>>,
    failures: Arc<RwLock<FailurePlan>>,
    operations: Arc<RwLock<OperationCounts>>,
}

impl MockWorkingCopy {
    pub fn new(clone_root: impl Into<PathBuf>) -> Self {
        Self {
            clone_root: clone_root.into(),
            remotes: Arc::new(RwLock::new(HashMap::new())),
            origins: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(FailurePlan::default())),
            operations: Arc::new(RwLock::new(OperationCounts::default())),
        }
    }

    /// Put a file into the remote at `url`
    pub fn seed_remote(&self, url: &str, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.remotes
            .write()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .insert(path.into(), content.into());
    }

    /// Files currently pushed to the remote at `url`
    pub fn remote_files(&self, url: &str) -> Vec<PathBuf> {
        self.remotes
            .read()
            .unwrap()
            .get(url)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Content of one pushed file
    pub fn remote_file(&self, url: &str, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.remotes
            .read()
            .unwrap()
            .get(url)
            .and_then(|files| files.get(path.as_ref()).cloned())
    }

    pub fn remote_contains(&self, url: &str, path: impl AsRef<Path>) -> bool {
        self.remotes
            .read()
            .unwrap()
            .get(url)
            .is_some_and(|files| files.contains_key(path.as_ref()))
    }

    pub fn fail_next_clones(&self, n: usize) {
        self.failures.write().unwrap().clones = n;
    }

    pub fn fail_next_pulls(&self, n: usize) {
        self.failures.write().unwrap().pulls = n;
    }

    pub fn fail_next_pushes(&self, n: usize) {
        self.failures.write().unwrap().pushes = n;
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    pub fn clone_root(&self) -> &Path {
        &self.clone_root
    }

    fn materialize(&self, url: &str, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let remotes = self.remotes.read().unwrap();
        if let Some(files) = remotes.get(url) {
            for (rel, content) in files {
                let dest = dir.join(rel);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(dest, content)?;
            }
        }
        Ok(())
    }

    fn snapshot(dir: &Path) -> Result<RemoteFiles> {
        let mut files = RemoteFiles::new();
        for entry in walkdir::WalkDir::new(dir).min_depth(1) {
            let entry = entry.map_err(|e| GitOpsError::git("push", e.to_string()))?;
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(dir)
                    .map_err(|e| GitOpsError::git("push", e.to_string()))?;
                files.insert(rel.to_path_buf(), std::fs::read(entry.path())?);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl GitWorkingCopy for MockWorkingCopy {
    fn clone_directory(&self, local_name: &str) -> PathBuf {
        self.clone_root.join(local_name)
    }

    async fn clone_repo(&self, url: &str, local_name: &str) -> Result<PathBuf> {
        self.operations.write().unwrap().clones += 1;
        if take_failure(&mut self.failures.write().unwrap().clones) {
            return Err(GitOpsError::git("clone", format!("could not read from {url}")));
        }

        let dir = self.clone_directory(local_name);
        self.materialize(url, &dir)?;
        self.origins
            .write()
            .unwrap()
            .insert(dir.clone(), url.to_string());
        Ok(dir)
    }

    async fn pull(&self, dir: &Path) -> Result<()> {
        self.operations.write().unwrap().pulls += 1;
        if take_failure(&mut self.failures.write().unwrap().pulls) {
            return Err(GitOpsError::git("pull", "cannot rebase: unstaged changes"));
        }

        let url = self
            .origins
            .read()
            .unwrap()
            .get(dir)
            .cloned()
            .ok_or_else(|| GitOpsError::git("pull", "not a git repository"))?;
        self.materialize(&url, dir)
    }

    async fn commit_and_push(
        &self,
        dir: &Path,
        _message: &str,
        _author: &CommitIdentity,
    ) -> Result<String> {
        self.operations.write().unwrap().push_attempts += 1;
        if take_failure(&mut self.failures.write().unwrap().pushes) {
            return Err(GitOpsError::git("push", "updates were rejected (fetch first)"));
        }

        let url = self
            .origins
            .read()
            .unwrap()
            .get(dir)
            .cloned()
            .ok_or_else(|| GitOpsError::git("push", "not a git repository"))?;
        let files = Self::snapshot(dir)?;
        self.remotes.write().unwrap().insert(url, files);

        let mut ops = self.operations.write().unwrap();
        ops.pushes += 1;
        Ok(format!("commit-{}", ops.pushes))
    }
}
