//! Local working copies of GitOps repositories
//!
//! [`GitWorkingCopy`] is the narrow contract the publisher needs: clone,
//! pull, and commit-and-push. [`GitCli`] implements it over the `git`
//! binary.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::error::{GitOpsError, Result};
use crate::identity::CommitIdentity;

/// Clone/pull/commit/push against a remote repository
#[async_trait]
pub trait GitWorkingCopy: Send + Sync {
    /// Where a clone named `local_name` lives (whether or not it exists yet)
    fn clone_directory(&self, local_name: &str) -> PathBuf;

    /// Clone `url` into [`clone_directory`](Self::clone_directory)
    async fn clone_repo(&self, url: &str, local_name: &str) -> Result<PathBuf>;

    /// Bring an existing clone up to date with its remote
    async fn pull(&self, dir: &Path) -> Result<()>;

    /// Stage everything, commit as `author`, push; returns the commit id
    async fn commit_and_push(
        &self,
        dir: &Path,
        message: &str,
        author: &CommitIdentity,
    ) -> Result<String>;
}

/// Working copies managed by the `git` command-line client
#[derive(Debug, Clone)]
pub struct GitCli {
    clone_root: PathBuf,
    program: String,
}

impl GitCli {
    pub fn new(clone_root: impl Into<PathBuf>) -> Self {
        Self {
            clone_root: clone_root.into(),
            program: "git".to_string(),
        }
    }

    /// Use a different git executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn clone_root(&self) -> &Path {
        &self.clone_root
    }

    /// Run git with `args` in `dir`, returning trimmed stdout
    pub(crate) async fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<String> {
        // subcommand, skipping `-c key=value` options
        let command = args
            .iter()
            .find(|arg| !arg.starts_with('-') && !arg.contains('='))
            .copied()
            .unwrap_or("git");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(args = ?args, dir = ?dir, "running git");
        let output = cmd
            .output()
            .await
            .map_err(|e| GitOpsError::git(command, format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitOpsError::git(command, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl GitWorkingCopy for GitCli {
    fn clone_directory(&self, local_name: &str) -> PathBuf {
        self.clone_root.join(local_name)
    }

    async fn clone_repo(&self, url: &str, local_name: &str) -> Result<PathBuf> {
        let dest = self.clone_directory(local_name);
        tokio::fs::create_dir_all(&self.clone_root).await?;

        let dest_str = dest.to_string_lossy();
        self.run(None, &["clone", "--quiet", url, &*dest_str]).await?;
        tracing::debug!(url, dir = %dest.display(), "repository cloned");
        Ok(dest)
    }

    async fn pull(&self, dir: &Path) -> Result<()> {
        self.run(Some(dir), &["pull", "--quiet", "--rebase", "--autostash"])
            .await?;
        Ok(())
    }

    async fn commit_and_push(
        &self,
        dir: &Path,
        message: &str,
        author: &CommitIdentity,
    ) -> Result<String> {
        let name = format!("user.name={}", author.name);
        let email = format!("user.email={}", author.email);

        self.run(Some(dir), &["add", "-A"]).await?;
        self.run(
            Some(dir),
            &[
                "-c",
                name.as_str(),
                "-c",
                email.as_str(),
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--quiet",
                "--allow-empty",
                "-m",
                message,
            ],
        )
        .await?;
        self.run(Some(dir), &["push", "--quiet", "origin", "HEAD"])
            .await?;

        self.run(Some(dir), &["rev-parse", "HEAD"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::{CreateRepositoryRequest, GitHostingClient, LocalHosting};
    use crate::publisher::{PublishRequest, RepositoryPublisher};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    fn author() -> CommitIdentity {
        CommitIdentity::from_email("jane.doe@example.com")
    }

    /// Bare `orders-svc` repository under `temp`; returns its URL
    async fn bare_repository(temp: &TempDir) -> String {
        let hosting = LocalHosting::new(temp.path().join("remotes"), temp.path().join("scratch"));
        let provision = hosting
            .create_repository(&CreateRepositoryRequest {
                name: "orders-svc".to_string(),
                description: String::new(),
                author: author(),
            })
            .await
            .unwrap();
        assert!(provision.is_new);
        provision.url
    }

    fn write_chart(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("Chart.yaml"), "apiVersion: v1\nname: orders-svc\nversion: 1.0.0\n")
            .unwrap();
    }

    /// Pushes a competing commit from another clone before the first push
    struct RacingWorkingCopy {
        inner: GitCli,
        url: String,
        raced: AtomicBool,
    }

    #[async_trait]
    impl GitWorkingCopy for RacingWorkingCopy {
        fn clone_directory(&self, local_name: &str) -> PathBuf {
            self.inner.clone_directory(local_name)
        }

        async fn clone_repo(&self, url: &str, local_name: &str) -> Result<PathBuf> {
            self.inner.clone_repo(url, local_name).await
        }

        async fn pull(&self, dir: &Path) -> Result<()> {
            self.inner.pull(dir).await
        }

        async fn commit_and_push(
            &self,
            dir: &Path,
            message: &str,
            author: &CommitIdentity,
        ) -> Result<String> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let rival = self.inner.clone_repo(&self.url, "rival").await?;
                tokio::fs::write(rival.join("README.md"), "# orders-svc\n").await?;
                self.inner.commit_and_push(&rival, "add README", author).await?;
            }
            self.inner.commit_and_push(dir, message, author).await
        }
    }

    #[test]
    fn test_clone_directory_under_root() {
        let git = GitCli::new("/var/cache/chartops/git");
        assert_eq!(
            git.clone_directory("orders-svc-42"),
            PathBuf::from("/var/cache/chartops/git/orders-svc-42")
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_git_error() {
        let temp = TempDir::new().unwrap();
        let git = GitCli::new(temp.path()).with_program("chartops-no-such-git");

        let err = git.pull(temp.path()).await.unwrap_err();
        assert!(matches!(err, GitOpsError::Git { ref command, .. } if command == "pull"));
    }

    #[tokio::test]
    async fn test_clone_commit_push_and_pull() {
        let temp = TempDir::new().unwrap();
        let url = bare_repository(&temp).await;
        let git = GitCli::new(temp.path().join("clones"));

        let first = git.clone_repo(&url, "first").await.unwrap();
        write_chart(&first.join("orders-svc/1.0.0"));
        let commit = git.commit_and_push(&first, "first commit", &author()).await.unwrap();
        assert_eq!(commit.len(), 40);

        let second = git.clone_repo(&url, "second").await.unwrap();
        assert!(second.join("orders-svc/1.0.0/Chart.yaml").is_file());

        std::fs::write(first.join("README.md"), "# orders-svc\n").unwrap();
        git.commit_and_push(&first, "add README", &author()).await.unwrap();
        git.pull(&second).await.unwrap();
        assert!(second.join("README.md").is_file());

        let author_line = git
            .run(Some(&second), &["log", "-1", "--format=%an <%ae>"])
            .await
            .unwrap();
        assert_eq!(author_line, "jane doe <jane.doe@example.com>");
    }

    #[tokio::test]
    async fn test_clone_of_missing_repository_fails() {
        let temp = TempDir::new().unwrap();
        let git = GitCli::new(temp.path().join("clones"));
        let url = format!("file://{}", temp.path().join("missing.git").display());

        let err = git.clone_repo(&url, "missing").await.unwrap_err();
        assert!(matches!(err, GitOpsError::Git { ref command, .. } if command == "clone"));
    }

    #[tokio::test]
    async fn test_publish_retries_after_rival_push() {
        let temp = TempDir::new().unwrap();
        let url = bare_repository(&temp).await;
        let staged = temp.path().join("staged");
        write_chart(&staged);

        let hosting = LocalHosting::new(temp.path().join("remotes"), temp.path().join("scratch"));
        let git = RacingWorkingCopy {
            inner: GitCli::new(temp.path().join("clones")),
            url: url.clone(),
            raced: AtomicBool::new(false),
        };
        let publisher = RepositoryPublisher::new(Arc::new(hosting), Arc::new(git), "first commit");

        let outcome = publisher
            .publish(&PublishRequest {
                repo_name: "orders-svc".to_string(),
                in_repo_path: "orders-svc/1.0.0".to_string(),
                staged_dir: staged,
                identity: author(),
                description: String::new(),
            })
            .await
            .unwrap();
        assert!(outcome.committed);
        assert_eq!(outcome.repo_url, url);

        let check = GitCli::new(temp.path().join("check"));
        let dir = check.clone_repo(&url, "verify").await.unwrap();
        assert!(dir.join("README.md").is_file());
        assert!(dir.join("orders-svc/1.0.0/Chart.yaml").is_file());
    }
}
