//! End-to-end chart publication
//!
//! [`ChartPublicationPipeline`] stages a reference chart into a fresh
//! workspace, packages it, resolves the commit author and hands the staged
//! tree to the [`RepositoryPublisher`]. The workspace is a guard owned by
//! the call, so it is removed however the call ends.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chartops_core::{
    API_VERSION_V1, API_VERSION_V2, ArchivePackager, ChartMetadata, ChartValues, CoreError,
    IMAGE_DESCRIPTOR_TEMPLATE_FILE, PackagedChart, StagedWorkspace, WorkspaceAllocator,
    decompress_archive, extract_overrides, yaml_to_json,
};

use crate::config::ChartOpsConfig;
use crate::error::Result;
use crate::hosting::GitHostingClient;
use crate::identity::{CommitIdentityResolver, UserDirectory};
use crate::naming::{app_env_location, gitops_repo_name, normalize_repo_name, shared_template_location};
use crate::publisher::{PublishRequest, RepositoryPublisher, validate_in_repo_path};
use crate::working_copy::GitWorkingCopy;

/// Where a chart is published
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    /// Chart shared by every app built from a base template, stored at
    /// `<base_template>/<version>`
    SharedTemplate {
        repo_name: String,
        base_template: String,
    },
    /// Per-app proxy chart stored at `<app_name>-<env_name>`
    AppProxy {
        app_name: String,
        env_name: String,
        /// Pinned repository; defaults to the app's GitOps repository name
        repo_name: Option<String>,
    },
}

/// Input of [`ChartPublicationPipeline::publish`]
#[derive(Debug, Clone)]
pub struct ChartPublishRequest {
    pub reference_chart_dir: PathBuf,
    pub metadata: ChartMetadata,
    pub version: String,
    pub user_id: i32,
    pub target: PublishTarget,
}

/// Coordinates of a published chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedArtifact {
    pub repo_url: String,
    pub chart_location: String,
    /// Default values (YAML) as packaged
    pub values: String,
    pub committed: bool,
}

impl PublishedArtifact {
    /// Default values as JSON, `{}` when the chart declares none
    pub fn values_json(&self) -> Result<String> {
        if self.values.trim().is_empty() {
            return Ok("{}".to_string());
        }
        Ok(yaml_to_json(&self.values)?)
    }
}

/// Stage, package and publish charts
pub struct ChartPublicationPipeline {
    allocator: WorkspaceAllocator,
    packager: ArchivePackager,
    publisher: RepositoryPublisher,
    identity: CommitIdentityResolver,
    repo_prefix: String,
}

impl ChartPublicationPipeline {
    pub fn new(
        allocator: WorkspaceAllocator,
        publisher: RepositoryPublisher,
        identity: CommitIdentityResolver,
        repo_prefix: impl Into<String>,
    ) -> Self {
        Self {
            allocator,
            packager: ArchivePackager::new(),
            publisher,
            identity,
            repo_prefix: repo_prefix.into(),
        }
    }

    /// Wire a pipeline from configuration and concrete collaborators
    pub fn from_config(
        config: &ChartOpsConfig,
        hosting: Arc<dyn GitHostingClient>,
        git: Arc<dyn GitWorkingCopy>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let publisher = RepositoryPublisher::new(hosting, git, config.commit_message.clone());
        let identity =
            CommitIdentityResolver::new(users, Arc::new(config.clone()), config.bot_email.clone());
        Self::new(
            WorkspaceAllocator::new(&config.chart_working_dir),
            publisher,
            identity,
            config.gitops_repo_prefix.clone(),
        )
    }

    /// GitOps repository name for an app under the configured prefix
    pub fn gitops_repo_name(&self, app_name: &str) -> String {
        gitops_repo_name(&self.repo_prefix, app_name)
    }

    /// Publish a chart built from `request.reference_chart_dir`
    pub async fn publish(&self, request: &ChartPublishRequest) -> Result<PublishedArtifact> {
        let (api_version, repo_name, chart_location) = match &request.target {
            PublishTarget::SharedTemplate {
                repo_name,
                base_template,
            } => (
                API_VERSION_V1,
                repo_name.clone(),
                shared_template_location(base_template, &request.version),
            ),
            PublishTarget::AppProxy {
                app_name,
                env_name,
                repo_name,
            } => (
                API_VERSION_V2,
                repo_name
                    .clone()
                    .unwrap_or_else(|| self.gitops_repo_name(app_name)),
                app_env_location(app_name, env_name),
            ),
        };
        validate_in_repo_path(&chart_location)?;

        let (workspace, packaged) =
            self.stage_and_package(&request.reference_chart_dir, &request.metadata, api_version)?;
        let identity = self.identity.resolve(request.user_id).await;

        let outcome = self
            .publisher
            .publish(&PublishRequest {
                repo_name,
                in_repo_path: chart_location.clone(),
                staged_dir: workspace.path().to_path_buf(),
                identity,
                description: format!("helm chart for {}", packaged.metadata.name),
            })
            .await?;

        Ok(PublishedArtifact {
            repo_url: outcome.repo_url,
            chart_location,
            values: packaged.values,
            committed: outcome.committed,
        })
    }

    /// Default values and override files of a reference chart
    ///
    /// The reference chart must ship an image descriptor template.
    pub fn fetch_reference_values(
        &self,
        metadata: &ChartMetadata,
        reference_chart_dir: &Path,
    ) -> Result<ChartValues> {
        let (workspace, packaged) =
            self.stage_and_package(reference_chart_dir, metadata, API_VERSION_V1)?;

        let mut values = extract_overrides(workspace.path());
        values.values = packaged.values;

        let template_path = workspace.path().join(IMAGE_DESCRIPTOR_TEMPLATE_FILE);
        values.image_descriptor_template = std::fs::read_to_string(&template_path).map_err(|e| {
            CoreError::InvalidChartLayout {
                path: reference_chart_dir.display().to_string(),
                message: format!("cannot read {IMAGE_DESCRIPTOR_TEMPLATE_FILE}: {e}"),
            }
        })?;

        Ok(values)
    }

    /// Packaged reference chart as an uncompressed tar stream
    pub fn reference_chart_bytes(
        &self,
        metadata: &ChartMetadata,
        reference_chart_dir: &Path,
    ) -> Result<Vec<u8>> {
        let (_workspace, packaged) =
            self.stage_and_package(reference_chart_dir, metadata, API_VERSION_V1)?;
        Ok(decompress_archive(&packaged.archive_path)?)
    }

    /// Provision the repository for a shared-template chart without pushing
    ///
    /// Returns the repository URL and the chart location inside it.
    pub async fn create_repository_for_app(
        &self,
        repo_name: &str,
        base_template: &str,
        version: &str,
        user_id: i32,
    ) -> Result<(String, String)> {
        let identity = self.identity.resolve(user_id).await;
        let description = format!("helm chart for {base_template}");
        let repo = self
            .publisher
            .ensure_repository(repo_name, &description, &identity)
            .await?;
        Ok((repo.url, shared_template_location(base_template, version)))
    }

    /// Commit a README to a repository as the resolved user
    pub async fn create_readme(&self, repo_name: &str, user_id: i32) -> Result<String> {
        let identity = self.identity.resolve(user_id).await;
        self.publisher
            .hosting()
            .create_readme(&normalize_repo_name(repo_name), &identity)
            .await
    }

    /// Version declared by the chart at `location`
    pub fn chart_version(&self, location: &Path) -> Result<String> {
        Ok(chartops_core::chart_version(location)?)
    }

    fn stage_and_package(
        &self,
        reference_chart_dir: &Path,
        metadata: &ChartMetadata,
        api_version: &str,
    ) -> Result<(StagedWorkspace, PackagedChart)> {
        let workspace = StagedWorkspace::create(&self.allocator)?;
        workspace.stage_from(reference_chart_dir)?;

        let mut metadata = metadata.clone();
        metadata.api_version = api_version.to_string();
        let packaged = self.packager.package(workspace.path(), &metadata)?;

        Ok((workspace, packaged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GitOpsError;
    use crate::identity::StaticUserDirectory;
    use crate::mock::{MockHosting, MockWorkingCopy};
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        hosting: MockHosting,
        git: MockWorkingCopy,
        pipeline: ChartPublicationPipeline,
        reference: PathBuf,
    }

    fn fixture(prefix: &str) -> Fixture {
        let temp = TempDir::new().unwrap();

        let reference = temp.path().join("reference");
        std::fs::create_dir_all(reference.join("templates")).unwrap();
        std::fs::write(
            reference.join("Chart.yaml"),
            "apiVersion: v2\nname: reference-chart\nversion: 4.11.0\n",
        )
        .unwrap();
        std::fs::write(reference.join("values.yaml"), "replicaCount: 2\n").unwrap();
        std::fs::write(reference.join("env-values.yml"), "env: prod\n").unwrap();
        std::fs::write(
            reference.join(IMAGE_DESCRIPTOR_TEMPLATE_FILE),
            r#"{"server": {"deployment": {"image": "{{.Image}}"}}}"#,
        )
        .unwrap();
        std::fs::write(
            reference.join("templates").join("deployment.yaml"),
            "kind: Deployment\n",
        )
        .unwrap();

        let mut config = ChartOpsConfig::default();
        config.chart_working_dir = temp.path().join("charts");
        config.gitops_repo_prefix = prefix.to_string();

        let hosting = MockHosting::new();
        let git = MockWorkingCopy::new(temp.path().join("clones"));
        let users = StaticUserDirectory::new().with_user(1, "jane.doe@example.com");
        let pipeline = ChartPublicationPipeline::from_config(
            &config,
            Arc::new(hosting.clone()),
            Arc::new(git.clone()),
            Arc::new(users),
        );

        Fixture {
            temp,
            hosting,
            git,
            pipeline,
            reference,
        }
    }

    fn is_empty_dir(path: &Path) -> bool {
        match std::fs::read_dir(path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    fn shared_request(f: &Fixture) -> ChartPublishRequest {
        ChartPublishRequest {
            reference_chart_dir: f.reference.clone(),
            metadata: ChartMetadata::new("orders-svc", "1.0.0"),
            version: "1.0.0".to_string(),
            user_id: 1,
            target: PublishTarget::SharedTemplate {
                repo_name: "orders-svc".to_string(),
                base_template: "orders-svc".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_publish_shared_template_to_fresh_remote() {
        let f = fixture("");
        let artifact = f.pipeline.publish(&shared_request(&f)).await.unwrap();

        let url = MockHosting::url_for("orders-svc");
        assert_eq!(artifact.chart_location, "orders-svc/1.0.0");
        assert_eq!(artifact.repo_url, url);
        assert_eq!(artifact.values, "replicaCount: 2\n");
        assert!(artifact.committed);

        let descriptor = f.git.remote_file(&url, "orders-svc/1.0.0/Chart.yaml").unwrap();
        let descriptor: ChartMetadata = serde_yaml::from_slice(&descriptor).unwrap();
        assert_eq!(descriptor.api_version, "v1");
        assert_eq!(descriptor.name, "orders-svc");
        assert!(f.git.remote_contains(&url, "orders-svc/1.0.0/orders-svc-1.0.0.tgz"));
        assert!(f.git.remote_contains(&url, "orders-svc/1.0.0/templates/deployment.yaml"));

        assert!(is_empty_dir(&f.temp.path().join("charts")));
        assert!(is_empty_dir(&f.temp.path().join("clones")));
    }

    #[tokio::test]
    async fn test_publish_twice_is_idempotent() {
        let f = fixture("");
        let first = f.pipeline.publish(&shared_request(&f)).await.unwrap();
        let second = f.pipeline.publish(&shared_request(&f)).await.unwrap();

        assert!(first.committed);
        assert!(!second.committed);
        assert_eq!(first.repo_url, second.repo_url);
        assert_eq!(first.chart_location, second.chart_location);
        assert_eq!(f.git.operation_counts().pushes, 1);
    }

    #[tokio::test]
    async fn test_publish_app_proxy_uses_prefixed_repo() {
        let f = fixture("platform");
        let request = ChartPublishRequest {
            target: PublishTarget::AppProxy {
                app_name: "orders-svc".to_string(),
                env_name: "prod".to_string(),
                repo_name: None,
            },
            ..shared_request(&f)
        };

        let artifact = f.pipeline.publish(&request).await.unwrap();

        let url = MockHosting::url_for("platform-orders-svc");
        assert_eq!(artifact.repo_url, url);
        assert_eq!(artifact.chart_location, "orders-svc-prod");
        assert_eq!(artifact.values_json().unwrap(), r#"{"replicaCount":2}"#);

        let descriptor = f.git.remote_file(&url, "orders-svc-prod/Chart.yaml").unwrap();
        let descriptor: ChartMetadata = serde_yaml::from_slice(&descriptor).unwrap();
        assert_eq!(descriptor.api_version, "v2");
    }

    #[tokio::test]
    async fn test_publish_app_proxy_pinned_repo() {
        let f = fixture("platform");
        let request = ChartPublishRequest {
            target: PublishTarget::AppProxy {
                app_name: "orders-svc".to_string(),
                env_name: "prod".to_string(),
                repo_name: Some("legacy orders".to_string()),
            },
            ..shared_request(&f)
        };

        let artifact = f.pipeline.publish(&request).await.unwrap();
        assert_eq!(artifact.repo_url, MockHosting::url_for("legacy-orders"));
        assert_eq!(f.hosting.repository_names(), vec!["legacy-orders"]);
    }

    #[tokio::test]
    async fn test_absolute_base_template_is_rejected() {
        let f = fixture("");
        let outside = f.temp.path().join("outside");
        let request = ChartPublishRequest {
            target: PublishTarget::SharedTemplate {
                repo_name: "orders-svc".to_string(),
                base_template: outside.display().to_string(),
            },
            ..shared_request(&f)
        };

        let err = f.pipeline.publish(&request).await.unwrap_err();
        assert!(matches!(err, GitOpsError::InvalidTargetPath { .. }));
        assert!(!outside.exists());
        assert!(is_empty_dir(&f.temp.path().join("charts")));
        assert_eq!(f.hosting.operation_counts().repo_creates, 0);
    }

    #[tokio::test]
    async fn test_missing_reference_fails_staging() {
        let f = fixture("");
        let request = ChartPublishRequest {
            reference_chart_dir: f.temp.path().join("does-not-exist"),
            ..shared_request(&f)
        };

        let err = f.pipeline.publish(&request).await.unwrap_err();
        assert!(matches!(err, GitOpsError::Chart(CoreError::StagingCopyFailed { .. })));
        assert!(is_empty_dir(&f.temp.path().join("charts")));
        assert_eq!(f.hosting.operation_counts().repo_creates, 0);
    }

    #[tokio::test]
    async fn test_reference_without_descriptor_is_invalid() {
        let f = fixture("");
        std::fs::remove_file(f.reference.join("Chart.yaml")).unwrap();

        let err = f.pipeline.publish(&shared_request(&f)).await.unwrap_err();
        assert!(matches!(err, GitOpsError::Chart(CoreError::InvalidChartLayout { .. })));
        assert!(is_empty_dir(&f.temp.path().join("charts")));
    }

    #[test]
    fn test_fetch_reference_values() {
        let f = fixture("");
        let values = f
            .pipeline
            .fetch_reference_values(&ChartMetadata::new("reference-chart", "4.11.0"), &f.reference)
            .unwrap();

        assert_eq!(values.values, "replicaCount: 2\n");
        assert_eq!(values.env_overrides, r#"{"env":"prod"}"#);
        assert!(values.app_overrides.is_empty());
        assert!(values.release_overrides.is_empty());
        assert!(values.pipeline_overrides.is_empty());
        assert!(values.image_descriptor_template.contains("{{.Image}}"));
        assert!(is_empty_dir(&f.temp.path().join("charts")));
    }

    #[test]
    fn test_fetch_reference_values_requires_image_template() {
        let f = fixture("");
        std::fs::remove_file(f.reference.join(IMAGE_DESCRIPTOR_TEMPLATE_FILE)).unwrap();

        let err = f
            .pipeline
            .fetch_reference_values(&ChartMetadata::new("reference-chart", "4.11.0"), &f.reference)
            .unwrap_err();
        assert!(matches!(err, GitOpsError::Chart(CoreError::InvalidChartLayout { .. })));
    }

    #[test]
    fn test_reference_chart_bytes_is_tar_stream() {
        let f = fixture("");
        let bytes = f
            .pipeline
            .reference_chart_bytes(&ChartMetadata::new("reference-chart", "4.11.0"), &f.reference)
            .unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert!(names.contains(&"reference-chart/Chart.yaml".to_string()));
        assert!(names.contains(&"reference-chart/templates/deployment.yaml".to_string()));
    }

    #[tokio::test]
    async fn test_create_repository_for_app() {
        let f = fixture("");
        let (url, location) = f
            .pipeline
            .create_repository_for_app("orders svc", "orders-svc", "1.0.0", 1)
            .await
            .unwrap();

        assert_eq!(url, MockHosting::url_for("orders-svc"));
        assert_eq!(location, "orders-svc/1.0.0");
        assert_eq!(f.git.operation_counts().clones, 0);
    }

    #[tokio::test]
    async fn test_create_readme_requires_repository() {
        let f = fixture("");
        assert!(f.pipeline.create_readme("orders-svc", 1).await.is_err());

        f.pipeline
            .create_repository_for_app("orders-svc", "orders-svc", "1.0.0", 1)
            .await
            .unwrap();
        assert!(f.pipeline.create_readme("orders-svc", 1).await.is_ok());
        assert_eq!(f.hosting.operation_counts().readmes, 2);
    }

    #[test]
    fn test_values_json_empty() {
        let artifact = PublishedArtifact {
            repo_url: String::new(),
            chart_location: String::new(),
            values: "  \n".to_string(),
            committed: false,
        };
        assert_eq!(artifact.values_json().unwrap(), "{}");
    }

    #[test]
    fn test_chart_version_passthrough() {
        let f = fixture("");
        assert_eq!(f.pipeline.chart_version(&f.reference).unwrap(), "4.11.0");
    }
}
