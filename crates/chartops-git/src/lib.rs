//! chartops git - GitOps repository publication
//!
//! This crate publishes staged charts into Git repositories watched by a
//! GitOps controller:
//! - `ChartPublicationPipeline`: stage, package and publish in one call
//! - `RepositoryPublisher`: the clone/inspect/commit/push state machine,
//!   with auto-heal of half-published paths and one pull-and-retry on push
//! - `CommitIdentityResolver`: commit author from user, GitOps config or bot
//! - `GitHostingClient` / `GitWorkingCopy`: collaborator seams, with
//!   `LocalHosting` and `GitCli` backed by the `git` binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use chartops_git::{ChartOpsConfig, ChartPublicationPipeline, GitCli, LocalHosting};
//!
//! let config = ChartOpsConfig::load()?;
//! let pipeline = ChartPublicationPipeline::from_config(&config, hosting, git, users);
//! let artifact = pipeline.publish(&request).await?;
//! println!("{} @ {}", artifact.repo_url, artifact.chart_location);
//! ```

pub mod config;
pub mod error;
pub mod hosting;
pub mod identity;
pub mod mock;
pub mod naming;
pub mod pipeline;
pub mod publisher;
pub mod working_copy;

pub use config::{ChartOpsConfig, DeploymentAppType};
pub use error::{GitOpsError, Result};
pub use hosting::{CreateRepositoryRequest, GitHostingClient, LocalHosting, RepositoryProvision};
pub use identity::{
    CommitIdentity, CommitIdentityResolver, GitOpsConfigSource, IdentitySource,
    StaticUserDirectory, UserDirectory, UserRecord, display_name_from_email,
};
pub use mock::{MockHosting, MockWorkingCopy, OperationCounts};
pub use naming::{
    app_env_location, gitops_repo_name, normalize_repo_name, repo_name_from_url,
    shared_template_location,
};
pub use pipeline::{ChartPublicationPipeline, ChartPublishRequest, PublishTarget, PublishedArtifact};
pub use publisher::{
    LocalClone, PublishOutcome, PublishRequest, PublishState, RepoCoordinates,
    RepositoryPublisher, TargetInspection, inspect_target, validate_in_repo_path,
};
pub use working_copy::{GitCli, GitWorkingCopy};
