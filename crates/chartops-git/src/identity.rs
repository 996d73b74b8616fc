//! Commit author resolution
//!
//! The author of a publish commit is, in order of preference: the acting
//! user, the email configured on the active GitOps integration, or the bot
//! identity. Resolution never fails; lookup errors only degrade the result.

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::config::ChartOpsConfig;
use crate::error::{GitOpsError, Result};

/// Emails that belong to built-in accounts and never author commits
const RESERVED_EMAILS: [&str; 2] = ["admin", "system"];

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z_]").expect("non-word pattern is valid"));

/// Author of a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitIdentity {
    pub email: String,
    pub name: String,
}

impl CommitIdentity {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }

    /// Identity whose display name is derived from the email
    pub fn from_email(email: impl Into<String>) -> Self {
        let email = email.into();
        let name = display_name_from_email(&email);
        Self { email, name }
    }
}

/// Human-readable label from an email: the local part with every non-word
/// character replaced by a space
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    NON_WORD.replace_all(local, " ").into_owned()
}

/// Where a resolved identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    User,
    GitOpsConfig,
    Bot,
}

/// A user account as seen by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i32,
    pub email: String,
}

/// Read-only user lookup
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by id; `Ok(None)` when no such user exists
    async fn find_user(&self, user_id: i32) -> Result<Option<UserRecord>>;
}

/// Read-only access to the active GitOps integration
#[async_trait]
pub trait GitOpsConfigSource: Send + Sync {
    /// Email configured on the active integration, if any
    async fn active_gitops_email(&self) -> Result<Option<String>>;
}

#[async_trait]
impl GitOpsConfigSource for ChartOpsConfig {
    async fn active_gitops_email(&self) -> Result<Option<String>> {
        Ok(self.gitops_email.clone())
    }
}

/// In-memory user directory
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: HashMap<i32, UserRecord>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: i32, email: impl Into<String>) -> Self {
        self.users.insert(
            id,
            UserRecord {
                id,
                email: email.into(),
            },
        );
        self
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn find_user(&self, user_id: i32) -> Result<Option<UserRecord>> {
        Ok(self.users.get(&user_id).cloned())
    }
}

/// Resolves commit authors
#[derive(Clone)]
pub struct CommitIdentityResolver {
    users: Arc<dyn UserDirectory>,
    gitops: Arc<dyn GitOpsConfigSource>,
    bot_email: String,
}

impl CommitIdentityResolver {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        gitops: Arc<dyn GitOpsConfigSource>,
        bot_email: impl Into<String>,
    ) -> Self {
        Self {
            users,
            gitops,
            bot_email: bot_email.into(),
        }
    }

    /// Author for commits made on behalf of `user_id`
    pub async fn resolve(&self, user_id: i32) -> CommitIdentity {
        self.resolve_with_source(user_id).await.0
    }

    /// Like [`resolve`](Self::resolve), also reporting which source won
    pub async fn resolve_with_source(&self, user_id: i32) -> (CommitIdentity, IdentitySource) {
        let user = match self.users.find_user(user_id).await {
            Ok(user) => user,
            Err(e) => {
                degraded(format!("user lookup for {user_id} failed: {e}"));
                None
            }
        };

        if let Some(user) = user.filter(|u| is_author_email(&u.email)) {
            return (CommitIdentity::from_email(user.email), IdentitySource::User);
        }

        match self.gitops.active_gitops_email().await {
            Ok(Some(email)) if !email.is_empty() => {
                return (CommitIdentity::from_email(email), IdentitySource::GitOpsConfig);
            }
            Ok(_) => {}
            Err(e) => degraded(format!("error in getting email from active gitops config: {e}")),
        }

        (CommitIdentity::from_email(self.bot_email.clone()), IdentitySource::Bot)
    }
}

fn is_author_email(email: &str) -> bool {
    !email.is_empty() && !RESERVED_EMAILS.contains(&email)
}

fn degraded(reason: String) {
    let err = GitOpsError::IdentityResolutionDegraded { reason };
    tracing::error!(error = %err, "falling back to next commit identity source");
}
