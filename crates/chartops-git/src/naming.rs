//! GitOps repository naming rules

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Collapse every whitespace run to a single `-`
pub fn normalize_repo_name(name: &str) -> String {
    WHITESPACE.replace_all(name, "-").into_owned()
}

/// Dedicated repository name for an app: `<prefix>-<app>`, or the app name
/// alone when no prefix is configured
pub fn gitops_repo_name(prefix: &str, app_name: &str) -> String {
    if prefix.is_empty() {
        app_name.to_string()
    } else {
        format!("{}-{}", prefix, app_name)
    }
}

/// Repository name from its clone URL (last path segment without `.git`)
///
/// Handles scp-style remotes (`git@host:org/repo.git`) as well as URLs.
pub fn repo_name_from_url(repo_url: &str) -> String {
    let path = match url::Url::parse(repo_url) {
        Ok(parsed) if parsed.has_host() || parsed.scheme() == "file" => parsed.path().to_string(),
        _ => repo_url.to_string(),
    };

    let last = path
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// In-repository location of a chart published for a shared base template
pub fn shared_template_location(base_template: &str, version: &str) -> String {
    format!("{}/{}", base_template, version)
}

/// In-repository location of a per-app proxy chart
pub fn app_env_location(app_name: &str, env_name: &str) -> String {
    format!("{}-{}", app_name, env_name)
}
