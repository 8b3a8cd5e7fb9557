// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Forge drivers: the abstraction over GitHub-style and GitLab-style APIs.
//!
//! A [`Forge`] knows how to parse a repository URL, list tags (with
//! pagination), look up a release by tag, download a release asset, and build
//! the HTTP request for a ref's zip archive. The two variants differ in URL
//! shapes, auth headers (`Authorization: token …` vs `PRIVATE-TOKEN: …`),
//! and how nested namespaces are encoded; everything above this module is
//! provider-agnostic.

use std::fmt;
use std::path::Path;

use crate::error::{self, FetchError};

pub mod github;
pub mod gitlab;
pub(crate) mod http;

pub use github::GitHubSource;
pub use gitlab::GitLabSource;

/// Which forge API family a repository lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    GitHub,
    GitLab,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::GitHub => write!(f, "github"),
            SourceType::GitLab => write!(f, "gitlab"),
        }
    }
}

/// Parse the `--source` selector. `auto` (or empty) yields `None`, meaning
/// the type should be detected from the URL.
pub fn parse_source_type(s: &str) -> Result<Option<SourceType>, FetchError> {
    match s.to_lowercase().as_str() {
        "github" => Ok(Some(SourceType::GitHub)),
        "gitlab" => Ok(Some(SourceType::GitLab)),
        "auto" | "" => Ok(None),
        other => Err(FetchError::new(
            error::WRAPPED,
            format!(
                "unknown source type \"{}\" (valid values: auto, github, gitlab)",
                other
            ),
        )),
    }
}

/// Detect the forge type from a repository URL's host.
///
/// Only the canonical hosts are recognized; any other host defaults to the
/// GitHub-style driver, so self-hosted GitLab instances must be selected
/// explicitly with `--source gitlab`.
pub fn detect_source_type(repo_url: &str) -> Result<SourceType, FetchError> {
    let parsed = url::Url::parse(repo_url).map_err(|e| {
        FetchError::new(
            error::REPO_URL_MALFORMED_OR_NOT_PARSEABLE,
            format!("repo URL {} is malformed: {}", repo_url, e),
        )
    })?;
    let host = parsed.host_str().unwrap_or_default().to_lowercase();

    match host.as_str() {
        "gitlab.com" | "www.gitlab.com" => Ok(SourceType::GitLab),
        _ => Ok(SourceType::GitHub),
    }
}

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API version path component for enterprise GitHub hosts.
    pub api_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_version: "v3".to_string(),
        }
    }
}

/// A resolved handle to a remote repository.
#[derive(Debug, Clone)]
pub struct Repo {
    /// The URL as the caller supplied it.
    pub url: String,
    /// URL scheme, `http` or `https`. Self-hosted instances served over
    /// plain http keep working; API requests reuse the repo URL's scheme.
    pub scheme: String,
    /// Host (and port, if any) of the forge instance.
    pub base_url: String,
    /// API endpoint base, host-relative (no scheme).
    pub api_url: String,
    /// Account or namespace; may contain `/` for nested GitLab groups.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Access token, empty for anonymous access.
    pub token: String,
    pub source_type: SourceType,
}

/// A request for a specific commit of a repository.
///
/// At most one of the reference fields is meaningful for any given fetch;
/// when several are set the precedence is commit SHA, then branch, then tag,
/// then the generic ref.
#[derive(Debug, Clone)]
pub struct Commit {
    pub repo: Repo,
    /// Generic git reference; lowest precedence.
    pub git_ref: String,
    pub git_tag: String,
    pub branch_name: String,
    pub commit_sha: String,
}

impl Commit {
    /// The reference that actually identifies this commit.
    pub fn effective_ref(&self) -> Result<&str, FetchError> {
        if !self.commit_sha.is_empty() {
            Ok(&self.commit_sha)
        } else if !self.branch_name.is_empty() {
            Ok(&self.branch_name)
        } else if !self.git_tag.is_empty() {
            Ok(&self.git_tag)
        } else if !self.git_ref.is_empty() {
            Ok(&self.git_ref)
        } else {
            Err(FetchError::new(
                error::WRAPPED,
                "neither a commit SHA, a branch name, a tag, nor a ref was specified, so it is \
                 impossible to identify a specific commit to download",
            ))
        }
    }
}

/// A binary attached to a release.
#[derive(Debug, Clone)]
pub struct ReleaseAsset {
    /// Forge-assigned asset id; only meaningful together with its repo.
    pub id: u64,
    /// Direct download URL.
    pub url: String,
    /// Asset filename.
    pub name: String,
}

/// Release metadata for one tag.
#[derive(Debug, Clone)]
pub struct Release {
    pub id: u64,
    pub url: String,
    pub name: String,
    pub assets: Vec<ReleaseAsset>,
}

/// The forge driver: one variant per supported API family.
#[derive(Debug, Clone)]
pub enum Forge {
    GitHub(GitHubSource),
    GitLab(GitLabSource),
}

impl Forge {
    /// Build the driver for the given source type.
    pub fn new(kind: SourceType, config: Config) -> Self {
        match kind {
            SourceType::GitHub => Forge::GitHub(GitHubSource::new(config)),
            SourceType::GitLab => Forge::GitLab(GitLabSource::new(config)),
        }
    }

    pub fn kind(&self) -> SourceType {
        match self {
            Forge::GitHub(_) => SourceType::GitHub,
            Forge::GitLab(_) => SourceType::GitLab,
        }
    }

    /// Parse a repository URL into a [`Repo`].
    pub fn parse_url(&self, repo_url: &str, token: &str) -> Result<Repo, FetchError> {
        match self {
            Forge::GitHub(s) => s.parse_url(repo_url, token),
            Forge::GitLab(s) => s.parse_url(repo_url, token),
        }
    }

    /// List all semver-parseable tag names, following pagination to the end.
    pub async fn fetch_tags(
        &self,
        repo_url: &str,
        token: &str,
    ) -> Result<Vec<String>, FetchError> {
        match self {
            Forge::GitHub(s) => s.fetch_tags(repo_url, token).await,
            Forge::GitLab(s) => s.fetch_tags(repo_url, token).await,
        }
    }

    /// Fetch release metadata for a tag.
    pub async fn get_release_info(
        &self,
        repo: &Repo,
        tag: &str,
    ) -> Result<Release, FetchError> {
        match self {
            Forge::GitHub(s) => s.get_release_info(repo, tag).await,
            Forge::GitLab(s) => s.get_release_info(repo, tag).await,
        }
    }

    /// Download one release asset to `dest_path`.
    pub async fn download_release_asset(
        &self,
        repo: &Repo,
        asset: &ReleaseAsset,
        dest_path: &Path,
        with_progress: bool,
    ) -> Result<(), FetchError> {
        match self {
            Forge::GitHub(s) => {
                s.download_release_asset(repo, asset, dest_path, with_progress)
                    .await
            }
            Forge::GitLab(s) => {
                s.download_release_asset(repo, asset, dest_path, with_progress)
                    .await
            }
        }
    }

    /// Build (but do not execute) the HTTP request for a ref's zip archive.
    pub fn make_archive_request(
        &self,
        commit: &Commit,
        token: &str,
    ) -> Result<reqwest::Request, FetchError> {
        match self {
            Forge::GitHub(s) => s.make_archive_request(commit, token),
            Forge::GitLab(s) => s.make_archive_request(commit, token),
        }
    }
}

/// The shared HTTP client used to execute archive requests built by
/// [`Forge::make_archive_request`].
pub fn http_client() -> &'static reqwest::Client {
    http::client()
}
