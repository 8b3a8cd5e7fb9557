// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! GitHub-style driver, covering both github.com and enterprise instances.
//!
//! On the canonical hosts the API lives at `api.github.com`; any other host
//! is assumed to be an enterprise installation whose API is served from
//! `<host>/api/<version>` (`v3` unless overridden).

use std::path::Path;

use serde::Deserialize;

use crate::error::{self, FetchError};
use crate::version::Version;

use super::http::{self, Auth};
use super::{Commit, Config, Release, ReleaseAsset, Repo, SourceType};

/// Response shape of `GET /repos/:owner/:repo/tags`, reduced to the fields
/// used here.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    name: String,
}

/// Response shape of `GET /repos/:owner/:repo/releases/tags/:tag`.
#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    url: String,
    name: Option<String>,
    #[serde(default)]
    assets: Vec<AssetResponse>,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    id: u64,
    url: String,
    name: String,
}

#[derive(Debug, Clone)]
pub struct GitHubSource {
    api_version: String,
}

impl GitHubSource {
    pub fn new(config: Config) -> Self {
        Self {
            api_version: config.api_version,
        }
    }

    /// Parse a repository URL into a [`Repo`].
    pub fn parse_url(&self, repo_url: &str, token: &str) -> Result<Repo, FetchError> {
        let (scheme, base_url, owner, name) = split_repo_url(repo_url)?;

        let api_url = if base_url == "github.com" || base_url == "www.github.com" {
            "api.github.com".to_string()
        } else {
            tracing::info!(
                "Assuming GitHub Enterprise since the provided url ({}) does not appear to be for github.com",
                repo_url
            );
            format!("{}/api/{}", base_url, self.api_version)
        };

        Ok(Repo {
            url: repo_url.to_string(),
            scheme,
            base_url,
            api_url,
            owner,
            name,
            token: token.to_string(),
            source_type: SourceType::GitHub,
        })
    }

    /// List all semver tags, walking `Link: rel="next"` pagination.
    pub async fn fetch_tags(
        &self,
        repo_url: &str,
        token: &str,
    ) -> Result<Vec<String>, FetchError> {
        let repo = self.parse_url(repo_url, token)?;
        let mut tags = Vec::new();

        // per_page=100 is the API maximum; fewer round trips.
        let mut next = Some(format!(
            "{}://{}/repos/{}/{}/tags?per_page=100",
            repo.scheme, repo.api_url, repo.owner, repo.name
        ));
        while let Some(url) = next {
            let response = http::get(&url, Auth::GitHubToken(&repo.token), None).await?;
            next = http::next_link(response.headers().get(reqwest::header::LINK));

            let page: Vec<TagsResponse> = response.json().await.map_err(FetchError::wrap)?;
            for tag in page {
                // Tags that are not semantically versioned are skipped so
                // they cannot break constraint resolution later.
                if Version::parse(&tag.name).is_ok() {
                    tags.push(tag.name);
                }
            }
        }

        Ok(tags)
    }

    /// Fetch release metadata for a tag.
    pub async fn get_release_info(
        &self,
        repo: &Repo,
        tag: &str,
    ) -> Result<Release, FetchError> {
        let url = format!(
            "{}://{}/repos/{}/{}/releases/tags/{}",
            repo.scheme, repo.api_url, repo.owner, repo.name, tag
        );
        let response = http::get(&url, Auth::GitHubToken(&repo.token), None).await?;
        let release: ReleaseResponse = response.json().await.map_err(FetchError::wrap)?;

        Ok(Release {
            id: release.id,
            url: release.url,
            name: release.name.unwrap_or_default(),
            assets: release
                .assets
                .into_iter()
                .map(|a| ReleaseAsset {
                    id: a.id,
                    url: a.url,
                    name: a.name,
                })
                .collect(),
        })
    }

    /// Download one release asset via the assets endpoint.
    ///
    /// `Accept: application/octet-stream` makes the API serve the binary
    /// itself rather than the asset's JSON description.
    pub async fn download_release_asset(
        &self,
        repo: &Repo,
        asset: &ReleaseAsset,
        dest_path: &Path,
        with_progress: bool,
    ) -> Result<(), FetchError> {
        let url = format!(
            "{}://{}/repos/{}/{}/releases/assets/{}",
            repo.scheme, repo.api_url, repo.owner, repo.name, asset.id
        );
        let response = http::get(
            &url,
            Auth::GitHubToken(&repo.token),
            Some("application/octet-stream"),
        )
        .await?;
        http::write_response_to_disk(response, dest_path, with_progress).await
    }

    /// Build the request for the zipball of the commit's effective ref.
    pub fn make_archive_request(
        &self,
        commit: &Commit,
        token: &str,
    ) -> Result<reqwest::Request, FetchError> {
        let git_ref = commit.effective_ref()?;
        let url = format!(
            "{}://{}/repos/{}/{}/zipball/{}",
            commit.repo.scheme, commit.repo.api_url, commit.repo.owner, commit.repo.name, git_ref
        );
        Auth::GitHubToken(token)
            .apply(http::client().get(&url))
            .build()
            .map_err(FetchError::wrap)
    }
}

/// Split an http(s) repository URL into (scheme, host, owner, name).
fn split_repo_url(repo_url: &str) -> Result<(String, String, String, String), FetchError> {
    let malformed = || {
        FetchError::new(
            error::REPO_URL_MALFORMED_OR_NOT_PARSEABLE,
            format!("repo URL {} is malformed or could not be parsed", repo_url),
        )
    };

    let parsed = url::Url::parse(repo_url).map_err(|_| malformed())?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::new(
            error::REPO_URL_MALFORMED_OR_NOT_PARSEABLE,
            format!(
                "repo URL {} uses the unsupported scheme \"{}\" (only http and https work)",
                repo_url,
                parsed.scheme()
            ),
        ));
    }

    let mut base_url = parsed.host_str().ok_or_else(malformed)?.to_string();
    if let Some(port) = parsed.port() {
        base_url = format!("{}:{}", base_url, port);
    }

    let mut segments = parsed
        .path_segments()
        .ok_or_else(malformed)?
        .filter(|s| !s.is_empty());
    let owner = segments.next().ok_or_else(malformed)?.to_string();
    let name = segments
        .next()
        .ok_or_else(malformed)?
        .trim_end_matches(".git")
        .to_string();
    if owner.is_empty() || name.is_empty() {
        return Err(malformed());
    }

    Ok((parsed.scheme().to_string(), base_url, owner, name))
}
