// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! GitLab-style driver.
//!
//! The API always lives under `<host>/api/v4`. Project namespaces can be
//! nested (`group/subgroup/project`), so the owner keeps every segment but
//! the last, and the full `owner/name` path is URL-encoded (`/` → `%2F`)
//! wherever the API wants a project id. Authentication uses the
//! `PRIVATE-TOKEN` header.

use std::path::Path;

use serde::Deserialize;

use crate::error::{self, FetchError};
use crate::version::Version;

use super::http::{self, Auth};
use super::{Commit, Config, Release, ReleaseAsset, Repo, SourceType};

/// Response shape of `GET /projects/:id/repository/tags`.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    name: String,
}

/// Response shape of `GET /projects/:id/releases/:tag`, reduced to what is
/// used. Uploaded binaries live under `assets.links`.
#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    name: Option<String>,
    #[serde(default)]
    assets: AssetsResponse,
}

#[derive(Debug, Default, Deserialize)]
struct AssetsResponse {
    #[serde(default)]
    links: Vec<AssetLink>,
}

#[derive(Debug, Deserialize)]
struct AssetLink {
    id: u64,
    name: String,
    url: String,
}

#[derive(Debug, Clone)]
pub struct GitLabSource;

impl GitLabSource {
    pub fn new(_config: Config) -> Self {
        // GitLab's API version is fixed at v4; the config's api_version only
        // applies to GitHub enterprise hosts.
        Self
    }

    /// Parse a repository URL into a [`Repo`], supporting nested subgroups.
    pub fn parse_url(&self, repo_url: &str, token: &str) -> Result<Repo, FetchError> {
        let malformed = |why: &str| {
            FetchError::new(
                error::REPO_URL_MALFORMED_OR_NOT_PARSEABLE,
                format!("GitLab repo URL {} could not be parsed ({})", repo_url, why),
            )
        };

        let parsed = url::Url::parse(repo_url).map_err(|_| malformed("not a valid URL"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(malformed("only http and https schemes are supported"));
        }

        let mut base_url = parsed
            .host_str()
            .ok_or_else(|| malformed("missing host"))?
            .to_string();
        if let Some(port) = parsed.port() {
            base_url = format!("{}:{}", base_url, port);
        }

        let path = parsed
            .path()
            .trim_matches('/')
            .trim_end_matches(".git");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(malformed("need at least a namespace and a project name"));
        }

        // The last segment is the project; everything before it is the
        // (possibly nested) namespace.
        let name = segments[segments.len() - 1].to_string();
        let owner = segments[..segments.len() - 1].join("/");

        Ok(Repo {
            url: repo_url.to_string(),
            scheme: parsed.scheme().to_string(),
            api_url: format!("{}/api/v4", base_url),
            base_url,
            owner,
            name,
            token: token.to_string(),
            source_type: SourceType::GitLab,
        })
    }

    /// List all semver tags, walking `Link: rel="next"` pagination.
    pub async fn fetch_tags(
        &self,
        repo_url: &str,
        token: &str,
    ) -> Result<Vec<String>, FetchError> {
        let repo = self.parse_url(repo_url, token)?;
        let project = encode_project_path(&repo.owner, &repo.name);
        let mut tags = Vec::new();

        let mut next = Some(format!(
            "{}://{}/projects/{}/repository/tags?per_page=100",
            repo.scheme, repo.api_url, project
        ));
        while let Some(url) = next {
            let response = http::get(&url, Auth::PrivateToken(&repo.token), None).await?;
            next = http::next_link(response.headers().get(reqwest::header::LINK));

            let page: Vec<TagsResponse> = response.json().await.map_err(FetchError::wrap)?;
            for tag in page {
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
        let project = encode_project_path(&repo.owner, &repo.name);
        let url = format!(
            "{}://{}/projects/{}/releases/{}",
            repo.scheme, repo.api_url, project, tag
        );
        let response = http::get(&url, Auth::PrivateToken(&repo.token), None).await?;
        let release: ReleaseResponse = response.json().await.map_err(FetchError::wrap)?;

        Ok(Release {
            id: 0,
            url: format!(
                "{}://{}/{}/{}/-/releases/{}",
                repo.scheme, repo.base_url, repo.owner, repo.name, tag
            ),
            name: release.name.unwrap_or_default(),
            assets: release
                .assets
                .links
                .into_iter()
                .map(|link| ReleaseAsset {
                    id: link.id,
                    url: link.url,
                    name: link.name,
                })
                .collect(),
        })
    }

    /// Download one release asset from its direct URL.
    pub async fn download_release_asset(
        &self,
        repo: &Repo,
        asset: &ReleaseAsset,
        dest_path: &Path,
        with_progress: bool,
    ) -> Result<(), FetchError> {
        let response = http::get(&asset.url, Auth::PrivateToken(&repo.token), None).await?;
        http::write_response_to_disk(response, dest_path, with_progress).await
    }

    /// Build the request for the archive of the commit's effective ref.
    pub fn make_archive_request(
        &self,
        commit: &Commit,
        token: &str,
    ) -> Result<reqwest::Request, FetchError> {
        let git_ref = commit.effective_ref()?;
        let project = encode_project_path(&commit.repo.owner, &commit.repo.name);
        let encoded_ref: String =
            url::form_urlencoded::byte_serialize(git_ref.as_bytes()).collect();
        let url = format!(
            "{}://{}/projects/{}/repository/archive.zip?sha={}",
            commit.repo.scheme, commit.repo.api_url, project, encoded_ref
        );
        Auth::PrivateToken(token)
            .apply(http::client().get(&url))
            .build()
            .map_err(FetchError::wrap)
    }
}

/// Percent-encode the `owner/name` project path the way the GitLab API
/// expects (every `/` becomes `%2F`).
fn encode_project_path(owner: &str, name: &str) -> String {
    let raw = format!("{}/{}", owner, name);
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> GitLabSource {
        GitLabSource::new(Config::default())
    }

    #[test]
    fn test_parse_url_simple_project() {
        let repo = source()
            .parse_url("https://gitlab.com/owner/project", "")
            .unwrap();
        assert_eq!(repo.owner, "owner");
        assert_eq!(repo.name, "project");
        assert_eq!(repo.api_url, "gitlab.com/api/v4");
    }

    #[test]
    fn test_parse_url_nested_groups() {
        let repo = source()
            .parse_url("https://gitlab.com/group/subgroup/project", "")
            .unwrap();
        assert_eq!(repo.owner, "group/subgroup");
        assert_eq!(repo.name, "project");
    }

    #[test]
    fn test_parse_url_strips_suffixes() {
        let repo = source()
            .parse_url("https://gitlab.com/group/project.git", "")
            .unwrap();
        assert_eq!(repo.name, "project");

        let repo = source()
            .parse_url("https://gitlab.com/group/project/", "")
            .unwrap();
        assert_eq!(repo.name, "project");
    }

    #[test]
    fn test_parse_url_self_hosted() {
        let repo = source()
            .parse_url("https://gitlab.mycompany.com/team/tool", "")
            .unwrap();
        assert_eq!(repo.api_url, "gitlab.mycompany.com/api/v4");
    }

    #[test]
    fn test_parse_url_rejects_bad_input() {
        let err = source().parse_url("https://gitlab.com/justowner", "").unwrap_err();
        assert_eq!(err.code(), error::REPO_URL_MALFORMED_OR_NOT_PARSEABLE);

        let err = source().parse_url("git@gitlab.com:owner/project.git", "").unwrap_err();
        assert_eq!(err.code(), error::REPO_URL_MALFORMED_OR_NOT_PARSEABLE);
    }

    #[test]
    fn test_encode_project_path() {
        assert_eq!(
            encode_project_path("group/subgroup", "project"),
            "group%2Fsubgroup%2Fproject"
        );
        assert_eq!(encode_project_path("owner", "my.project"), "owner%2Fmy.project");
    }

    #[test]
    fn test_make_archive_request_encodes_ref() {
        let repo = source()
            .parse_url("https://gitlab.com/group/subgroup/project", "")
            .unwrap();
        let commit = Commit {
            repo,
            git_ref: String::new(),
            git_tag: String::new(),
            branch_name: "feature/thing".to_string(),
            commit_sha: String::new(),
        };
        let request = source().make_archive_request(&commit, "tok").unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://gitlab.com/api/v4/projects/group%2Fsubgroup%2Fproject/repository/archive.zip?sha=feature%2Fthing"
        );
        assert_eq!(request.headers().get("PRIVATE-TOKEN").unwrap(), "tok");
    }
}
