// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! HTTP plumbing shared by the forge drivers: the client, auth headers,
//! `Link`-header pagination, status-to-error mapping, and streaming a
//! response body to disk.

use std::path::Path;
use std::sync::{LazyLock, OnceLock};

use futures_util::StreamExt;
use regex::Regex;
use tokio::io::AsyncWriteExt;

use crate::download::progress::ByteCounter;
use crate::error::FetchError;

/// Shared HTTP client. Built once; forges reject requests without a
/// `User-Agent`, so one is always set.
///
/// # Panics
///
/// Panics if the client cannot be built, which only happens when the
/// system's TLS stack is fundamentally broken.
pub(crate) fn client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .user_agent(concat!("forgefetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build the HTTP client (broken TLS configuration?)")
    })
}

/// How a driver authenticates its requests. An empty token sends no header.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Auth<'a> {
    /// GitHub-style: `Authorization: token <t>`.
    GitHubToken(&'a str),
    /// GitLab-style: `PRIVATE-TOKEN: <t>`.
    PrivateToken(&'a str),
}

impl Auth<'_> {
    /// Attach the auth header, if a token is present.
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Auth::GitHubToken(token) if !token.is_empty() => {
                request.header(reqwest::header::AUTHORIZATION, format!("token {}", token))
            }
            Auth::PrivateToken(token) if !token.is_empty() => {
                request.header("PRIVATE-TOKEN", *token)
            }
            _ => request,
        }
    }
}

/// Perform a GET against a forge API endpoint, turning any non-200 response
/// into a [`FetchError`] whose code is the HTTP status and whose details
/// carry the response body.
pub(crate) async fn get(
    url: &str,
    auth: Auth<'_>,
    accept: Option<&str>,
) -> Result<reqwest::Response, FetchError> {
    let mut request = auth.apply(client().get(url));
    if let Some(accept) = accept {
        request = request.header(reqwest::header::ACCEPT, accept);
    }
    let response = request.send().await.map_err(FetchError::wrap)?;
    error_for_status(response, url).await
}

/// Pass a 200 response through; convert everything else into a status-coded
/// error carrying the body text.
pub(crate) async fn error_for_status(
    response: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response, FetchError> {
    if response.status() == reqwest::StatusCode::OK {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::from_status(
        status,
        format!(
            "received HTTP response {} while fetching {}. Full HTTP response: {}",
            status, url, body
        ),
    ))
}

static NEXT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<(.+?)>;\s*rel="next""#).expect("static regex"));

/// Extract the `rel="next"` URL from a `Link` header, if any.
///
/// The header looks like `<url>; rel="next", <url>; rel="last"`.
pub(crate) fn next_link(header: Option<&reqwest::header::HeaderValue>) -> Option<String> {
    let links = header?.to_str().ok()?;
    for link in links.split(',') {
        if let Some(captures) = NEXT_LINK_RE.captures(link) {
            return Some(captures[1].trim().to_string());
        }
    }
    None
}

/// Stream a response body to disk, optionally printing a running byte count
/// to stderr.
pub(crate) async fn write_response_to_disk(
    response: reqwest::Response,
    dest_path: &Path,
    with_progress: bool,
) -> Result<(), FetchError> {
    let total = response.content_length();
    let mut counter = if with_progress {
        Some(ByteCounter::new(total))
    } else {
        None
    };

    let mut out = tokio::fs::File::create(dest_path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::wrap)?;
        out.write_all(&chunk).await?;
        if let Some(counter) = counter.as_mut() {
            counter.add(chunk.len() as u64);
        }
    }
    out.flush().await?;

    if let Some(counter) = counter.take() {
        counter.finish();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_next_link_extracts_next_page() {
        let header = HeaderValue::from_static(
            "<https://api.github.com/repositories/1/tags?page=2>; rel=\"next\", \
             <https://api.github.com/repositories/1/tags?page=5>; rel=\"last\"",
        );
        assert_eq!(
            next_link(Some(&header)).as_deref(),
            Some("https://api.github.com/repositories/1/tags?page=2")
        );
    }

    #[test]
    fn test_next_link_absent() {
        let header = HeaderValue::from_static(
            "<https://api.github.com/repositories/1/tags?page=1>; rel=\"prev\"",
        );
        assert_eq!(next_link(Some(&header)), None);
        assert_eq!(next_link(None), None);
    }
}
