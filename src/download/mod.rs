// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Downloading: the ref archive and the parallel release-asset fan-out.
//!
//! The archive lands in a fresh temporary directory whose lifetime is tied
//! to the returned [`DownloadedArchive`]; dropping it removes the directory
//! no matter how the fetch ends. Release assets download concurrently, one
//! task per asset, each reporting a single result record over a bounded
//! channel that the caller drains after every task has finished.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::error::{self, FetchError};
use crate::source::{Commit, Forge, ReleaseAsset, Repo, SourceType};

pub mod progress;

/// A downloaded ref archive. The backing temporary directory is removed when
/// this value drops, on success and failure alike.
#[derive(Debug)]
pub struct DownloadedArchive {
    zip_path: PathBuf,
    _temp_dir: TempDir,
}

impl DownloadedArchive {
    pub fn zip_path(&self) -> &Path {
        &self.zip_path
    }
}

/// Download the zip archive for a commit into a new temporary directory.
///
/// GitHub-style endpoints are additionally checked for an `application/zip`
/// content type: a 200 with HTML in it (a login page, say) must not be
/// handed to the extractor as if it were an archive.
pub async fn download_archive(
    forge: &Forge,
    commit: &Commit,
    token: &str,
) -> Result<DownloadedArchive, FetchError> {
    let request = forge.make_archive_request(commit, token)?;
    let url = request.url().to_string();
    tracing::debug!("Downloading ZIP archive: {}", url);

    let response = crate::source::http_client()
        .execute(request)
        .await
        .map_err(FetchError::wrap)?;

    if response.status() != reqwest::StatusCode::OK {
        let status = response.status().as_u16();
        return Err(FetchError::new(
            error::FAILED_TO_DOWNLOAD_FILE,
            format!(
                "failed to download the archive at {}. Received HTTP response {}",
                url, status
            ),
        ));
    }

    if forge.kind() == SourceType::GitHub {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content_type != "application/zip" {
            return Err(FetchError::new(
                error::FAILED_TO_DOWNLOAD_FILE,
                format!(
                    "failed to download the archive at {}. Expected the response's \
                     \"Content-Type\" header to be \"application/zip\", but it was \"{}\"",
                    url, content_type
                ),
            ));
        }
    }

    let temp_dir = tempfile::tempdir()?;
    let zip_path = temp_dir.path().join("repo.zip");
    crate::source::http::write_response_to_disk(response, &zip_path, false).await?;

    Ok(DownloadedArchive {
        zip_path,
        _temp_dir: temp_dir,
    })
}

/// Outcome of one asset download task.
#[derive(Debug)]
pub struct AssetDownloadResult {
    /// Where the asset was (or would have been) written.
    pub asset_path: PathBuf,
    /// `None` on success.
    pub error: Option<FetchError>,
}

/// Download the given release assets concurrently, one task per asset.
///
/// Every task reports exactly one [`AssetDownloadResult`]; the returned list
/// contains one record per asset in no particular order. Failures do not
/// abort the other downloads.
pub async fn download_release_assets(
    forge: &Forge,
    repo: &Repo,
    assets: Vec<ReleaseAsset>,
    dest_dir: &Path,
    with_progress: bool,
) -> Vec<AssetDownloadResult> {
    let (tx, mut rx) = mpsc::channel(assets.len().max(1));
    let mut handles = Vec::with_capacity(assets.len());

    for asset in assets {
        let forge = forge.clone();
        let repo = repo.clone();
        let tx = tx.clone();
        let asset_path = dest_dir.join(&asset.name);

        handles.push(tokio::spawn(async move {
            tracing::info!(
                "Downloading asset {} to {}",
                asset.name,
                asset_path.display()
            );
            let outcome = forge
                .download_release_asset(&repo, &asset, &asset_path, with_progress)
                .await;
            match &outcome {
                Ok(()) => tracing::info!("Downloaded {}", asset_path.display()),
                Err(err) => tracing::error!("Download failed for {}: {}", asset.name, err),
            }
            // The channel is sized to the task count, so this cannot block.
            let _ = tx
                .send(AssetDownloadResult {
                    asset_path,
                    error: outcome.err(),
                })
                .await;
        }));
    }
    drop(tx);

    for handle in handles {
        // A panicked task simply produces no result record.
        let _ = handle.await;
    }

    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    results
}
