// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! The end-to-end fetch pipeline.
//!
//! Sequencing: validate the options, pick a forge driver, parse the repo
//! URL, list tags, resolve the tag constraint, then download whichever of
//! the two payload kinds were asked for — source paths out of the ref's
//! archive, and release assets (in parallel) — and finally verify digests
//! and optionally stream a single asset to stdout.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::archive::{self, ExtractOptions};
use crate::checksum;
use crate::download;
use crate::error::{self, FetchError};
use crate::source::{self, Commit, Config, Forge, ReleaseAsset, Repo, SourceType};
use crate::version;

/// Everything the caller asked for, assembled by the CLI layer.
///
/// Optional strings are empty when unset, mirroring how the flags arrive.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub repo_url: String,
    /// Generic git ref; lower precedence than commit, branch, and tag.
    pub git_ref: String,
    pub commit_sha: String,
    pub branch_name: String,
    /// Exact tag or version constraint expression.
    pub tag_constraint: String,
    pub github_token: String,
    pub gitlab_token: String,
    /// Forge selector: "auto", "github", or "gitlab".
    pub source_type: String,
    pub source_paths: Vec<String>,
    /// Regex (or verbatim filename) selecting release assets.
    pub release_asset: String,
    pub release_asset_checksums: HashSet<String>,
    pub release_asset_checksum_algo: String,
    pub stdout: bool,
    pub local_download_path: String,
    pub github_api_version: String,
    pub with_progress: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            git_ref: String::new(),
            commit_sha: String::new(),
            branch_name: String::new(),
            tag_constraint: String::new(),
            github_token: String::new(),
            gitlab_token: String::new(),
            source_type: "auto".to_string(),
            source_paths: Vec::new(),
            release_asset: String::new(),
            release_asset_checksums: HashSet::new(),
            release_asset_checksum_algo: String::new(),
            stdout: false,
            local_download_path: String::new(),
            github_api_version: "v3".to_string(),
            with_progress: false,
        }
    }
}

/// Reject option combinations that leave the caller's intent ambiguous.
pub fn validate_options(options: &FetchOptions) -> Result<(), FetchError> {
    let usage = |msg: &str| FetchError::new(error::WRAPPED, msg.to_string());

    if options.repo_url.is_empty() {
        return Err(usage(
            "the --repo flag is required. Run \"forgefetch --help\" for full usage info",
        ));
    }
    if options.local_download_path.is_empty() {
        return Err(usage(
            "missing required argument specifying the local download path. Run \
             \"forgefetch --help\" for full usage info",
        ));
    }
    if options.git_ref.is_empty()
        && options.tag_constraint.is_empty()
        && options.commit_sha.is_empty()
        && options.branch_name.is_empty()
    {
        return Err(usage(
            "you must specify at least one of --ref, --tag, --commit, or --branch. Run \
             \"forgefetch --help\" for full usage info",
        ));
    }
    if !options.release_asset.is_empty() && options.tag_constraint.is_empty() {
        return Err(usage(
            "the --release-asset flag can only be used with --tag. Run \"forgefetch --help\" \
             for full usage info",
        ));
    }
    if !options.release_asset_checksums.is_empty()
        && options.release_asset_checksum_algo.is_empty()
    {
        return Err(usage(
            "if --release-asset-checksum is set, you must also enter a value for \
             --release-asset-checksum-algo",
        ));
    }
    source::parse_source_type(&options.source_type)?;
    Ok(())
}

/// Run the whole pipeline.
pub async fn run(options: &FetchOptions) -> Result<(), FetchError> {
    validate_options(options)?;

    let source_type = match source::parse_source_type(&options.source_type)? {
        Some(explicit) => explicit,
        None => source::detect_source_type(&options.repo_url)?,
    };

    // GitHub tokens stay the fallback for GitLab targets: self-hosted setups
    // sometimes configure only the one variable.
    let token = match source_type {
        SourceType::GitLab if !options.gitlab_token.is_empty() => options.gitlab_token.clone(),
        _ => options.github_token.clone(),
    };

    let api_version = if options.github_api_version.is_empty() {
        Config::default().api_version
    } else {
        options.github_api_version.clone()
    };
    let forge = Forge::new(source_type, Config { api_version });
    tracing::info!("Using {} source for {}", forge.kind(), options.repo_url);

    let repo = forge.parse_url(&options.repo_url, &token)?;
    let tags = forge.fetch_tags(&options.repo_url, &token).await?;

    let desired_tag = resolve_desired_tag(options, &tags)?;

    let mut source_paths = options.source_paths.clone();
    if source_paths.is_empty() && options.release_asset.is_empty() {
        // Nothing was selected explicitly, so take the whole repo.
        source_paths.push("/".to_string());
    }

    if !source_paths.is_empty() {
        download_source_paths(&forge, &repo, options, &source_paths, &desired_tag, &token)
            .await?;
    }

    let mut asset_paths = Vec::new();
    if !options.release_asset.is_empty() {
        asset_paths = download_matching_assets(&forge, &repo, options, &desired_tag).await?;
    }

    if !options.release_asset_checksums.is_empty() {
        for asset_path in &asset_paths {
            checksum::verify_checksum_of_release_asset(
                asset_path,
                &options.release_asset_checksums,
                &options.release_asset_checksum_algo,
            )?;
        }
    }

    if options.stdout {
        match asset_paths.len() {
            1 => stream_to_stdout(&asset_paths[0])?,
            0 => tracing::warn!("No assets downloaded. Ignoring --stdout"),
            _ => tracing::warn!("Multiple assets were downloaded. Ignoring --stdout"),
        }
    }

    Ok(())
}

/// Turn the user's ref/constraint input into the concrete tag to fetch.
///
/// A generic `--ref` takes precedence over `--tag` as the expression to
/// inspect; either way, a specific tag is used verbatim and a range is
/// resolved against the repository's tag list.
fn resolve_desired_tag(
    options: &FetchOptions,
    tags: &[String],
) -> Result<String, FetchError> {
    let expression = if !options.git_ref.is_empty() {
        &options.git_ref
    } else {
        &options.tag_constraint
    };

    let (specific, desired_tag) = version::is_specific_tag(expression);
    if specific {
        Ok(desired_tag)
    } else {
        version::latest_acceptable_tag(expression, tags)
    }
}

async fn download_source_paths(
    forge: &Forge,
    repo: &Repo,
    options: &FetchOptions,
    source_paths: &[String],
    desired_tag: &str,
    token: &str,
) -> Result<(), FetchError> {
    let commit = Commit {
        repo: repo.clone(),
        git_ref: desired_tag.to_string(),
        git_tag: desired_tag.to_string(),
        branch_name: options.branch_name.clone(),
        commit_sha: options.commit_sha.clone(),
    };

    if !commit.commit_sha.is_empty() {
        tracing::info!("Downloading commit \"{}\" of {} ...", commit.commit_sha, repo.url);
    } else if !commit.branch_name.is_empty() {
        tracing::info!(
            "Downloading latest commit from branch \"{}\" of {} ...",
            commit.branch_name,
            repo.url
        );
    } else {
        tracing::info!("Downloading tag \"{}\" of {} ...", desired_tag, repo.url);
    }

    // The archive value owns its temp dir; it is cleaned up when this
    // function returns, extracted or not.
    let downloaded = download::download_archive(forge, &commit, token).await?;

    for source_path in source_paths {
        tracing::info!(
            "Extracting files from <repo>{} to {} ...",
            source_path,
            options.local_download_path
        );
        let file_count = archive::extract_files(
            downloaded.zip_path(),
            source_path,
            Path::new(&options.local_download_path),
            &ExtractOptions::default(),
        )?;
        tracing::info!(
            "{} file{} extracted",
            file_count,
            if file_count == 1 { "" } else { "s" }
        );
    }

    tracing::info!("Download and extraction complete.");
    Ok(())
}

async fn download_matching_assets(
    forge: &Forge,
    repo: &Repo,
    options: &FetchOptions,
    tag: &str,
) -> Result<Vec<PathBuf>, FetchError> {
    let release = forge.get_release_info(repo, tag).await?;
    let matching = match_assets(&release.assets, &options.release_asset)?;
    if matching.is_empty() {
        return Err(FetchError::new(
            error::WRAPPED,
            format!(
                "no assets matching \"{}\" in release {}",
                options.release_asset, tag
            ),
        ));
    }

    let dest_dir = Path::new(&options.local_download_path);
    fs::create_dir_all(dest_dir)?;

    let results = download::download_release_assets(
        forge,
        repo,
        matching,
        dest_dir,
        options.with_progress,
    )
    .await;

    // Partial success is still success: the caller gets every path that made
    // it, and the failures are reported as one composed message.
    let mut asset_paths = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result.error {
            None => asset_paths.push(result.asset_path),
            Some(err) => failures.push(format!("{}: {}", result.asset_path.display(), err)),
        }
    }
    if !failures.is_empty() {
        tracing::error!(
            "{} errors downloading assets:\n\t{}",
            failures.len(),
            failures.join("\n\t")
        );
    }
    tracing::info!("Download of release assets complete");

    Ok(asset_paths)
}

/// Select assets by regex, also accepting the pattern as a verbatim
/// filename.
///
/// Filenames like `tool-v1.2.3+linux.zip` are legal asset names but broken
/// regexes-in-spirit, so when compilation fails the string gets one more
/// chance as an exact literal before the compile error surfaces.
fn match_assets(
    assets: &[ReleaseAsset],
    pattern: &str,
) -> Result<Vec<ReleaseAsset>, FetchError> {
    match Regex::new(pattern) {
        Ok(re) => Ok(assets
            .iter()
            .filter(|a| re.is_match(&a.name) || a.name == pattern)
            .cloned()
            .collect()),
        Err(compile_err) => {
            let literal: Vec<ReleaseAsset> = assets
                .iter()
                .filter(|a| a.name == pattern)
                .cloned()
                .collect();
            if literal.is_empty() {
                Err(FetchError::new(
                    error::WRAPPED,
                    format!("invalid asset regex \"{}\": {}", pattern, compile_err),
                ))
            } else {
                Ok(literal)
            }
        }
    }
}

fn stream_to_stdout(asset_path: &Path) -> Result<(), FetchError> {
    let mut file = File::open(asset_path)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    io::copy(&mut file, &mut handle)?;
    Ok(())
}
