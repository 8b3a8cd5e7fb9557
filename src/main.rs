// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

use anyhow::{anyhow, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use forgefetch::fetch::{self, FetchOptions};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes: success, or a single failure code. The error text on stderr
/// carries the distinction between failure classes.
mod exit_codes {
    pub const ERROR: i32 = 1;
}

#[derive(Parser)]
#[command(name = "forgefetch")]
#[command(version = VERSION)]
#[command(
    about = "forgefetch makes it easy to download files, folders, and release assets from a \
             specific git commit, branch, or tag of public and private GitHub and GitLab repos."
)]
#[command(
    override_usage = "forgefetch [OPTIONS] <LOCAL_DOWNLOAD_PATH>"
)]
struct Cli {
    /// Fully qualified URL of the repo to fetch from. Required.
    #[arg(long)]
    repo: Option<String>,

    /// The git reference to download. If specified, takes lower precedence
    /// than --commit, --branch, and --tag.
    #[arg(long = "ref")]
    git_ref: Option<String>,

    /// The specific git commit SHA to download. Overrides --branch and --tag.
    #[arg(long)]
    commit: Option<String>,

    /// The git branch from which to download; the latest commit on the
    /// branch is used. Overrides --tag.
    #[arg(long)]
    branch: Option<String>,

    /// The git tag to download, either exact (e.g. "v1.0.7") or a version
    /// constraint expression (e.g. "~> 1.0"). Blank means the latest tag.
    #[arg(long)]
    tag: Option<String>,

    /// A source path to download from the repo. If neither this nor
    /// --release-asset is specified, all files are downloaded. Repeatable.
    #[arg(long = "source-path")]
    source_path: Vec<String>,

    /// Regex matching the name of a release asset (a binary uploaded to a
    /// release) to download. Only works with --tag.
    #[arg(long = "release-asset")]
    release_asset: Option<String>,

    /// A checksum the release asset should have, as lowercase hex. When any
    /// are given, each downloaded asset must match one of them. Repeatable.
    #[arg(long = "release-asset-checksum")]
    release_asset_checksum: Vec<String>,

    /// Algorithm for computing asset checksums: "sha256" or "sha512".
    #[arg(long = "release-asset-checksum-algo")]
    release_asset_checksum_algo: Option<String>,

    /// A GitHub Personal Access Token, required for private GitHub repos.
    #[arg(long = "github-oauth-token", env = "GITHUB_OAUTH_TOKEN", hide_env_values = true)]
    github_oauth_token: Option<String>,

    /// A GitLab Personal Access Token, required for private GitLab repos.
    #[arg(long = "gitlab-token", env = "GITLAB_TOKEN", hide_env_values = true)]
    gitlab_token: Option<String>,

    /// The source type to use: "github", "gitlab", or "auto" (detect from
    /// the URL host).
    #[arg(long, short = 's', default_value = "auto")]
    source: String,

    /// API version of the GitHub instance; only used for enterprise hosts.
    #[arg(long = "github-api-version", default_value = "v3")]
    github_api_version: String,

    /// Display download progress on stderr; useful for large files.
    #[arg(long)]
    progress: bool,

    /// Write the single downloaded release asset to standard output so it
    /// can be piped into another command.
    #[arg(long)]
    stdout: bool,

    /// Logging level: trace, debug, info, warn, error, fatal, or panic.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    /// The local path to download into. The legacy two-argument form
    /// ("<source-path> <path>") is still accepted.
    #[arg(value_name = "LOCAL_DOWNLOAD_PATH")]
    paths: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(message) = init_logging(&cli.log_level) {
        eprintln!("{} {}", "[x]".red(), message);
        std::process::exit(exit_codes::ERROR);
    }

    let options = build_options(cli);
    if let Err(err) = fetch::run(&options).await {
        let message =
            forgefetch::friendly_message(&err).unwrap_or_else(|| err.details().to_string());
        eprintln!("{} {}", "[x]".red(), message);
        std::process::exit(exit_codes::ERROR);
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        // fatal and panic exist for compatibility; everything at or above
        // error is reported the same way.
        "error" | "fatal" | "panic" => "error",
        other => {
            return Err(anyhow!(
                "invalid --log-level \"{}\" (expected trace, debug, info, warn, error, fatal, \
                 or panic)",
                other
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn build_options(cli: Cli) -> FetchOptions {
    let mut source_paths = cli.source_path;
    let mut local_download_path = cli.paths.first().cloned().unwrap_or_default();

    // Old releases took the source path as an optional first positional arg.
    if cli.paths.len() == 2 {
        tracing::warn!(
            "DEPRECATION WARNING: passing source paths via command-line args is deprecated. \
             Please use the --source-path option instead!"
        );
        source_paths = vec![cli.paths[0].clone()];
        local_download_path = cli.paths[1].clone();
    }

    FetchOptions {
        repo_url: cli.repo.unwrap_or_default(),
        git_ref: cli.git_ref.unwrap_or_default(),
        commit_sha: cli.commit.unwrap_or_default(),
        branch_name: cli.branch.unwrap_or_default(),
        tag_constraint: cli.tag.unwrap_or_default(),
        github_token: cli.github_oauth_token.unwrap_or_default(),
        gitlab_token: cli.gitlab_token.unwrap_or_default(),
        source_type: cli.source,
        source_paths,
        release_asset: cli.release_asset.unwrap_or_default(),
        release_asset_checksums: cli.release_asset_checksum.into_iter().collect(),
        release_asset_checksum_algo: cli.release_asset_checksum_algo.unwrap_or_default(),
        stdout: cli.stdout,
        local_download_path,
        github_api_version: cli.github_api_version,
        with_progress: cli.progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_options_single_positional_is_destination() {
        let cli = Cli::parse_from([
            "forgefetch",
            "--repo",
            "https://github.com/owner/repo",
            "--tag",
            "v1.0.0",
            "/tmp/out",
        ]);
        let options = build_options(cli);
        assert_eq!(options.local_download_path, "/tmp/out");
        assert!(options.source_paths.is_empty());
    }

    #[test]
    fn test_build_options_legacy_two_positionals() {
        let cli = Cli::parse_from([
            "forgefetch",
            "--repo",
            "https://github.com/owner/repo",
            "--tag",
            "v1.0.0",
            "/modules/app",
            "/tmp/out",
        ]);
        let options = build_options(cli);
        assert_eq!(options.source_paths, vec!["/modules/app".to_string()]);
        assert_eq!(options.local_download_path, "/tmp/out");
    }

    #[test]
    fn test_build_options_collects_repeated_flags() {
        let cli = Cli::parse_from([
            "forgefetch",
            "--repo",
            "https://github.com/owner/repo",
            "--tag",
            "v1.0.0",
            "--source-path",
            "/a",
            "--source-path",
            "/b",
            "--release-asset-checksum",
            "aaaa",
            "--release-asset-checksum",
            "bbbb",
            "--release-asset-checksum-algo",
            "sha256",
            "/tmp/out",
        ]);
        let options = build_options(cli);
        assert_eq!(options.source_paths.len(), 2);
        assert_eq!(options.release_asset_checksums.len(), 2);
        assert_eq!(options.release_asset_checksum_algo, "sha256");
    }
}
