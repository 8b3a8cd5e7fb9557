// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! forgefetch - download files, folders, and release assets from a specific
//! commit, branch, or tag of GitHub and GitLab repos, public or private,
//! hosted or self-hosted.
//!
//! The pipeline resolves the caller's ref (an exact commit, a branch, an
//! exact tag, or a version constraint matched against the repo's tag list),
//! downloads the archive of that ref, extracts the requested paths, and
//! fetches any matching release assets in parallel, optionally verifying
//! their digests.
//!
//! # Core Modules
//!
//! - [`fetch`] - The end-to-end pipeline and its options
//! - [`source`] - Forge drivers (GitHub-style and GitLab-style) and repo types
//! - [`version`] - Semver parsing and tag-constraint resolution
//! - [`archive`] - Zip extraction with path-prefix selection
//! - [`download`] - Archive and parallel asset downloading
//! - [`checksum`] - Release-asset digest verification
//! - [`error`] - The error type and code taxonomy

pub mod archive;
pub mod checksum;
pub mod download;
pub mod error;
pub mod fetch;
pub mod source;
pub mod version;

// Re-export the types most embedders need.
pub use error::{friendly_message, FetchError};
pub use fetch::FetchOptions;
pub use source::{Commit, Forge, Release, ReleaseAsset, Repo, SourceType};
pub use version::{is_specific_tag, latest_acceptable_tag, Constraint, Version};
