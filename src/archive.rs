// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Extraction of forge-produced zip archives.
//!
//! Forge archive endpoints wrap the whole tree in a single top-level
//! directory named after the commit (e.g. `owner-repo-a1b2c3d/`). That name
//! is not predictable, so it is discovered from the first entry and stripped
//! before the caller's source path is applied. Extraction runs in two passes:
//! regular files and directories first, symlinks second, so that links whose
//! targets live elsewhere in the same archive resolve once created.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{self, FetchError};

/// Extraction behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Replace each symlink with a copy of its target instead of recreating
    /// the link. A link to a directory becomes a directory with the target's
    /// contents copied in.
    pub resolve_symlinks: bool,
}

/// Extract the entries under `source_path` from a zip archive into
/// `dest_path`, returning how many regular files were written.
///
/// `source_path` is relative to the repository root (`"/"` selects
/// everything). When it names a single file, `dest_path` may itself be a file
/// path; the parent directory is created as needed. Directories are created
/// mode `0o777` (subject to umask) and files are written mode `0o644` —
/// forge archives do not carry reliable mode bits, so none are preserved.
pub fn extract_files(
    zip_file_path: &Path,
    source_path: &str,
    dest_path: &Path,
    options: &ExtractOptions,
) -> Result<usize, FetchError> {
    let file = File::open(zip_file_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(FetchError::wrap)?;

    if archive.is_empty() {
        return Err(FetchError::new(
            error::FAILED_TO_DOWNLOAD_FILE,
            format!(
                "the archive at {} contains no entries",
                zip_file_path.display()
            ),
        ));
    }

    // By convention the first entry reveals the single top-level directory
    // every forge wraps the tree in.
    let stripping_root = {
        let first = archive.by_index(0).map_err(FetchError::wrap)?;
        first
            .name()
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string()
    };

    let trimmed = source_path.trim_matches('/');
    let prefix = if trimmed.is_empty() {
        stripping_root
    } else {
        format!("{}/{}", stripping_root, trimmed)
    };
    let prefix_dir = format!("{}/", prefix);

    let mut file_count = 0usize;
    let mut symlinks: Vec<(PathBuf, Vec<u8>)> = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(FetchError::wrap)?;
        let name = entry.name().to_string();

        let is_single_file_match = !entry.is_dir() && name == prefix;
        if !is_single_file_match && !name.starts_with(&prefix_dir) {
            continue;
        }

        let relative = name
            .strip_prefix(&prefix)
            .unwrap_or("")
            .trim_start_matches('/');
        reject_unsafe_path(&name, relative)?;
        let target = if relative.is_empty() {
            dest_path.to_path_buf()
        } else {
            dest_path.join(relative)
        };

        if entry.is_dir() {
            create_dir_all_world_writable(&target)?;
        } else if is_symlink_mode(entry.unix_mode()) {
            let mut payload = Vec::new();
            io::copy(&mut entry, &mut payload)?;
            symlinks.push((target, payload));
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = create_file_world_readable(&target)?;
            io::copy(&mut entry, &mut out)?;
            file_count += 1;
        }
    }

    for (link_path, payload) in symlinks {
        if options.resolve_symlinks {
            materialize_symlink_as_copy(&link_path, &payload, dest_path)?;
        } else {
            materialize_symlink(&link_path, &payload)?;
        }
    }

    Ok(file_count)
}

/// Reject entries whose path would land outside the destination root.
fn reject_unsafe_path(entry_name: &str, relative: &str) -> Result<(), FetchError> {
    let ok = Path::new(relative)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(())
    } else {
        Err(FetchError::new(
            error::UNSAFE_ARCHIVE_PATH,
            format!(
                "refusing to extract \"{}\": entry path escapes the destination directory",
                entry_name
            ),
        ))
    }
}

fn is_symlink_mode(unix_mode: Option<u32>) -> bool {
    matches!(unix_mode, Some(mode) if mode & 0o170000 == 0o120000)
}

#[cfg(unix)]
fn create_dir_all_world_writable(path: &Path) -> io::Result<()> {
    use std::fs::DirBuilder;
    use std::os::unix::fs::DirBuilderExt;
    DirBuilder::new().recursive(true).mode(0o777).create(path)
}

#[cfg(not(unix))]
fn create_dir_all_world_writable(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn create_file_world_readable(path: &Path) -> io::Result<File> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
}

#[cfg(not(unix))]
fn create_file_world_readable(path: &Path) -> io::Result<File> {
    File::create(path)
}

/// Recreate an archive symlink on disk. The payload bytes of the entry are
/// the link target, relative to the link's own directory.
#[cfg(unix)]
fn materialize_symlink(link_path: &Path, payload: &[u8]) -> Result<(), FetchError> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    if let Some(parent) = link_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if link_path.symlink_metadata().is_ok() {
        fs::remove_file(link_path)?;
    }
    std::os::unix::fs::symlink(OsStr::from_bytes(payload), link_path)?;
    Ok(())
}

#[cfg(not(unix))]
fn materialize_symlink(link_path: &Path, payload: &[u8]) -> Result<(), FetchError> {
    // No symlink support; fall back to writing the target string as a file.
    if let Some(parent) = link_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(link_path, payload)?;
    Ok(())
}

/// Replace a symlink entry with a copy of whatever it points at.
fn materialize_symlink_as_copy(
    link_path: &Path,
    payload: &[u8],
    dest_root: &Path,
) -> Result<(), FetchError> {
    let target_rel = String::from_utf8_lossy(payload).to_string();
    let parent = link_path.parent().unwrap_or(dest_root).to_path_buf();
    let resolved = parent.join(&target_rel);

    let resolved = resolved.canonicalize().map_err(|e| {
        FetchError::new(
            error::UNSAFE_ARCHIVE_PATH,
            format!(
                "cannot resolve symlink target \"{}\" for {}: {}",
                target_rel,
                link_path.display(),
                e
            ),
        )
    })?;
    let root = dest_root.canonicalize()?;
    if !resolved.starts_with(&root) {
        return Err(FetchError::new(
            error::UNSAFE_ARCHIVE_PATH,
            format!(
                "refusing to copy symlink target \"{}\": it resolves outside the destination",
                target_rel
            ),
        ));
    }

    if resolved.is_dir() {
        copy_dir_recursive(&resolved, link_path)?;
    } else {
        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&resolved, link_path)?;
    }
    Ok(())
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
