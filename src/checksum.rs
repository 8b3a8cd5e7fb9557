// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Digest computation and verification for downloaded release assets.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256, Sha512};

use crate::error::{self, FetchError};

/// Compute the digest of a file under the named algorithm.
///
/// Supported algorithms are `sha256` and `sha512`. The file is streamed
/// through the hasher, so asset size does not matter. Returns lowercase hex.
pub fn compute_checksum(file_path: &Path, algorithm: &str) -> Result<String, FetchError> {
    match algorithm {
        "sha256" => hash_file::<Sha256>(file_path),
        "sha512" => hash_file::<Sha512>(file_path),
        other => Err(FetchError::new(
            error::UNSUPPORTED_CHECKSUM_ALGORITHM,
            format!("the checksum algorithm \"{}\" is not supported", other),
        )),
    }
}

/// Verify that a downloaded release asset's digest is one of the accepted
/// values.
///
/// The caller passes a set rather than a single value: when several binaries
/// are downloaded against one tag, each of them only has to match one of the
/// checksums shipped for that tag.
pub fn verify_checksum_of_release_asset(
    asset_path: &Path,
    checksums: &HashSet<String>,
    algorithm: &str,
) -> Result<(), FetchError> {
    let computed = compute_checksum(asset_path, algorithm)?;
    if !checksums.contains(&computed) {
        let mut expected: Vec<&str> = checksums.iter().map(String::as_str).collect();
        expected.sort_unstable();
        return Err(FetchError::new(
            error::CHECKSUM_DOES_NOT_MATCH,
            format!(
                "expected the checksum to be one of {:?}, but instead got {} for the release \
                 asset at {}. This means that either you are using the wrong checksum value in \
                 your call (e.g. did you update the version of the module you're installing but \
                 not the checksum?) or that someone has replaced the asset with a potentially \
                 dangerous one and you should be very careful about proceeding.",
                expected,
                computed,
                asset_path.display()
            ),
        ));
    }
    tracing::info!("Release asset checksum verified for {}", asset_path.display());
    Ok(())
}

fn hash_file<D: Digest>(file_path: &Path) -> Result<String, FetchError> {
    let mut file = File::open(file_path).map_err(computing_error)?;
    let mut hasher = D::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer).map_err(computing_error)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn computing_error(err: std::io::Error) -> FetchError {
    FetchError::new(error::ERROR_WHILE_COMPUTING_CHECKSUM, err.to_string()).with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // shasum -a 256 / -a 512 over the literal bytes "hello world\n"
    const HELLO_SHA256: &str =
        "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";
    const HELLO_SHA512: &str =
        "db3974a97f2407b7cae1ae637c0030687a11913274d578492558e39c16c017de84eacdc8c62fe34ee4e12b4b1428817f09b6a2760c3f8a664ceae94d2434a593";

    fn hello_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("hello.txt");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"hello world\n").unwrap();
        path
    }

    #[test]
    fn test_compute_checksum_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = hello_file(&dir);
        assert_eq!(compute_checksum(&path, "sha256").unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_compute_checksum_sha512() {
        let dir = tempfile::tempdir().unwrap();
        let path = hello_file(&dir);
        assert_eq!(compute_checksum(&path, "sha512").unwrap(), HELLO_SHA512);
    }

    #[test]
    fn test_compute_checksum_unknown_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        let path = hello_file(&dir);
        let err = compute_checksum(&path, "md5").unwrap_err();
        assert_eq!(err.code(), error::UNSUPPORTED_CHECKSUM_ALGORITHM);
    }

    #[test]
    fn test_compute_checksum_missing_file() {
        let err = compute_checksum(Path::new("/no/such/file"), "sha256").unwrap_err();
        assert_eq!(err.code(), error::ERROR_WHILE_COMPUTING_CHECKSUM);
    }

    #[test]
    fn test_verify_accepts_matching_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = hello_file(&dir);
        let set: HashSet<String> =
            [HELLO_SHA256.to_string(), "deadbeef".to_string()].into();
        assert!(verify_checksum_of_release_asset(&path, &set, "sha256").is_ok());
    }

    #[test]
    fn test_verify_rejects_unknown_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = hello_file(&dir);
        let set: HashSet<String> = ["deadbeef".to_string()].into();
        let err = verify_checksum_of_release_asset(&path, &set, "sha256").unwrap_err();
        assert_eq!(err.code(), error::CHECKSUM_DOES_NOT_MATCH);
    }
}
