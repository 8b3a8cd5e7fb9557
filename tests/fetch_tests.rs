// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! End-to-end pipeline tests: a mock forge on one side, the filesystem on
//! the other, with `fetch::run` in between.

use std::collections::HashSet;
use std::io::Write;

use forgefetch::fetch::{self, FetchOptions};
use forgefetch::{checksum, error};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

/// A zip shaped like a forge archive: one wrapping directory, a folder with
/// two files, and one file outside the folder.
fn repo_zip() -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let opts = SimpleFileOptions::default();
        writer.add_directory("repo-0a1b2c/", opts).unwrap();
        writer.add_directory("repo-0a1b2c/folder/", opts).unwrap();
        writer
            .start_file("repo-0a1b2c/folder/file1.txt", opts)
            .unwrap();
        writer.write_all(b"first file").unwrap();
        writer
            .add_directory("repo-0a1b2c/folder/sub/", opts)
            .unwrap();
        writer
            .start_file("repo-0a1b2c/folder/sub/file2.txt", opts)
            .unwrap();
        writer.write_all(b"second file").unwrap();
        writer.start_file("repo-0a1b2c/root.txt", opts).unwrap();
        writer.write_all(b"root file").unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

async fn mock_tags(server: &MockServer, tags: &[&str]) {
    let body: Vec<_> = tags.iter().map(|t| json!({ "name": t })).collect();
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn options_for(server: &MockServer, dest: &std::path::Path) -> FetchOptions {
    FetchOptions {
        repo_url: format!("{}/owner/repo", server.uri()),
        local_download_path: dest.to_string_lossy().into_owned(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_source_path_extraction_end_to_end() {
    let server = MockServer::start().await;
    mock_tags(&server, &["v0.0.3", "v0.0.2", "v0.0.1"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/zipball/v0.0.3"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(repo_zip(), "application/zip"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");
    let mut options = options_for(&server, &dest);
    options.tag_constraint = "~> 0.0".to_string();
    options.source_paths = vec!["/folder".to_string()];

    fetch::run(&options).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(dest.join("file1.txt")).unwrap(),
        "first file"
    );
    assert_eq!(
        std::fs::read_to_string(dest.join("sub/file2.txt")).unwrap(),
        "second file"
    );
    assert!(!dest.join("root.txt").exists());
}

#[tokio::test]
async fn test_exact_tag_is_used_verbatim() {
    let server = MockServer::start().await;
    mock_tags(&server, &["v0.0.3", "v0.0.2"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/zipball/v0.0.2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(repo_zip(), "application/zip"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");
    let mut options = options_for(&server, &dest);
    options.tag_constraint = "v0.0.2".to_string();

    fetch::run(&options).await.unwrap();
    assert!(dest.join("root.txt").exists());
}

#[tokio::test]
async fn test_unsatisfiable_constraint_fails() {
    let server = MockServer::start().await;
    mock_tags(&server, &["v1.0.0", "v1.2.0"]).await;

    let dir = tempfile::tempdir().unwrap();
    let mut options = options_for(&server, &dir.path().join("out"));
    options.tag_constraint = ">= 9.0".to_string();

    let err = fetch::run(&options).await.unwrap_err();
    assert_eq!(err.code(), error::NO_TAG_SATISFIES_CONSTRAINT);
}

#[tokio::test]
async fn test_release_asset_download_with_checksum_verification() {
    let server = MockServer::start().await;
    mock_tags(&server, &["v1.0.0"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/releases/tags/v1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "url": "https://example.com/releases/7",
            "name": "v1.0.0",
            "assets": [
                { "id": 42, "url": "https://example.com/assets/42", "name": "tool_linux_amd64" },
            ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/releases/assets/42"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tool-bytes".to_vec()))
        .mount(&server)
        .await;

    // Compute the expected digest from the same bytes the mock serves.
    let scratch = tempfile::tempdir().unwrap();
    let sample = scratch.path().join("sample");
    std::fs::write(&sample, b"tool-bytes").unwrap();
    let digest = checksum::compute_checksum(&sample, "sha256").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("assets");
    let mut options = options_for(&server, &dest);
    options.tag_constraint = "v1.0.0".to_string();
    options.release_asset = "tool_.*".to_string();
    options.release_asset_checksums = HashSet::from([digest]);
    options.release_asset_checksum_algo = "sha256".to_string();

    fetch::run(&options).await.unwrap();
    assert_eq!(
        std::fs::read(dest.join("tool_linux_amd64")).unwrap(),
        b"tool-bytes"
    );
}

#[tokio::test]
async fn test_checksum_mismatch_is_fatal() {
    let server = MockServer::start().await;
    mock_tags(&server, &["v1.0.0"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/releases/tags/v1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "url": "u",
            "name": "v1.0.0",
            "assets": [
                { "id": 42, "url": "u", "name": "tool_linux_amd64" },
            ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/releases/assets/42"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tampered".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut options = options_for(&server, &dir.path().join("assets"));
    options.tag_constraint = "v1.0.0".to_string();
    options.release_asset = "tool_.*".to_string();
    options.release_asset_checksums =
        HashSet::from(["0000000000000000000000000000000000000000".to_string()]);
    options.release_asset_checksum_algo = "sha256".to_string();

    let err = fetch::run(&options).await.unwrap_err();
    assert_eq!(err.code(), error::CHECKSUM_DOES_NOT_MATCH);
}

#[tokio::test]
async fn test_partial_asset_failure_keeps_successful_downloads() {
    let server = MockServer::start().await;
    mock_tags(&server, &["v1.0.0"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/releases/tags/v1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "url": "u",
            "name": "v1.0.0",
            "assets": [
                { "id": 42, "url": "u", "name": "tool_linux_amd64" },
                { "id": 43, "url": "u", "name": "tool_darwin_amd64" },
            ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/releases/assets/42"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"linux build".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/releases/assets/43"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("assets");
    let mut options = options_for(&server, &dest);
    options.tag_constraint = "v1.0.0".to_string();
    options.release_asset = "tool_.*_amd64".to_string();

    // One failed download is reported but does not fail the run; the
    // successful asset is kept.
    fetch::run(&options).await.unwrap();
    assert_eq!(
        std::fs::read(dest.join("tool_linux_amd64")).unwrap(),
        b"linux build"
    );
}

#[tokio::test]
async fn test_no_matching_assets_fails() {
    let server = MockServer::start().await;
    mock_tags(&server, &["v1.0.0"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/releases/tags/v1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "url": "u",
            "name": "v1.0.0",
            "assets": [ { "id": 42, "url": "u", "name": "tool_linux_amd64" } ],
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut options = options_for(&server, &dir.path().join("assets"));
    options.tag_constraint = "v1.0.0".to_string();
    options.release_asset = "windows".to_string();

    let err = fetch::run(&options).await.unwrap_err();
    assert!(err.details().contains("no assets matching"));
}
