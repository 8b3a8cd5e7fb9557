// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Error type shared across the fetch pipeline.
//!
//! Every layer below the CLI returns a [`FetchError`]: a numeric code, a
//! human-readable detail string, and optionally the underlying error that
//! caused it. The code is what callers branch on; HTTP status codes from a
//! forge API are used verbatim so that 401 and 404 stay distinguishable all
//! the way up. [`friendly_message`] maps the well-known codes to a longer
//! preamble that restates the likely cause before showing the raw detail.

use std::fmt;

// =============================================================================
// Error codes
// =============================================================================

/// The `--tag` value could not be parsed as a version constraint expression.
pub const INVALID_TAG_CONSTRAINT_EXPRESSION: i32 = 100;

/// The constraint parsed fine but no tag in the repository satisfies it.
pub const NO_TAG_SATISFIES_CONSTRAINT: i32 = 110;

/// The repository URL does not match the shape the driver expects.
pub const REPO_URL_MALFORMED_OR_NOT_PARSEABLE: i32 = 300;

/// Upstream returned HTTP 401.
pub const INVALID_TOKEN_OR_ACCESS_DENIED: i32 = 401;

/// Upstream returned HTTP 404.
pub const REPO_DOES_NOT_EXIST_OR_ACCESS_DENIED: i32 = 404;

/// Archive or asset download returned a non-200 status or the wrong content type.
pub const FAILED_TO_DOWNLOAD_FILE: i32 = 500;

/// Computed digest of a release asset is not in the accepted set.
pub const CHECKSUM_DOES_NOT_MATCH: i32 = 510;

/// I/O failure while computing a digest.
pub const ERROR_WHILE_COMPUTING_CHECKSUM: i32 = 520;

/// The requested digest algorithm is not supported.
pub const UNSUPPORTED_CHECKSUM_ALGORITHM: i32 = 530;

/// An archive entry's path would escape the destination directory.
pub const UNSAFE_ARCHIVE_PATH: i32 = 540;

/// Wrapped errors from lower layers that carry no code of their own.
pub const WRAPPED: i32 = -1;

// =============================================================================
// FetchError
// =============================================================================

/// An error from any layer of the fetch pipeline.
///
/// Code `0` is reserved to mean "no error" and is never constructed; absence
/// of an error is always expressed through `Result::Ok`.
#[derive(Debug)]
pub struct FetchError {
    code: i32,
    details: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl FetchError {
    /// Create an error with an explicit code.
    pub fn new(code: i32, details: impl Into<String>) -> Self {
        debug_assert!(code != 0, "code 0 means no error and must not be constructed");
        Self {
            code,
            details: details.into(),
            source: None,
        }
    }

    /// Wrap an underlying error that carries no code of its own.
    pub fn wrap<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            code: WRAPPED,
            details: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create an error from an upstream HTTP status; the status is the code.
    pub fn from_status(status: u16, details: impl Into<String>) -> Self {
        Self::new(i32::from(status), details)
    }

    /// Attach the underlying cause to an error built with [`FetchError::new`].
    pub fn with_source<E>(mut self, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(err));
        self
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn details(&self) -> &str {
        &self.details
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code, self.details)
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::wrap(err)
    }
}

// =============================================================================
// Friendly messages
// =============================================================================

/// Map well-known error codes to a longer explanation shown to the user.
///
/// Returns `None` for codes that should surface verbatim.
pub fn friendly_message(err: &FetchError) -> Option<String> {
    match err.code() {
        INVALID_TAG_CONSTRAINT_EXPRESSION => Some(format!(
            "The --tag value you entered is not a valid constraint expression.\n\
             Examples of valid expressions: \"v1.0.7\", \"~> 1.2\", \">= 0.4.0, < 2.0.0\".\n\
             \n\
             Underlying error message:\n\
             {}",
            err.details()
        )),
        INVALID_TOKEN_OR_ACCESS_DENIED => Some(format!(
            "Received an HTTP 401 Response when attempting to query the repo for its tags.\n\
             \n\
             This means that either your access token is invalid, or that the token is valid\n\
             but is being used to request access to either a public repo or a private repo\n\
             to which you don't have access.\n\
             \n\
             Underlying error message:\n\
             {}",
            err.details()
        )),
        REPO_DOES_NOT_EXIST_OR_ACCESS_DENIED => Some(format!(
            "Received an HTTP 404 Response when attempting to query the repo for its tags.\n\
             \n\
             This means that either no repo exists at the URL provided, or that you don't\n\
             have permission to access it. If the URL is correct, you may need to pass in an\n\
             access token.\n\
             \n\
             Underlying error message:\n\
             {}",
            err.details()
        )),
        _ => None,
    }
}
