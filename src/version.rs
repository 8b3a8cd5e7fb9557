// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Semantic version parsing and tag-constraint resolution.
//!
//! Tags coming back from a forge are plain strings; this module parses them
//! into [`Version`]s, parses the user's `--tag` expression into a
//! [`Constraint`], and picks the greatest tag that satisfies it. Constraint
//! operators follow the Hashicorp conventions: `= != > >= < <=` plus the
//! pessimistic operator `~>` (`~> 1.2.3` admits `[1.2.3, 1.3.0)`, `~> 1.2`
//! admits `[1.2.0, 2.0.0)`). Multiple clauses may be combined with commas and
//! must all hold.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{self, FetchError};

/// Semantic version (MAJOR.MINOR.PATCH with optional prerelease/build).
///
/// Parsing tolerates a leading `v` and fewer than three segments
/// (`"1.2"` parses as `1.2.0`), matching the tag spellings forges accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl Version {
    /// Parse a version string.
    pub fn parse(s: &str) -> Result<Self, FetchError> {
        Self::parse_counted(s).map(|(v, _)| v)
    }

    /// Parse a version string, also reporting how many numeric segments were
    /// spelled out. The segment count decides the width of a pessimistic
    /// constraint (`~> 1.2` vs `~> 1.2.3`).
    fn parse_counted(s: &str) -> Result<(Self, usize), FetchError> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);
        if s.is_empty() {
            return Err(invalid_version(s));
        }

        // Split off build metadata, then prerelease.
        let (version_part, build) = match s.split_once('+') {
            Some((v, b)) => (v, Some(b.to_string())),
            None => (s, None),
        };
        let (core, prerelease) = match version_part.split_once('-') {
            Some((v, p)) => (v, Some(p.to_string())),
            None => (version_part, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(invalid_version(s));
        }

        let mut segments = [0u64; 3];
        for (i, part) in parts.iter().enumerate() {
            segments[i] = part.parse().map_err(|_| invalid_version(s))?;
        }

        Ok((
            Version {
                major: segments[0],
                minor: segments[1],
                patch: segments[2],
                prerelease,
                build,
            },
            parts.len(),
        ))
    }

    /// Create a new version with no prerelease or build metadata.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }
}

fn invalid_version(s: &str) -> FetchError {
    FetchError::new(
        error::INVALID_TAG_CONSTRAINT_EXPRESSION,
        format!("\"{}\" is not a valid semantic version", s),
    )
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.major.cmp(&other.major) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.minor.cmp(&other.minor) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.patch.cmp(&other.patch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // A prerelease sorts below the corresponding release.
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

/// Comparison operator of a single constraint clause.
#[derive(Debug, Clone, PartialEq)]
enum Op {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// `~>`: at least the stated version, below the next minor or major
    /// depending on how many segments were spelled out.
    Pessimistic { upper: Version },
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    op: Op,
    version: Version,
}

impl Clause {
    fn parse(s: &str) -> Result<Self, FetchError> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix("~>") {
            let (version, segments) = Version::parse_counted(rest)?;
            let upper = if segments >= 3 {
                Version::new(version.major, version.minor + 1, 0)
            } else {
                Version::new(version.major + 1, 0, 0)
            };
            return Ok(Clause {
                op: Op::Pessimistic { upper },
                version,
            });
        }
        if let Some(rest) = s.strip_prefix(">=") {
            return Ok(Clause {
                op: Op::Gte,
                version: Version::parse(rest)?,
            });
        }
        if let Some(rest) = s.strip_prefix("<=") {
            return Ok(Clause {
                op: Op::Lte,
                version: Version::parse(rest)?,
            });
        }
        if let Some(rest) = s.strip_prefix("!=") {
            return Ok(Clause {
                op: Op::Neq,
                version: Version::parse(rest)?,
            });
        }
        if let Some(rest) = s.strip_prefix('>') {
            return Ok(Clause {
                op: Op::Gt,
                version: Version::parse(rest)?,
            });
        }
        if let Some(rest) = s.strip_prefix('<') {
            return Ok(Clause {
                op: Op::Lt,
                version: Version::parse(rest)?,
            });
        }
        if let Some(rest) = s.strip_prefix('=') {
            return Ok(Clause {
                op: Op::Eq,
                version: Version::parse(rest)?,
            });
        }

        // A bare version is an exact match.
        Ok(Clause {
            op: Op::Eq,
            version: Version::parse(s)?,
        })
    }

    fn matches(&self, v: &Version) -> bool {
        match &self.op {
            Op::Eq => v == &self.version,
            Op::Neq => v != &self.version,
            Op::Gt => v > &self.version,
            Op::Gte => v >= &self.version,
            Op::Lt => v < &self.version,
            Op::Lte => v <= &self.version,
            Op::Pessimistic { upper } => v >= &self.version && v < upper,
        }
    }
}

/// A parsed constraint expression: one or more comma-separated clauses that
/// must all hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    clauses: Vec<Clause>,
}

impl Constraint {
    /// Parse a constraint expression such as `">= 1.2, < 2.0"`.
    pub fn parse(s: &str) -> Result<Self, FetchError> {
        let clauses = s
            .split(',')
            .map(Clause::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                FetchError::new(
                    error::INVALID_TAG_CONSTRAINT_EXPRESSION,
                    format!("malformed constraint \"{}\": {}", s, e.details()),
                )
            })?;
        Ok(Constraint { clauses })
    }

    /// Check whether a version satisfies every clause.
    pub fn matches(&self, v: &Version) -> bool {
        self.clauses.iter().all(|c| c.matches(v))
    }
}

/// Decide whether a `--tag` expression names one exact tag or is a range.
///
/// Returns `(true, trimmed_tag)` for a bare version, optionally preceded by
/// `=`; expressions starting with one of `> < ! ~` are ranges and come back
/// unchanged.
pub fn is_specific_tag(tag_constraint: &str) -> (bool, String) {
    match tag_constraint.as_bytes().first().copied() {
        Some(b'=') => (true, tag_constraint[1..].trim().to_string()),
        Some(b'>') | Some(b'<') | Some(b'!') | Some(b'~') => {
            (false, tag_constraint.to_string())
        }
        Some(_) => (true, tag_constraint.trim().to_string()),
        None => (false, tag_constraint.to_string()),
    }
}

/// Return the greatest tag that satisfies the given constraint.
///
/// Tags that do not parse as semantic versions are skipped. An empty tag
/// list (or a list with no parseable tags) yields an empty string rather than
/// an error. An empty constraint selects the greatest tag outright. The
/// returned value is the original tag spelling, so a `v` prefix survives.
pub fn latest_acceptable_tag(
    tag_constraint: &str,
    tags: &[String],
) -> Result<String, FetchError> {
    if tags.is_empty() {
        return Ok(String::new());
    }

    let mut versions: Vec<(Version, &str)> = tags
        .iter()
        .filter_map(|t| Version::parse(t).ok().map(|v| (v, t.as_str())))
        .collect();
    if versions.is_empty() {
        return Ok(String::new());
    }
    versions.sort_by(|a, b| a.0.cmp(&b.0));

    if tag_constraint.trim().is_empty() {
        let (_, tag) = versions.last().expect("non-empty after sort");
        return Ok(tag.to_string());
    }

    let constraint = Constraint::parse(tag_constraint)?;
    versions
        .iter()
        .rev()
        .find(|(v, _)| constraint.matches(v))
        .map(|(_, tag)| tag.to_string())
        .ok_or_else(|| {
            FetchError::new(
                error::NO_TAG_SATISFIES_CONSTRAINT,
                format!(
                    "no tag in the repository satisfies the constraint \"{}\"",
                    tag_constraint
                ),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_version() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert!(v.prerelease.is_none());
        assert!(v.build.is_none());
    }

    #[test]
    fn test_parse_version_with_v_prefix() {
        let v = Version::parse("v1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_version_two_segments() {
        let v = Version::parse("1.2").unwrap();
        assert_eq!(v, Version::new(1, 2, 0));
    }

    #[test]
    fn test_parse_version_with_prerelease_and_build() {
        let v = Version::parse("1.2.3-alpha.1+build.5").unwrap();
        assert_eq!(v.prerelease.as_deref(), Some("alpha.1"));
        assert_eq!(v.build.as_deref(), Some("build.5"));
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        assert!(Version::parse("josh").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::new(1, 0, 0) < Version::new(2, 0, 0));
        assert!(Version::new(1, 2, 0) < Version::new(1, 3, 0));
        assert!(Version::new(1, 2, 3) < Version::new(1, 2, 4));
        assert!(Version::parse("1.0.0-rc1").unwrap() < Version::new(1, 0, 0));
    }

    #[test]
    fn test_pessimistic_three_segments() {
        let c = Constraint::parse("~> 1.2.3").unwrap();
        assert!(c.matches(&Version::new(1, 2, 3)));
        assert!(c.matches(&Version::new(1, 2, 9)));
        assert!(!c.matches(&Version::new(1, 3, 0)));
        assert!(!c.matches(&Version::new(1, 2, 2)));
    }

    #[test]
    fn test_pessimistic_two_segments() {
        let c = Constraint::parse("~> 1.2").unwrap();
        assert!(c.matches(&Version::new(1, 2, 0)));
        assert!(c.matches(&Version::new(1, 9, 9)));
        assert!(!c.matches(&Version::new(2, 0, 0)));
        assert!(!c.matches(&Version::new(1, 1, 9)));
    }

    #[test]
    fn test_multi_clause_constraint() {
        let c = Constraint::parse(">= 1.2, < 2.0").unwrap();
        assert!(c.matches(&Version::new(1, 5, 0)));
        assert!(!c.matches(&Version::new(2, 0, 0)));
        assert!(!c.matches(&Version::new(1, 1, 0)));
    }

    #[test]
    fn test_is_specific_tag() {
        assert_eq!(is_specific_tag(" 1.0.7 "), (true, "1.0.7".to_string()));
        assert_eq!(is_specific_tag("=v1.0.7"), (true, "v1.0.7".to_string()));
        assert_eq!(
            is_specific_tag("~> 1.0.0"),
            (false, "~> 1.0.0".to_string())
        );
        assert_eq!(is_specific_tag(">= 2.0"), (false, ">= 2.0".to_string()));
        assert_eq!(is_specific_tag(""), (false, String::new()));
    }

    #[test]
    fn test_latest_acceptable_tag_pessimistic() {
        let all = tags(&[
            "1.0.5", "1.0.6", "1.0.7", "1.0.8", "1.0.9", "1.1.0", "1.1.1", "1.1.2",
            "1.1.3", "1.2.3", "1.4.0", "2.0.0", "2.1.0",
        ]);
        assert_eq!(latest_acceptable_tag("~> 1.0.0", &all).unwrap(), "1.0.9");
        assert_eq!(latest_acceptable_tag("~> 1.1.1", &all).unwrap(), "1.1.3");
        assert_eq!(latest_acceptable_tag("~> 1.2.1", &all).unwrap(), "1.2.3");
        assert_eq!(latest_acceptable_tag("~> 1.1", &all).unwrap(), "1.4.0");
        assert_eq!(latest_acceptable_tag("~> 1.3", &all).unwrap(), "1.4.0");
    }

    #[test]
    fn test_latest_acceptable_tag_gte() {
        let all = tags(&["1.0.5", "1.1.0", "1.4.0", "2.0.0", "2.1.0"]);
        assert_eq!(latest_acceptable_tag(">= 1.3", &all).unwrap(), "2.1.0");
    }

    #[test]
    fn test_latest_acceptable_tag_empty_constraint_takes_greatest() {
        let all = tags(&["v0.0.1", "v0.0.2", "v0.0.3"]);
        assert_eq!(latest_acceptable_tag("", &all).unwrap(), "v0.0.3");
    }

    #[test]
    fn test_latest_acceptable_tag_empty_list_is_not_an_error() {
        assert_eq!(latest_acceptable_tag("v1.0.7", &[]).unwrap(), "");
    }

    #[test]
    fn test_latest_acceptable_tag_preserves_v_prefix() {
        let all = tags(&["v1.0.5", "v1.0.7"]);
        assert_eq!(latest_acceptable_tag("~> 1.0", &all).unwrap(), "v1.0.7");
        assert_eq!(latest_acceptable_tag("v1.0.7", &all).unwrap(), "v1.0.7");
    }

    #[test]
    fn test_latest_acceptable_tag_malformed_constraint() {
        let err =
            latest_acceptable_tag("plump elephants dancing", &tags(&["v0.0.1"])).unwrap_err();
        assert_eq!(err.code(), crate::error::INVALID_TAG_CONSTRAINT_EXPRESSION);
    }

    #[test]
    fn test_latest_acceptable_tag_nothing_satisfies() {
        let err = latest_acceptable_tag(">= 9.0", &tags(&["1.0.0", "2.0.0"])).unwrap_err();
        assert_eq!(err.code(), crate::error::NO_TAG_SATISFIES_CONSTRAINT);
    }

    #[test]
    fn test_latest_acceptable_tag_skips_non_semver() {
        let all = tags(&["not-a-version", "1.0.0", "nightly"]);
        assert_eq!(latest_acceptable_tag("", &all).unwrap(), "1.0.0");
        assert_eq!(
            latest_acceptable_tag("", &tags(&["nightly", "latest"])).unwrap(),
            ""
        );
    }
}
