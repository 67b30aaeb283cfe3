//! Version identifiers parsed from version directory names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{MigrateResult, MigrationError};

/// A version parsed from a directory name such as `v0.01` or `v2.10.3`.
///
/// Ordering, equality and hashing use the numeric rank
/// `(major, minor, revision)` where a missing revision ranks as `0`. The
/// original spelling is kept for display, so `v0.01` and `v0.1` compare equal
/// but print differently.
#[derive(Debug, Clone)]
pub struct Version {
    major: u32,
    minor: u32,
    revision: Option<u32>,
    minor_width: usize,
    raw: String,
}

impl Version {
    /// Create a version with a zero-padded two digit minor component.
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            revision: None,
            minor_width: 2,
            raw: format!("v{}.{:02}", major, minor),
        }
    }

    /// The first version of a new workspace, `v0.00`.
    pub fn initial() -> Self {
        Self::new(0, 0)
    }

    /// Parse a directory name.
    pub fn parse(name: &str) -> MigrateResult<Self> {
        let invalid = || MigrationError::InvalidVersion(name.to_string());

        let body = name.strip_prefix('v').ok_or_else(invalid)?;
        let parts: Vec<&str> = body.split('.').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(invalid());
        }

        let mut numbers = Vec::with_capacity(parts.len());
        for part in &parts {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            numbers.push(part.parse::<u32>().map_err(|_| invalid())?);
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            revision: numbers.get(2).copied(),
            minor_width: parts[1].len(),
            raw: name.to_string(),
        })
    }

    /// Whether a directory name looks like it is meant to be a version:
    /// a `v` followed by a digit. Such names must parse or discovery fails.
    pub fn is_version_like(name: &str) -> bool {
        let mut chars = name.chars();
        chars.next() == Some('v')
            && chars.next().is_some_and(|c| c.is_ascii_digit())
    }

    /// Major component.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Minor component.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Revision component, if the name carried one.
    pub fn revision(&self) -> Option<u32> {
        self.revision
    }

    /// The name as written on disk.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The version after this one when bumping the minor component.
    pub fn next_minor(&self) -> Self {
        let minor = self.minor.saturating_add(1);
        Self {
            major: self.major,
            minor,
            revision: None,
            minor_width: self.minor_width,
            raw: format!("v{}.{:0width$}", self.major, minor, width = self.minor_width),
        }
    }

    /// The version after this one when bumping the major component.
    pub fn next_major(&self) -> Self {
        let major = self.major.saturating_add(1);
        Self {
            major,
            minor: 0,
            revision: None,
            minor_width: self.minor_width,
            raw: format!("v{}.{:0width$}", major, 0, width = self.minor_width),
        }
    }

    fn rank(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.revision.unwrap_or(0))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_major_minor() {
        let v = Version::parse("v1.02").unwrap();
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 2);
        assert_eq!(v.revision(), None);
        assert_eq!(v.to_string(), "v1.02");
    }

    #[test]
    fn test_parse_revision() {
        let v = Version::parse("v2.10.3").unwrap();
        assert_eq!(v.revision(), Some(3));
    }

    #[test]
    fn test_parse_invalid() {
        for name in ["v1", "v1.x", "v1.2.3.4", "v1.2-beta", "v.1", "v1..2", "1.0", "v1.2."] {
            assert!(Version::parse(name).is_err(), "{name} should not parse");
        }
    }

    #[test]
    fn test_version_like() {
        assert!(Version::is_version_like("v0.01"));
        assert!(Version::is_version_like("v1"));
        // upper case is not a version directory, so it is ignored, not rejected
        assert!(!Version::is_version_like("V2.0"));
        assert!(Version::parse("V2.0").is_err());
        assert!(!Version::is_version_like("vendor"));
        assert!(!Version::is_version_like("_pre"));
        assert!(!Version::is_version_like("docs"));
    }

    #[test]
    fn test_numeric_ordering() {
        let mut versions: Vec<Version> = ["v0.10", "v0.02", "v1.00", "v0.02.1", "v0.9"]
            .iter()
            .map(|n| Version::parse(n).unwrap())
            .collect();
        versions.sort();
        let names: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["v0.02", "v0.02.1", "v0.9", "v0.10", "v1.00"]);
    }

    #[test]
    fn test_rank_ignores_padding() {
        assert_eq!(Version::parse("v0.01").unwrap(), Version::parse("v0.1").unwrap());
        assert_eq!(Version::parse("v1.01").unwrap(), Version::parse("v1.01.0").unwrap());
    }

    #[test]
    fn test_display_round_trip_keeps_rank() {
        for name in ["v0.00", "v0.01", "v3.7", "v10.200.5", "v0.010"] {
            let parsed = Version::parse(name).unwrap();
            let reparsed = Version::parse(&parsed.to_string()).unwrap();
            assert_eq!(parsed.cmp(&reparsed), Ordering::Equal);
            assert_eq!(reparsed.as_str(), name);
        }
    }

    #[test]
    fn test_next_versions() {
        let v = Version::parse("v0.09").unwrap();
        assert_eq!(v.next_minor().to_string(), "v0.10");
        assert_eq!(v.next_major().to_string(), "v1.00");
        assert_eq!(Version::parse("v1.5").unwrap().next_minor().to_string(), "v1.6");
        assert_eq!(Version::parse("v2.03.7").unwrap().next_minor().to_string(), "v2.04");
        assert_eq!(Version::initial().to_string(), "v0.00");
    }
}
