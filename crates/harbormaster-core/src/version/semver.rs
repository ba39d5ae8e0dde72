//! Semantic version value type used for chart and release versions.
//!
//! Wraps [`semver::Version`] with the lenient parsing rules release tooling needs:
//! an optional `v` prefix, short `vMAJOR` / `vMAJOR.MINOR` forms, and build metadata
//! that is accepted but discarded.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;

/// A parsed semantic version. Always rendered with a leading `v`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Semver(semver::Version);

impl Semver {
    /// Parse a version string such as `v1.18.0`, `1.18`, or `v1.18.0-pre+build`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let raw = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if raw.is_empty() {
            return Err(VersionError::Empty);
        }

        // Build metadata never takes part in comparisons, drop it up front.
        let without_build = raw.split_once('+').map_or(raw, |(core, _)| core);
        let (core, prerelease) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (without_build, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(VersionError::malformed(input, "expected MAJOR[.MINOR[.PATCH]]"));
        }
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u64>()
                .map_err(|_| VersionError::malformed(input, "version components must be numeric"))?;
        }

        let mut version = semver::Version::new(numbers[0], numbers[1], numbers[2]);
        if let Some(pre) = prerelease {
            version.pre = semver::Prerelease::new(pre)
                .map_err(|e| VersionError::malformed(input, &e.to_string()))?;
        }
        Ok(Self(version))
    }

    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn prerelease(&self) -> &str {
        self.0.pre.as_str()
    }

    /// The `vMAJOR.MINOR` string of the next minor release line.
    pub fn next_minor(&self) -> String {
        format!("v{}.{}", self.0.major, self.0.minor + 1)
    }

    /// Shorthand for [`crate::version::compat::is_upgrade_to`] with `self` as the candidate.
    pub fn is_upgrade_to(&self, current: &Semver) -> Result<(), crate::error::InvalidUpgradeError> {
        crate::version::compat::is_upgrade_to(self, current)
    }
}

impl Ord for Semver {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for Semver {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.0.major, self.0.minor, self.0.patch)?;
        if !self.0.pre.is_empty() {
            write!(f, "-{}", self.0.pre)?;
        }
        Ok(())
    }
}

impl FromStr for Semver {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Semver {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Semver {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Semver::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Semver {
        Semver::parse(s).unwrap()
    }

    #[test]
    fn test_parse_full_version() {
        let version = v("v1.18.0");
        assert_eq!((version.major(), version.minor(), version.patch()), (1, 18, 0));
        assert_eq!(version.prerelease(), "");
    }

    #[test]
    fn test_parse_drops_build_metadata() {
        let version = v("v1.18.0-pre+yyyymmddhhmmss-abcdefabcdef");
        assert_eq!(version.prerelease(), "pre");
        assert_eq!(version.to_string(), "v1.18.0-pre");
    }

    #[test]
    fn test_parse_short_forms() {
        assert_eq!(v("1.18.0"), Semver::new(1, 18, 0));
        assert_eq!(v("v1.18"), Semver::new(1, 18, 0));
        assert_eq!(v("v1"), Semver::new(1, 0, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Semver::parse("v-pre.0.yyyymmddhhmmss-abcdefabcdef").is_err());
        assert!(Semver::parse("v1.18. 0").is_err());
        assert!(Semver::parse("").is_err());
        assert!(Semver::parse("v1.2.3.4").is_err());
    }

    #[test]
    fn test_ordering_with_prerelease() {
        assert!(v("v1.18.0-pre") < v("v1.18.0"));
        assert!(v("v1.18.0-pre") < v("v1.18.0-pre.1"));
        assert!(v("v1.18.0") < v("v1.18.1"));
        assert_eq!(v("v1.18.0-pre").cmp(&v("v1.18.0-pre")), Ordering::Equal);
    }

    #[test]
    fn test_next_minor() {
        assert_eq!(v("v1.18.0").next_minor(), "v1.19");
        assert_eq!(v("v1.18.0-pre").next_minor(), "v1.19");
    }

    #[test]
    fn test_json_and_yaml_serialization() {
        let json = serde_json::to_string(&v("v1.18.0-pre")).unwrap();
        assert_eq!(json, "\"v1.18.0-pre\"");
        let parsed: Semver = serde_json::from_str("\"v1.18.0\"").unwrap();
        assert_eq!(parsed, Semver::new(1, 18, 0));
        assert!(serde_json::from_str::<Semver>("\"v1. 18.0\"").is_err());

        let yaml = serde_yaml::to_string(&Semver::new(1, 18, 0)).unwrap();
        assert_eq!(yaml, "v1.18.0\n");
    }
}
