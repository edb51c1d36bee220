//! Ordering of `vMAJOR.MINOR.PATCH` release versions.

use std::fmt;
use std::str::FromStr;

/// A release version of the form `v1.2.3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

/// A version string that did not have three numeric components after its prefix.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed version string: {0:?}")]
pub struct InvalidVersion(pub String);

impl Version {
    /// Build a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = InvalidVersion;

    /// Parses a version after dropping its one-character prefix, so `v0.4.22`
    /// and `x0.4.22` parse identically.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidVersion(s.to_string());

        let mut chars = s.chars();
        chars.next().ok_or_else(invalid)?;

        let mut parts = chars.as_str().split('.');
        let mut component = || -> Result<u64, InvalidVersion> {
            parts
                .next()
                .and_then(|part| part.parse::<u64>().ok())
                .ok_or_else(invalid)
        };
        let version = Version::new(component()?, component()?, component()?);

        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Returns `true` when `candidate` is strictly older than `current`.
///
/// A malformed version on either side yields `false` rather than an error,
/// so callers treat an unparseable candidate as "not older".
pub fn is_older(candidate: &str, current: &str) -> bool {
    match (candidate.parse::<Version>(), current.parse::<Version>()) {
        (Ok(candidate), Ok(current)) => candidate < current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_patch_release() {
        assert!(is_older("v1.2.3", "v1.2.4"));
    }

    #[test]
    fn newer_major_is_not_older() {
        assert!(!is_older("v2.0.0", "v1.9.9"));
        assert!(is_older("v1.9.9", "v2.0.0"));
    }

    #[test]
    fn components_compare_numerically() {
        assert!(is_older("v0.4.9", "v0.4.10"));
        assert!(!is_older("v0.10.0", "v0.9.0"));
    }

    #[test]
    fn equal_versions_are_not_older() {
        for v in ["v0.0.0", "v0.4.22", "v10.20.30"] {
            assert!(!is_older(v, v), "{v} should not be older than itself");
        }
    }

    // Malformed input degrades to "not older"; callers depend on this.
    #[test]
    fn malformed_component_is_not_older() {
        assert!(!is_older("v1.2.x", "v1.2.4"));
        assert!(!is_older("v1.2.4", "v1.2.x"));
        assert!(!is_older("v1.2", "v1.2.4"));
        assert!(!is_older("", "v1.2.4"));
        assert!(!is_older("v1.-2.3", "v1.2.4"));
        assert!(!is_older("v1.2.3.4", "v1.2.4"));
    }

    #[test]
    fn prefix_character_is_not_interpreted() {
        assert!(is_older("x1.2.3", "v1.2.4"));
        assert!(!is_older("1.2.3", "v1.2.4"));
    }

    #[test]
    fn version_round_trips_through_display() {
        let version: Version = "v0.4.22".parse().unwrap();
        assert_eq!(version, Version::new(0, 4, 22));
        assert_eq!(version.to_string(), "v0.4.22");
    }

    #[test]
    fn invalid_version_reports_input() {
        let err = "vfoo".parse::<Version>().unwrap_err();
        assert_eq!(err, InvalidVersion("vfoo".into()));
    }
}
