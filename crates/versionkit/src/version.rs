//! Dotted-numeric versions
//!
//! Registry version lists are ordered by their numeric `major.minor.patch`
//! components only. Anything after the numeric part (pre-release or build
//! suffixes such as `1.2.0-beta1`) is kept for display but carries no weight
//! in the ordering.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A version ordered by its numeric components.
#[derive(Debug, Clone)]
pub struct DottedVersion {
    major: u64,
    minor: u64,
    patch: u64,
    raw: String,
}

impl DottedVersion {
    /// Major component.
    #[must_use]
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Minor component.
    #[must_use]
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch component (0 when the version has only two components).
    #[must_use]
    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// The version exactly as it was parsed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Pick the greatest version from a list of raw version strings.
    ///
    /// Entries that are not dotted-numeric are skipped. On ties the first
    /// occurrence wins.
    pub fn max_of<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut newest: Option<Self> = None;
        for raw in versions {
            let Ok(candidate) = raw.parse::<Self>() else {
                log::debug!("Version '{raw}' does not match the expected format, ignoring it");
                continue;
            };
            match &newest {
                Some(current) if *current >= candidate => {}
                _ => newest = Some(candidate),
            }
        }
        newest
    }
}

impl FromStr for DottedVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let numeric_end = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(raw.len());
        let numeric = raw[..numeric_end].trim_end_matches('.');
        let suffix = &raw[numeric_end..];

        // A suffix must be introduced by a pre-release or build separator,
        // or be a bare alpha/beta marker (`1.2.0a1`).
        if !suffix.is_empty() && !suffix.starts_with(['-', '+', 'a', 'b']) {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        let parts: Vec<&str> = numeric.split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(Error::InvalidVersion(s.to_string()));
        }
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| Error::InvalidVersion(s.to_string()))?;
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            raw: raw.to_string(),
        })
    }
}

impl PartialEq for DottedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DottedVersion {}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> DottedVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_components() {
        let version = v("1.22.3");
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 22);
        assert_eq!(version.patch(), 3);
        assert_eq!(version.as_str(), "1.22.3");
    }

    #[test]
    fn test_two_component_version() {
        let version = v("4.1");
        assert_eq!(version.patch(), 0);
        assert_eq!(version, v("4.1.0"));
    }

    #[test]
    fn test_numeric_not_lexical_ordering() {
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("10.0.0") > v("9.99.99"));
    }

    #[test]
    fn test_suffix_does_not_weigh() {
        assert_eq!(v("1.2.0-beta1").cmp(&v("1.2.0")), Ordering::Equal);
        assert_eq!(v("1.2.0a1").as_str(), "1.2.0a1");
    }

    #[test]
    fn test_invalid_versions() {
        assert!("".parse::<DottedVersion>().is_err());
        assert!("1".parse::<DottedVersion>().is_err());
        assert!("1.2.3.4".parse::<DottedVersion>().is_err());
        assert!("v1.2.3".parse::<DottedVersion>().is_err());
        assert!("latest".parse::<DottedVersion>().is_err());
        assert!("1.2.x".parse::<DottedVersion>().is_err());
    }

    #[test]
    fn test_max_of() {
        let newest = DottedVersion::max_of(["1.0.0", "2.0.0", "1.10.0", "garbage"]).unwrap();
        assert_eq!(newest.as_str(), "2.0.0");
        assert!(DottedVersion::max_of(Vec::<&str>::new()).is_none());
        assert!(DottedVersion::max_of(["nope"]).is_none());
    }
}
