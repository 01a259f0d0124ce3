//! Version parsing and zero-padded lexicographic comparison.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;

/// Ordered tuple of non-negative integer components (major.minor.build.revision).
///
/// Missing trailing components compare as zero, so `1.2` equals `1.2.0`.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    /// Parse a dotted numeric string such as `10.0.19041.1`.
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(malformed(text));
        }

        let components = trimmed
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed(text));
                }
                segment.parse::<u64>().map_err(|_| malformed(text))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }

    pub fn from_components(components: impl Into<Vec<u64>>) -> Self {
        Self {
            components: components.into(),
        }
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    fn significant(&self) -> &[u64] {
        let len = self
            .components
            .iter()
            .rposition(|c| *c != 0)
            .map_or(0, |idx| idx + 1);
        &self.components[..len]
    }
}

fn malformed(text: &str) -> VersionError {
    VersionError::Malformed {
        input: text.to_string(),
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for idx in 0..len {
            let a = self.components.get(idx).copied().unwrap_or(0);
            let b = other.components.get(idx).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Trailing zeros are insignificant for equality, so they must be for hashing too.
        self.significant().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Comparison entry points used by every detection check.
pub struct VersionComparator;

impl VersionComparator {
    pub fn parse(text: &str) -> Result<Version, VersionError> {
        Version::parse(text)
    }

    /// Compare after padding the shorter version with zero components.
    pub fn compare(a: &Version, b: &Version) -> Ordering {
        a.cmp(b)
    }

    pub fn is_older(current: &Version, required: &Version) -> bool {
        Self::compare(current, required) == Ordering::Less
    }

    /// Compare a raw reported version against a requirement.
    ///
    /// An unparseable `current` counts as older than any requirement.
    pub fn is_older_text(current: &str, required: &Version) -> bool {
        match Version::parse(current) {
            Ok(current) => Self::is_older(&current, required),
            Err(err) => {
                tracing::debug!(error = %err, "treating unparseable version as outdated");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn parses_dotted_integers() {
        assert_eq!(v("10.0.19041.1").components(), &[10, 0, 19041, 1]);
        assert_eq!(v(" 2.1 ").components(), &[2, 1]);
    }

    #[test]
    fn rejects_empty_and_non_numeric() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("abc").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("1.2-beta").is_err());
        assert!(Version::parse("-1.0").is_err());
        assert!(Version::parse("1.+2").is_err());
    }

    #[test]
    fn trailing_zeros_are_insignificant() {
        assert_eq!(v("1.2"), v("1.2.0"));
        assert_eq!(v("1.2.0.0").to_string(), "1.2.0.0");

        let mut set = HashSet::new();
        set.insert(v("3.0"));
        assert!(set.contains(&v("3.0.0.0")));
    }

    #[test]
    fn comparison_is_numeric_not_textual() {
        assert!(v("1.10") > v("1.9"));
        assert!(VersionComparator::is_older(&v("1.0.0"), &v("2.1.0")));
        assert!(!VersionComparator::is_older(&v("2.1.0"), &v("2.1")));
    }

    #[test]
    fn unparseable_current_is_older() {
        assert!(VersionComparator::is_older_text("n/a", &v("0.0.1")));
        assert!(!VersionComparator::is_older_text("5.0", &v("4.9")));
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&v("6.0.1")).unwrap();
        assert_eq!(json, "\"6.0.1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("6.0.1"));
        assert!(serde_json::from_str::<Version>("\"six\"").is_err());
    }
}
