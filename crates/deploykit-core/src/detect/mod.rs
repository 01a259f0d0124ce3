//! Detection probes over installed-application, file, registry and host state.
//!
//! Probes never fail. Internal errors are logged and degrade the result to
//! "not found / update needed".

pub mod environment;
pub mod probe;

use serde::{Deserialize, Serialize};

use crate::version::{Version, VersionComparator};

pub use environment::{EnvironmentSnapshot, probe_environment};
pub use probe::{DetectionProbes, TieBreak};

/// Verdict of a version probe.
///
/// `found == false` always comes with `current_version == None` and
/// `needs_update == true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub found: bool,
    pub current_version: Option<Version>,
    /// Raw version text as reported, even when it failed to parse.
    pub reported_version: Option<String>,
    pub required_version: Version,
    pub needs_update: bool,
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn not_found(required: &Version) -> Self {
        Self {
            found: false,
            current_version: None,
            reported_version: None,
            required_version: required.clone(),
            needs_update: true,
            error: None,
        }
    }

    pub fn probe_failed(required: &Version, error: impl std::fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::not_found(required)
        }
    }

    /// Result for an entity that exists and reported `reported` as its version.
    pub fn found(reported: Option<&str>, required: &Version) -> Self {
        let current_version = reported.and_then(|text| Version::parse(text).ok());
        let needs_update = match reported {
            Some(text) => VersionComparator::is_older_text(text, required),
            None => true,
        };
        Self {
            found: true,
            current_version,
            reported_version: reported.map(str::to_string),
            required_version: required.clone(),
            needs_update,
            error: None,
        }
    }

    /// Present and at or above the required version.
    pub fn is_current(&self) -> bool {
        self.found && !self.needs_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn not_found_needs_update() {
        let result = DetectionResult::not_found(&v("1.0"));
        assert!(!result.found);
        assert!(result.needs_update);
        assert!(result.current_version.is_none());
    }

    #[test]
    fn malformed_reported_version_needs_update() {
        let result = DetectionResult::found(Some("unknown"), &v("1.0"));
        assert!(result.found);
        assert!(result.needs_update);
        assert!(result.current_version.is_none());
        assert_eq!(result.reported_version.as_deref(), Some("unknown"));
    }

    #[test]
    fn missing_version_metadata_needs_update() {
        let result = DetectionResult::found(None, &v("1.0"));
        assert!(result.found);
        assert!(result.needs_update);
    }

    #[test]
    fn equal_version_is_current() {
        let result = DetectionResult::found(Some("2.1.0.0"), &v("2.1"));
        assert!(result.is_current());
    }
}
