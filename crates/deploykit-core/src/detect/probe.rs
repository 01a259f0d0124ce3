//! Application, file and registry version probes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detect::environment::{EnvironmentSnapshot, probe_environment};
use crate::detect::DetectionResult;
use crate::error::ProbeError;
use crate::host::{
    ApplicationInventory, FileMetadataReader, HostFacts, HostServices, InstalledApplication,
    RegistryReader, RegistryValue,
};
use crate::types::MatchMode;
use crate::version::Version;

/// Which inventory entry wins when a pattern matches several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Highest parsed version; unparseable versions sort lowest.
    #[default]
    HighestVersion,
    /// Whatever the inventory returned first.
    FirstReturned,
    /// Lowest display name.
    Alphabetical,
}

impl TieBreak {
    /// Pick one entry. Remaining ties fall back to display name, then inventory order.
    pub fn select(self, apps: &[InstalledApplication]) -> Option<&InstalledApplication> {
        match self {
            TieBreak::FirstReturned => apps.first(),
            TieBreak::Alphabetical => apps
                .iter()
                .enumerate()
                .min_by(|(ia, a), (ib, b)| {
                    a.display_name.cmp(&b.display_name).then(ia.cmp(ib))
                })
                .map(|(_, app)| app),
            TieBreak::HighestVersion => apps
                .iter()
                .enumerate()
                .max_by(|(ia, a), (ib, b)| {
                    parsed(a)
                        .cmp(&parsed(b))
                        .then_with(|| b.display_name.cmp(&a.display_name))
                        .then_with(|| ib.cmp(ia))
                })
                .map(|(_, app)| app),
        }
    }
}

fn parsed(app: &InstalledApplication) -> Option<Version> {
    app.display_version
        .as_deref()
        .and_then(|text| Version::parse(text).ok())
}

/// Where the presence and version of an application can be observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionTarget {
    /// Inventory display-name pattern.
    pub name: Option<String>,
    #[serde(default)]
    pub match_mode: MatchMode,
    pub file: Option<PathBuf>,
    pub registry: Option<RegistryLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLocation {
    pub key: String,
    pub value: String,
}

impl DetectionTarget {
    pub fn by_name(name: impl Into<String>, match_mode: MatchMode) -> Self {
        Self {
            name: Some(name.into()),
            match_mode,
            ..Self::default()
        }
    }

    pub fn has_evidence(&self) -> bool {
        self.name.is_some() || self.file.is_some() || self.registry.is_some()
    }
}

/// Probe set bound to the host's read-only collaborators.
#[derive(Clone, Copy)]
pub struct DetectionProbes<'a> {
    inventory: &'a dyn ApplicationInventory,
    files: &'a dyn FileMetadataReader,
    registry: &'a dyn RegistryReader,
    facts: &'a dyn HostFacts,
    tie_break: TieBreak,
}

impl<'a> DetectionProbes<'a> {
    pub fn new(services: &HostServices<'a>, tie_break: TieBreak) -> Self {
        Self {
            inventory: services.inventory,
            files: services.files,
            registry: services.registry,
            facts: services.facts,
            tie_break,
        }
    }

    /// Matching inventory entries; an unreachable inventory yields none.
    pub fn probe_application(
        &self,
        name_pattern: &str,
        match_mode: MatchMode,
    ) -> Vec<InstalledApplication> {
        self.query(name_pattern, match_mode).unwrap_or_default()
    }

    pub fn probe_application_version(
        &self,
        name_pattern: &str,
        match_mode: MatchMode,
        required: &Version,
    ) -> DetectionResult {
        let apps = match self.query(name_pattern, match_mode) {
            Ok(apps) => apps,
            Err(err) => return DetectionResult::probe_failed(required, err),
        };

        let Some(selected) = self.tie_break.select(&apps) else {
            debug!(pattern = name_pattern, "no matching application installed");
            return DetectionResult::not_found(required);
        };
        if apps.len() > 1 {
            debug!(
                pattern = name_pattern,
                matches = apps.len(),
                selected = %selected.display_name,
                "multiple applications matched"
            );
        }
        DetectionResult::found(selected.display_version.as_deref(), required)
    }

    pub fn probe_file_version(&self, path: &Path, required: &Version) -> DetectionResult {
        match self.files.exists(path) {
            Ok(true) => {}
            Ok(false) => return DetectionResult::not_found(required),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "file probe failed");
                return DetectionResult::probe_failed(required, err);
            }
        }
        match self.files.read_file_version(path) {
            Ok(version) => DetectionResult::found(version.as_deref(), required),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "file version probe failed");
                DetectionResult::probe_failed(required, err)
            }
        }
    }

    pub fn probe_registry_version(
        &self,
        key: &str,
        value_name: &str,
        required: &Version,
    ) -> DetectionResult {
        match self.registry.read_value(key, value_name) {
            Ok(None) => DetectionResult::not_found(required),
            Ok(Some(RegistryValue::Text(text))) => DetectionResult::found(Some(&text), required),
            Ok(Some(RegistryValue::Number(n))) => {
                DetectionResult::found(Some(&n.to_string()), required)
            }
            Err(err) => {
                warn!(key, value = value_name, error = %err, "registry probe failed");
                DetectionResult::probe_failed(required, err)
            }
        }
    }

    /// Probe the first configured evidence source: inventory, then file, then registry.
    pub fn probe_target(&self, target: &DetectionTarget, required: &Version) -> DetectionResult {
        if let Some(name) = &target.name {
            return self.probe_application_version(name, target.match_mode, required);
        }
        if let Some(path) = &target.file {
            return self.probe_file_version(path, required);
        }
        if let Some(location) = &target.registry {
            return self.probe_registry_version(&location.key, &location.value, required);
        }
        DetectionResult::probe_failed(required, "no detection evidence configured")
    }

    pub fn probe_environment(&self) -> EnvironmentSnapshot {
        probe_environment(self.facts)
    }

    fn query(
        &self,
        name_pattern: &str,
        match_mode: MatchMode,
    ) -> Result<Vec<InstalledApplication>, ProbeError> {
        let apps = self
            .inventory
            .query_installed_applications(name_pattern, match_mode)
            .inspect_err(|err| {
                warn!(pattern = name_pattern, error = %err, "application inventory probe failed");
            })?;
        // Inventories may match loosely; the pattern is authoritative.
        Ok(apps
            .into_iter()
            .filter(|app| match_mode.matches(name_pattern, &app.display_name))
            .collect())
    }
}

impl std::fmt::Debug for DetectionProbes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionProbes")
            .field("tie_break", &self.tie_break)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str, version: Option<&str>) -> InstalledApplication {
        InstalledApplication::new(name, version)
    }

    #[test]
    fn highest_version_tie_break() {
        let apps = vec![
            app("Foo", Some("1.0")),
            app("Foo", Some("garbage")),
            app("Foo", Some("1.10")),
            app("Foo", Some("1.9")),
        ];
        let selected = TieBreak::HighestVersion.select(&apps).unwrap();
        assert_eq!(selected.display_version.as_deref(), Some("1.10"));
    }

    #[test]
    fn highest_version_ties_prefer_name_then_order() {
        let apps = vec![
            app("Foo B", Some("2.0")),
            app("Foo A", Some("2.0")),
            app("Foo A", Some("2.0.0")),
        ];
        let selected = TieBreak::HighestVersion.select(&apps).unwrap();
        assert_eq!(selected, &apps[1]);
    }

    #[test]
    fn alphabetical_and_first_returned() {
        let apps = vec![app("Zeta", Some("1.0")), app("Alpha", Some("0.1"))];
        assert_eq!(TieBreak::Alphabetical.select(&apps).unwrap().display_name, "Alpha");
        assert_eq!(TieBreak::FirstReturned.select(&apps).unwrap().display_name, "Zeta");
        assert!(TieBreak::HighestVersion.select(&[]).is_none());
    }

    #[test]
    fn target_without_evidence() {
        assert!(!DetectionTarget::default().has_evidence());
        assert!(DetectionTarget::by_name("Foo", MatchMode::Exact).has_evidence());
    }
}
