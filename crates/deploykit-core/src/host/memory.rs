//! In-memory host used by tests and the CLI simulation mode.
//!
//! The installer mutates the inventory the way a real installer would, so a
//! post-operation re-probe observes the change.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{InstallerError, ProbeError};
use crate::host::{
    ApplicationInventory, FileMetadataReader, HostFacts, InstallAction, InstallRequest,
    InstalledApplication, Installer, Prompt, RegistryReader, RegistryValue,
};
use crate::types::{MatchMode, PromptKind};

/// Static host classification facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentFacts {
    pub is_laptop: bool,
    pub is_domain_joined: bool,
    pub is_server: bool,
    pub is_virtual_machine: bool,
    pub is_terminal_server: bool,
    pub is_admin: bool,
    pub architecture: String,
    pub hour: u8,
}

impl Default for EnvironmentFacts {
    fn default() -> Self {
        Self {
            is_laptop: false,
            is_domain_joined: false,
            is_server: false,
            is_virtual_machine: false,
            is_terminal_server: false,
            is_admin: true,
            architecture: "x64".to_string(),
            hour: 12,
        }
    }
}

/// Scripted installer response for a named target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerBehavior {
    /// Exit with this code; the inventory changes only for success/reboot codes.
    ExitCode(i32),
    /// Fail to launch at all.
    Fail(String),
}

#[derive(Debug, Default)]
struct HostInner {
    applications: Vec<InstalledApplication>,
    files: HashMap<PathBuf, Option<String>>,
    registry: HashMap<(String, String), RegistryValue>,
    behaviors: HashMap<String, InstallerBehavior>,
    installer_calls: Vec<InstallRequest>,
    prompts: Vec<(PromptKind, String)>,
    inventory_error: Option<String>,
    file_errors: HashMap<PathBuf, String>,
    registry_errors: HashMap<(String, String), String>,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    inner: Mutex<HostInner>,
    facts: EnvironmentFacts,
    failing_checks: HashSet<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(mut self, facts: EnvironmentFacts) -> Self {
        self.facts = facts;
        self
    }

    /// Make one environment check (e.g. `"is_laptop"`) report an error.
    pub fn with_failing_check(mut self, check: impl Into<String>) -> Self {
        self.failing_checks.insert(check.into());
        self
    }

    pub fn with_application(self, name: &str, version: Option<&str>) -> Self {
        self.add_application(name, version);
        self
    }

    pub fn with_file(self, path: impl Into<PathBuf>, version: Option<&str>) -> Self {
        self.lock()
            .files
            .insert(path.into(), version.map(str::to_string));
        self
    }

    pub fn with_registry_value(self, key: &str, value_name: &str, value: RegistryValue) -> Self {
        self.lock()
            .registry
            .insert(registry_key(key, value_name), value);
        self
    }

    pub fn with_installer_behavior(self, name: &str, behavior: InstallerBehavior) -> Self {
        self.lock().behaviors.insert(name.to_string(), behavior);
        self
    }

    pub fn with_inventory_error(self, reason: &str) -> Self {
        self.lock().inventory_error = Some(reason.to_string());
        self
    }

    /// Make metadata reads for `path` fail as if access were denied.
    pub fn with_file_error(self, path: impl Into<PathBuf>, reason: &str) -> Self {
        self.lock().file_errors.insert(path.into(), reason.to_string());
        self
    }

    pub fn with_registry_error(self, key: &str, value_name: &str, reason: &str) -> Self {
        self.lock()
            .registry_errors
            .insert(registry_key(key, value_name), reason.to_string());
        self
    }

    pub fn add_application(&self, name: &str, version: Option<&str>) {
        self.lock()
            .applications
            .push(InstalledApplication::new(name, version));
    }

    pub fn applications(&self) -> Vec<InstalledApplication> {
        self.lock().applications.clone()
    }

    /// Every installer invocation, in call order.
    pub fn installer_calls(&self) -> Vec<InstallRequest> {
        self.lock().installer_calls.clone()
    }

    pub fn prompts(&self) -> Vec<(PromptKind, String)> {
        self.lock().prompts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HostInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, name: &str, value: bool) -> Result<bool, ProbeError> {
        if self.failing_checks.contains(name) {
            return Err(ProbeError::Environment {
                check: name.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        Ok(value)
    }
}

fn registry_key(key: &str, value_name: &str) -> (String, String) {
    // Registry paths and value names are case-insensitive.
    (key.to_lowercase(), value_name.to_lowercase())
}

fn file_error(path: &Path, reason: &str) -> ProbeError {
    ProbeError::FileMetadata {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn apply_install(inner: &mut HostInner, request: &InstallRequest) {
    let version = request.version.as_ref().map(ToString::to_string);
    match request.action {
        InstallAction::Uninstall => {
            inner
                .applications
                .retain(|app| app.display_name != request.name);
        }
        InstallAction::Install | InstallAction::Update => {
            let version = version.or_else(|| Some("1.0.0".to_string()));
            if let Some(existing) = inner
                .applications
                .iter_mut()
                .find(|app| app.display_name == request.name)
            {
                existing.display_version = version;
            } else {
                inner.applications.push(InstalledApplication {
                    display_name: request.name.clone(),
                    display_version: version,
                });
            }
        }
        InstallAction::Repair => {
            if !inner
                .applications
                .iter()
                .any(|app| app.display_name == request.name)
            {
                inner.applications.push(InstalledApplication {
                    display_name: request.name.clone(),
                    display_version: version.or_else(|| Some("1.0.0".to_string())),
                });
            }
        }
    }
}

impl ApplicationInventory for MemoryHost {
    fn query_installed_applications(
        &self,
        name_pattern: &str,
        match_mode: MatchMode,
    ) -> Result<Vec<InstalledApplication>, ProbeError> {
        let inner = self.lock();
        if let Some(reason) = &inner.inventory_error {
            return Err(ProbeError::InventoryUnavailable(reason.clone()));
        }
        Ok(inner
            .applications
            .iter()
            .filter(|app| match_mode.matches(name_pattern, &app.display_name))
            .cloned()
            .collect())
    }
}

impl FileMetadataReader for MemoryHost {
    fn exists(&self, path: &Path) -> Result<bool, ProbeError> {
        let inner = self.lock();
        if let Some(reason) = inner.file_errors.get(path) {
            return Err(file_error(path, reason));
        }
        Ok(inner.files.contains_key(path))
    }

    fn read_file_version(&self, path: &Path) -> Result<Option<String>, ProbeError> {
        let inner = self.lock();
        if let Some(reason) = inner.file_errors.get(path) {
            return Err(file_error(path, reason));
        }
        match inner.files.get(path) {
            Some(version) => Ok(version.clone()),
            None => Err(file_error(path, "file not found")),
        }
    }
}

impl RegistryReader for MemoryHost {
    fn read_value(&self, key: &str, value_name: &str) -> Result<Option<RegistryValue>, ProbeError> {
        let inner = self.lock();
        let lookup = registry_key(key, value_name);
        if let Some(reason) = inner.registry_errors.get(&lookup) {
            return Err(ProbeError::Registry {
                key: key.to_string(),
                value: value_name.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(inner.registry.get(&lookup).cloned())
    }
}

impl Installer for MemoryHost {
    fn run_installer(&self, request: &InstallRequest) -> Result<i32, InstallerError> {
        let mut inner = self.lock();
        inner.installer_calls.push(request.clone());

        match inner.behaviors.get(&request.name).cloned() {
            Some(InstallerBehavior::Fail(reason)) => Err(InstallerError::Failed(reason)),
            Some(InstallerBehavior::ExitCode(code)) => {
                if code == 0 || code == 3010 || code == 1641 {
                    apply_install(&mut inner, request);
                }
                Ok(code)
            }
            None => {
                apply_install(&mut inner, request);
                Ok(0)
            }
        }
    }
}

impl Prompt for MemoryHost {
    fn show_message(&self, text: &str, kind: PromptKind) {
        self.lock().prompts.push((kind, text.to_string()));
    }
}

impl HostFacts for MemoryHost {
    fn is_laptop(&self) -> Result<bool, ProbeError> {
        self.check("is_laptop", self.facts.is_laptop)
    }

    fn is_domain_joined(&self) -> Result<bool, ProbeError> {
        self.check("is_domain_joined", self.facts.is_domain_joined)
    }

    fn is_server(&self) -> Result<bool, ProbeError> {
        self.check("is_server", self.facts.is_server)
    }

    fn is_virtual_machine(&self) -> Result<bool, ProbeError> {
        self.check("is_virtual_machine", self.facts.is_virtual_machine)
    }

    fn is_terminal_server(&self) -> Result<bool, ProbeError> {
        self.check("is_terminal_server", self.facts.is_terminal_server)
    }

    fn is_admin(&self) -> Result<bool, ProbeError> {
        self.check("is_admin", self.facts.is_admin)
    }

    fn architecture(&self) -> Result<String, ProbeError> {
        self.check("architecture", true)?;
        Ok(self.facts.architecture.clone())
    }

    fn local_hour(&self) -> Result<u8, ProbeError> {
        self.check("hour", true)?;
        Ok(self.facts.hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    #[test]
    fn installer_adds_then_removes_application() {
        let host = MemoryHost::new();
        let install = InstallRequest::new(
            "Widget",
            InstallAction::Install,
            Some(Version::parse("2.0").unwrap()),
        );
        assert_eq!(host.run_installer(&install).unwrap(), 0);

        let apps = host
            .query_installed_applications("Widget", MatchMode::Exact)
            .unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].display_version.as_deref(), Some("2.0"));

        let remove = InstallRequest::new("Widget", InstallAction::Uninstall, None);
        host.run_installer(&remove).unwrap();
        assert!(host.applications().is_empty());
        assert_eq!(host.installer_calls().len(), 2);
    }

    #[test]
    fn failing_exit_code_leaves_inventory_untouched() {
        let host = MemoryHost::new().with_installer_behavior("Widget", InstallerBehavior::ExitCode(1603));
        let request = InstallRequest::new("Widget", InstallAction::Install, None);
        assert_eq!(host.run_installer(&request).unwrap(), 1603);
        assert!(host.applications().is_empty());
    }

    #[test]
    fn registry_lookup_ignores_case() {
        let host = MemoryHost::new().with_registry_value(
            "HKLM/Software/Contoso",
            "Version",
            RegistryValue::Text("1.2".to_string()),
        );
        let value = host.read_value("hklm/software/contoso", "version").unwrap();
        assert_eq!(value, Some(RegistryValue::Text("1.2".to_string())));
    }

    #[test]
    fn scripted_read_errors_surface_as_probe_errors() {
        let host = MemoryHost::new()
            .with_file("C:/Foo/foo.exe", Some("1.0"))
            .with_file_error("C:/Foo/foo.exe", "access denied")
            .with_registry_error("HKLM/Foo", "Version", "hive unavailable");
        assert!(matches!(
            host.exists(Path::new("C:/Foo/foo.exe")),
            Err(ProbeError::FileMetadata { .. })
        ));
        assert!(matches!(
            host.read_value("hklm/foo", "VERSION"),
            Err(ProbeError::Registry { .. })
        ));
    }

    #[test]
    fn failing_check_reports_environment_error() {
        let host = MemoryHost::new().with_failing_check("is_server");
        assert!(host.is_server().is_err());
        assert!(host.is_laptop().is_ok());
    }
}
