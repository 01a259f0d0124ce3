//! TOML host-state fixtures describing a simulated endpoint.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::host::RegistryValue;
use crate::host::memory::{EnvironmentFacts, InstallerBehavior, MemoryHost};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostState {
    pub environment: EnvironmentSection,
    #[serde(rename = "application")]
    pub applications: Vec<ApplicationEntry>,
    #[serde(rename = "file")]
    pub files: Vec<FileEntry>,
    #[serde(rename = "registry")]
    pub registry: Vec<RegistryEntry>,
    #[serde(rename = "installer")]
    pub installers: Vec<InstallerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSection {
    pub is_laptop: bool,
    pub is_domain_joined: bool,
    pub is_server: bool,
    pub is_virtual_machine: bool,
    pub is_terminal_server: bool,
    pub is_admin: bool,
    pub architecture: String,
    pub hour: u8,
}

impl Default for EnvironmentSection {
    fn default() -> Self {
        let facts = EnvironmentFacts::default();
        Self {
            is_laptop: facts.is_laptop,
            is_domain_joined: facts.is_domain_joined,
            is_server: facts.is_server,
            is_virtual_machine: facts.is_virtual_machine,
            is_terminal_server: facts.is_terminal_server,
            is_admin: facts.is_admin,
            architecture: facts.architecture,
            hour: facts.hour,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationEntry {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: String,
    pub value: String,
    pub data: RegistryValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerEntry {
    pub name: String,
    pub exit_code: Option<i32>,
    pub fail: Option<String>,
}

impl HostState {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.environment.hour > 23 {
            anyhow::bail!("environment.hour must be 0-23, got {}", self.environment.hour);
        }
        for installer in &self.installers {
            if installer.exit_code.is_some() && installer.fail.is_some() {
                anyhow::bail!(
                    "installer '{}' sets both exit_code and fail",
                    installer.name
                );
            }
        }
        Ok(())
    }

    pub fn into_host(self) -> MemoryHost {
        let env = self.environment;
        let mut host = MemoryHost::new().with_facts(EnvironmentFacts {
            is_laptop: env.is_laptop,
            is_domain_joined: env.is_domain_joined,
            is_server: env.is_server,
            is_virtual_machine: env.is_virtual_machine,
            is_terminal_server: env.is_terminal_server,
            is_admin: env.is_admin,
            architecture: env.architecture,
            hour: env.hour,
        });

        for app in self.applications {
            host = host.with_application(&app.name, app.version.as_deref());
        }
        for file in self.files {
            host = host.with_file(file.path, file.version.as_deref());
        }
        for entry in self.registry {
            host = host.with_registry_value(&entry.key, &entry.value, entry.data);
        }
        for installer in self.installers {
            let behavior = match (installer.fail, installer.exit_code) {
                (Some(reason), _) => InstallerBehavior::Fail(reason),
                (None, Some(code)) => InstallerBehavior::ExitCode(code),
                (None, None) => continue,
            };
            host = host.with_installer_behavior(&installer.name, behavior);
        }
        host
    }
}

pub fn parse_host_state_str(content: &str) -> anyhow::Result<HostState> {
    let state: HostState = toml::from_str(content).context("Invalid host state TOML")?;
    state.validate()?;
    Ok(state)
}

/// Load a host-state fixture; a missing file yields a default empty host.
pub fn load_host_state(path: &Path) -> anyhow::Result<HostState> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "host state file missing, using defaults");
        return Ok(HostState::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read host state file: {}", path.display()))?;
    parse_host_state_str(&content)
        .with_context(|| format!("Failed to parse host state file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ApplicationInventory, HostFacts, RegistryReader};
    use crate::types::MatchMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_full_host_state() {
        let toml = r#"
[environment]
is_laptop = true
is_admin = false
architecture = "arm64"
hour = 22

[[application]]
name = "Contoso Widget"
version = "1.0.0"

[[registry]]
key = "HKLM/Software/Contoso"
value = "Build"
data = 42

[[installer]]
name = "Contoso Widget"
exit_code = 1603
"#;
        let host = parse_host_state_str(toml).unwrap().into_host();
        assert!(host.is_laptop().unwrap());
        assert!(!host.is_admin().unwrap());
        assert_eq!(host.architecture().unwrap(), "arm64");
        assert_eq!(host.local_hour().unwrap(), 22);

        let apps = host
            .query_installed_applications("Widget", MatchMode::Contains)
            .unwrap();
        assert_eq!(apps.len(), 1);

        let value = host.read_value("HKLM/Software/Contoso", "Build").unwrap();
        assert_eq!(value, Some(RegistryValue::Number(42)));
    }

    #[test]
    fn rejects_out_of_range_hour() {
        let err = parse_host_state_str("[environment]\nhour = 24\n").unwrap_err();
        assert!(err.to_string().contains("0-23"));
    }

    #[test]
    fn missing_file_yields_default_host() {
        let dir = tempfile::tempdir().unwrap();
        let state = load_host_state(&dir.path().join("absent.toml")).unwrap();
        assert!(state.applications.is_empty());
        assert!(state.environment.is_admin);
    }

    #[test]
    fn loads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[[application]]\nname = \"Foo\"\nversion = \"2.0\"").unwrap();
        let state = load_host_state(file.path()).unwrap();
        assert_eq!(state.applications[0].name, "Foo");
    }
}
