//! Collaborator interfaces supplied by the surrounding deployment toolkit.
//!
//! The core never touches the operating system directly. Everything it knows
//! about installed software, files, registry values and the host itself comes
//! through these traits; everything it does goes through [`Installer`] and
//! [`Prompt`].

pub mod memory;
pub mod state;

use std::path::Path;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::error::{InstallerError, ProbeError};
use crate::types::{MatchMode, PromptKind};
use crate::version::Version;

pub use memory::MemoryHost;
pub use state::{HostState, load_host_state};

/// One entry returned by the application inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApplication {
    pub display_name: String,
    pub display_version: Option<String>,
}

impl InstalledApplication {
    pub fn new(display_name: impl Into<String>, display_version: Option<&str>) -> Self {
        Self {
            display_name: display_name.into(),
            display_version: display_version.map(str::to_string),
        }
    }
}

/// Installed-application lookup (e.g. the uninstall registry hive).
pub trait ApplicationInventory {
    fn query_installed_applications(
        &self,
        name_pattern: &str,
        match_mode: MatchMode,
    ) -> Result<Vec<InstalledApplication>, ProbeError>;
}

/// File existence and version-resource lookup.
pub trait FileMetadataReader {
    fn exists(&self, path: &Path) -> Result<bool, ProbeError>;

    /// `Ok(None)` when the file carries no version metadata.
    fn read_file_version(&self, path: &Path) -> Result<Option<String>, ProbeError>;
}

/// Raw registry-like value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistryValue {
    Number(u64),
    Text(String),
}

/// Key/value store lookup.
pub trait RegistryReader {
    /// `Ok(None)` when either the key or the value is absent.
    fn read_value(&self, key: &str, value_name: &str) -> Result<Option<RegistryValue>, ProbeError>;
}

/// What the installer collaborator should do with a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallAction {
    Install,
    Update,
    Repair,
    Uninstall,
}

/// A single installer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub name: String,
    pub action: InstallAction,
    pub version: Option<Version>,
}

impl InstallRequest {
    pub fn new(name: impl Into<String>, action: InstallAction, version: Option<Version>) -> Self {
        Self {
            name: name.into(),
            action,
            version,
        }
    }
}

/// Runs installers. Blocking; returns the installer's process exit code.
pub trait Installer {
    fn run_installer(&self, request: &InstallRequest) -> Result<i32, InstallerError>;
}

/// User-facing message display. Must not block on dismissal.
pub trait Prompt {
    fn show_message(&self, text: &str, kind: PromptKind);
}

/// Host classification facts.
pub trait HostFacts {
    fn is_laptop(&self) -> Result<bool, ProbeError>;
    fn is_domain_joined(&self) -> Result<bool, ProbeError>;
    fn is_server(&self) -> Result<bool, ProbeError>;
    fn is_virtual_machine(&self) -> Result<bool, ProbeError>;
    fn is_terminal_server(&self) -> Result<bool, ProbeError>;
    fn is_admin(&self) -> Result<bool, ProbeError>;
    fn architecture(&self) -> Result<String, ProbeError>;

    fn local_hour(&self) -> Result<u8, ProbeError> {
        Ok(chrono::Local::now().hour() as u8)
    }
}

/// Prompt that discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPrompt;

impl Prompt for NullPrompt {
    fn show_message(&self, _text: &str, _kind: PromptKind) {}
}

/// Borrowed bundle of every collaborator a deployment run needs.
#[derive(Clone, Copy)]
pub struct HostServices<'a> {
    pub inventory: &'a dyn ApplicationInventory,
    pub files: &'a dyn FileMetadataReader,
    pub registry: &'a dyn RegistryReader,
    pub installer: &'a dyn Installer,
    pub prompt: &'a dyn Prompt,
    pub facts: &'a dyn HostFacts,
}

impl<'a> HostServices<'a> {
    /// Borrow every collaborator from a single host implementation.
    pub fn from_host<H>(host: &'a H) -> Self
    where
        H: ApplicationInventory
            + FileMetadataReader
            + RegistryReader
            + Installer
            + Prompt
            + HostFacts,
    {
        Self {
            inventory: host,
            files: host,
            registry: host,
            installer: host,
            prompt: host,
            facts: host,
        }
    }

    pub fn with_installer(mut self, installer: &'a dyn Installer) -> Self {
        self.installer = installer;
        self
    }

    pub fn with_prompt(mut self, prompt: &'a dyn Prompt) -> Self {
        self.prompt = prompt;
        self
    }
}

impl std::fmt::Debug for HostServices<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}
