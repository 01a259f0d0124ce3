//! Session-scoped application metadata and exit-code classification.

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// How an installer's process exit code is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerVerdict {
    Success,
    /// Success, but the host must restart to complete it.
    RebootRequired,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCodePolicy {
    #[serde(default = "default_success_codes")]
    pub success_exit_codes: Vec<i32>,
    #[serde(default = "default_reboot_codes")]
    pub reboot_exit_codes: Vec<i32>,
}

fn default_success_codes() -> Vec<i32> {
    vec![0]
}

fn default_reboot_codes() -> Vec<i32> {
    vec![1641, 3010]
}

impl Default for ExitCodePolicy {
    fn default() -> Self {
        Self {
            success_exit_codes: default_success_codes(),
            reboot_exit_codes: default_reboot_codes(),
        }
    }
}

impl ExitCodePolicy {
    pub fn classify(&self, code: i32) -> InstallerVerdict {
        if self.success_exit_codes.contains(&code) {
            InstallerVerdict::Success
        } else if self.reboot_exit_codes.contains(&code) {
            InstallerVerdict::RebootRequired
        } else {
            InstallerVerdict::Failed
        }
    }
}

/// Describes the application a session deploys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub vendor: String,
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(flatten)]
    pub exit_codes: ExitCodePolicy,
    #[serde(default)]
    pub processes_to_close: Vec<String>,
}

impl AppMetadata {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            vendor: String::new(),
            name: name.into(),
            version,
            architecture: None,
            language: None,
            revision: None,
            exit_codes: ExitCodePolicy::default(),
            processes_to_close: Vec::new(),
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// "Vendor Name Version", skipping an empty vendor.
    pub fn display_name(&self) -> String {
        if self.vendor.is_empty() {
            format!("{} {}", self.name, self.version)
        } else {
            format!("{} {} {}", self.vendor, self.name, self.version)
        }
    }
}
