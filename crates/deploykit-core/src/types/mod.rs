//! Shared core types used across detection, chain and session layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Requested deployment operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Install,
    Uninstall,
    Repair,
}

impl OperationKind {
    /// Noun used in phase labels ("Installation", "Uninstallation", "Repair").
    pub fn noun(self) -> &'static str {
        match self {
            OperationKind::Install => "Installation",
            OperationKind::Uninstall => "Uninstallation",
            OperationKind::Repair => "Repair",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Install => "install",
            OperationKind::Uninstall => "uninstall",
            OperationKind::Repair => "repair",
        };
        f.write_str(s)
    }
}

/// How an inventory name pattern is matched against display names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Case-sensitive full match.
    #[default]
    Exact,
    /// Substring match.
    Contains,
}

impl MatchMode {
    pub fn matches(self, pattern: &str, display_name: &str) -> bool {
        match self {
            MatchMode::Exact => display_name == pattern,
            MatchMode::Contains => display_name.contains(pattern),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => f.write_str("exact"),
            MatchMode::Contains => f.write_str("contains"),
        }
    }
}

/// Phase within a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    PreOperation,
    Operation,
    PostOperation,
}

impl SessionPhase {
    /// Phase marker for logging/UI collaborators, e.g. "Pre-Installation".
    pub fn label(self, kind: OperationKind) -> String {
        match self {
            SessionPhase::PreOperation => format!("Pre-{}", kind.noun()),
            SessionPhase::Operation => kind.noun().to_string(),
            SessionPhase::PostOperation => format!("Post-{}", kind.noun()),
        }
    }
}

/// Verified presence of a dependency item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Installed,
    Missing,
}

/// How much user interaction the prompt collaborator may show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployMode {
    /// Welcome, progress, completion and error messages.
    #[default]
    Interactive,
    /// Error messages only.
    NonInteractive,
    /// Nothing at all.
    Silent,
}

impl DeployMode {
    pub fn allows(self, kind: PromptKind) -> bool {
        match self {
            DeployMode::Interactive => true,
            DeployMode::NonInteractive => kind == PromptKind::Error,
            DeployMode::Silent => false,
        }
    }
}

/// Kind of user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptKind {
    Welcome,
    Progress,
    Completion,
    Error,
}

impl PromptKind {
    pub fn severity(self) -> Severity {
        match self {
            PromptKind::Error => Severity::Error,
            PromptKind::Welcome | PromptKind::Progress | PromptKind::Completion => Severity::Info,
        }
    }
}

/// Log severity for collaborator-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Error,
}
