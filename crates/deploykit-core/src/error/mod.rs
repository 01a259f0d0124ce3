//! Error taxonomy for detection, dependency and session layers.
//!
//! Only [`ChainError::DependencyInstallFailed`] and [`OperationError`] affect
//! control flow. Version and probe errors are absorbed where they occur.

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;
use crate::types::{MatchMode, OperationKind};

/// Version string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("malformed version string: '{input}'")]
    Malformed { input: String },
}

/// Internal failure of a detection probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("application inventory unavailable: {0}")]
    InventoryUnavailable(String),

    #[error("failed to read file metadata for {path}: {reason}")]
    FileMetadata { path: String, reason: String },

    #[error("failed to read registry value {key}/{value}: {reason}")]
    Registry {
        key: String,
        value: String,
        reason: String,
    },

    #[error("environment check '{check}' failed: {reason}")]
    Environment { check: String, reason: String },
}

/// Failure reported by the installer collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallerError {
    #[error("installer exited with code {0}")]
    ExitCode(i32),

    #[error("installer timed out after {0:?}")]
    TimedOut(Duration),

    #[error("installer failed: {0}")]
    Failed(String),
}

/// Errors produced while building or resolving a dependency chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// A fatal item could not be installed or repaired.
    #[error("dependency '{name}' failed to install: {reason}")]
    DependencyInstallFailed { name: String, reason: String },

    /// Two items share the same (name, match mode) identity.
    #[error("duplicate dependency '{name}' ({match_mode})")]
    DuplicateItem { name: String, match_mode: MatchMode },
}

/// Misuse of the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session has not been opened")]
    NotOpen,

    #[error("session is closed")]
    Closed,

    #[error("invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

/// Failure of an operation handler, mapped to an exit code by the orchestrator.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Dependency(#[from] ChainError),

    #[error("deployment is not eligible on this host: {0}")]
    NotEligible(String),

    #[error("{operation} of '{app}' failed: {reason}")]
    OperationFailed {
        operation: OperationKind,
        app: String,
        reason: String,
    },

    #[error("post-operation verification failed for '{app}': {reason}")]
    VerificationFailed { app: String, reason: String },

    #[error("deployment cancelled before {0}")]
    Cancelled(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("unhandled operation error: {0}")]
    Unhandled(String),
}
