//! Deploykit Core Library
//!
//! Provides the deployment session state machine: version detection,
//! dependency chaining, phase-ordered install/uninstall/repair handlers
//! and the structured end-of-run report.

pub mod chain;
pub mod config;
pub mod detect;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod report;
pub mod session;
pub mod types;
pub mod version;

/// Re-exports of commonly used types
pub mod prelude {
    // Versions
    pub use crate::version::{Version, VersionComparator};

    // Shared enums
    pub use crate::types::{
        DeployMode, ItemStatus, MatchMode, OperationKind, PromptKind, SessionPhase, Severity,
    };

    // Detection
    pub use crate::detect::{DetectionProbes, DetectionResult, EnvironmentSnapshot, TieBreak};

    // Dependency chain
    pub use crate::chain::{
        ChainAction, ChainResult, ChainVerificationReport, DependencyChain, DependencyItem,
    };

    // Session
    pub use crate::session::{AppMetadata, DeploymentSession, SessionState};

    // Report
    pub use crate::report::{Report, ReportBuilder};

    // Orchestration
    pub use crate::orchestrator::{CancellationToken, ExitCode, Orchestrator};

    // Configuration
    pub use crate::config::DeploymentManifest;
}
