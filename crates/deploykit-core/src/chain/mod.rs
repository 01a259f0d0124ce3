//! Ordered prerequisite resolution with per-item failure isolation.

pub mod resolve;
pub mod timeout;

use serde::{Deserialize, Serialize};

use crate::types::MatchMode;
use crate::version::Version;

pub use resolve::{
    ChainAction, ChainContext, ChainFailure, ChainResult, ChainVerificationReport,
    DependencyChain, ItemResolution, ItemVerification, ResolutionAction,
};
pub use timeout::TimeoutInstaller;

/// A named prerequisite of the main application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyItem {
    pub name: String,
    #[serde(default, rename = "version")]
    pub required_version: Option<Version>,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// A fatal item's failure aborts the chain; a non-fatal one is recorded.
    #[serde(default = "default_fatal")]
    pub fatal: bool,
}

fn default_fatal() -> bool {
    true
}

impl DependencyItem {
    pub fn new(name: impl Into<String>, match_mode: MatchMode) -> Self {
        Self {
            name: name.into(),
            required_version: None,
            match_mode,
            fatal: true,
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.required_version = Some(version);
        self
    }

    pub fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }

    /// Chain identity: no two items may share it.
    pub fn identity(&self) -> (&str, MatchMode) {
        (&self.name, self.match_mode)
    }

    /// Version used for probing; presence-only items require `0`.
    pub fn probe_version(&self) -> Version {
        self.required_version
            .clone()
            .unwrap_or_else(|| Version::from_components([0]))
    }
}
