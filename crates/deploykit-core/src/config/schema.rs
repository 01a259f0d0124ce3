//! Manifest schema.

use serde::{Deserialize, Serialize};

use crate::chain::{DependencyChain, DependencyItem};
use crate::detect::TieBreak;
use crate::detect::probe::DetectionTarget;
use crate::error::ChainError;
use crate::orchestrator::eligibility::EligibilityRule;
use crate::session::AppMetadata;
use crate::types::{DeployMode, MatchMode};

/// Complete description of one deployable application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub app: AppMetadata,

    /// Defaults to an exact inventory match on `app.name`.
    #[serde(default)]
    pub detection: Option<DetectionTarget>,

    #[serde(default)]
    pub policy: DeploymentPolicy,

    #[serde(default)]
    pub eligibility: Vec<EligibilityRule>,

    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencyItem>,
}

/// Run-wide switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentPolicy {
    pub deploy_mode: DeployMode,
    /// Report 3010 instead of 0 when a reboot is pending.
    pub allow_reboot_passthru: bool,
    /// Leave prerequisites installed on uninstall.
    pub keep_shared_dependencies: bool,
    /// Show the underlying error text in failure prompts.
    pub show_error_details: bool,
    pub tie_break: TieBreak,
    pub installer_timeout_secs: Option<u64>,
}

impl Default for DeploymentPolicy {
    fn default() -> Self {
        Self {
            deploy_mode: DeployMode::Interactive,
            allow_reboot_passthru: true,
            keep_shared_dependencies: true,
            show_error_details: false,
            tie_break: TieBreak::HighestVersion,
            installer_timeout_secs: None,
        }
    }
}

impl DeploymentManifest {
    pub fn new(app: AppMetadata) -> Self {
        Self {
            app,
            detection: None,
            policy: DeploymentPolicy::default(),
            eligibility: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, item: DependencyItem) -> Self {
        self.dependencies.push(item);
        self
    }

    pub fn with_detection(mut self, target: DetectionTarget) -> Self {
        self.detection = Some(target);
        self
    }

    pub fn with_eligibility(mut self, rule: EligibilityRule) -> Self {
        self.eligibility.push(rule);
        self
    }

    pub fn detection_target(&self) -> DetectionTarget {
        self.detection
            .clone()
            .unwrap_or_else(|| DetectionTarget::by_name(&self.app.name, MatchMode::Exact))
    }

    /// Name handed to the installer for the main application.
    pub fn install_name(&self) -> &str {
        self.detection
            .as_ref()
            .and_then(|target| target.name.as_deref())
            .unwrap_or(&self.app.name)
    }

    pub fn dependency_chain(&self) -> Result<DependencyChain, ChainError> {
        DependencyChain::new(self.dependencies.clone())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app.name.trim().is_empty() {
            anyhow::bail!("app.name must not be empty");
        }
        if let Some(target) = &self.detection
            && !target.has_evidence()
        {
            anyhow::bail!("[detection] must set at least one of name, file or registry");
        }
        for dep in &self.dependencies {
            if dep.name.trim().is_empty() {
                anyhow::bail!("dependency name must not be empty");
            }
        }
        for rule in &self.eligibility {
            if let EligibilityRule::Hours { start, end } = rule
                && (*start > 23 || *end > 23)
            {
                anyhow::bail!("hours eligibility window out of range: {start}..{end}");
            }
        }
        self.dependency_chain()?;
        if self.policy.installer_timeout_secs == Some(0) {
            anyhow::bail!("policy.installer_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
