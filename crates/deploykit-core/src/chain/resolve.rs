//! Chain construction, resolution and verification.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::chain::DependencyItem;
use crate::detect::{DetectionProbes, DetectionResult};
use crate::error::ChainError;
use crate::host::{InstallAction, InstallRequest, Installer};
use crate::session::{ExitCodePolicy, InstallerVerdict};
use crate::types::{ItemStatus, MatchMode};

/// Whether outdated items are acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainAction {
    /// Install absent items only.
    Install,
    /// Install absent items and update those below their required version.
    Repair,
}

/// What resolution did for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionAction {
    AlreadyPresent,
    Installed,
    Updated,
    Removed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResolution {
    pub name: String,
    pub match_mode: MatchMode,
    pub fatal: bool,
    pub action: ResolutionAction,
    pub status: ItemStatus,
    /// Detection performed before any installer ran.
    pub detected: DetectionResult,
    pub error: Option<String>,
}

/// Per-item outcome of [`DependencyChain::resolve`], in chain order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResult {
    pub items: Vec<ItemResolution>,
    pub reboot_required: bool,
}

impl ChainResult {
    pub fn failed_items(&self) -> impl Iterator<Item = &ItemResolution> {
        self.items
            .iter()
            .filter(|item| item.action == ResolutionAction::Failed)
    }

    pub fn has_non_fatal_failures(&self) -> bool {
        self.failed_items().any(|item| !item.fatal)
    }
}

/// A fatal item failed; `partial` holds everything resolved up to and including it.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct ChainFailure {
    pub error: ChainError,
    pub partial: ChainResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVerification {
    pub name: String,
    pub match_mode: MatchMode,
    pub fatal: bool,
    pub status: ItemStatus,
    pub detection: DetectionResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerificationReport {
    pub all_satisfied: bool,
    pub items: Vec<ItemVerification>,
}

impl ChainVerificationReport {
    pub fn status_of(&self, name: &str) -> Option<ItemStatus> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.status)
    }
}

/// Collaborators a chain needs while resolving.
#[derive(Clone, Copy)]
pub struct ChainContext<'a> {
    pub probes: DetectionProbes<'a>,
    pub installer: &'a dyn Installer,
    pub exit_codes: &'a ExitCodePolicy,
}

/// Ordered list of prerequisites with unique (name, match mode) identities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyChain {
    items: Vec<DependencyItem>,
}

impl DependencyChain {
    pub fn new(items: Vec<DependencyItem>) -> Result<Self, ChainError> {
        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.identity()) {
                return Err(ChainError::DuplicateItem {
                    name: item.name.clone(),
                    match_mode: item.match_mode,
                });
            }
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[DependencyItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolve items in order, stopping at the first fatal failure.
    pub fn resolve(
        &self,
        ctx: &ChainContext<'_>,
        action: ChainAction,
    ) -> Result<ChainResult, ChainFailure> {
        let mut result = ChainResult::default();

        for item in &self.items {
            let detected = ctx.probes.probe_application_version(
                &item.name,
                item.match_mode,
                &item.probe_version(),
            );

            let install_action = match (detected.found, action) {
                (false, _) => InstallAction::Install,
                (true, ChainAction::Repair) if is_outdated(item, &detected) => {
                    InstallAction::Update
                }
                (true, _) => {
                    debug!(item = %item.name, "dependency already present");
                    result.items.push(ItemResolution {
                        name: item.name.clone(),
                        match_mode: item.match_mode,
                        fatal: item.fatal,
                        action: ResolutionAction::AlreadyPresent,
                        status: ItemStatus::Installed,
                        detected,
                        error: None,
                    });
                    continue;
                }
            };

            info!(item = %item.name, action = ?install_action, "resolving dependency");
            let request =
                InstallRequest::new(&item.name, install_action, item.required_version.clone());
            let outcome = invoke(ctx, &request);

            match outcome {
                Ok(reboot) => {
                    result.reboot_required |= reboot;
                    result.items.push(ItemResolution {
                        name: item.name.clone(),
                        match_mode: item.match_mode,
                        fatal: item.fatal,
                        action: match install_action {
                            InstallAction::Update => ResolutionAction::Updated,
                            _ => ResolutionAction::Installed,
                        },
                        status: ItemStatus::Installed,
                        detected,
                        error: None,
                    });
                }
                Err(reason) => {
                    result.items.push(ItemResolution {
                        name: item.name.clone(),
                        match_mode: item.match_mode,
                        fatal: item.fatal,
                        action: ResolutionAction::Failed,
                        status: ItemStatus::Missing,
                        detected,
                        error: Some(reason.clone()),
                    });

                    if item.fatal {
                        error!(item = %item.name, %reason, "fatal dependency failed, aborting chain");
                        return Err(ChainFailure {
                            error: ChainError::DependencyInstallFailed {
                                name: item.name.clone(),
                                reason,
                            },
                            partial: result,
                        });
                    }
                    warn!(item = %item.name, %reason, "non-fatal dependency failed, continuing");
                }
            }
        }

        Ok(result)
    }

    /// Remove present items in reverse chain order; every failure is recorded, none abort.
    pub fn remove(&self, ctx: &ChainContext<'_>) -> ChainResult {
        let mut result = ChainResult::default();

        for item in self.items.iter().rev() {
            let detected = ctx.probes.probe_application_version(
                &item.name,
                item.match_mode,
                &item.probe_version(),
            );
            if !detected.found {
                debug!(item = %item.name, "dependency not present, nothing to remove");
                continue;
            }

            info!(item = %item.name, "removing dependency");
            let request = InstallRequest::new(&item.name, InstallAction::Uninstall, None);
            let outcome = invoke(ctx, &request);

            let (action, status, error) = match outcome {
                Ok(reboot) => {
                    result.reboot_required |= reboot;
                    (ResolutionAction::Removed, ItemStatus::Missing, None)
                }
                Err(reason) => {
                    warn!(item = %item.name, %reason, "failed to remove dependency, continuing");
                    (ResolutionAction::Failed, ItemStatus::Installed, Some(reason))
                }
            };
            result.items.push(ItemResolution {
                name: item.name.clone(),
                match_mode: item.match_mode,
                fatal: item.fatal,
                action,
                status,
                detected,
                error,
            });
        }

        result
    }

    /// Re-probe every item.
    pub fn verify(&self, probes: &DetectionProbes<'_>) -> ChainVerificationReport {
        let items: Vec<ItemVerification> = self
            .items
            .iter()
            .map(|item| {
                let detection = probes.probe_application_version(
                    &item.name,
                    item.match_mode,
                    &item.probe_version(),
                );
                let satisfied = detection.found && !is_outdated(item, &detection);
                ItemVerification {
                    name: item.name.clone(),
                    match_mode: item.match_mode,
                    fatal: item.fatal,
                    status: if satisfied {
                        ItemStatus::Installed
                    } else {
                        ItemStatus::Missing
                    },
                    detection,
                }
            })
            .collect();

        ChainVerificationReport {
            all_satisfied: items.iter().all(|item| item.status == ItemStatus::Installed),
            items,
        }
    }
}

/// Run the installer; `Ok(true)` means success pending reboot.
pub(crate) fn invoke(ctx: &ChainContext<'_>, request: &InstallRequest) -> Result<bool, String> {
    match ctx.installer.run_installer(request) {
        Ok(code) => match ctx.exit_codes.classify(code) {
            InstallerVerdict::Success => Ok(false),
            InstallerVerdict::RebootRequired => Ok(true),
            InstallerVerdict::Failed => Err(format!("installer exited with code {code}")),
        },
        Err(err) => Err(err.to_string()),
    }
}

/// Only items with an explicit required version can be outdated.
fn is_outdated(item: &DependencyItem, detected: &DetectionResult) -> bool {
    item.required_version.is_some() && detected.needs_update
}

impl std::fmt::Debug for ChainContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainContext")
            .field("exit_codes", self.exit_codes)
            .finish_non_exhaustive()
    }
}
