//! Structured end-of-run report.
//!
//! The report has a fixed shape: timestamp, environment, application checks
//! and dependency status. Absent data is an explicit `None`/empty list, never
//! a missing field.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{ChainResult, ChainVerificationReport, ResolutionAction};
use crate::detect::{DetectionResult, EnvironmentSnapshot};
use crate::types::{ItemStatus, MatchMode, SessionPhase};

/// Summary verdict of an application check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Ok,
    Outdated,
    Missing,
}

impl CheckStatus {
    pub fn from_result(result: &DetectionResult) -> Self {
        match (result.found, result.needs_update) {
            (false, _) => CheckStatus::Missing,
            (true, true) => CheckStatus::Outdated,
            (true, false) => CheckStatus::Ok,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationCheck {
    pub name: String,
    /// Phase the check was taken in; `None` outside a session.
    pub phase: Option<SessionPhase>,
    pub status: CheckStatus,
    pub result: DetectionResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub match_mode: MatchMode,
    pub fatal: bool,
    /// `None` when the item was only verified, never resolved.
    pub action: Option<ResolutionAction>,
    pub status: ItemStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub environment: Option<EnvironmentSnapshot>,
    pub application_checks: Vec<ApplicationCheck>,
    pub dependency_status: Vec<DependencyStatus>,
}

impl Report {
    pub fn dependency(&self, name: &str) -> Option<&DependencyStatus> {
        self.dependency_status.iter().find(|dep| dep.name == name)
    }

    /// Most recent check for `name` taken in `phase`.
    pub fn application_check(&self, name: &str, phase: SessionPhase) -> Option<&ApplicationCheck> {
        self.application_checks
            .iter()
            .rev()
            .find(|check| check.name == name && check.phase == Some(phase))
    }

    /// Whether the reported version of `name` differs between the pre- and
    /// post-operation checks. `None` if either check is missing.
    pub fn version_changed(&self, name: &str) -> Option<bool> {
        let before = self.application_check(name, SessionPhase::PreOperation)?;
        let after = self.application_check(name, SessionPhase::PostOperation)?;
        Some(
            before.result.found != after.result.found
                || before.result.current_version != after.result.current_version
                || before.result.reported_version != after.result.reported_version,
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Flatten into ordered `(key, value)` pairs.
    pub fn to_key_values(&self) -> Vec<(String, String)> {
        let mut pairs = vec![(
            "timestamp".to_string(),
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        )];

        match &self.environment {
            Some(env) => {
                let flags = [
                    ("is_laptop", env.is_laptop),
                    ("is_domain_joined", env.is_domain_joined),
                    ("is_server", env.is_server),
                    ("is_virtual_machine", env.is_virtual_machine),
                    ("is_terminal_server", env.is_terminal_server),
                    ("is_admin", env.is_admin),
                ];
                for (key, value) in flags {
                    pairs.push((format!("environment.{key}"), value.to_string()));
                }
                pairs.push(("environment.hour".to_string(), env.hour.to_string()));
                pairs.push((
                    "environment.architecture".to_string(),
                    env.architecture.clone(),
                ));
            }
            None => pairs.push(("environment".to_string(), "absent".to_string())),
        }

        for (idx, check) in self.application_checks.iter().enumerate() {
            let prefix = format!("application_checks.{idx}");
            pairs.push((format!("{prefix}.name"), check.name.clone()));
            pairs.push((format!("{prefix}.phase"), optional(check.phase.map(|p| format!("{p:?}")))));
            pairs.push((format!("{prefix}.status"), format!("{:?}", check.status).to_uppercase()));
            pairs.push((format!("{prefix}.found"), check.result.found.to_string()));
            pairs.push((
                format!("{prefix}.current_version"),
                optional(check.result.current_version.as_ref().map(ToString::to_string)),
            ));
            pairs.push((
                format!("{prefix}.required_version"),
                check.result.required_version.to_string(),
            ));
            pairs.push((
                format!("{prefix}.needs_update"),
                check.result.needs_update.to_string(),
            ));
            pairs.push((format!("{prefix}.error"), optional(check.result.error.clone())));
        }

        for (idx, dep) in self.dependency_status.iter().enumerate() {
            let prefix = format!("dependency_status.{idx}");
            pairs.push((format!("{prefix}.name"), dep.name.clone()));
            pairs.push((format!("{prefix}.match_mode"), dep.match_mode.to_string()));
            pairs.push((format!("{prefix}.fatal"), dep.fatal.to_string()));
            pairs.push((format!("{prefix}.action"), optional(dep.action.map(|a| format!("{a:?}")))));
            pairs.push((format!("{prefix}.status"), format!("{:?}", dep.status)));
            pairs.push((format!("{prefix}.error"), optional(dep.error.clone())));
        }

        pairs
    }
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "absent".to_string())
}

/// Accumulates checks over a run.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    phase: Option<SessionPhase>,
    environment: Option<EnvironmentSnapshot>,
    application_checks: Vec<ApplicationCheck>,
    dependency_status: Vec<DependencyStatus>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag subsequent application checks with `phase`.
    pub fn set_phase(&mut self, phase: Option<SessionPhase>) {
        self.phase = phase;
    }

    pub fn add_environment_snapshot(&mut self, snapshot: EnvironmentSnapshot) {
        self.environment = Some(snapshot);
    }

    pub fn add_application_check(&mut self, name: &str, result: DetectionResult) {
        self.application_checks.push(ApplicationCheck {
            name: name.to_string(),
            phase: self.phase,
            status: CheckStatus::from_result(&result),
            result,
        });
    }

    pub fn add_dependency_status(&mut self, chain: &ChainResult) {
        for item in &chain.items {
            let entry = self.dependency_entry(&item.name, item.match_mode, item.fatal);
            entry.action = Some(item.action);
            entry.status = item.status;
            entry.error = item.error.clone();
        }
    }

    /// Overwrite statuses with re-probed ones.
    pub fn add_dependency_verification(&mut self, verification: &ChainVerificationReport) {
        for item in &verification.items {
            let entry = self.dependency_entry(&item.name, item.match_mode, item.fatal);
            entry.status = item.status;
        }
    }

    fn dependency_entry(&mut self, name: &str, match_mode: MatchMode, fatal: bool) -> &mut DependencyStatus {
        let idx = match self
            .dependency_status
            .iter()
            .position(|dep| dep.name == name && dep.match_mode == match_mode)
        {
            Some(idx) => idx,
            None => {
                self.dependency_status.push(DependencyStatus {
                    name: name.to_string(),
                    match_mode,
                    fatal,
                    action: None,
                    status: ItemStatus::Missing,
                    error: None,
                });
                self.dependency_status.len() - 1
            }
        };
        &mut self.dependency_status[idx]
    }

    pub fn build(&self) -> Report {
        self.build_at(Utc::now())
    }

    /// Build with a fixed timestamp.
    pub fn build_at(&self, timestamp: DateTime<Utc>) -> Report {
        Report {
            timestamp,
            environment: self.environment.clone(),
            application_checks: self.application_checks.clone(),
            dependency_status: self.dependency_status.clone(),
        }
    }
}
