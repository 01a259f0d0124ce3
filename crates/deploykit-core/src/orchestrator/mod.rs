//! Phase-ordered deployment driver.
//!
//! One [`Orchestrator::run`] call owns one [`DeploymentSession`]: it opens the
//! session, runs Pre → Main → Post, maps the outcome to an exit code and
//! closes the session exactly once, including when a handler panics.

pub mod eligibility;
mod install;
mod repair;
mod uninstall;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::chain::resolve::invoke;
use crate::chain::{ChainContext, ChainFailure, ChainResult, DependencyChain};
use crate::config::DeploymentManifest;
use crate::detect::probe::DetectionTarget;
use crate::detect::{DetectionProbes, DetectionResult};
use crate::error::{ChainError, OperationError};
use crate::host::{HostServices, InstallAction, InstallRequest};
use crate::report::{Report, ReportBuilder};
use crate::session::{DeploymentSession, PhaseObserver};
use crate::types::{ItemStatus, OperationKind, PromptKind};

pub type ExitCode = i32;

pub const EXIT_SUCCESS: ExitCode = 0;
pub const EXIT_REBOOT_REQUIRED: ExitCode = 3010;
pub const EXIT_CANCELLED: ExitCode = 1602;
/// Uncaught orchestrator-level failure.
pub const EXIT_UNHANDLED: ExitCode = 60001;
pub const EXIT_DEPENDENCY_FAILED: ExitCode = 60002;
pub const EXIT_NOT_ELIGIBLE: ExitCode = 60003;
pub const EXIT_OPERATION_FAILED: ExitCode = 60004;

/// Exit code reported for a failed run.
pub fn exit_code_for(err: &OperationError) -> ExitCode {
    match err {
        OperationError::Dependency(_) => EXIT_DEPENDENCY_FAILED,
        OperationError::NotEligible(_) => EXIT_NOT_ELIGIBLE,
        OperationError::OperationFailed { .. } | OperationError::VerificationFailed { .. } => {
            EXIT_OPERATION_FAILED
        }
        OperationError::Cancelled(_) => EXIT_CANCELLED,
        OperationError::Session(_) | OperationError::Unhandled(_) => EXIT_UNHANDLED,
    }
}

/// Cooperative cancellation flag, checked at phase boundaries only.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: ExitCode,
    pub reboot_required: bool,
    pub report: Report,
}

pub struct Orchestrator<'a> {
    manifest: &'a DeploymentManifest,
    services: HostServices<'a>,
    chain: DependencyChain,
    target: DetectionTarget,
    cancellation: CancellationToken,
    observers: Vec<Arc<dyn PhaseObserver>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        manifest: &'a DeploymentManifest,
        services: HostServices<'a>,
    ) -> Result<Self, ChainError> {
        Ok(Self {
            manifest,
            services,
            chain: manifest.dependency_chain()?,
            target: manifest.detection_target(),
            cancellation: CancellationToken::new(),
            observers: Vec::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_observer<O: PhaseObserver + 'static>(mut self, observer: O) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn manifest(&self) -> &DeploymentManifest {
        self.manifest
    }

    pub fn run(&self, operation: OperationKind) -> ExitCode {
        self.run_with_report(operation).exit_code
    }

    pub fn run_with_report(&self, operation: OperationKind) -> RunOutcome {
        let mut session = DeploymentSession::new(self.manifest.app.clone(), operation);
        for observer in &self.observers {
            session.add_observer(Box::new(Arc::clone(observer)));
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.drive(&mut session)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    app = %self.manifest.app.name,
                    %operation,
                    panic = %message,
                    "unhandled error at orchestrator boundary"
                );
                Err(OperationError::Unhandled(message))
            }
        };

        let code = match result {
            Ok(()) => self.success_code(&session),
            Err(err) => {
                let code = exit_code_for(&err);
                error!(app = %self.manifest.app.name, %operation, exit_code = code, error = %err, "deployment failed");
                self.prompt(&self.failure_message(operation, &err), PromptKind::Error);
                code
            }
        };

        let exit_code = session.close(code);
        RunOutcome {
            exit_code,
            reboot_required: session.reboot_required(),
            report: session.report().build(),
        }
    }

    /// Probe environment, application and dependencies without a session.
    pub fn detect(&self) -> Report {
        let probes = self.probes();
        let mut builder = ReportBuilder::new();
        builder.add_environment_snapshot(probes.probe_environment());
        builder.add_application_check(
            self.manifest.install_name(),
            probes.probe_target(&self.target, &self.manifest.app.version),
        );
        if !self.chain.is_empty() {
            builder.add_dependency_verification(&self.chain.verify(&probes));
        }
        builder.build()
    }

    fn drive(&self, session: &mut DeploymentSession) -> Result<(), OperationError> {
        let operation = session.operation();
        self.check_cancelled("pre-operation")?;
        session.open()?;

        let probes = self.probes();
        let environment = probes.probe_environment();
        session
            .report_mut()
            .add_environment_snapshot(environment.clone());

        self.prompt(&self.welcome_message(operation), PromptKind::Welcome);
        eligibility::evaluate(&self.manifest.eligibility, &environment)
            .map_err(OperationError::NotEligible)?;

        let detected = self.probe_app(&probes, session);
        if self.nothing_to_do(operation, &detected) {
            self.prompt(
                &format!("{} is already in the requested state.", self.app_name()),
                PromptKind::Completion,
            );
            return Ok(());
        }

        self.check_cancelled("operation")?;
        session.enter_operation()?;
        self.prompt(
            &format!("{} of {} in progress...", operation.noun(), self.app_name()),
            PromptKind::Progress,
        );

        let ctx = ChainContext {
            probes,
            installer: self.services.installer,
            exit_codes: &self.manifest.app.exit_codes,
        };
        match operation {
            OperationKind::Install => install::run(self, &ctx, session, &detected)?,
            OperationKind::Uninstall => uninstall::run(self, &ctx, session)?,
            OperationKind::Repair => repair::run(self, &ctx, session, &detected)?,
        }

        self.check_cancelled("post-operation")?;
        session.enter_post()?;
        self.verify(&probes, session)?;

        let mut done = format!("{} of {} completed.", operation.noun(), self.app_name());
        if session.reboot_required() {
            done.push_str(" A restart is required.");
        }
        self.prompt(&done, PromptKind::Completion);
        Ok(())
    }

    /// Short-circuit checks taken at the end of PreOperation.
    fn nothing_to_do(&self, operation: OperationKind, detected: &DetectionResult) -> bool {
        match operation {
            OperationKind::Install if detected.is_current() => {
                info!(app = %self.manifest.app.name, "already installed at required version");
                true
            }
            OperationKind::Uninstall if !detected.found && detected.error.is_none() => {
                info!(app = %self.manifest.app.name, "not installed, nothing to remove");
                true
            }
            _ => false,
        }
    }

    fn verify(
        &self,
        probes: &DetectionProbes<'_>,
        session: &mut DeploymentSession,
    ) -> Result<(), OperationError> {
        let operation = session.operation();
        let result = self.probe_app(probes, session);

        if !self.chain.is_empty() {
            let verification = self.chain.verify(probes);
            if !verification.all_satisfied && operation != OperationKind::Uninstall {
                for item in verification.items.iter().filter(|item| item.status == ItemStatus::Missing) {
                    warn!(item = %item.name, fatal = item.fatal, "dependency not satisfied after operation");
                }
            }
            session.report_mut().add_dependency_verification(&verification);
        }

        let failure = match operation {
            OperationKind::Install | OperationKind::Repair if !result.found => {
                Some("application not detected".to_string())
            }
            OperationKind::Install | OperationKind::Repair if result.needs_update => Some(format!(
                "detected version {} is below required {}",
                result.reported_version.as_deref().unwrap_or("unknown"),
                result.required_version
            )),
            OperationKind::Uninstall if result.found => {
                Some("application still detected".to_string())
            }
            _ => None,
        };

        match failure {
            Some(reason) => Err(OperationError::VerificationFailed {
                app: self.manifest.app.name.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Run the installer against the main application.
    fn run_main(
        &self,
        ctx: &ChainContext<'_>,
        session: &mut DeploymentSession,
        action: InstallAction,
    ) -> Result<(), OperationError> {
        let version = match action {
            InstallAction::Uninstall => None,
            _ => Some(self.manifest.app.version.clone()),
        };
        let request = InstallRequest::new(self.manifest.install_name(), action, version);
        info!(app = %request.name, ?action, "running main installer");

        match invoke(ctx, &request) {
            Ok(reboot) => {
                if reboot {
                    session.mark_reboot_required();
                }
                Ok(())
            }
            Err(reason) => Err(OperationError::OperationFailed {
                operation: session.operation(),
                app: self.manifest.app.name.clone(),
                reason,
            }),
        }
    }

    fn record_chain(&self, session: &mut DeploymentSession, result: &ChainResult) {
        if result.reboot_required {
            session.mark_reboot_required();
        }
        if result.has_non_fatal_failures() {
            debug!(
                failed = result.failed_items().count(),
                "chain finished with non-fatal failures"
            );
        }
        session.report_mut().add_dependency_status(result);
    }

    /// Record the partial chain and surface the fatal error.
    fn chain_failed(&self, session: &mut DeploymentSession, failure: ChainFailure) -> OperationError {
        self.record_chain(session, &failure.partial);
        failure.error.into()
    }

    fn probe_app(
        &self,
        probes: &DetectionProbes<'_>,
        session: &mut DeploymentSession,
    ) -> DetectionResult {
        let result = probes.probe_target(&self.target, &self.manifest.app.version);
        session
            .report_mut()
            .add_application_check(self.manifest.install_name(), result.clone());
        result
    }

    fn probes(&self) -> DetectionProbes<'a> {
        DetectionProbes::new(&self.services, self.manifest.policy.tie_break)
    }

    fn check_cancelled(&self, boundary: &str) -> Result<(), OperationError> {
        if self.cancellation.is_cancelled() {
            warn!(app = %self.manifest.app.name, boundary, "cancellation requested");
            return Err(OperationError::Cancelled(boundary.to_string()));
        }
        Ok(())
    }

    fn success_code(&self, session: &DeploymentSession) -> ExitCode {
        if session.reboot_required() && self.manifest.policy.allow_reboot_passthru {
            EXIT_REBOOT_REQUIRED
        } else {
            EXIT_SUCCESS
        }
    }

    fn prompt(&self, text: &str, kind: PromptKind) {
        if self.manifest.policy.deploy_mode.allows(kind) {
            self.services.prompt.show_message(text, kind);
        }
    }

    fn app_name(&self) -> String {
        self.manifest.app.display_name()
    }

    fn welcome_message(&self, operation: OperationKind) -> String {
        let mut text = format!("{} of {} is about to begin.", operation.noun(), self.app_name());
        let processes = &self.manifest.app.processes_to_close;
        if !processes.is_empty() {
            text.push_str(&format!(" Please close: {}.", processes.join(", ")));
        }
        text
    }

    fn failure_message(&self, operation: OperationKind, err: &OperationError) -> String {
        if self.manifest.policy.show_error_details {
            format!("{} of {} failed: {err}", operation.noun(), self.app_name())
        } else {
            format!(
                "{} of {} did not complete. Contact your administrator.",
                operation.noun(),
                self.app_name()
            )
        }
    }
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("app", &self.manifest.app.name)
            .field("chain", &self.chain)
            .field("target", &self.target)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

/// Single entry point: run `operation` and return the process exit code.
pub fn run_deployment(
    manifest: &DeploymentManifest,
    services: HostServices<'_>,
    operation: OperationKind,
) -> ExitCode {
    match Orchestrator::new(manifest, services) {
        Ok(orchestrator) => orchestrator.run(operation),
        Err(err) => {
            error!(app = %manifest.app.name, error = %err, "invalid dependency chain");
            EXIT_UNHANDLED
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    #[test]
    fn exit_codes_are_distinct_from_installer_codes() {
        let codes = [
            EXIT_UNHANDLED,
            EXIT_DEPENDENCY_FAILED,
            EXIT_NOT_ELIGIBLE,
            EXIT_OPERATION_FAILED,
        ];
        for code in codes {
            assert!(code != EXIT_SUCCESS && code != EXIT_REBOOT_REQUIRED && code != 1641);
        }
    }

    #[test]
    fn errors_map_to_reserved_codes() {
        assert_eq!(
            exit_code_for(&OperationError::NotEligible("no admin".into())),
            EXIT_NOT_ELIGIBLE
        );
        assert_eq!(
            exit_code_for(&OperationError::Cancelled("operation".into())),
            EXIT_CANCELLED
        );
        assert_eq!(
            exit_code_for(&OperationError::Session(SessionError::Closed)),
            EXIT_UNHANDLED
        );
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn panic_message_reads_str_and_string() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
