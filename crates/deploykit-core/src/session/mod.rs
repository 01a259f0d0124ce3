//! Deployment session state machine.
//!
//! `Created → PreOperation → Operation → PostOperation → Closed`.
//!
//! Phase transitions are the only sanctioned mutation points. `close()` may
//! be called from any state, and the first call fixes the exit code.

pub mod metadata;
pub mod observer;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SessionError;
use crate::report::ReportBuilder;
use crate::types::{OperationKind, SessionPhase};

pub use metadata::{AppMetadata, ExitCodePolicy, InstallerVerdict};
pub use observer::{PhaseEvent, PhaseObserver, RecordingPhaseObserver, TracingPhaseObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Created,
    PreOperation,
    Operation,
    PostOperation,
    Closed,
}

impl SessionState {
    fn phase(self) -> Option<SessionPhase> {
        match self {
            SessionState::PreOperation => Some(SessionPhase::PreOperation),
            SessionState::Operation => Some(SessionPhase::Operation),
            SessionState::PostOperation => Some(SessionPhase::PostOperation),
            SessionState::Created | SessionState::Closed => None,
        }
    }
}

/// One deployment attempt.
pub struct DeploymentSession {
    app: AppMetadata,
    operation: OperationKind,
    state: SessionState,
    exit_code: Option<i32>,
    reboot_required: bool,
    report: ReportBuilder,
    observers: Vec<Box<dyn PhaseObserver>>,
}

impl DeploymentSession {
    pub fn new(app: AppMetadata, operation: OperationKind) -> Self {
        Self {
            app,
            operation,
            state: SessionState::Created,
            exit_code: None,
            reboot_required: false,
            report: ReportBuilder::new(),
            observers: vec![Box::new(TracingPhaseObserver)],
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn PhaseObserver>) {
        self.observers.push(observer);
    }

    pub fn app(&self) -> &AppMetadata {
        &self.app
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current phase; unavailable before `open()` and after `close()`.
    pub fn phase(&self) -> Result<SessionPhase, SessionError> {
        match self.state {
            SessionState::Created => Err(SessionError::NotOpen),
            SessionState::Closed => Err(SessionError::Closed),
            state => state.phase().ok_or(SessionError::NotOpen),
        }
    }

    /// Marker such as "Pre-Installation" for the current phase.
    pub fn phase_label(&self) -> Result<String, SessionError> {
        self.phase().map(|phase| phase.label(self.operation))
    }

    pub fn open(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Created, SessionState::PreOperation)
    }

    pub fn enter_operation(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::PreOperation, SessionState::Operation)
    }

    pub fn enter_post(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Operation, SessionState::PostOperation)
    }

    /// Close the session and return the effective exit code.
    ///
    /// Later calls are no-ops that return the first code.
    pub fn close(&mut self, exit_code: i32) -> i32 {
        if let Some(existing) = self.exit_code {
            if existing != exit_code {
                warn!(
                    first = existing,
                    ignored = exit_code,
                    "session already closed, keeping first exit code"
                );
            }
            return existing;
        }

        self.state = SessionState::Closed;
        self.exit_code = Some(exit_code);
        self.report.set_phase(None);
        for observer in &self.observers {
            observer.session_closed(self.operation, exit_code);
        }
        exit_code
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn mark_reboot_required(&mut self) {
        self.reboot_required = true;
    }

    pub fn reboot_required(&self) -> bool {
        self.reboot_required
    }

    pub fn report(&self) -> &ReportBuilder {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut ReportBuilder {
        &mut self.report
    }

    fn transition(&mut self, from: SessionState, to: SessionState) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        if self.state != from {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        self.state = to;
        if let Some(phase) = to.phase() {
            self.report.set_phase(Some(phase));
            let label = phase.label(self.operation);
            for observer in &self.observers {
                observer.phase_changed(self.operation, phase, &label);
            }
        }
        Ok(())
    }
}

impl Drop for DeploymentSession {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            warn!(operation = %self.operation, state = ?self.state, "session dropped without close");
        }
    }
}

impl std::fmt::Debug for DeploymentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentSession")
            .field("app", &self.app.name)
            .field("operation", &self.operation)
            .field("state", &self.state)
            .field("exit_code", &self.exit_code)
            .field("reboot_required", &self.reboot_required)
            .finish_non_exhaustive()
    }
}
