//! Phase-changed notifications for logging and UI collaborators.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::types::{OperationKind, SessionPhase};

/// Receives session transitions. Labels only; no business logic.
pub trait PhaseObserver {
    fn phase_changed(&self, operation: OperationKind, phase: SessionPhase, label: &str);

    fn session_closed(&self, _operation: OperationKind, _exit_code: i32) {}
}

/// Logs every transition through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPhaseObserver;

impl PhaseObserver for TracingPhaseObserver {
    fn phase_changed(&self, operation: OperationKind, _phase: SessionPhase, label: &str) {
        info!(%operation, phase = label, "entering phase");
    }

    fn session_closed(&self, operation: OperationKind, exit_code: i32) {
        info!(%operation, exit_code, "session closed");
    }
}

/// Event captured by [`RecordingPhaseObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    Entered(String),
    Closed(i32),
}

/// Keeps every notification in memory; clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingPhaseObserver {
    events: Arc<Mutex<Vec<PhaseEvent>>>,
}

impl RecordingPhaseObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PhaseEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn push(&self, event: PhaseEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl PhaseObserver for RecordingPhaseObserver {
    fn phase_changed(&self, _operation: OperationKind, _phase: SessionPhase, label: &str) {
        self.push(PhaseEvent::Entered(label.to_string()));
    }

    fn session_closed(&self, _operation: OperationKind, exit_code: i32) {
        self.push(PhaseEvent::Closed(exit_code));
    }
}

impl<T: PhaseObserver + ?Sized> PhaseObserver for Arc<T> {
    fn phase_changed(&self, operation: OperationKind, phase: SessionPhase, label: &str) {
        (**self).phase_changed(operation, phase, label);
    }

    fn session_closed(&self, operation: OperationKind, exit_code: i32) {
        (**self).session_closed(operation, exit_code);
    }
}
