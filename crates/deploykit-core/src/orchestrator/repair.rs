//! Repair handler: branch on the state detected during PreOperation.

use tracing::info;

use crate::chain::{ChainAction, ChainContext};
use crate::detect::DetectionResult;
use crate::error::OperationError;
use crate::host::InstallAction;
use crate::report::CheckStatus;
use crate::session::DeploymentSession;

use super::Orchestrator;

pub(super) fn run(
    orchestrator: &Orchestrator<'_>,
    ctx: &ChainContext<'_>,
    session: &mut DeploymentSession,
    detected: &DetectionResult,
) -> Result<(), OperationError> {
    match orchestrator.chain.resolve(ctx, ChainAction::Repair) {
        Ok(result) => orchestrator.record_chain(session, &result),
        Err(failure) => return Err(orchestrator.chain_failed(session, failure)),
    }

    let status = CheckStatus::from_result(detected);
    let action = repair_action(status);
    info!(app = %orchestrator.manifest.app.name, ?status, ?action, "repair branch selected");
    orchestrator.run_main(ctx, session, action)
}

fn repair_action(status: CheckStatus) -> InstallAction {
    match status {
        CheckStatus::Missing => InstallAction::Install,
        CheckStatus::Outdated => InstallAction::Update,
        CheckStatus::Ok => InstallAction::Repair,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branches_follow_detected_state() {
        assert_eq!(repair_action(CheckStatus::Missing), InstallAction::Install);
        assert_eq!(repair_action(CheckStatus::Outdated), InstallAction::Update);
        assert_eq!(repair_action(CheckStatus::Ok), InstallAction::Repair);
    }
}
