//! Install handler: prerequisites first, then the main application.

use tracing::info;

use crate::chain::{ChainAction, ChainContext};
use crate::detect::DetectionResult;
use crate::error::OperationError;
use crate::host::InstallAction;
use crate::session::DeploymentSession;

use super::Orchestrator;

pub(super) fn run(
    orchestrator: &Orchestrator<'_>,
    ctx: &ChainContext<'_>,
    session: &mut DeploymentSession,
    detected: &DetectionResult,
) -> Result<(), OperationError> {
    match orchestrator.chain.resolve(ctx, ChainAction::Install) {
        Ok(result) => orchestrator.record_chain(session, &result),
        Err(failure) => return Err(orchestrator.chain_failed(session, failure)),
    }

    let action = if detected.found {
        info!(
            from = detected.reported_version.as_deref().unwrap_or("unknown"),
            to = %orchestrator.manifest.app.version,
            "upgrading existing installation"
        );
        InstallAction::Update
    } else {
        InstallAction::Install
    };
    orchestrator.run_main(ctx, session, action)
}
