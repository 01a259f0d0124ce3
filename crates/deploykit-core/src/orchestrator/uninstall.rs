//! Uninstall handler.

use tracing::debug;

use crate::chain::ChainContext;
use crate::error::OperationError;
use crate::host::InstallAction;
use crate::session::DeploymentSession;

use super::Orchestrator;

pub(super) fn run(
    orchestrator: &Orchestrator<'_>,
    ctx: &ChainContext<'_>,
    session: &mut DeploymentSession,
) -> Result<(), OperationError> {
    orchestrator.run_main(ctx, session, InstallAction::Uninstall)?;

    if orchestrator.manifest.policy.keep_shared_dependencies {
        debug!("keeping shared dependencies");
        return Ok(());
    }
    let removed = orchestrator.chain.remove(ctx);
    orchestrator.record_chain(session, &removed);
    Ok(())
}
