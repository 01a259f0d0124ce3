//! Caller-supplied timeout around a blocking installer.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::InstallerError;
use crate::host::{InstallRequest, Installer};

/// Runs each invocation on a worker thread and gives up after `timeout`.
///
/// An abandoned invocation keeps running in the background; only its result
/// is discarded.
#[derive(Debug)]
pub struct TimeoutInstaller<I> {
    inner: Arc<I>,
    timeout: Duration,
}

impl<I> TimeoutInstaller<I> {
    pub fn new(inner: Arc<I>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<I> Installer for TimeoutInstaller<I>
where
    I: Installer + Send + Sync + 'static,
{
    fn run_installer(&self, request: &InstallRequest) -> Result<i32, InstallerError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned = request.clone();

        thread::Builder::new()
            .name(format!("installer-{}", request.name))
            .spawn(move || {
                // Receiver may be gone after a timeout.
                let _ = tx.send(inner.run_installer(&owned));
            })
            .map_err(|err| InstallerError::Failed(format!("failed to start installer: {err}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(item = %request.name, timeout = ?self.timeout, "installer timed out");
                Err(InstallerError::TimedOut(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(InstallerError::Failed(
                "installer terminated without reporting a result".to_string(),
            )),
        }
    }
}
