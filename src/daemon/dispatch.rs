//! Concurrent per-share mount workers and result collection.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bookmarks::ShareEntry;
use crate::mount::{MountAttempt, MountExecutor, MountResult};
use crate::vault::CredentialOracle;

/// What a worker delivers for a share that passed the credential check.
pub type MountReport = MountResult<MountAttempt>;

/// Identifies one reconnect-triggered mount cycle in the logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleId(pub Uuid);

impl CycleId {
    /// Generate a new random cycle ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Spawns one independent worker per share.
///
/// A worker checks credentials, then mounts; its report goes to the result
/// channel. Workers never wait on each other, and none of them runs on the
/// event loop.
pub struct MountDispatcher {
    oracle: CredentialOracle,
    executor: Arc<dyn MountExecutor>,
    results: mpsc::UnboundedSender<MountReport>,
}

impl MountDispatcher {
    /// Create a dispatcher and the receiver its reports arrive on.
    ///
    /// The receiver closes once the dispatcher and every worker are gone.
    pub fn new(
        oracle: CredentialOracle,
        executor: Arc<dyn MountExecutor>,
    ) -> (Self, mpsc::UnboundedReceiver<MountReport>) {
        let (results, receiver) = mpsc::unbounded_channel();
        (
            Self {
                oracle,
                executor,
                results,
            },
            receiver,
        )
    }

    /// Start the worker for one share.
    pub fn dispatch(&self, cycle: CycleId, share: ShareEntry) -> JoinHandle<()> {
        let oracle = self.oracle.clone();
        let executor = Arc::clone(&self.executor);
        let results = self.results.clone();
        let span = info_span!("mount", cycle = %cycle, share = %share);

        tokio::spawn(
            async move {
                if !oracle.has_credentials(&share).await {
                    debug!("No stored credentials, skipping");
                    return;
                }

                info!("Trying to mount {} ...", share);
                let report = executor.mount(&share).await;
                if results.send(report).is_err() {
                    debug!("Result collector is gone");
                }
            }
            .instrument(span),
        )
    }
}

/// Log every report until the channel closes; returns how many were seen.
pub async fn collect_results(mut receiver: mpsc::UnboundedReceiver<MountReport>) -> usize {
    let mut seen = 0;
    while let Some(report) = receiver.recv().await {
        log_report(&report);
        seen += 1;
    }
    seen
}

/// Log one mount outcome.
pub fn log_report(report: &MountReport) {
    match report {
        Ok(attempt) if attempt.succeeded() => {
            info!(share = %attempt.share, pid = ?attempt.pid, "{}", attempt);
        }
        Ok(attempt) => {
            warn!(
                share = %attempt.share,
                pid = ?attempt.pid,
                status = ?attempt.status,
                stdout = %attempt.stdout,
                stderr = %attempt.stderr,
                "{}",
                attempt
            );
        }
        Err(e) => error!("{}", e),
    }
}
