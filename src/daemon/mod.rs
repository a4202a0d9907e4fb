//! Daemon startup, event loop and shutdown
//!
//! Startup order: lock, bus subscriptions, optional session registration,
//! then the event loop. The lock is released on every exit path once it
//! has been acquired.

mod dispatch;
mod orchestrator;

pub use dispatch::{collect_results, log_report, CycleId, MountDispatcher, MountReport};
pub use orchestrator::{run_event_loop, EventHandler, LoopControl, Orchestrator};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::Connection;

use crate::bookmarks::BookmarkSource;
use crate::bus::{
    self, event_channel, EventSender, LifecycleError, NetworkStateWatcher, SessionLifecycleClient,
    SubscriptionError,
};
use crate::config::{Config, ConfigError, SessionRegistration};
use crate::lock::{LockError, SingleInstanceGuard};
use crate::mount::{CommandMountExecutor, MountError};
use crate::vault::{CredentialOracle, SecretServiceVault};

/// Errors that stop the daemon
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

impl DaemonError {
    /// Another instance holds the lock; not a failure of this process.
    pub fn is_already_running(&self) -> bool {
        matches!(self, DaemonError::Lock(LockError::AlreadyRunning { .. }))
    }
}

/// Run the daemon until it is stopped.
pub async fn run(config: &Config) -> Result<(), DaemonError> {
    let mut guard = SingleInstanceGuard::acquire(config.lock_path()?)?;
    info!(pid = guard.pid(), lock = ?guard.path(), "Daemon started");

    let result = serve(config).await;
    guard.release();

    let collector = result?;
    drain_results(collector, config.shutdown_grace()).await;
    info!("Daemon stopped");
    Ok(())
}

/// Start every component and run the event loop.
///
/// Returns the result collector so in-flight outcomes can still be logged
/// after the lock is gone.
async fn serve(config: &Config) -> Result<JoinHandle<usize>, DaemonError> {
    let (events, mut receiver) = event_channel();
    bus::forward_termination_signals(events.clone()).map_err(DaemonError::Signals)?;

    let system = bus::system_connection().await?;
    let _watcher = NetworkStateWatcher::subscribe(&system, events.clone()).await?;

    let session_bus = bus::session_connection().await?;
    let session = register_session(config, &session_bus, events).await?;

    let executor = CommandMountExecutor::from_argv(&config.mount_command)?;
    let oracle = CredentialOracle::new(Arc::new(SecretServiceVault::new(session_bus.clone())));
    let (dispatcher, results) = MountDispatcher::new(oracle, Arc::new(executor));
    let collector = tokio::spawn(collect_results(results));

    let bookmarks = BookmarkSource::new(config.bookmarks_path()?, config.watched_protocols.clone());
    info!(bookmarks = ?bookmarks.path(), "Waiting for network state changes");

    let mut orchestrator = Orchestrator::new(bookmarks, dispatcher, session);
    run_event_loop(&mut orchestrator, &mut receiver).await;

    Ok(collector)
}

/// Decide whether to register with the session manager.
///
/// Returns the autostart id to register with, or `None` to run without
/// session integration.
fn registration_plan(
    policy: SessionRegistration,
    autostart_id: Option<String>,
) -> Result<Option<String>, LifecycleError> {
    match (policy, autostart_id) {
        (SessionRegistration::Disabled, _) => Ok(None),
        (_, Some(id)) => Ok(Some(id)),
        (SessionRegistration::Required, None) => Err(LifecycleError::MissingAutostartId),
        (SessionRegistration::Auto, None) => Ok(None),
    }
}

/// Register with the session manager according to the configured policy.
async fn register_session(
    config: &Config,
    connection: &Connection,
    events: EventSender,
) -> Result<Option<SessionLifecycleClient>, DaemonError> {
    let policy = config.session_registration;
    let Some(autostart_id) = registration_plan(policy, SessionLifecycleClient::autostart_id())?
    else {
        debug!(%policy, "Skipping session registration");
        return Ok(None);
    };

    match SessionLifecycleClient::register(connection, &config.app_id, &autostart_id, events).await
    {
        Ok(client) => Ok(Some(client)),
        Err(e) if policy == SessionRegistration::Required => Err(e.into()),
        Err(e) => {
            warn!("Continuing without session integration: {}", e);
            Ok(None)
        }
    }
}

/// Wait up to `grace` for outstanding mount results to be logged.
///
/// Mount processes still running afterwards are left alone.
async fn drain_results(collector: JoinHandle<usize>, grace: Duration) {
    match tokio::time::timeout(grace, collector).await {
        Ok(Ok(count)) => debug!(count, "All mount results logged"),
        Ok(Err(e)) => warn!("Result collector failed: {}", e),
        Err(_) => info!(
            "Mounts still in progress after {:?}; leaving them running",
            grace
        ),
    }
}
