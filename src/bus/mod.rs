//! D-Bus signal sources
//!
//! Every signal the daemon reacts to is turned into a `DaemonEvent` and sent
//! over one channel to the event loop, which handles them in arrival order.

use thiserror::Error;
use tokio::sync::mpsc;

pub mod network;
pub mod session;

pub use network::{NetworkState, NetworkStateWatcher};
pub use session::{
    LifecycleError, SessionClientHandle, SessionLifecycleClient, SessionSignal, SessionState,
};

/// Events delivered to the event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEvent {
    /// NetworkManager reported a new state
    NetworkStateChanged(NetworkState),
    /// The session manager sent a lifecycle signal
    Session(SessionSignal),
    /// The process received SIGTERM or SIGINT
    Terminate,
}

/// Sending half of the event channel
pub type EventSender = mpsc::UnboundedSender<DaemonEvent>;

/// Receiving half of the event channel
pub type EventReceiver = mpsc::UnboundedReceiver<DaemonEvent>;

/// Create the event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A required bus service could not be reached at startup
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Could not connect to the {bus} bus: {source}")]
    Connect {
        bus: &'static str,
        #[source]
        source: zbus::Error,
    },

    #[error("Could not subscribe to {signal}: {source}")]
    Subscribe {
        signal: &'static str,
        #[source]
        source: zbus::Error,
    },
}

/// Connect to the system bus
pub async fn system_connection() -> Result<zbus::Connection, SubscriptionError> {
    zbus::Connection::system()
        .await
        .map_err(|source| SubscriptionError::Connect {
            bus: "system",
            source,
        })
}

/// Connect to the session bus
pub async fn session_connection() -> Result<zbus::Connection, SubscriptionError> {
    zbus::Connection::session()
        .await
        .map_err(|source| SubscriptionError::Connect {
            bus: "session",
            source,
        })
}

/// Forward SIGTERM and SIGINT to the event loop as `DaemonEvent::Terminate`.
pub fn forward_termination_signals(events: EventSender) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = terminate.recv() => {},
            _ = interrupt.recv() => {},
        }
        let _ = events.send(DaemonEvent::Terminate);
    });

    Ok(())
}
