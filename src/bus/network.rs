//! NetworkManager state notifications.

use futures::StreamExt;
use tracing::{debug, warn};
use zbus::Connection;

use super::{DaemonEvent, EventSender, SubscriptionError};

#[zbus::proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager",
    gen_blocking = false
)]
trait NetworkManager {
    #[zbus(signal)]
    fn state_changed(&self, state: u32) -> zbus::Result<()>;
}

/// NetworkManager's `NMState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Unknown,
    Asleep,
    Disconnected,
    Disconnecting,
    Connecting,
    /// Link-local connectivity only
    ConnectedLocal,
    /// Site-local connectivity only
    ConnectedSite,
    /// Globally reachable
    ConnectedGlobal,
    /// A code this daemon does not know
    Other(u32),
}

impl NetworkState {
    /// Only full, global connectivity starts a mount cycle.
    pub fn is_fully_connected(&self) -> bool {
        matches!(self, NetworkState::ConnectedGlobal)
    }
}

impl From<u32> for NetworkState {
    fn from(code: u32) -> Self {
        match code {
            0 => NetworkState::Unknown,
            10 => NetworkState::Asleep,
            20 => NetworkState::Disconnected,
            30 => NetworkState::Disconnecting,
            40 => NetworkState::Connecting,
            50 => NetworkState::ConnectedLocal,
            60 => NetworkState::ConnectedSite,
            70 => NetworkState::ConnectedGlobal,
            other => NetworkState::Other(other),
        }
    }
}

/// Subscription to NetworkManager's `StateChanged` signal.
///
/// Every notification is forwarded unfiltered; deciding what to do with a
/// state is up to the event handler.
pub struct NetworkStateWatcher {
    task: tokio::task::JoinHandle<()>,
}

impl NetworkStateWatcher {
    /// Subscribe on the system bus and start forwarding states.
    ///
    /// Fails when NetworkManager cannot be reached; there is no degraded mode.
    pub async fn subscribe(
        connection: &Connection,
        events: EventSender,
    ) -> Result<Self, SubscriptionError> {
        let subscribe_error = |source| SubscriptionError::Subscribe {
            signal: "org.freedesktop.NetworkManager.StateChanged",
            source,
        };

        let proxy = NetworkManagerProxy::new(connection)
            .await
            .map_err(subscribe_error)?;
        let mut stream = proxy.receive_state_changed().await.map_err(subscribe_error)?;
        debug!("Subscribed to NetworkManager StateChanged");

        let task = tokio::spawn(async move {
            while let Some(signal) = stream.next().await {
                let state = match signal.args() {
                    Ok(args) => NetworkState::from(*args.state()),
                    Err(e) => {
                        warn!("Malformed StateChanged signal: {}", e);
                        continue;
                    }
                };
                if events.send(DaemonEvent::NetworkStateChanged(state)).is_err() {
                    // Event loop is gone
                    break;
                }
            }
            debug!("NetworkManager signal stream ended");
        });

        Ok(Self { task })
    }
}

impl Drop for NetworkStateWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
