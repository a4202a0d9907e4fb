//! GNOME session manager client
//!
//! When launched from session autostart, the daemon registers as a session
//! client so logout does not wait on it. It always agrees to end the session
//! and leaves the event loop when told to stop.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use zbus::zvariant::OwnedObjectPath;
use zbus::Connection;

use super::{DaemonEvent, EventSender};

/// Environment variable carrying the autostart startup id
pub const AUTOSTART_ID_ENV: &str = "DESKTOP_AUTOSTART_ID";

/// Deadline for `EndSessionResponse`; the session manager gives up on
/// clients that take longer than a few seconds.
const RESPONSE_DEADLINE: Duration = Duration::from_secs(1);

#[zbus::proxy(
    interface = "org.gnome.SessionManager",
    default_service = "org.gnome.SessionManager",
    default_path = "/org/gnome/SessionManager",
    gen_blocking = false
)]
trait SessionManager {
    fn register_client(&self, app_id: &str, client_startup_id: &str)
        -> zbus::Result<OwnedObjectPath>;
}

#[zbus::proxy(
    interface = "org.gnome.SessionManager.ClientPrivate",
    default_service = "org.gnome.SessionManager",
    gen_blocking = false
)]
trait ClientPrivate {
    fn end_session_response(&self, is_ok: bool, reason: &str) -> zbus::Result<()>;

    #[zbus(signal)]
    fn query_end_session(&self, flags: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn end_session(&self, flags: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn cancel_end_session(&self) -> zbus::Result<()>;

    #[zbus(signal)]
    fn stop(&self) -> zbus::Result<()>;
}

/// Errors in the session manager protocol
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Not launched from session autostart ({AUTOSTART_ID_ENV} is not set)")]
    MissingAutostartId,

    #[error("Session registration failed: {0}")]
    Register(#[source] zbus::Error),

    #[error("EndSessionResponse failed: {0}")]
    Response(#[source] zbus::Error),

    #[error("EndSessionResponse not delivered within {0:?}")]
    Timeout(Duration),

    #[error("Client is not registered")]
    NotRegistered,
}

/// Object path the session manager assigned to this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClientHandle(OwnedObjectPath);

impl SessionClientHandle {
    /// Wrap an object path returned by `RegisterClient`
    pub fn new(path: OwnedObjectPath) -> Self {
        Self(path)
    }

    /// The object path
    pub fn path(&self) -> &OwnedObjectPath {
        &self.0
    }
}

impl fmt::Display for SessionClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Lifecycle signals sent by the session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    QueryEnd { flags: u32 },
    End { flags: u32 },
    CancelEnd,
    Stop,
}

/// Registration state of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unregistered,
    Registered,
    ShuttingDown,
}

/// Sends `EndSessionResponse` back to the session manager.
#[async_trait]
pub trait EndSessionResponder: Send + Sync {
    async fn end_session_response(&self, accept: bool, reason: &str) -> Result<(), LifecycleError>;
}

/// Responder addressed at the registered client object path.
struct DbusResponder {
    proxy: ClientPrivateProxy<'static>,
}

#[async_trait]
impl EndSessionResponder for DbusResponder {
    async fn end_session_response(&self, accept: bool, reason: &str) -> Result<(), LifecycleError> {
        self.proxy
            .end_session_response(accept, reason)
            .await
            .map_err(LifecycleError::Response)
    }
}

/// Session manager client and its state machine.
pub struct SessionLifecycleClient {
    state: SessionState,
    handle: Option<SessionClientHandle>,
    responder: Option<Box<dyn EndSessionResponder>>,
    forwarder: Option<tokio::task::JoinHandle<()>>,
}

impl SessionLifecycleClient {
    /// A client that has not registered.
    pub fn unregistered() -> Self {
        Self {
            state: SessionState::Unregistered,
            handle: None,
            responder: None,
            forwarder: None,
        }
    }

    /// A registered client using a custom responder.
    pub fn with_responder(
        handle: SessionClientHandle,
        responder: Box<dyn EndSessionResponder>,
    ) -> Self {
        Self {
            state: SessionState::Registered,
            handle: Some(handle),
            responder: Some(responder),
            forwarder: None,
        }
    }

    /// Read the autostart id from the environment, if launched via autostart.
    pub fn autostart_id() -> Option<String> {
        std::env::var(AUTOSTART_ID_ENV)
            .ok()
            .filter(|id| !id.is_empty())
    }

    /// Register with the session manager and forward its signals as events.
    pub async fn register(
        connection: &Connection,
        app_id: &str,
        autostart_id: &str,
        events: EventSender,
    ) -> Result<Self, LifecycleError> {
        let manager = SessionManagerProxy::new(connection)
            .await
            .map_err(LifecycleError::Register)?;
        let path = manager
            .register_client(app_id, autostart_id)
            .await
            .map_err(LifecycleError::Register)?;
        let handle = SessionClientHandle::new(path);
        info!(client = %handle, "Registered with session manager");

        let proxy = ClientPrivateProxy::builder(connection)
            .path(handle.path().clone())
            .map_err(LifecycleError::Register)?
            .build()
            .await
            .map_err(LifecycleError::Register)?;

        let signals = session_signals(&proxy)
            .await
            .map_err(LifecycleError::Register)?;
        let forwarder = tokio::spawn(forward_signals(signals, events));

        Ok(Self {
            state: SessionState::Registered,
            handle: Some(handle),
            responder: Some(Box::new(DbusResponder { proxy })),
            forwarder: Some(forwarder),
        })
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle assigned at registration
    pub fn handle(&self) -> Option<&SessionClientHandle> {
        self.handle.as_ref()
    }

    /// React to a lifecycle signal and return the resulting state.
    ///
    /// End queries are always accepted. A failed response is returned as an
    /// error but leaves the client registered.
    pub async fn on_signal(&mut self, signal: SessionSignal) -> Result<SessionState, LifecycleError> {
        match signal {
            SessionSignal::QueryEnd { flags } | SessionSignal::End { flags } => {
                debug!(?signal, flags, "Session end requested");
                self.respond_end_session().await?;
            }
            SessionSignal::CancelEnd => {
                debug!("Session end cancelled");
            }
            SessionSignal::Stop => {
                info!("Session manager asked the daemon to stop");
                self.state = SessionState::ShuttingDown;
            }
        }
        Ok(self.state)
    }

    async fn respond_end_session(&self) -> Result<(), LifecycleError> {
        let responder = match (&self.state, &self.responder) {
            (SessionState::Registered, Some(responder)) => responder,
            _ => return Err(LifecycleError::NotRegistered),
        };

        tokio::time::timeout(RESPONSE_DEADLINE, responder.end_session_response(true, ""))
            .await
            .map_err(|_| LifecycleError::Timeout(RESPONSE_DEADLINE))?
    }
}

impl Drop for SessionLifecycleClient {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// Merge the four ClientPrivate signals into one stream.
async fn session_signals(
    proxy: &ClientPrivateProxy<'static>,
) -> zbus::Result<BoxStream<'static, SessionSignal>> {
    let query_end = proxy.receive_query_end_session().await?.map(|s| {
        let flags = s.args().map(|a| *a.flags()).unwrap_or(0);
        SessionSignal::QueryEnd { flags }
    });
    let end = proxy.receive_end_session().await?.map(|s| {
        let flags = s.args().map(|a| *a.flags()).unwrap_or(0);
        SessionSignal::End { flags }
    });
    let cancel = proxy
        .receive_cancel_end_session()
        .await?
        .map(|_| SessionSignal::CancelEnd);
    let stop = proxy.receive_stop().await?.map(|_| SessionSignal::Stop);

    Ok(stream::select_all([
        query_end.boxed(),
        end.boxed(),
        cancel.boxed(),
        stop.boxed(),
    ])
    .boxed())
}

async fn forward_signals(mut signals: BoxStream<'static, SessionSignal>, events: EventSender) {
    while let Some(signal) = signals.next().await {
        if events.send(DaemonEvent::Session(signal)).is_err() {
            break;
        }
    }
    warn!("Session manager signal stream ended");
}
