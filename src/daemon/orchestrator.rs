//! Event handling for the daemon.
//!
//! The `Orchestrator` is the context object every event is routed through:
//! it owns the bookmark source, the mount dispatcher and the optional session
//! client, so no handler needs process-wide state.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::dispatch::{CycleId, MountDispatcher};
use crate::bookmarks::{BookmarkSource, ShareEntry};
use crate::bus::{DaemonEvent, EventReceiver, SessionLifecycleClient, SessionSignal, SessionState};

/// Whether the event loop keeps running after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Break,
}

/// Single entry point for all daemon events.
#[async_trait]
pub trait EventHandler: Send {
    async fn handle_event(&mut self, event: DaemonEvent) -> LoopControl;
}

/// Handle events one at a time, in arrival order.
///
/// Returns when the handler asks to stop or when every sender is dropped.
pub async fn run_event_loop<H>(handler: &mut H, events: &mut EventReceiver)
where
    H: EventHandler + ?Sized,
{
    while let Some(event) = events.recv().await {
        if handler.handle_event(event).await == LoopControl::Break {
            debug!("Event loop stopping");
            break;
        }
    }
}

/// Wires network and session events to their handlers.
pub struct Orchestrator {
    bookmarks: BookmarkSource,
    dispatcher: MountDispatcher,
    session: Option<SessionLifecycleClient>,
}

impl Orchestrator {
    pub fn new(
        bookmarks: BookmarkSource,
        dispatcher: MountDispatcher,
        session: Option<SessionLifecycleClient>,
    ) -> Self {
        Self {
            bookmarks,
            dispatcher,
            session,
        }
    }

    /// Read the bookmarks and start one worker per share.
    ///
    /// Returns the number of workers started.
    pub async fn start_mount_cycle(&self) -> usize {
        let cycle = CycleId::new();
        let lines = self.bookmarks.read_shares().await;
        debug!(cycle = %cycle, shares = lines.len(), "Starting mount cycle");

        let mut started = 0;
        for line in lines {
            match ShareEntry::parse(&line) {
                Ok(share) => {
                    // Worker runs detached; its outcome arrives on the result channel
                    drop(self.dispatcher.dispatch(cycle, share));
                    started += 1;
                }
                Err(e) => warn!(cycle = %cycle, "Skipping bookmark {:?}: {}", line, e),
            }
        }
        started
    }

    async fn on_session_signal(&mut self, signal: SessionSignal) -> LoopControl {
        let Some(client) = self.session.as_mut() else {
            // Not registered; only a stop request matters
            return match signal {
                SessionSignal::Stop => LoopControl::Break,
                _ => LoopControl::Continue,
            };
        };

        match client.on_signal(signal).await {
            Ok(SessionState::ShuttingDown) => LoopControl::Break,
            Ok(_) => LoopControl::Continue,
            Err(e) => {
                warn!(?signal, "Session lifecycle error: {}", e);
                LoopControl::Continue
            }
        }
    }
}

#[async_trait]
impl EventHandler for Orchestrator {
    async fn handle_event(&mut self, event: DaemonEvent) -> LoopControl {
        match event {
            DaemonEvent::NetworkStateChanged(state) if state.is_fully_connected() => {
                info!(?state, "Network is fully connected");
                self.start_mount_cycle().await;
                LoopControl::Continue
            }
            DaemonEvent::NetworkStateChanged(state) => {
                debug!(?state, "Ignoring network state");
                LoopControl::Continue
            }
            DaemonEvent::Session(signal) => self.on_session_signal(signal).await,
            DaemonEvent::Terminate => {
                info!("Termination signal received");
                LoopControl::Break
            }
        }
    }
}
