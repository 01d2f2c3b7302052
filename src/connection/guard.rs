// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::events::Event;
use crate::core::state::ServerState;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// An RAII guard to ensure connection resources are always cleaned up when a
/// connection handler's scope is exited, however it exits (clean
/// disconnect, read error, or server shutdown).
pub struct ConnectionGuard {
    state: Arc<ServerState>,
    session_id: u64,
    session_uuid: Uuid,
    addr: SocketAddr,
    channels: Vec<Bytes>,
    patterns: Vec<Bytes>,
}

impl ConnectionGuard {
    pub(crate) fn new(state: Arc<ServerState>, session_id: u64, session_uuid: Uuid, addr: SocketAddr) -> Self {
        Self {
            state,
            session_id,
            session_uuid,
            addr,
            channels: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Snapshots the session's live subscriptions just before the guard is
    /// dropped, so `Drop` knows which channel-manager entries to tear down.
    pub(crate) fn record_subscriptions(
        &mut self,
        channels: impl IntoIterator<Item = Bytes>,
        patterns: impl IntoIterator<Item = Bytes>,
    ) {
        self.channels = channels.into_iter().collect();
        self.patterns = patterns.into_iter().collect();
    }
}

impl Drop for ConnectionGuard {
    /// Performs resource cleanup when the guard goes out of scope: tears down
    /// any remaining pub/sub subscriptions, removes the client from the
    /// global registry, and notifies the event bus.
    fn drop(&mut self) {
        debug!("cleaning up resources for connection {}", self.addr);

        for channel in &self.channels {
            self.state.channel_manager.unsubscribe(channel, self.session_id);
        }
        for pattern in &self.patterns {
            self.state.channel_manager.unsubscribe_pattern(pattern, self.session_id);
        }

        if self.state.clients.remove(&self.session_id).is_none() {
            debug!("client {} was not in the global state map upon cleanup", self.addr);
        }

        self.state.event_bus.post_event(Event::ConnectionClosed {
            session_id: Bytes::from(self.session_uuid.to_string()),
        });
    }
}
