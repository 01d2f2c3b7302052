// src/connection/session.rs

//! Defines the state associated with a single client session: its mode and
//! subscription sets, plus the session's own pub/sub mailbox. Parse state
//! lives in the frame codec, not here -- `RespFrameCodec` is recreated fresh
//! per connection, so there's nothing to track at this layer.

use crate::core::pubsub::SessionSink;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;

/// A session starts in `Cache` mode and moves to `PubSub` the instant it
/// gains its first subscription, reverting the instant both subscription
/// sets are empty again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Cache,
    PubSub,
}

/// Holds the state specific to a single client session.
#[derive(Debug)]
pub struct SessionState {
    pub mode: SessionMode,
    pub subscribed_channels: HashSet<Bytes>,
    pub subscribed_patterns: HashSet<Bytes>,
    /// This session's inbound pub/sub mailbox, shared with the channel
    /// manager as a `dyn MessageSink`.
    pub sink: Arc<SessionSink>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            mode: SessionMode::Cache,
            subscribed_channels: HashSet::new(),
            subscribed_patterns: HashSet::new(),
            sink: Arc::new(SessionSink::new()),
        }
    }

    /// Total number of active subscriptions (channels + patterns), the count
    /// every SUBSCRIBE/UNSUBSCRIBE reply reports back to the client.
    pub fn subscription_count(&self) -> usize {
        self.subscribed_channels.len() + self.subscribed_patterns.len()
    }

    pub fn is_subscribed(&self) -> bool {
        self.mode == SessionMode::PubSub
    }

    /// Recomputes `mode` from the current subscription sets. Called after
    /// every mutation of either set.
    pub fn refresh_mode(&mut self) {
        self.mode = if self.subscription_count() == 0 {
            SessionMode::Cache
        } else {
            SessionMode::PubSub
        };
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
