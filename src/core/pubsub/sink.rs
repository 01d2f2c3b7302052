// src/core/pubsub/sink.rs

//! The concrete `MessageSink` every session registers with the channel
//! manager: a lock-free inbound queue paired with a `Notify` so the
//! session's read loop can wake up and drain it without polling.

use super::{MessageSink, PubSubMessage};
use crate::core::queue::InboundQueue;
use tokio::sync::Notify;

/// Default capacity of a session's pub/sub mailbox. Sized generously since
/// the queue only ever holds undelivered messages, not a backlog of work.
const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// A session's pub/sub mailbox. One instance is shared (via `Arc`) between
/// the channel manager, which holds a weak or strong handle to it as a
/// `dyn MessageSink`, and the session's own read loop, which owns the only
/// consumer.
pub struct SessionSink {
    queue: InboundQueue<PubSubMessage>,
    notify: Notify,
}

impl SessionSink {
    pub fn new() -> Self {
        Self {
            queue: InboundQueue::with_capacity(DEFAULT_MAILBOX_CAPACITY),
            notify: Notify::new(),
        }
    }

    /// Pops the next queued message without blocking.
    pub fn try_recv(&self) -> Option<PubSubMessage> {
        self.queue.try_pop()
    }

    /// Resolves once another message may be pending; the session's read loop
    /// races this against the socket read in a `tokio::select!`.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

impl Default for SessionSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSink for SessionSink {
    fn enqueue(&self, msg: PubSubMessage) -> bool {
        let pushed = self.queue.try_push(msg);
        if pushed {
            self.notify.notify_one();
        }
        pushed
    }
}
