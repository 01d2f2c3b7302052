// src/core/events.rs

//! The server's event bus: three event kinds dispatched synchronously to
//! every registered observer. Used to keep the status collector's
//! `INFO stats` counters current without coupling the command layer to any
//! particular consumer.

use bytes::Bytes;
use std::sync::RwLock;

/// The three event kinds the core emits.
#[derive(Debug, Clone)]
pub enum Event {
    ConnectionOpened { session_id: Bytes },
    ConnectionClosed { session_id: Bytes },
    CommandProcessed { name: String, arg_count: usize },
}

/// Anything that wants to be told about server activity implements this and
/// registers itself with the `EventBus`.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &Event);
}

/// A synchronous fan-out point. `post_event` calls every observer in
/// registration order on the caller's own task -- there is no queue, no
/// background task, and no possibility of an event being dropped or reordered.
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<Vec<std::sync::Arc<dyn EventObserver>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: std::sync::Arc<dyn EventObserver>) {
        self.observers.write().unwrap().push(observer);
    }

    pub fn post_event(&self, event: Event) {
        for observer in self.observers.read().unwrap().iter() {
            observer.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observer_count", &self.observers.read().unwrap().len())
            .finish()
    }
}
