// src/core/state/client.rs

//! Client registry types: metadata tracked per connection for `CLIENT LIST`,
//! `CLIENT GETNAME`/`SETNAME`, and targeted shutdown.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

/// Closing this sender tells the owning session's strand to stop.
pub type ShutdownSender = broadcast::Sender<()>;
pub type ClientStateTuple = (Arc<Mutex<ClientInfo>>, ShutdownSender);
/// Keyed by a fast `u64` counter rather than `session_id` (a UUID) so lookups
/// and hashing on the hot connection path stay cheap; `session_id` is a
/// stable identifier that survives reconnect-free for the life of the
/// connection and travels alongside it.
pub type ClientMap = Arc<DashMap<u64, ClientStateTuple>>;

#[derive(Debug)]
pub struct ClientInfo {
    pub addr: SocketAddr,
    /// The fast map key, assigned from a monotonic per-server counter.
    pub id: u64,
    /// A stable session identifier (UUID v4), independent of the fast map key.
    pub session_id: Uuid,
    pub name: Option<String>,
    pub created: Instant,
    pub last_command_time: Instant,
}
