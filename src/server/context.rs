// src/server/context.rs

use crate::core::state::{ServerInit, ServerState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the server's main loop.
/// Shutdown fan-out goes through `state.subscribe_shutdown()`/`trigger_shutdown()`
/// rather than a separate channel held here.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub init_channels: ServerInit,
    pub listener: TcpListener,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
}
