// src/server/initialization.rs

//! Handles the complete server initialization process: configuration
//! logging, state setup, and loading an optional snapshot from disk.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::state::ServerState;
use crate::core::storage::snapshot;
use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, reload};

/// Initializes all server components before starting the main loop.
pub async fn setup(
    config: Config,
    log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
) -> Result<ServerContext> {
    log_startup_info(&config);

    let snapshot_cfg = config.snapshot.clone();
    let server_init = ServerState::initialize(config, log_reload_handle)?;
    let server_state = server_init.state.clone();
    info!("server state initialized");

    if server_state.cluster.is_some() {
        info!(
            "server starting in CLUSTER mode, node id: {}",
            server_state.cluster.as_ref().unwrap().local_node_id
        );
    } else {
        info!("server starting in STANDALONE mode");
    }

    if snapshot_cfg.enabled {
        match snapshot::load(&server_state.db, &snapshot_cfg.path).await {
            Ok(count) => info!("loaded {} keys from snapshot {}", count, snapshot_cfg.path),
            Err(e) => warn!("failed to load snapshot {}: {}", snapshot_cfg.path, e),
        }
    }

    let listener_config = server_state.config.lock().await;
    let listener = TcpListener::bind((listener_config.host.as_str(), listener_config.port)).await?;
    info!("astra cache listening on {}:{}", listener_config.host, listener_config.port);
    drop(listener_config);

    Ok(ServerContext {
        state: server_state,
        init_channels: server_init,
        listener,
        background_tasks: JoinSet::new(),
    })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    match config.maxmemory {
        Some(limit) => info!(
            "memory limit set to {} bytes ({:.2} MB)",
            limit,
            limit as f64 / 1024.0 / 1024.0
        ),
        None => warn!("no 'maxmemory' limit is active, server memory is unbounded"),
    }
}
