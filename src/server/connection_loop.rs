// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use crate::connection::ConnectionHandler;
use crate::core::events::Event;
use crate::core::state::ClientInfo;
use crate::core::storage::snapshot;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

#[cfg(windows)]
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Waits for a shutdown signal based on the operating system.
/// On Unix, it listens for SIGINT and SIGTERM.
/// On Windows, it listens for Ctrl+C.
async fn await_shutdown_signal() {
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to create SIGINT stream");
    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to create SIGTERM stream");

    #[cfg(windows)]
    let mut ctrl_c = signal::ctrl_c().expect("failed to create Ctrl+C stream");

    tokio::select! {
        _ = async { #[cfg(unix)] { sigint.recv().await; info!("SIGINT received, initiating graceful shutdown"); } } => {},
        _ = async { #[cfg(unix)] { sigterm.recv().await; info!("SIGTERM received, initiating graceful shutdown"); } } => {},
        _ = async { #[cfg(windows)] { ctrl_c.await; info!("Ctrl-C received, initiating graceful shutdown"); } } => {},
    }
}

/// The main server loop that accepts connections and handles graceful shutdown.
pub async fn run(mut ctx: ServerContext) {
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = await_shutdown_signal() => {
                break;
            },

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => info!("a background task has completed"),
                    Ok(Err(e)) => { error!("CRITICAL: background task failed: {}. shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: background task panicked: {e:?}. shutting down."); break; }
                }
            },

            res = ctx.listener.accept() => {
                if let Ok((socket, addr)) = res {
                    info!("accepted new connection from: {}", addr);

                    let session_id = ctx.state.next_client_id();
                    let session_uuid = Uuid::new_v4();
                    let state_clone = ctx.state.clone();

                    let (conn_shutdown_tx, conn_shutdown_rx) = broadcast::channel(1);
                    let global_shutdown_rx = ctx.state.subscribe_shutdown();

                    let client_info = Arc::new(Mutex::new(ClientInfo {
                        addr,
                        id: session_id,
                        session_id: session_uuid,
                        name: None,
                        created: Instant::now(),
                        last_command_time: Instant::now(),
                    }));
                    state_clone.clients.insert(session_id, (client_info, conn_shutdown_tx));
                    state_clone.event_bus.post_event(Event::ConnectionOpened {
                        session_id: Bytes::from(session_uuid.to_string()),
                    });

                    client_tasks.spawn(async move {
                        let handler = ConnectionHandler::new(
                            socket,
                            addr,
                            state_clone,
                            session_id,
                            session_uuid,
                            conn_shutdown_rx,
                            global_shutdown_rx,
                        );
                        handler.run().await;
                    });
                } else if let Err(e) = res {
                    error!("failed to accept connection: {}", e);
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res && e.is_panic() {
                    error!("a client handler panicked: {e:?}");
                }
            },
        }
    }

    info!("shutting down, sending signal to all tasks");
    ctx.state.trigger_shutdown();

    client_tasks.shutdown().await;
    info!("all client connections closed");

    let snapshot_cfg = ctx.state.config.lock().await.snapshot.clone();
    if snapshot_cfg.enabled {
        match snapshot::save(&ctx.state.db, &snapshot_cfg.path).await {
            Ok(count) => info!("wrote {} keys to snapshot {}", count, snapshot_cfg.path),
            Err(e) => error!("failed to write snapshot {}: {}", snapshot_cfg.path, e),
        }
    }

    info!("waiting for background tasks to finish...");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("timed out waiting for background tasks to finish cleanly");
    }
    info!("server shutdown complete");
}
