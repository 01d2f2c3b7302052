// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::client::*;
use crate::config::Config;
use crate::core::cluster::{ClusterState, GossipTaskMessage};
use crate::core::errors::CacheError;
use crate::core::events::EventBus;
use crate::core::metrics::StatusCollector;
use crate::core::pubsub::ChannelManager;
use crate::core::scripting::ScriptManager;
use crate::core::storage::db::Db;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing_subscriber::{filter::EnvFilter, reload};

/// Contains all initialized components required to spawn the server's background tasks.
/// This struct is created once during server initialization and then consumed by the spawner.
pub struct ServerInit {
    /// The fully initialized, shared server state.
    pub state: Arc<ServerState>,
    /// A fresh receiver every background task can subscribe to for shutdown.
    pub shutdown_rx: broadcast::Receiver<()>,
    /// A channel for command handlers to send messages (e.g. `CLUSTER MEET`) to
    /// the cluster gossip task. `None` in standalone mode.
    pub cluster_gossip_rx: Option<mpsc::Receiver<GossipTaskMessage>>,
}

/// The central struct holding all shared, server-wide state.
/// This struct is wrapped in an `Arc` and passed to nearly every task and
/// connection handler, providing a single source of truth for the server's
/// configuration and dynamic state.
pub struct ServerState {
    pub start_time: Instant,
    /// The sharded key-value store. Cheaply `Clone`-able (every field is an
    /// `Arc` or `Copy` value), so it isn't itself wrapped in an `Arc`.
    pub db: Db,
    /// A map of all active client connections, keyed by a fast per-server
    /// counter (see `ClientInfo::session_id` for the stable UUID identifier).
    pub clients: ClientMap,
    /// A monotonic counter handing out `ClientInfo::id` values.
    next_client_id: AtomicU64,
    /// The server's runtime configuration, wrapped in a Mutex to allow for
    /// dynamic changes via the `CONFIG SET` command.
    pub config: Arc<Mutex<Config>>,
    /// The manager for all publish-subscribe channels and patterns.
    pub channel_manager: Arc<ChannelManager>,
    /// Holds cached Lua scripts and bridges `EVAL`/`EVALSHA` into the command layer.
    pub scripting: Arc<ScriptManager>,
    /// The central event bus driving the status collector's `INFO` counters.
    pub event_bus: Arc<EventBus>,
    /// Server-wide counters and OS memory samples backing `INFO`.
    pub status: Arc<StatusCollector>,
    /// The state of the cluster, if enabled. `None` in standalone mode.
    pub cluster: Option<Arc<ClusterState>>,
    /// A sender for command handlers (`CLUSTER MEET`) to reach the gossip task.
    pub cluster_gossip_tx: Option<mpsc::Sender<GossipTaskMessage>>,
    /// A handle to the logging filter, allowing dynamic log level changes.
    pub log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ServerState {
    /// Initializes the entire server state from the given configuration.
    /// This is the main factory function for creating the server's shared context.
    pub fn initialize(
        config: Config,
        log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
    ) -> Result<ServerInit, CacheError> {
        let db = Db::new(&config.cache, config.maxmemory_policy, config.maxmemory);

        let event_bus = Arc::new(EventBus::new());
        let status = Arc::new(StatusCollector::new());
        event_bus.register(status.clone());

        let (cluster, cluster_gossip_tx, cluster_gossip_rx) = if config.cluster.enabled {
            let cluster_state = Arc::new(ClusterState::new(
                &config.host,
                config.port,
                config.cluster.port,
            ));
            let (tx, rx) = mpsc::channel(128);
            (Some(cluster_state), Some(tx), Some(rx))
        } else {
            (None, None, None)
        };

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let state = Arc::new(Self {
            start_time: Instant::now(),
            db,
            clients: Arc::new(DashMap::new()),
            next_client_id: AtomicU64::new(1),
            config: Arc::new(Mutex::new(config)),
            channel_manager: Arc::new(ChannelManager::new()),
            scripting: Arc::new(ScriptManager::new()),
            event_bus,
            status,
            cluster,
            cluster_gossip_tx,
            log_reload_handle,
            shutdown_tx,
        });

        Ok(ServerInit {
            state,
            shutdown_rx,
            cluster_gossip_rx,
        })
    }

    /// Hands out the next `ClientInfo::id`, used as the `ClientMap` key.
    pub fn next_client_id(&self) -> u64 {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }

    /// A fresh receiver for any task that needs to observe shutdown.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Broadcasts the shutdown signal to every subscribed task.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
