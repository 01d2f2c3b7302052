// src/server/spawner.rs

//! Spawns all of the server's long-running background tasks.

use super::context::ServerContext;
use crate::core::cluster::gossip;
use crate::core::pubsub::channel_purger::ChannelPurgerTask;
use crate::core::storage::ttl::TtlManager;
use anyhow::Result;
use tracing::info;

/// Spawns all background tasks into the provided `JoinSet`.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let server_state = &ctx.state;
    let background_tasks = &mut ctx.background_tasks;

    let ttl_manager = TtlManager::new(std::sync::Arc::new(server_state.db.clone()), server_state.status.clone());
    let shutdown_rx_ttl = server_state.subscribe_shutdown();
    background_tasks.spawn(async move {
        ttl_manager.run(shutdown_rx_ttl).await;
        Ok(())
    });

    let purger = ChannelPurgerTask::new(server_state.clone());
    let shutdown_rx_purge = server_state.subscribe_shutdown();
    background_tasks.spawn(async move {
        purger.run(shutdown_rx_purge).await;
        Ok(())
    });

    let status = server_state.status.clone();
    let shutdown_rx_status = server_state.subscribe_shutdown();
    background_tasks.spawn(async move {
        status.run(shutdown_rx_status).await;
        Ok(())
    });

    let cluster_enabled = server_state.config.lock().await.cluster.enabled;
    if cluster_enabled {
        let cluster = server_state
            .cluster
            .clone()
            .expect("cluster state must be initialized when cluster mode is enabled");
        let gossip_rx = ctx
            .init_channels
            .cluster_gossip_rx
            .take()
            .expect("gossip task receiver must exist when cluster mode is enabled");
        let bus_port = server_state.config.lock().await.cluster.port;
        let shutdown_rx_cluster = server_state.subscribe_shutdown();
        background_tasks.spawn(async move {
            gossip::run(cluster, bus_port, gossip_rx, shutdown_rx_cluster).await;
            Ok(())
        });
    }

    info!("all background tasks have been spawned");
    Ok(())
}
