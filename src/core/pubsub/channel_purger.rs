// src/core/pubsub/channel_purger.rs

//! A background task to periodically clean up exact-channel subscriber
//! entries whose weak references have all expired.

use crate::core::state::ServerState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

const PURGE_INTERVAL: Duration = Duration::from_secs(300);

pub struct ChannelPurgerTask {
    state: Arc<ServerState>,
}

impl ChannelPurgerTask {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let purged = self.state.channel_manager.purge_stale();
                    if purged > 0 {
                        debug!("purged {} stale pub/sub subscriber entries", purged);
                    }
                }
                _ = shutdown_rx.recv() => {
                    return;
                }
            }
        }
    }
}
