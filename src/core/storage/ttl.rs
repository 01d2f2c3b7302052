// src/core/storage/ttl.rs

//! Implements the active, sampling-based TTL expiration manager.

use crate::core::metrics::StatusCollector;
use crate::core::storage::db::Db;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// The interval at which the TTL manager checks for expired keys.
const TTL_CHECK_INTERVAL: Duration = Duration::from_millis(100);
/// The number of keys to sample from the database in each cycle.
const TTL_SAMPLE_SIZE: usize = 20;
/// The percentage threshold of expired keys in a sample that triggers
/// an immediate re-run of the check.
const TTL_EXPIRED_THRESHOLD_PERCENT: u32 = 25;

/// `TtlManager` is a background task that actively expires keys to prevent
/// memory build-up from expired data that is never accessed again.
pub struct TtlManager {
    db: Arc<Db>,
    status: Arc<StatusCollector>,
}

impl TtlManager {
    pub fn new(db: Arc<Db>, status: Arc<StatusCollector>) -> Self {
        Self { db, status }
    }

    /// Runs the main loop for the TTL expiration manager.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("TTL expiration manager started (active, sampling-based)");
        let mut interval = tokio::time::interval(TTL_CHECK_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.purge_expired_keys_with_sampling().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("TTL expiration manager shutting down");
                    return;
                }
            }
        }
    }

    /// Performs one cycle of the active expiration algorithm.
    ///
    /// A random sample of keys is taken; expired ones among them are deleted.
    /// If the expired fraction of the sample exceeds a threshold, the cycle
    /// repeats immediately, the way Redis's active expiration cycle does.
    async fn purge_expired_keys_with_sampling(&self) {
        loop {
            let expired_in_sample = self.db.get_expired_sample_keys(TTL_SAMPLE_SIZE).await;
            if expired_in_sample.is_empty() {
                break;
            }

            let expired_count = self.db.del(&expired_in_sample).await;
            if expired_count > 0 {
                self.status.record_expired(expired_count as u64);
                debug!("purged {} expired keys from sample", expired_count);
            }

            if expired_in_sample.len() < TTL_SAMPLE_SIZE {
                break;
            }

            let expired_percentage = (expired_count * 100 / TTL_SAMPLE_SIZE) as u32;
            if expired_percentage < TTL_EXPIRED_THRESHOLD_PERCENT {
                break;
            }
        }
    }
}
