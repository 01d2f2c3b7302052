// src/core/metrics.rs

//! The status collector: registers as an `EventObserver` to keep `INFO`'s
//! counters current, and separately samples OS-level memory on a timer so
//! that figure doesn't depend on any particular command running.

use crate::core::events::{Event, EventObserver};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use sysinfo::System;
use tokio::sync::broadcast;
use tracing::info;

/// How often the background sampler refreshes the OS memory figure.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// Server-wide counters and OS samples backing the `INFO` command and, in a
/// future deployment, a metrics-scrape endpoint. Every field is an atomic so
/// readers never contend with the command path.
#[derive(Debug, Default)]
pub struct StatusCollector {
    pub connected_clients: AtomicI64,
    pub connections_received_total: AtomicU64,
    pub commands_processed_total: AtomicU64,
    pub expired_keys_total: AtomicU64,
    pub evicted_keys_total: AtomicU64,
    pub keyspace_hits: AtomicU64,
    pub keyspace_misses: AtomicU64,
    pub os_used_memory_bytes: AtomicU64,
    connected_clients_peak: AtomicUsize,
}

impl StatusCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.keyspace_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.keyspace_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, n: u64) {
        if n > 0 {
            self.expired_keys_total.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn record_evicted(&self, n: u64) {
        if n > 0 {
            self.evicted_keys_total.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn connected_clients(&self) -> i64 {
        self.connected_clients.load(Ordering::Relaxed).max(0)
    }

    pub fn connected_clients_peak(&self) -> usize {
        self.connected_clients_peak.load(Ordering::Relaxed)
    }

    /// Samples OS-wide memory usage on a timer until shutdown.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("status collector started");
        let mut sys = System::new();
        let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    sys.refresh_memory();
                    self.os_used_memory_bytes.store(sys.used_memory(), Ordering::Relaxed);
                }
                _ = shutdown_rx.recv() => {
                    info!("status collector shutting down");
                    return;
                }
            }
        }
    }
}

impl EventObserver for StatusCollector {
    fn on_event(&self, event: &Event) {
        match event {
            Event::ConnectionOpened { .. } => {
                let now = self.connected_clients.fetch_add(1, Ordering::Relaxed) + 1;
                self.connections_received_total.fetch_add(1, Ordering::Relaxed);
                self.connected_clients_peak
                    .fetch_max(now.max(0) as usize, Ordering::Relaxed);
            }
            Event::ConnectionClosed { .. } => {
                self.connected_clients.fetch_sub(1, Ordering::Relaxed);
            }
            Event::CommandProcessed { .. } => {
                self.commands_processed_total.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
