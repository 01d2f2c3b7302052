// src/config.rs

//! Manages server configuration: loading, resolving dynamic values, and validation.
//!
//! Configuration is layered the way the original server's config loader works:
//! a TOML file supplies the base values, and `ASTRA_*` environment variables
//! can override individual fields on top of it.

use anyhow::{Context, Result, anyhow};
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::fs;
use sysinfo::System;
use tracing::{info, warn};

/// The memory eviction strategy applied once a shard exceeds its capacity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    #[default]
    NoEviction,
    Lru,
    Lfu,
}

/// Cluster gossip bus settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClusterConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cluster_port")]
    pub port: u16,
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,
    #[serde(default = "default_gossip_interval_ms")]
    pub gossip_interval_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_cluster_port(),
            node_timeout_ms: default_node_timeout_ms(),
            gossip_interval_ms: default_gossip_interval_ms(),
        }
    }
}

fn default_cluster_port() -> u16 {
    default_port() + 10000
}
fn default_node_timeout_ms() -> u64 {
    15_000
}
fn default_gossip_interval_ms() -> u64 {
    1_000
}

/// Eviction and frequency-tracking knobs for the cache engine.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    /// Total entry-count budget, spread evenly across shards.
    #[serde(default = "default_entry_capacity")]
    pub entry_capacity: usize,
    /// Minutes per LFU decay step; see `LfuInfo::touch`.
    #[serde(default = "default_lfu_decay_minutes")]
    pub lfu_decay_minutes: u16,
    /// Keys whose LFU counter reaches this value are skipped by the evictor.
    #[serde(default = "default_hot_key_threshold")]
    pub hot_key_threshold: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_capacity: default_entry_capacity(),
            lfu_decay_minutes: default_lfu_decay_minutes(),
            hot_key_threshold: default_hot_key_threshold(),
        }
    }
}

fn default_entry_capacity() -> usize {
    1_000_000
}
fn default_lfu_decay_minutes() -> u16 {
    1
}
fn default_hot_key_threshold() -> u8 {
    32
}

/// Optional point-in-time snapshot persistence: a flat `key value expiry-ms`
/// text dump taken on shutdown and loaded back on startup.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_snapshot_path")]
    pub path: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_snapshot_path(),
        }
    }
}

fn default_snapshot_path() -> String {
    "astra.snapshot".to_string()
}

// Platform-specific module for detecting cgroup memory limits on Linux.
#[cfg(target_os = "linux")]
mod linux_memory {
    use super::*;

    pub fn get_cgroup_memory_limit() -> Option<u64> {
        // Cgroup v2
        if let Ok(limit_str) = fs::read_to_string("/sys/fs/cgroup/memory.max")
            && let Ok(limit) = limit_str.trim().parse::<u64>()
            && limit < u64::MAX / 2
        {
            info!("Detected cgroup v2 memory limit: {} bytes", limit);
            return Some(limit);
        }

        // Cgroup v1
        if let Ok(limit_str) = fs::read_to_string("/sys/fs/cgroup/memory/memory.limit_in_bytes")
            && let Ok(limit) = limit_str.trim().parse::<u64>()
            && limit < u64::MAX / 2
        {
            info!("Detected cgroup v1 memory limit: {} bytes", limit);
            return Some(limit);
        }

        None
    }
}

// Stub module for non-Linux operating systems.
#[cfg(not(target_os = "linux"))]
mod other_os_memory {
    pub fn get_cgroup_memory_limit() -> Option<u64> {
        None
    }
}

/// Gets the available memory, prioritizing cgroup limits on Linux over system memory.
fn get_available_memory() -> Result<u64> {
    #[cfg(target_os = "linux")]
    let cgroup_limit = linux_memory::get_cgroup_memory_limit();

    #[cfg(not(target_os = "linux"))]
    let cgroup_limit = other_os_memory::get_cgroup_memory_limit();

    if let Some(limit) = cgroup_limit {
        return Ok(limit);
    }

    let mut sys = System::new();
    sys.refresh_memory();
    let total_memory = sys.total_memory();
    warn!(
        "Could not detect cgroup memory limit. Using total system memory: {} bytes",
        total_memory
    );
    Ok(total_memory)
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum MaxMemoryConfig {
    Bytes(usize),
    String(String),
}

/// A raw representation of the config file (plus env overrides) before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    password: Option<String>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default = "default_worker_threads")]
    worker_threads: usize,
    #[serde(default = "default_maxmemory_config")]
    maxmemory: MaxMemoryConfig,
    #[serde(default)]
    maxmemory_policy: EvictionPolicy,
    #[serde(default)]
    cluster: ClusterConfig,
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    snapshot: SnapshotConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    6380
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10000
}
fn default_worker_threads() -> usize {
    0 // 0 means "let tokio pick a thread per core"
}
fn default_maxmemory_config() -> MaxMemoryConfig {
    MaxMemoryConfig::String("25%".to_string())
}

/// Represents the final, validated, and resolved server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub log_level: String,
    pub max_clients: usize,
    pub worker_threads: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxmemory: Option<usize>,
    pub maxmemory_policy: EvictionPolicy,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            worker_threads: default_worker_threads(),
            maxmemory: None,
            maxmemory_policy: EvictionPolicy::default(),
            cluster: ClusterConfig::default(),
            cache: CacheConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` by layering a TOML file under `ASTRA_*` environment
    /// overrides, the way the original server's multi-source config loader does.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("ASTRA").separator("_"))
            .build()
            .with_context(|| format!("Failed to load configuration from '{path}'"))?;

        let raw_config: RawConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse configuration from '{path}'"))?;

        let available_memory = get_available_memory()?;
        let resolved_maxmemory = resolve_maxmemory(raw_config.maxmemory, available_memory)?;

        let config = Config {
            host: raw_config.host,
            port: raw_config.port,
            password: raw_config.password,
            log_level: raw_config.log_level,
            max_clients: raw_config.max_clients,
            worker_threads: raw_config.worker_threads,
            maxmemory: resolved_maxmemory,
            maxmemory_policy: raw_config.maxmemory_policy,
            cluster: raw_config.cluster,
            cache: raw_config.cache,
            snapshot: raw_config.snapshot,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if let Some(mem) = self.maxmemory
            && mem > 0
            && mem < 1_000_000
        {
            warn!(
                "low maxmemory setting: {} bytes. This may cause performance issues.",
                mem
            );
        }

        if self.cluster.enabled && self.cluster.port == self.port {
            return Err(anyhow!("cluster.port cannot be the same as the main server port"));
        }

        Ok(())
    }
}

/// Resolves the `MaxMemoryConfig` into an `Option<usize>` representing bytes.
fn resolve_maxmemory(cfg: MaxMemoryConfig, available_memory: u64) -> Result<Option<usize>> {
    match cfg {
        MaxMemoryConfig::Bytes(b) => Ok(Some(b)),
        MaxMemoryConfig::String(s) => {
            let s_lower = s.to_lowercase();
            if let Some(percentage_str) = s_lower.strip_suffix('%') {
                let percentage: f64 = percentage_str
                    .parse()
                    .context("Invalid maxmemory percentage value")?;
                if !(0.0..=100.0).contains(&percentage) {
                    return Err(anyhow!(
                        "Invalid maxmemory percentage, must be between 0 and 100"
                    ));
                }
                let resolved_bytes = (available_memory as f64 * (percentage / 100.0)) as usize;
                info!(
                    "Resolved maxmemory '{}' to {} bytes ({:.2}% of total available {} bytes).",
                    s, resolved_bytes, percentage, available_memory
                );
                Ok(Some(resolved_bytes))
            } else if let Some(val_str) = s_lower.strip_suffix("gb") {
                parse_memory_string(&s, val_str, 1024 * 1024 * 1024)
            } else if let Some(val_str) = s_lower.strip_suffix('g') {
                parse_memory_string(&s, val_str, 1024 * 1024 * 1024)
            } else if let Some(val_str) = s_lower.strip_suffix("mb") {
                parse_memory_string(&s, val_str, 1024 * 1024)
            } else if let Some(val_str) = s_lower.strip_suffix('m') {
                parse_memory_string(&s, val_str, 1024 * 1024)
            } else if let Some(val_str) = s_lower.strip_suffix("kb") {
                parse_memory_string(&s, val_str, 1024)
            } else if let Some(val_str) = s_lower.strip_suffix('k') {
                parse_memory_string(&s, val_str, 1024)
            } else {
                let bytes: usize = s.parse().with_context(|| format!("Invalid maxmemory value '{s}'. Must be a number (bytes), a percentage (e.g., '50%'), or have a unit (e.g., '512mb')."))?;
                Ok(Some(bytes))
            }
        }
    }
}

/// Parses a string number with a unit (kb, mb, gb) and applies a multiplier.
fn parse_memory_string(
    original_str: &str,
    value_str: &str,
    multiplier: u64,
) -> Result<Option<usize>> {
    let value: u64 = value_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid number in maxmemory config: '{original_str}'"))?;
    let result_u64 = value.saturating_mul(multiplier);
    if result_u64 > (usize::MAX as u64) {
        return Err(anyhow!(
            "maxmemory value '{}' is too large for this system's architecture (max is {} bytes)",
            original_str,
            usize::MAX
        ));
    }
    Ok(Some(result_u64 as usize))
}
