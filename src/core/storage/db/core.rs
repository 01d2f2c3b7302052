// src/core/storage/db/core.rs

//! `Db`: a sharded, concurrent key-value store. Keys are routed to one of
//! `NUM_SHARDS` independent `DbShard`s by hash, so unrelated keys never
//! contend on the same lock.

use crate::config::{CacheConfig, EvictionPolicy};
use crate::core::cluster::slot::get_slot;
use crate::core::pubsub::glob_match;
use crate::core::storage::data_types::StoredValue;
use crate::core::storage::db::shard::{DbShard, ShardCache};
use bytes::Bytes;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::{IteratorRandom, SliceRandom};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::warn;

/// The number of independent shards the keyspace is split across.
pub const NUM_SHARDS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopDirection {
    Left,
    Right,
}

/// The sharded cache engine. Cheaply `Clone`-able: every field is an `Arc`
/// or `Copy` configuration value.
#[derive(Debug, Clone)]
pub struct Db {
    shards: Arc<Vec<Arc<DbShard>>>,
    pub eviction_policy: EvictionPolicy,
    pub hot_key_threshold: u8,
    pub lfu_decay_minutes: u16,
    pub maxmemory: Option<usize>,
}

impl Db {
    pub fn new(cache_config: &CacheConfig, eviction_policy: EvictionPolicy, maxmemory: Option<usize>) -> Self {
        let per_shard_capacity = if cache_config.entry_capacity == 0 {
            0
        } else {
            (cache_config.entry_capacity / NUM_SHARDS).max(1)
        };
        let shards = (0..NUM_SHARDS)
            .map(|_| Arc::new(DbShard::new(per_shard_capacity)))
            .collect();
        Self {
            shards: Arc::new(shards),
            eviction_policy,
            hot_key_threshold: cache_config.hot_key_threshold,
            lfu_decay_minutes: cache_config.lfu_decay_minutes,
            maxmemory,
        }
    }

    pub fn get_shard_index(key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    pub fn get_shard(&self, index: usize) -> &Arc<DbShard> {
        &self.shards[index]
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn slot_for_key(key: &Bytes) -> u16 {
        get_slot(key)
    }

    pub fn get_key_count(&self) -> usize {
        self.shards.iter().map(|s| s.key_count.load(Ordering::Relaxed)).sum()
    }

    pub fn get_current_memory(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.current_memory.load(Ordering::Relaxed))
            .sum()
    }

    /// Reads a single key, bumping its recency/frequency metadata.
    pub async fn get(&self, key: &Bytes) -> Option<StoredValue> {
        let idx = Self::get_shard_index(key);
        let shard = &self.shards[idx];
        let mut guard = shard.entries.lock().await;
        if guard.peek(key).is_some_and(|v| v.is_expired()) {
            guard.remove(key);
            return None;
        }
        guard.get(key, self.lfu_decay_minutes).cloned()
    }

    /// Reads many keys in one pass, grouping lookups by shard to minimize lock
    /// acquisitions. Preserves the input order and length: a miss is `None`.
    pub async fn batch_get(&self, keys: &[Bytes]) -> Vec<Option<StoredValue>> {
        let mut results: Vec<Option<StoredValue>> = vec![None; keys.len()];
        let mut by_shard: Vec<Vec<usize>> = vec![Vec::new(); NUM_SHARDS];
        for (i, key) in keys.iter().enumerate() {
            by_shard[Self::get_shard_index(key)].push(i);
        }
        for (shard_idx, indices) in by_shard.into_iter().enumerate() {
            if indices.is_empty() {
                continue;
            }
            let shard = &self.shards[shard_idx];
            let mut guard = shard.entries.lock().await;
            for i in indices {
                let key = &keys[i];
                if guard.peek(key).is_some_and(|v| v.is_expired()) {
                    guard.remove(key);
                    continue;
                }
                results[i] = guard.get(key, self.lfu_decay_minutes).cloned();
            }
        }
        results
    }

    /// Inserts a single key, triggering eviction first if the owning shard is
    /// already at capacity under the configured policy.
    pub async fn put(&self, key: Bytes, value: StoredValue) {
        let idx = Self::get_shard_index(&key);
        let shard = &self.shards[idx];
        let mut guard = shard.entries.lock().await;
        guard.put(key, value);
        self.evict_if_needed(&mut guard);
    }

    /// Inserts many key/value pairs, grouping writes by shard. Each shard is
    /// locked once for the whole batch that belongs to it.
    pub async fn batch_put(&self, items: Vec<(Bytes, StoredValue)>) {
        let mut by_shard: Vec<Vec<(Bytes, StoredValue)>> = (0..NUM_SHARDS).map(|_| Vec::new()).collect();
        for (key, value) in items {
            let idx = Self::get_shard_index(&key);
            by_shard[idx].push((key, value));
        }
        for (shard_idx, batch) in by_shard.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            let shard = &self.shards[shard_idx];
            let mut guard = shard.entries.lock().await;
            for (key, value) in batch {
                guard.put(key, value);
            }
            self.evict_if_needed(&mut guard);
        }
    }

    /// Evicts entries from an already-locked shard, after an insert has
    /// landed, until it is back at or under capacity and the server is
    /// under its memory budget. A shard configured with zero capacity fails
    /// `len() > capacity()` as soon as it holds anything, so it evicts back
    /// to empty after every insert.
    pub(crate) fn evict_if_needed(&self, guard: &mut ShardCache) -> usize {
        if self.eviction_policy == EvictionPolicy::NoEviction {
            return 0;
        }
        let mut evicted = 0usize;
        let mut attempts = 0usize;
        let max_attempts = guard.len() + 1;
        while (guard.is_over_capacity() || self.is_over_memory_budget()) && attempts < max_attempts {
            attempts += 1;
            if guard.evict_one(self.eviction_policy, self.hot_key_threshold).is_none() {
                break;
            }
            evicted += 1;
        }
        evicted
    }

    fn is_over_memory_budget(&self) -> bool {
        match self.maxmemory {
            Some(limit) => self.get_current_memory() > limit,
            None => false,
        }
    }

    pub async fn del(&self, keys: &[Bytes]) -> usize {
        let mut count = 0;
        for key in keys {
            let idx = Self::get_shard_index(key);
            let shard = &self.shards[idx];
            let mut guard = shard.entries.lock().await;
            if guard.remove(key).is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn clear_all_shards(&self) {
        for shard in self.shards.iter() {
            shard.entries.lock().await.clear();
        }
    }

    /// Samples keys from a random shard and returns those that are expired,
    /// for the active TTL sweeper.
    pub async fn get_expired_sample_keys(&self, sample_size: usize) -> Vec<Bytes> {
        let shard_idx = {
            let mut rng = SmallRng::from_entropy();
            (0..NUM_SHARDS).choose(&mut rng).unwrap_or(0)
        };
        let shard = &self.shards[shard_idx];
        let guard = shard.entries.lock().await;
        let mut rng = SmallRng::from_entropy();
        guard
            .iter()
            .choose_multiple(&mut rng, sample_size)
            .into_iter()
            .filter(|(_, v)| v.is_expired())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub async fn get_random_keys(&self, count: usize) -> Vec<Bytes> {
        let mut rng = SmallRng::from_entropy();
        let mut out = Vec::with_capacity(count);
        let mut shard_order: Vec<usize> = (0..NUM_SHARDS).collect();
        shard_order.shuffle(&mut rng);
        for shard_idx in shard_order {
            if out.len() >= count {
                break;
            }
            let shard = &self.shards[shard_idx];
            let guard = shard.entries.lock().await;
            let remaining = count - out.len();
            out.extend(guard.iter().take(remaining).map(|(k, _)| k.clone()));
        }
        out
    }

    /// Returns up to `count` keys whose cluster slot equals `slot`.
    pub async fn get_keys_in_slot(&self, slot: u16, count: usize) -> Vec<Bytes> {
        let mut out = Vec::new();
        for shard in self.shards.iter() {
            if out.len() >= count {
                break;
            }
            let guard = shard.entries.lock().await;
            for (key, _) in guard.iter() {
                if get_slot(key) == slot {
                    out.push(key.clone());
                    if out.len() >= count {
                        break;
                    }
                }
            }
        }
        out
    }

    /// Cursor-based incremental iteration. The cursor is a shard index; a full
    /// shard's worth of keys (optionally filtered by a glob pattern) is
    /// returned per call. Cursor `0` both starts and (on completion) ends a
    /// scan, matching the usual guarantee that a full scan eventually returns to 0.
    pub async fn scan_keys(
        &self,
        cursor: u64,
        count: usize,
        pattern: Option<&[u8]>,
    ) -> (u64, Vec<Bytes>) {
        let start = cursor as usize;
        if start >= NUM_SHARDS {
            warn!("scan cursor {} out of range, restarting", cursor);
            return (0, vec![]);
        }
        let shard = &self.shards[start];
        let guard = shard.entries.lock().await;
        let keys: Vec<Bytes> = guard
            .iter()
            .filter(|(k, _)| match pattern {
                Some(p) => glob_match(p, k),
                None => true,
            })
            .take(count.max(1))
            .map(|(k, _)| k.clone())
            .collect();
        let next = if start + 1 >= NUM_SHARDS { 0 } else { (start + 1) as u64 };
        (next, keys)
    }
}
