// src/core/storage/db/shard.rs

//! Defines `DbShard` and `ShardCache`, the fundamental concurrent storage unit.
//! Eviction policy (LRU or LFU) is applied per shard so that no single global
//! lock is needed to keep the whole cache under its memory/entry budget.

use crate::config::EvictionPolicy;
use crate::core::storage::data_types::StoredValue;
use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// How many candidates the LFU evictor samples before picking the coldest one.
/// A small sample gives an approximately-correct LFU without scanning the shard.
const LFU_SAMPLE_SIZE: usize = 5;

/// A single concurrent slice of a database. Holds a mutex-guarded `ShardCache`
/// plus atomics so size/memory accounting can be read without taking the lock.
#[derive(Debug)]
pub struct DbShard {
    pub entries: Mutex<ShardCache>,
    pub current_memory: Arc<AtomicUsize>,
    pub key_count: Arc<AtomicUsize>,
}

/// Wraps an `LruCache` (which always tracks recency, regardless of the active
/// eviction policy) with memory accounting and a pluggable eviction strategy.
#[derive(Debug)]
pub struct ShardCache {
    store: LruCache<Bytes, StoredValue>,
    memory_counter: Arc<AtomicUsize>,
    key_counter: Arc<AtomicUsize>,
    capacity: usize,
}

impl DbShard {
    pub(super) fn new(capacity: usize) -> Self {
        let current_memory = Arc::new(AtomicUsize::new(0));
        let key_count = Arc::new(AtomicUsize::new(0));
        Self {
            entries: Mutex::new(ShardCache::new(
                capacity,
                current_memory.clone(),
                key_count.clone(),
            )),
            current_memory,
            key_count,
        }
    }
}

impl ShardCache {
    fn new(capacity: usize, memory_counter: Arc<AtomicUsize>, key_counter: Arc<AtomicUsize>) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            store: LruCache::new(cap),
            memory_counter,
            key_counter,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn update_memory(&self, diff: isize) {
        if diff > 0 {
            self.memory_counter.fetch_add(diff as usize, Ordering::Relaxed);
        } else {
            self.memory_counter.fetch_sub((-diff) as usize, Ordering::Relaxed);
        }
    }

    /// Inserts a value, recomputing its size and updating memory/key accounting.
    /// Returns the previous value, if the key existed.
    pub fn put(&mut self, key: Bytes, mut value: StoredValue) -> Option<StoredValue> {
        value.size = value.data.memory_usage();
        let new_item_mem = key.len() + value.size;

        let old_value = self.store.put(key.clone(), value);
        if let Some(ref old) = old_value {
            let old_item_mem = key.len() + old.size;
            self.update_memory(new_item_mem as isize - old_item_mem as isize);
        } else {
            self.update_memory(new_item_mem as isize);
            self.key_counter.fetch_add(1, Ordering::Relaxed);
        }
        old_value
    }

    pub fn remove(&mut self, key: &Bytes) -> Option<StoredValue> {
        if let Some(value) = self.store.pop(key) {
            let mem = key.len() + value.size;
            self.update_memory(-(mem as isize));
            self.key_counter.fetch_sub(1, Ordering::Relaxed);
            Some(value)
        } else {
            None
        }
    }

    /// Looks up a key, bumping its LRU recency and LFU counter.
    pub fn get(&mut self, key: &Bytes, lfu_decay_mins: u16) -> Option<&StoredValue> {
        if let Some(entry) = self.store.get_mut(key) {
            entry.lfu.touch(lfu_decay_mins);
            return Some(entry);
        }
        None
    }

    /// Looks up a key without touching its recency/frequency metadata.
    pub fn peek(&self, key: &Bytes) -> Option<&StoredValue> {
        self.store.peek(key)
    }

    pub fn get_mut(&mut self, key: &Bytes) -> Option<&mut StoredValue> {
        self.store.get_mut(key)
    }

    pub fn clear(&mut self) {
        if self.store.is_empty() {
            return;
        }
        self.store.clear();
        self.memory_counter.store(0, Ordering::Relaxed);
        self.key_counter.store(0, Ordering::Relaxed);
    }

    pub fn iter(&self) -> lru::Iter<'_, Bytes, StoredValue> {
        self.store.iter()
    }

    pub fn is_over_capacity(&self) -> bool {
        self.store.len() > self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Evicts one entry according to `policy`, skipping keys whose LFU counter is at
    /// or above `hot_key_threshold` ("hot-key protection") unless no cold candidate
    /// exists, in which case progress is guaranteed by evicting the least-hot one found.
    pub fn evict_one(
        &mut self,
        policy: EvictionPolicy,
        hot_key_threshold: u8,
    ) -> Option<(Bytes, StoredValue)> {
        match policy {
            EvictionPolicy::NoEviction => None,
            EvictionPolicy::Lru => self.evict_lru(hot_key_threshold),
            EvictionPolicy::Lfu => self.evict_lfu(hot_key_threshold),
        }
    }

    fn evict_lru(&mut self, hot_key_threshold: u8) -> Option<(Bytes, StoredValue)> {
        // Walk from the least-recently-used end, skipping hot keys by re-inserting
        // them at the MRU end, bounded by the shard size so this always terminates.
        let mut skipped = Vec::new();
        let mut victim = None;
        for _ in 0..self.store.len() {
            let Some((key, value)) = self.store.pop_lru() else {
                break;
            };
            if value.lfu.counter() >= hot_key_threshold {
                skipped.push((key, value));
                continue;
            }
            victim = Some((key, value));
            break;
        }
        for (key, value) in skipped {
            self.store.put(key, value);
        }
        if let Some((ref key, ref value)) = victim {
            let mem = key.len() + value.size;
            self.update_memory(-(mem as isize));
            self.key_counter.fetch_sub(1, Ordering::Relaxed);
        }
        victim
    }

    fn evict_lfu(&mut self, hot_key_threshold: u8) -> Option<(Bytes, StoredValue)> {
        let sample_size = LFU_SAMPLE_SIZE.max(1).min(self.store.len());
        let mut best: Option<(Bytes, u8)> = None;
        for (key, value) in self.store.iter().take(sample_size) {
            if value.lfu.counter() >= hot_key_threshold {
                continue;
            }
            if best.as_ref().is_none_or(|(_, c)| value.lfu.counter() < *c) {
                best = Some((key.clone(), value.lfu.counter()));
            }
        }
        let key = match best {
            Some((k, _)) => k,
            // Every sampled key is hot (or the shard is empty); fall back to
            // plain LRU so the shard never gets stuck above capacity.
            None => self.store.iter().next()?.0.clone(),
        };
        self.remove(&key).map(|v| (key, v))
    }
}
