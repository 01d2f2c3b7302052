// src/core/storage/data_types.rs

//! Defines the core data structures for storing values in the cache:
//! `DataValue`, the typed payload every cache entry holds (a plain string,
//! or one of the structured collections hash/list/set/zset commands operate
//! on directly, enforcing `WRONGTYPE` by pattern-matching the variant rather
//! than re-parsing a tagged byte blob on every access), `StoredValue`
//! wrapping it with TTL/size/LFU metadata, plus the logarithmic LFU
//! frequency counter.

use crate::core::storage::zset::SortedSet;
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A hard limit on the size of a single string value to prevent DoS via excessive allocation.
pub const MAX_STRING_SIZE: usize = 512 * 1024 * 1024; // 512MB

const LFU_INIT_VAL: u8 = 5;
const LFU_LOG_FACTOR: f64 = 10.0;

/// Stores metadata for the LFU (Least Frequently Used) eviction policy: an
/// 8-bit logarithmic counter plus the last-decrement timestamp (minutes since
/// epoch, truncated to 16 bits) used to age the counter down between accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LfuInfo {
    pub(crate) last_decrement_time: u16,
    pub(crate) counter: u8,
}

impl Default for LfuInfo {
    fn default() -> Self {
        Self {
            last_decrement_time: lfu_time_now(),
            counter: LFU_INIT_VAL,
        }
    }
}

impl LfuInfo {
    pub fn counter(&self) -> u8 {
        self.counter
    }

    /// Ages the counter down by the configured decay period, then probabilistically
    /// grows it by one. Growth probability shrinks as the counter rises, so hot keys
    /// need exponentially more hits to keep climbing -- this is what makes the counter
    /// behave like a saturating log-scale frequency estimate instead of a linear one.
    pub fn touch(&mut self, decay_period_mins: u16) {
        let now = lfu_time_now();
        let elapsed = now.saturating_sub(self.last_decrement_time);
        let decay_periods = if decay_period_mins == 0 {
            0
        } else {
            elapsed / decay_period_mins
        };

        let decayed = if decay_periods > 0 {
            if decay_periods >= self.counter as u16 {
                0
            } else {
                self.counter - decay_periods as u8
            }
        } else {
            self.counter
        };

        self.counter = lfu_log_incr(decayed);
        self.last_decrement_time = now;
    }
}

fn lfu_time_now() -> u16 {
    (SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 60) as u16
}

fn lfu_log_incr(counter: u8) -> u8 {
    if counter == 255 {
        return 255;
    }
    let r: f64 = rand::random();
    let baseval = counter as f64;
    let p = 1.0 / (baseval * LFU_LOG_FACTOR + 1.0);
    if r < p {
        counter.saturating_add(1)
    } else {
        counter
    }
}

/// The typed payload of a single cache entry. Every structured command
/// (hash/list/set/zset) matches on this directly and returns
/// `CacheError::WrongType` when the stored variant doesn't match what the
/// command expects, per spec's WRONGTYPE rule.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    String(Bytes),
    List(VecDeque<Bytes>),
    Hash(IndexMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    SortedSet(SortedSet),
}

impl DataValue {
    /// Approximate heap footprint of the payload, used for memory accounting
    /// and `maxmemory` eviction pressure.
    pub fn memory_usage(&self) -> usize {
        match self {
            DataValue::String(s) => s.len(),
            DataValue::List(l) => l.iter().map(|v| v.len()).sum(),
            DataValue::Hash(h) => h.iter().map(|(k, v)| k.len() + v.len()).sum(),
            DataValue::Set(s) => s.iter().map(|v| v.len()).sum(),
            DataValue::SortedSet(z) => z.memory_usage(),
        }
    }
}

/// A wrapper for every value stored in the cache, carrying the typed data
/// payload plus the metadata the eviction and TTL subsystems need.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub data: DataValue,
    /// Absolute expiration instant, if the key was created/extended with a TTL.
    pub expiry: Option<Instant>,
    /// The calculated size of `data` in bytes, refreshed on every write.
    pub size: usize,
    /// LFU eviction policy metadata. Kept even when the active policy is LRU so a
    /// `CONFIG SET maxmemory-policy` mid-flight doesn't start from a blank slate.
    pub lfu: LfuInfo,
}

impl StoredValue {
    pub fn new(data: DataValue) -> Self {
        let size = data.memory_usage();
        Self {
            data,
            expiry: None,
            size,
            lfu: LfuInfo::default(),
        }
    }

    pub fn with_ttl(data: DataValue, expiry: Option<Instant>) -> Self {
        let mut v = Self::new(data);
        v.expiry = expiry;
        v
    }

    pub fn remaining_ttl_ms(&self) -> Option<i64> {
        self.expiry
            .and_then(|expiry| expiry.checked_duration_since(Instant::now()))
            .map(|d| d.as_millis() as i64)
    }

    pub fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= Instant::now())
    }

    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.size
    }
}
