// src/core/commands/generic.rs

//! Key-space and connection commands that don't belong to any one data type:
//! PING, ECHO, DEL, EXISTS, KEYS, TTL. Also holds the shared lock-holding
//! helpers every other `commands::*` module routes its reads and writes
//! through, so expiry, LRU/LFU bookkeeping, and eviction all happen on the
//! live command path and not only on the `Db::get`/`Db::put` batch API.

use crate::core::errors::CacheError;
use crate::core::metrics::StatusCollector;
use crate::core::protocol::RespValue;
use crate::core::storage::data_types::StoredValue;
use crate::core::storage::db::{Db, ExecutionLocks, ShardCache};
use bytes::Bytes;

/// The outcome of looking a key up without deciding yet whether the access
/// should count toward recency/frequency metadata: a command like TTL needs
/// to tell "never existed" apart from "existed, but just expired" (spec's
/// `-2` vs `0` distinction), which a plain `Option` can't express.
pub(crate) enum KeyLookup<'a> {
    Missing,
    Expired,
    Live(&'a StoredValue),
}

pub async fn exec_ping(message: Option<Bytes>) -> RespValue {
    match message {
        Some(msg) => RespValue::BulkString(msg),
        None => RespValue::SimpleString("PONG".into()),
    }
}

pub fn exec_echo(message: Bytes) -> RespValue {
    RespValue::BulkString(message)
}

pub async fn exec_del(keys: &[Bytes], locks: &mut ExecutionLocks<'_>) -> RespValue {
    let mut count = 0i64;
    for key in keys {
        if remove_key(locks, key) {
            count += 1;
        }
    }
    RespValue::Integer(count)
}

pub async fn exec_exists(keys: &[Bytes], locks: &mut ExecutionLocks<'_>) -> RespValue {
    let mut count = 0i64;
    for key in keys {
        if matches!(peek_live(locks, key), KeyLookup::Live(_)) {
            count += 1;
        }
    }
    RespValue::Integer(count)
}

pub async fn exec_keys(db: &Db, pattern: &Bytes) -> RespValue {
    let mut cursor = 0u64;
    let mut matched = Vec::new();
    loop {
        let (next, keys) = db.scan_keys(cursor, 256, Some(pattern)).await;
        matched.extend(keys.into_iter().map(RespValue::BulkString));
        if next == 0 {
            break;
        }
        cursor = next;
    }
    RespValue::Array(matched)
}

pub async fn exec_ttl(key: &Bytes, locks: &mut ExecutionLocks<'_>) -> RespValue {
    match peek_live(locks, key) {
        KeyLookup::Missing => RespValue::Integer(-2),
        KeyLookup::Expired => RespValue::Integer(0),
        KeyLookup::Live(value) => match value.remaining_ttl_ms() {
            Some(ms) => RespValue::Integer((ms + 999) / 1000),
            None => RespValue::Integer(-1),
        },
    }
}

/// Resolves whichever lock shape was acquired (`Single` for a one-key
/// command, `Multi`/`All` for DEL/EXISTS/MGET/KEYS-like commands) down to
/// the one shard guard that owns `key`.
pub(crate) fn shard_for_key<'a, 'b>(
    locks: &'a mut ExecutionLocks<'b>,
    key: &Bytes,
) -> Result<&'a mut ShardCache, CacheError> {
    let idx = Db::get_shard_index(key);
    match locks {
        ExecutionLocks::Single { shard_index, guard } if *shard_index == idx => Ok(guard),
        ExecutionLocks::Multi { guards } => guards
            .get_mut(&idx)
            .ok_or_else(|| CacheError::Internal("missing shard lock".into())),
        ExecutionLocks::All { guards } => guards
            .get_mut(idx)
            .ok_or_else(|| CacheError::Internal("missing shard lock".into())),
        _ => Err(CacheError::Internal("missing shard lock".into())),
    }
}

/// Looks up `key`, lazily deleting it if it's expired, without touching
/// recency/frequency metadata. Used for reads that must not themselves count
/// as an access: EXISTS and TTL.
pub(crate) fn peek_live<'a>(locks: &'a mut ExecutionLocks<'_>, key: &Bytes) -> KeyLookup<'a> {
    let Ok(guard) = shard_for_key(locks, key) else {
        return KeyLookup::Missing;
    };
    let expired = guard.peek(key).is_some_and(|v| v.is_expired());
    if expired {
        guard.remove(key);
        return KeyLookup::Expired;
    }
    match guard.peek(key) {
        Some(value) => KeyLookup::Live(value),
        None => KeyLookup::Missing,
    }
}

/// Looks up `key` for a read that counts as an access: lazily deletes it if
/// expired, otherwise bumps LRU recency and the LFU counter and records a
/// cache hit or miss. Used by GET and every structured-type read (HGET,
/// LRANGE, SMEMBERS, ZSCORE, ...).
pub(crate) fn get_live<'a>(
    locks: &'a mut ExecutionLocks<'_>,
    key: &Bytes,
    lfu_decay_minutes: u16,
    status: &StatusCollector,
) -> Option<&'a StoredValue> {
    let Ok(guard) = shard_for_key(locks, key) else {
        status.record_miss();
        return None;
    };
    let expired = guard.peek(key).is_some_and(|v| v.is_expired());
    if expired {
        guard.remove(key);
        status.record_miss();
        return None;
    }
    match guard.get(key, lfu_decay_minutes) {
        Some(value) => {
            status.record_hit();
            Some(value)
        }
        None => {
            status.record_miss();
            None
        }
    }
}

/// Inserts `value` at `key`, then runs the configured eviction policy over
/// the owning shard so capacity and memory budgets are enforced on every
/// live write, not just on the batch-load path.
pub(crate) fn put_live(
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
    key: Bytes,
    value: StoredValue,
) -> Result<(), CacheError> {
    let guard = shard_for_key(locks, &key)?;
    guard.put(key, value);
    apply_eviction(db, status, guard);
    Ok(())
}

/// Runs the configured eviction policy over an already-locked shard and
/// records however many entries it actually removed, so `INFO stats`'
/// `evicted_keys` reflects real eviction pressure rather than staying `0`.
pub(crate) fn apply_eviction(db: &Db, status: &StatusCollector, guard: &mut ShardCache) {
    let evicted = db.evict_if_needed(guard);
    status.record_evicted(evicted as u64);
}

pub(crate) fn remove_key(locks: &mut ExecutionLocks<'_>, key: &Bytes) -> bool {
    match shard_for_key(locks, key) {
        Ok(guard) => guard.remove(key).is_some(),
        Err(_) => false,
    }
}
