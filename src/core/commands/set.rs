// src/core/commands/set.rs

//! Set-valued key commands: SADD, SREM, SCARD, SMEMBERS, SISMEMBER, SPOP.

use crate::core::errors::CacheError;
use crate::core::metrics::StatusCollector;
use crate::core::protocol::RespValue;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::{Db, ExecutionLocks};
use bytes::Bytes;
use rand::seq::IteratorRandom;
use std::collections::HashSet;

fn shard_guard<'a, 'b>(
    locks: &'a mut ExecutionLocks<'b>,
    key: &Bytes,
) -> Result<&'a mut crate::core::storage::db::ShardCache, CacheError> {
    let idx = Db::get_shard_index(key);
    match locks {
        ExecutionLocks::Single { guard, .. } => Ok(guard),
        ExecutionLocks::Multi { guards } => guards
            .get_mut(&idx)
            .ok_or_else(|| CacheError::Internal("missing shard lock".into())),
        _ => Err(CacheError::Internal("missing shard lock".into())),
    }
}

fn with_set<'a>(
    locks: &'a mut ExecutionLocks<'_>,
    key: &Bytes,
    db: &Db,
    status: &StatusCollector,
) -> Result<Option<&'a HashSet<Bytes>>, CacheError> {
    match super::generic::get_live(locks, key, db.lfu_decay_minutes, status) {
        None => Ok(None),
        Some(stored) => match &stored.data {
            DataValue::Set(s) => Ok(Some(s)),
            _ => Err(CacheError::WrongType),
        },
    }
}

pub fn exec_sadd(
    key: &Bytes,
    members: &[Bytes],
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let guard = shard_guard(locks, key)?;
    let mut added = 0i64;
    let mut created = false;
    match guard.get_mut(key) {
        Some(stored) => {
            let DataValue::Set(set) = &mut stored.data else {
                return Err(CacheError::WrongType);
            };
            for member in members {
                if set.insert(member.clone()) {
                    added += 1;
                }
            }
            stored.size = stored.data.memory_usage();
        }
        None => {
            let mut set = HashSet::new();
            for member in members {
                if set.insert(member.clone()) {
                    added += 1;
                }
            }
            guard.put(key.clone(), StoredValue::new(DataValue::Set(set)));
            created = true;
        }
    }
    if created {
        super::generic::apply_eviction(db, status, guard);
    }
    Ok(RespValue::Integer(added))
}

pub fn exec_srem(key: &Bytes, members: &[Bytes], locks: &mut ExecutionLocks<'_>) -> Result<RespValue, CacheError> {
    let guard = shard_guard(locks, key)?;
    let Some(stored) = guard.get_mut(key) else {
        return Ok(RespValue::Integer(0));
    };
    let DataValue::Set(set) = &mut stored.data else {
        return Err(CacheError::WrongType);
    };
    let mut removed = 0i64;
    for member in members {
        if set.remove(member) {
            removed += 1;
        }
    }
    let now_empty = set.is_empty();
    stored.size = stored.data.memory_usage();
    if now_empty {
        guard.remove(key);
    }
    Ok(RespValue::Integer(removed))
}

pub fn exec_scard(key: &Bytes, locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> Result<RespValue, CacheError> {
    Ok(RespValue::Integer(with_set(locks, key, db, status)?.map(|s| s.len()).unwrap_or(0) as i64))
}

pub fn exec_smembers(key: &Bytes, locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> Result<RespValue, CacheError> {
    Ok(RespValue::Array(
        with_set(locks, key, db, status)?
            .map(|s| s.iter().cloned().map(RespValue::BulkString).collect())
            .unwrap_or_default(),
    ))
}

pub fn exec_sismember(
    key: &Bytes,
    member: &Bytes,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let is_member = with_set(locks, key, db, status)?.is_some_and(|s| s.contains(member));
    Ok(RespValue::Integer(is_member as i64))
}

pub fn exec_spop(key: &Bytes, count: Option<usize>, locks: &mut ExecutionLocks<'_>) -> Result<RespValue, CacheError> {
    let guard = shard_guard(locks, key)?;
    let Some(stored) = guard.get_mut(key) else {
        return Ok(match count {
            Some(_) => RespValue::Array(vec![]),
            None => RespValue::Null,
        });
    };
    let DataValue::Set(set) = &mut stored.data else {
        return Err(CacheError::WrongType);
    };
    let n = count.unwrap_or(1).min(set.len());
    let mut rng = rand::thread_rng();
    let chosen: Vec<Bytes> = set.iter().cloned().choose_multiple(&mut rng, n);
    for member in &chosen {
        set.remove(member);
    }
    let now_empty = set.is_empty();
    stored.size = stored.data.memory_usage();
    if now_empty {
        guard.remove(key);
    }
    Ok(match count {
        Some(_) => RespValue::Array(chosen.into_iter().map(RespValue::BulkString).collect()),
        None => chosen.into_iter().next().map(RespValue::BulkString).unwrap_or(RespValue::Null),
    })
}
