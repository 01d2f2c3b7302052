// src/core/commands/hash.rs

//! Hash-valued key commands: HSET, HGET, HGETALL, HDEL, HLEN, HEXISTS, HKEYS, HVALS.

use super::Command;
use crate::core::errors::CacheError;
use crate::core::metrics::StatusCollector;
use crate::core::protocol::RespValue;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::{Db, ExecutionLocks};
use bytes::Bytes;
use indexmap::IndexMap;

pub fn parse_hset(args: &[Bytes]) -> Result<Command, CacheError> {
    super::helpers::require_arity(args, 3, "HSET")?;
    let rest = &args[1..];
    if rest.len() % 2 != 0 {
        return Err(CacheError::WrongArgumentCount("HSET".into()));
    }
    let pairs = rest
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    Ok(Command::HSet { key: args[0].clone(), pairs })
}

fn with_hash<'a>(
    locks: &'a mut ExecutionLocks<'_>,
    key: &Bytes,
    db: &Db,
    status: &StatusCollector,
) -> Result<Option<&'a IndexMap<Bytes, Bytes>>, CacheError> {
    match super::generic::get_live(locks, key, db.lfu_decay_minutes, status) {
        None => Ok(None),
        Some(stored) => match &stored.data {
            DataValue::Hash(h) => Ok(Some(h)),
            _ => Err(CacheError::WrongType),
        },
    }
}

pub fn exec_hset(
    key: &Bytes,
    pairs: &[(Bytes, Bytes)],
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let idx = crate::core::storage::db::Db::get_shard_index(key);
    let guard = match locks {
        ExecutionLocks::Single { guard, .. } => guard,
        ExecutionLocks::Multi { guards } => guards.get_mut(&idx).ok_or(CacheError::Internal("missing shard lock".into()))?,
        _ => return Err(CacheError::Internal("missing shard lock".into())),
    };
    let mut added = 0i64;
    let mut created = false;
    match guard.get_mut(key) {
        Some(stored) => {
            let DataValue::Hash(map) = &mut stored.data else {
                return Err(CacheError::WrongType);
            };
            for (field, value) in pairs {
                if map.insert(field.clone(), value.clone()).is_none() {
                    added += 1;
                }
            }
            stored.size = stored.data.memory_usage();
        }
        None => {
            let mut map = IndexMap::new();
            for (field, value) in pairs {
                if map.insert(field.clone(), value.clone()).is_none() {
                    added += 1;
                }
            }
            guard.put(key.clone(), StoredValue::new(DataValue::Hash(map)));
            created = true;
        }
    }
    if created {
        super::generic::apply_eviction(db, status, guard);
    }
    Ok(RespValue::Integer(added))
}

pub fn exec_hget(
    key: &Bytes,
    field: &Bytes,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    match with_hash(locks, key, db, status)? {
        None => Ok(RespValue::Null),
        Some(map) => Ok(map
            .get(field)
            .map(|v| RespValue::BulkString(v.clone()))
            .unwrap_or(RespValue::Null)),
    }
}

pub fn exec_hgetall(
    key: &Bytes,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    match with_hash(locks, key, db, status)? {
        None => Ok(RespValue::Array(vec![])),
        Some(map) => {
            let mut out = Vec::with_capacity(map.len() * 2);
            for (field, value) in map {
                out.push(RespValue::BulkString(field.clone()));
                out.push(RespValue::BulkString(value.clone()));
            }
            Ok(RespValue::Array(out))
        }
    }
}

pub fn exec_hdel(key: &Bytes, fields: &[Bytes], locks: &mut ExecutionLocks<'_>) -> Result<RespValue, CacheError> {
    let idx = crate::core::storage::db::Db::get_shard_index(key);
    let guard = match locks {
        ExecutionLocks::Single { guard, .. } => guard,
        ExecutionLocks::Multi { guards } => guards.get_mut(&idx).ok_or(CacheError::Internal("missing shard lock".into()))?,
        _ => return Err(CacheError::Internal("missing shard lock".into())),
    };
    let Some(stored) = guard.get_mut(key) else {
        return Ok(RespValue::Integer(0));
    };
    let DataValue::Hash(map) = &mut stored.data else {
        return Err(CacheError::WrongType);
    };
    let mut removed = 0i64;
    for field in fields {
        if map.shift_remove(field).is_some() {
            removed += 1;
        }
    }
    let now_empty = map.is_empty();
    stored.size = stored.data.memory_usage();
    if now_empty {
        guard.remove(key);
    }
    Ok(RespValue::Integer(removed))
}

pub fn exec_hlen(key: &Bytes, locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> Result<RespValue, CacheError> {
    Ok(RespValue::Integer(with_hash(locks, key, db, status)?.map(|m| m.len()).unwrap_or(0) as i64))
}

pub fn exec_hexists(
    key: &Bytes,
    field: &Bytes,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let exists = with_hash(locks, key, db, status)?.is_some_and(|m| m.contains_key(field));
    Ok(RespValue::Integer(exists as i64))
}

pub fn exec_hkeys(key: &Bytes, locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> Result<RespValue, CacheError> {
    Ok(RespValue::Array(
        with_hash(locks, key, db, status)?
            .map(|m| m.keys().cloned().map(RespValue::BulkString).collect())
            .unwrap_or_default(),
    ))
}

pub fn exec_hvals(key: &Bytes, locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> Result<RespValue, CacheError> {
    Ok(RespValue::Array(
        with_hash(locks, key, db, status)?
            .map(|m| m.values().cloned().map(RespValue::BulkString).collect())
            .unwrap_or_default(),
    ))
}
