// src/core/commands/string.rs

//! String-valued key commands: GET, SET, INCR/DECR family, MGET/MSET.

use super::helpers::require_arity;
use super::{Command, SetArgs};
use crate::core::errors::CacheError;
use crate::core::metrics::StatusCollector;
use crate::core::protocol::RespValue;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::{Db, ExecutionLocks};
use bytes::Bytes;
use std::time::{Duration, Instant};

pub fn parse_set(args: &[Bytes]) -> Result<Command, CacheError> {
    require_arity(args, 2, "SET")?;
    let key = args[0].clone();
    let value = args[1].clone();
    let mut ex_seconds = None;
    let mut i = 2;
    while i < args.len() {
        let opt = super::helpers::parse_utf8(&args[i])?.to_ascii_uppercase();
        match opt.as_str() {
            "EX" => {
                let Some(raw) = args.get(i + 1) else {
                    return Err(CacheError::SyntaxError);
                };
                ex_seconds = Some(super::helpers::parse_usize(raw)? as u64);
                i += 2;
            }
            _ => return Err(CacheError::SyntaxError),
        }
    }
    Ok(Command::Set(SetArgs { key, value, ex_seconds }))
}

pub fn parse_mset(args: &[Bytes]) -> Result<Command, CacheError> {
    require_arity(args, 2, "MSET")?;
    if args.len() % 2 != 0 {
        return Err(CacheError::WrongArgumentCount("MSET".into()));
    }
    let pairs = args
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    Ok(Command::MSet { pairs })
}

pub fn exec_get(
    key: &Bytes,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    match super::generic::get_live(locks, key, db.lfu_decay_minutes, status) {
        None => Ok(RespValue::Null),
        Some(stored) => match &stored.data {
            DataValue::String(s) => Ok(RespValue::BulkString(s.clone())),
            _ => Err(CacheError::WrongType),
        },
    }
}

pub fn exec_set(args: &SetArgs, locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> RespValue {
    let expiry = args.ex_seconds.map(|secs| Instant::now() + Duration::from_secs(secs));
    let value = StoredValue::with_ttl(DataValue::String(args.value.clone()), expiry);
    put_single(locks, args.key.clone(), value, db, status);
    RespValue::SimpleString("OK".into())
}

pub fn exec_mget(keys: &[Bytes], locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> RespValue {
    let values = keys
        .iter()
        .map(
            |key| match super::generic::get_live(locks, key, db.lfu_decay_minutes, status) {
                Some(stored) => match &stored.data {
                    DataValue::String(s) => RespValue::BulkString(s.clone()),
                    _ => RespValue::Null,
                },
                None => RespValue::Null,
            },
        )
        .collect();
    RespValue::Array(values)
}

pub fn exec_mset(pairs: &[(Bytes, Bytes)], locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> RespValue {
    for (key, value) in pairs {
        put_single(
            locks,
            key.clone(),
            StoredValue::new(DataValue::String(value.clone())),
            db,
            status,
        );
    }
    RespValue::SimpleString("OK".into())
}

pub fn exec_incr_by(
    key: &Bytes,
    delta: i64,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let existing = match get_mut_single(locks, key) {
        Some(stored) => match &stored.data {
            DataValue::String(s) => {
                let text = std::str::from_utf8(s).map_err(|_| CacheError::NotAnInteger)?;
                text.parse::<i64>().map_err(|_| CacheError::NotAnInteger)?
            }
            _ => return Err(CacheError::WrongType),
        },
        None => 0,
    };
    let new_value = existing.checked_add(delta).ok_or(CacheError::Overflow)?;
    let rendered = Bytes::from(new_value.to_string());
    match get_mut_single(locks, key) {
        Some(stored) => {
            stored.data = DataValue::String(rendered);
            stored.size = stored.data.memory_usage();
        }
        None => put_single(locks, key.clone(), StoredValue::new(DataValue::String(rendered)), db, status),
    }
    Ok(RespValue::Integer(new_value))
}

fn put_single(locks: &mut ExecutionLocks<'_>, key: Bytes, value: StoredValue, db: &Db, status: &StatusCollector) {
    let idx = crate::core::storage::db::Db::get_shard_index(&key);
    let guard = match locks {
        ExecutionLocks::Single { guard, .. } => guard,
        ExecutionLocks::Multi { guards } => match guards.get_mut(&idx) {
            Some(guard) => guard,
            None => return,
        },
        _ => return,
    };
    guard.put(key, value);
    super::generic::apply_eviction(db, status, guard);
}

fn get_mut_single<'a>(
    locks: &'a mut ExecutionLocks<'_>,
    key: &Bytes,
) -> Option<&'a mut StoredValue> {
    match locks {
        ExecutionLocks::Single { guard, .. } => guard.get_mut(key),
        ExecutionLocks::Multi { guards } => {
            let idx = crate::core::storage::db::Db::get_shard_index(key);
            guards.get_mut(&idx).and_then(|g| g.get_mut(key))
        }
        _ => None,
    }
}
