// src/core/commands/list.rs

//! List-valued key commands: LPUSH, RPUSH, LPOP, RPOP, LLEN, LRANGE, LINDEX.

use crate::core::errors::CacheError;
use crate::core::metrics::StatusCollector;
use crate::core::protocol::RespValue;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::{Db, ExecutionLocks, PopDirection, PushDirection};
use bytes::Bytes;
use std::collections::VecDeque;

pub fn parse_pop(args: &[Bytes], name: &str) -> Result<(Bytes, Option<usize>), CacheError> {
    super::helpers::require_arity(args, 1, name)?;
    let count = args.get(1).map(super::helpers::parse_usize).transpose()?;
    Ok((args[0].clone(), count))
}

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

pub fn exec_push(
    key: &Bytes,
    values: &[Bytes],
    direction: PushDirection,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let guard = shard_guard(locks, key)?;
    let mut created = false;
    let len = match guard.get_mut(key) {
        Some(stored) => {
            let DataValue::List(list) = &mut stored.data else {
                return Err(CacheError::WrongType);
            };
            for value in values {
                match direction {
                    PushDirection::Left => list.push_front(value.clone()),
                    PushDirection::Right => list.push_back(value.clone()),
                }
            }
            let len = list.len();
            stored.size = stored.data.memory_usage();
            len
        }
        None => {
            let mut list = VecDeque::new();
            for value in values {
                match direction {
                    PushDirection::Left => list.push_front(value.clone()),
                    PushDirection::Right => list.push_back(value.clone()),
                }
            }
            let len = list.len();
            guard.put(key.clone(), StoredValue::new(DataValue::List(list)));
            created = true;
            len
        }
    };
    if created {
        super::generic::apply_eviction(db, status, guard);
    }
    Ok(RespValue::Integer(len as i64))
}

pub fn exec_pop(
    key: &Bytes,
    count: Option<usize>,
    direction: PopDirection,
    locks: &mut ExecutionLocks<'_>,
) -> Result<RespValue, CacheError> {
    let guard = shard_guard(locks, key)?;
    let Some(stored) = guard.get_mut(key) else {
        return Ok(match count {
            Some(_) => RespValue::NullArray,
            None => RespValue::Null,
        });
    };
    let DataValue::List(list) = &mut stored.data else {
        return Err(CacheError::WrongType);
    };
    let n = count.unwrap_or(1).min(list.len());
    let mut popped = Vec::with_capacity(n);
    for _ in 0..n {
        let item = match direction {
            PopDirection::Left => list.pop_front(),
            PopDirection::Right => list.pop_back(),
        };
        match item {
            Some(v) => popped.push(v),
            None => break,
        }
    }
    let now_empty = list.is_empty();
    stored.size = stored.data.memory_usage();
    if now_empty {
        guard.remove(key);
    }
    Ok(match count {
        Some(_) => RespValue::Array(popped.into_iter().map(RespValue::BulkString).collect()),
        None => popped
            .into_iter()
            .next()
            .map(RespValue::BulkString)
            .unwrap_or(RespValue::Null),
    })
}

fn with_list<'a>(
    locks: &'a mut ExecutionLocks<'_>,
    key: &Bytes,
    db: &Db,
    status: &StatusCollector,
) -> Result<Option<&'a VecDeque<Bytes>>, CacheError> {
    match super::generic::get_live(locks, key, db.lfu_decay_minutes, status) {
        None => Ok(None),
        Some(stored) => match &stored.data {
            DataValue::List(l) => Ok(Some(l)),
            _ => Err(CacheError::WrongType),
        },
    }
}

pub fn exec_llen(key: &Bytes, locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> Result<RespValue, CacheError> {
    Ok(RespValue::Integer(with_list(locks, key, db, status)?.map(|l| l.len()).unwrap_or(0) as i64))
}

/// Clamps a Redis-style possibly-negative index pair into a valid `[start, stop]`
/// range over a sequence of length `len`, or `None` if the range is empty.
fn clamp_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (len + start).max(0) } else { start.min(len - 1).max(0) };
    let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

pub fn exec_lrange(
    key: &Bytes,
    start: i64,
    stop: i64,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let Some(list) = with_list(locks, key, db, status)? else {
        return Ok(RespValue::Array(vec![]));
    };
    let Some((s, e)) = clamp_range(start, stop, list.len()) else {
        return Ok(RespValue::Array(vec![]));
    };
    let values = list
        .iter()
        .skip(s)
        .take(e - s + 1)
        .cloned()
        .map(RespValue::BulkString)
        .collect();
    Ok(RespValue::Array(values))
}

pub fn exec_lindex(
    key: &Bytes,
    index: i64,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let Some(list) = with_list(locks, key, db, status)? else {
        return Ok(RespValue::Null);
    };
    let len = list.len() as i64;
    let real_index = if index < 0 { len + index } else { index };
    if real_index < 0 || real_index >= len {
        return Ok(RespValue::Null);
    }
    Ok(list
        .get(real_index as usize)
        .cloned()
        .map(RespValue::BulkString)
        .unwrap_or(RespValue::Null))
}
