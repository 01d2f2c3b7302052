// src/core/commands/zset.rs

//! Sorted-set commands: ZADD, ZREM, ZCARD, ZRANGE, ZRANGEBYSCORE, ZSCORE.

use super::Command;
use crate::core::errors::CacheError;
use crate::core::metrics::StatusCollector;
use crate::core::protocol::RespValue;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::{Db, ExecutionLocks};
use crate::core::storage::zset::{ScoreBoundary, SortedSet};
use bytes::Bytes;

pub fn parse_zadd(args: &[Bytes]) -> Result<Command, CacheError> {
    super::helpers::require_arity(args, 3, "ZADD")?;
    let rest = &args[1..];
    if rest.len() % 2 != 0 {
        return Err(CacheError::WrongArgumentCount("ZADD".into()));
    }
    let mut pairs = Vec::with_capacity(rest.len() / 2);
    for pair in rest.chunks_exact(2) {
        let score = super::helpers::parse_f64(&pair[0])?;
        pairs.push((score, pair[1].clone()));
    }
    Ok(Command::ZAdd { key: args[0].clone(), pairs })
}

pub fn parse_zrange(args: &[Bytes]) -> Result<Command, CacheError> {
    super::helpers::require_arity(args, 3, "ZRANGE")?;
    let start = super::helpers::parse_i64(&args[1])?;
    let stop = super::helpers::parse_i64(&args[2])?;
    let with_scores = args
        .get(3)
        .map(|b| super::helpers::parse_utf8(b))
        .transpose()?
        .is_some_and(|s| s.eq_ignore_ascii_case("WITHSCORES"));
    Ok(Command::ZRange { key: args[0].clone(), start, stop, with_scores })
}

pub fn parse_zrangebyscore(args: &[Bytes]) -> Result<Command, CacheError> {
    super::helpers::require_arity(args, 3, "ZRANGEBYSCORE")?;
    let min = super::helpers::parse_score_boundary(&args[1])?;
    let max = super::helpers::parse_score_boundary(&args[2])?;
    let with_scores = args
        .get(3)
        .map(|b| super::helpers::parse_utf8(b))
        .transpose()?
        .is_some_and(|s| s.eq_ignore_ascii_case("WITHSCORES"));
    Ok(Command::ZRangeByScore { key: args[0].clone(), min, max, with_scores })
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

fn with_zset<'a>(
    locks: &'a mut ExecutionLocks<'_>,
    key: &Bytes,
    db: &Db,
    status: &StatusCollector,
) -> Result<Option<&'a SortedSet>, CacheError> {
    match super::generic::get_live(locks, key, db.lfu_decay_minutes, status) {
        None => Ok(None),
        Some(stored) => match &stored.data {
            DataValue::SortedSet(z) => Ok(Some(z)),
            _ => Err(CacheError::WrongType),
        },
    }
}

pub fn exec_zadd(
    key: &Bytes,
    pairs: &[(f64, Bytes)],
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let guard = shard_guard(locks, key)?;
    let mut added = 0i64;
    let mut created = false;
    match guard.get_mut(key) {
        Some(stored) => {
            let DataValue::SortedSet(zset) = &mut stored.data else {
                return Err(CacheError::WrongType);
            };
            for (score, member) in pairs {
                let is_new = !zset.contains_member(member);
                zset.add(*score, member.clone());
                if is_new {
                    added += 1;
                }
            }
            stored.size = stored.data.memory_usage();
        }
        None => {
            let mut zset = SortedSet::new();
            for (score, member) in pairs {
                zset.add(*score, member.clone());
                added += 1;
            }
            guard.put(key.clone(), StoredValue::new(DataValue::SortedSet(zset)));
            created = true;
        }
    }
    if created {
        super::generic::apply_eviction(db, status, guard);
    }
    Ok(RespValue::Integer(added))
}

pub fn exec_zrem(key: &Bytes, members: &[Bytes], locks: &mut ExecutionLocks<'_>) -> Result<RespValue, CacheError> {
    let guard = shard_guard(locks, key)?;
    let Some(stored) = guard.get_mut(key) else {
        return Ok(RespValue::Integer(0));
    };
    let DataValue::SortedSet(zset) = &mut stored.data else {
        return Err(CacheError::WrongType);
    };
    let mut removed = 0i64;
    for member in members {
        if zset.remove(member) {
            removed += 1;
        }
    }
    let now_empty = zset.is_empty();
    stored.size = stored.data.memory_usage();
    if now_empty {
        guard.remove(key);
    }
    Ok(RespValue::Integer(removed))
}

pub fn exec_zcard(key: &Bytes, locks: &mut ExecutionLocks<'_>, db: &Db, status: &StatusCollector) -> Result<RespValue, CacheError> {
    Ok(RespValue::Integer(with_zset(locks, key, db, status)?.map(|z| z.len()).unwrap_or(0) as i64))
}

fn render_entries(entries: Vec<crate::core::storage::zset::ZSetEntry>, with_scores: bool) -> RespValue {
    let mut out = Vec::with_capacity(entries.len() * if with_scores { 2 } else { 1 });
    for entry in entries {
        out.push(RespValue::BulkString(entry.member));
        if with_scores {
            out.push(RespValue::BulkString(Bytes::from(format_score(entry.score))));
        }
    }
    RespValue::Array(out)
}

fn format_score(score: f64) -> String {
    let mut buf = ryu::Buffer::new();
    if score.fract() == 0.0 && score.is_finite() {
        format!("{}", score as i64)
    } else {
        buf.format(score).to_string()
    }
}

pub fn exec_zrange(
    key: &Bytes,
    start: i64,
    stop: i64,
    with_scores: bool,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let Some(zset) = with_zset(locks, key, db, status)? else {
        return Ok(RespValue::Array(vec![]));
    };
    Ok(render_entries(zset.get_range(start, stop), with_scores))
}

pub fn exec_zrangebyscore(
    key: &Bytes,
    min: &ScoreBoundary,
    max: &ScoreBoundary,
    with_scores: bool,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    let Some(zset) = with_zset(locks, key, db, status)? else {
        return Ok(RespValue::Array(vec![]));
    };
    Ok(render_entries(zset.get_range_by_score(min.clone(), max.clone()), with_scores))
}

pub fn exec_zscore(
    key: &Bytes,
    member: &Bytes,
    locks: &mut ExecutionLocks<'_>,
    db: &Db,
    status: &StatusCollector,
) -> Result<RespValue, CacheError> {
    match with_zset(locks, key, db, status)?.and_then(|z| z.get_score(member)) {
        Some(score) => Ok(RespValue::BulkString(Bytes::from(format_score(score)))),
        None => Ok(RespValue::Null),
    }
}
