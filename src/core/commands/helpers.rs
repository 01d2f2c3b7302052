// src/core/commands/helpers.rs

//! Small argument-parsing helpers shared by every command category module.

use crate::core::errors::CacheError;
use bytes::Bytes;

pub fn parse_utf8(bytes: &Bytes) -> Result<&str, CacheError> {
    std::str::from_utf8(bytes).map_err(|_| CacheError::Protocol("invalid utf-8".into()))
}

pub fn parse_i64(bytes: &Bytes) -> Result<i64, CacheError> {
    parse_utf8(bytes)?.parse::<i64>().map_err(|_| CacheError::NotAnInteger)
}

pub fn parse_usize(bytes: &Bytes) -> Result<usize, CacheError> {
    parse_utf8(bytes)?.parse::<usize>().map_err(|_| CacheError::NotAnInteger)
}

pub fn parse_f64(bytes: &Bytes) -> Result<f64, CacheError> {
    let s = parse_utf8(bytes)?;
    match s {
        "+inf" | "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        _ => s.parse::<f64>().map_err(|_| CacheError::NotAFloat),
    }
}

/// Parses a `ZRANGEBYSCORE`-style score boundary: `(` prefix means exclusive,
/// `+inf`/`-inf` are the unbounded ends.
pub fn parse_score_boundary(
    bytes: &Bytes,
) -> Result<crate::core::storage::zset::ScoreBoundary, CacheError> {
    use crate::core::storage::zset::ScoreBoundary;
    let s = parse_utf8(bytes)?;
    if let Some(rest) = s.strip_prefix('(') {
        match rest {
            "+inf" => Ok(ScoreBoundary::PosInfinity),
            "-inf" => Ok(ScoreBoundary::NegInfinity),
            _ => Ok(ScoreBoundary::Exclusive(
                rest.parse::<f64>().map_err(|_| CacheError::NotAFloat)?,
            )),
        }
    } else {
        match s {
            "+inf" => Ok(ScoreBoundary::PosInfinity),
            "-inf" => Ok(ScoreBoundary::NegInfinity),
            _ => Ok(ScoreBoundary::Inclusive(
                s.parse::<f64>().map_err(|_| CacheError::NotAFloat)?,
            )),
        }
    }
}

pub fn require_arity(args: &[Bytes], min: usize, name: &str) -> Result<(), CacheError> {
    if args.len() < min {
        return Err(CacheError::WrongArgumentCount(name.to_string()));
    }
    Ok(())
}
