// src/core/storage/snapshot.rs

//! Optional point-in-time persistence: a flat, one-line-per-key text dump
//! taken on shutdown and loaded back on startup. Every `DataValue` variant
//! is persisted, tagged with a single-character type code so `load` knows
//! how to rebuild the collection without re-inferring its shape.

use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::Db;
use crate::core::storage::zset::SortedSet;
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Type tags for the `DataValue` variant a snapshot line encodes.
const TAG_STRING: &str = "s";
const TAG_LIST: &str = "l";
const TAG_HASH: &str = "h";
const TAG_SET: &str = "e";
const TAG_ZSET: &str = "z";

/// Hex-encodes `data` into a payload field. Collections join their
/// hex-encoded members with `,` (hashes and sorted sets pair member/field
/// with value/score via `:`); hex's alphabet never produces either
/// delimiter, so no escaping is needed.
fn encode_payload(data: &DataValue) -> (&'static str, String) {
    match data {
        DataValue::String(s) => (TAG_STRING, hex::encode(s)),
        DataValue::List(items) => (
            TAG_LIST,
            items.iter().map(hex::encode).collect::<Vec<_>>().join(","),
        ),
        DataValue::Hash(map) => (
            TAG_HASH,
            map.iter()
                .map(|(f, v)| format!("{}:{}", hex::encode(f), hex::encode(v)))
                .collect::<Vec<_>>()
                .join(","),
        ),
        DataValue::Set(members) => (
            TAG_SET,
            members.iter().map(hex::encode).collect::<Vec<_>>().join(","),
        ),
        DataValue::SortedSet(zset) => (
            TAG_ZSET,
            zset.iter()
                .map(|entry| format!("{}:{}", hex::encode(&entry.member), entry.score))
                .collect::<Vec<_>>()
                .join(","),
        ),
    }
}

fn decode_payload(tag: &str, payload: &str) -> Option<DataValue> {
    let pairs = |payload: &str| -> Option<Vec<(Bytes, Bytes)>> {
        if payload.is_empty() {
            return Some(Vec::new());
        }
        payload
            .split(',')
            .map(|pair| {
                let (a, b) = pair.split_once(':')?;
                Some((Bytes::from(hex::decode(a).ok()?), Bytes::from(hex::decode(b).ok()?)))
            })
            .collect()
    };
    let items = |payload: &str| -> Option<Vec<Bytes>> {
        if payload.is_empty() {
            return Some(Vec::new());
        }
        payload.split(',').map(|h| Some(Bytes::from(hex::decode(h).ok()?))).collect()
    };

    match tag {
        TAG_STRING => Some(DataValue::String(Bytes::from(hex::decode(payload).ok()?))),
        TAG_LIST => Some(DataValue::List(items(payload)?.into_iter().collect::<VecDeque<_>>())),
        TAG_HASH => {
            let mut map = IndexMap::new();
            for (field, value) in pairs(payload)? {
                map.insert(field, value);
            }
            Some(DataValue::Hash(map))
        }
        TAG_SET => Some(DataValue::Set(items(payload)?.into_iter().collect::<HashSet<_>>())),
        TAG_ZSET => {
            let mut zset = SortedSet::new();
            if !payload.is_empty() {
                for pair in payload.split(',') {
                    let (member_hex, score_str) = pair.split_once(':')?;
                    let member = Bytes::from(hex::decode(member_hex).ok()?);
                    let score: f64 = score_str.parse().ok()?;
                    zset.add(score, member);
                }
            }
            Some(DataValue::SortedSet(zset))
        }
        _ => None,
    }
}

/// Writes every live key to `path` as one `tag key payload expiry-epoch-ms`
/// line per entry. A relative TTL is resolved to an absolute epoch
/// timestamp so the snapshot remains meaningful across a restart.
pub async fn save(db: &Db, path: &str) -> std::io::Result<usize> {
    let now_epoch_ms = epoch_ms_now();
    let mut out = String::new();
    let mut count = 0usize;

    for idx in 0..db.shard_count() {
        let shard = db.get_shard(idx);
        let guard = shard.entries.lock().await;
        for (key, value) in guard.iter() {
            if value.is_expired() {
                continue;
            }
            let expiry_ms = value
                .remaining_ttl_ms()
                .map(|remaining| now_epoch_ms + remaining as u64)
                .unwrap_or(0);
            let (tag, payload) = encode_payload(&value.data);
            out.push_str(tag);
            out.push(' ');
            out.push_str(&hex::encode(key));
            out.push(' ');
            out.push_str(&payload);
            out.push(' ');
            out.push_str(&expiry_ms.to_string());
            out.push('\n');
            count += 1;
        }
    }

    tokio::fs::write(path, out).await?;
    info!("wrote {} keys to snapshot {}", count, path);
    Ok(count)
}

/// Loads a snapshot written by `save` into `db`, skipping any entry whose
/// absolute expiry has already passed. A missing file is not an error: it
/// just means the server starts with an empty cache.
pub async fn load(db: &Db, path: &str) -> std::io::Result<usize> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("no snapshot found at {}, starting with an empty cache", path);
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    let now_epoch_ms = epoch_ms_now();
    let mut loaded = 0usize;
    for line in contents.lines() {
        let mut parts = line.splitn(4, ' ');
        let (Some(tag), Some(key_hex), Some(payload), Some(expiry_str)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            warn!("skipping malformed snapshot line");
            continue;
        };
        let Ok(key) = hex::decode(key_hex) else {
            warn!("skipping snapshot line with invalid hex encoding");
            continue;
        };
        let Some(data) = decode_payload(tag, payload) else {
            warn!("skipping snapshot line with invalid payload for tag {}", tag);
            continue;
        };
        let Ok(expiry_ms) = expiry_str.parse::<u64>() else {
            warn!("skipping snapshot line with invalid expiry field");
            continue;
        };

        let expiry = if expiry_ms == 0 {
            None
        } else if expiry_ms <= now_epoch_ms {
            continue;
        } else {
            Some(Instant::now() + Duration::from_millis(expiry_ms - now_epoch_ms))
        };

        let stored = StoredValue::with_ttl(data, expiry);
        db.put(key.into(), stored).await;
        loaded += 1;
    }

    info!("loaded {} keys from snapshot {}", loaded, path);
    Ok(loaded)
}

fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, EvictionPolicy};
    use bytes::Bytes;

    fn test_db() -> Db {
        Db::new(&CacheConfig::default(), EvictionPolicy::NoEviction, None)
    }

    #[tokio::test]
    async fn round_trips_string_keys_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("astra.snapshot");
        let path_str = path.to_str().unwrap();

        let db = test_db();
        db.put(
            Bytes::from_static(b"greeting"),
            StoredValue::new(DataValue::String(Bytes::from_static(b"hello"))),
        )
        .await;

        let saved = save(&db, path_str).await.unwrap();
        assert_eq!(saved, 1);

        let fresh = test_db();
        let loaded = load(&fresh, path_str).await.unwrap();
        assert_eq!(loaded, 1);

        let value = fresh.get(&Bytes::from_static(b"greeting")).await.unwrap();
        assert_eq!(value.data, DataValue::String(Bytes::from_static(b"hello")));
    }

    #[tokio::test]
    async fn round_trips_structured_types_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("astra.snapshot");
        let path_str = path.to_str().unwrap();

        let db = test_db();
        db.put(
            Bytes::from_static(b"mylist"),
            StoredValue::new(DataValue::List(
                [Bytes::from_static(b"a"), Bytes::from_static(b"b")].into(),
            )),
        )
        .await;
        let mut hash = IndexMap::new();
        hash.insert(Bytes::from_static(b"field"), Bytes::from_static(b"value"));
        db.put(Bytes::from_static(b"myhash"), StoredValue::new(DataValue::Hash(hash)))
            .await;
        let mut set = HashSet::new();
        set.insert(Bytes::from_static(b"member"));
        db.put(Bytes::from_static(b"myset"), StoredValue::new(DataValue::Set(set)))
            .await;
        let mut zset = SortedSet::new();
        zset.add(1.5, Bytes::from_static(b"one"));
        zset.add(2.5, Bytes::from_static(b"two"));
        db.put(Bytes::from_static(b"myzset"), StoredValue::new(DataValue::SortedSet(zset)))
            .await;

        let saved = save(&db, path_str).await.unwrap();
        assert_eq!(saved, 4);

        let fresh = test_db();
        let loaded = load(&fresh, path_str).await.unwrap();
        assert_eq!(loaded, 4);

        let list = fresh.get(&Bytes::from_static(b"mylist")).await.unwrap();
        assert_eq!(
            list.data,
            DataValue::List([Bytes::from_static(b"a"), Bytes::from_static(b"b")].into())
        );

        let hash = fresh.get(&Bytes::from_static(b"myhash")).await.unwrap();
        let DataValue::Hash(map) = &hash.data else {
            panic!("expected hash");
        };
        assert_eq!(map.get(&Bytes::from_static(b"field")), Some(&Bytes::from_static(b"value")));

        let set = fresh.get(&Bytes::from_static(b"myset")).await.unwrap();
        let DataValue::Set(members) = &set.data else {
            panic!("expected set");
        };
        assert!(members.contains(&Bytes::from_static(b"member")));

        let zset = fresh.get(&Bytes::from_static(b"myzset")).await.unwrap();
        let DataValue::SortedSet(entries) = &zset.data else {
            panic!("expected zset");
        };
        let scored: Vec<_> = entries.iter().map(|e| (e.member.clone(), e.score)).collect();
        assert_eq!(
            scored,
            vec![(Bytes::from_static(b"one"), 1.5), (Bytes::from_static(b"two"), 2.5)]
        );
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let db = test_db();
        let loaded = load(&db, "/nonexistent/path/astra.snapshot").await.unwrap();
        assert_eq!(loaded, 0);
    }

    #[tokio::test]
    async fn expired_keys_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("astra.snapshot");
        let path_str = path.to_str().unwrap();

        let db = test_db();
        db.put(
            Bytes::from_static(b"stale"),
            StoredValue::with_ttl(
                DataValue::String(Bytes::from_static(b"gone")),
                Some(Instant::now() - Duration::from_secs(1)),
            ),
        )
        .await;

        let saved = save(&db, path_str).await.unwrap();
        assert_eq!(saved, 0);
    }
}
