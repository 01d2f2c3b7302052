// src/core/commands/server_info.rs

//! `INFO` section rendering and `COMMAND` introspection.

use super::CommandFlags;
use crate::core::errors::CacheError;
use crate::core::metrics::StatusCollector;
use crate::core::protocol::RespValue;
use crate::core::storage::db::Db;
use bytes::Bytes;
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum CommandSubcommand {
    List,
    Count,
    Docs,
}

pub fn parse_command(args: &[Bytes]) -> Result<CommandSubcommand, CacheError> {
    match args.first() {
        None => Ok(CommandSubcommand::List),
        Some(sub) => {
            let sub = super::helpers::parse_utf8(sub)?.to_ascii_uppercase();
            match sub.as_str() {
                "COUNT" => Ok(CommandSubcommand::Count),
                "DOCS" => Ok(CommandSubcommand::Docs),
                other => Err(CacheError::UnknownCommand(format!("command {}", other.to_ascii_lowercase()))),
            }
        }
    }
}

/// Every command name this server answers to, with its minimum arity and
/// flags, used to back `COMMAND`/`COMMAND COUNT`/`COMMAND DOCS`.
const COMMAND_TABLE: &[(&str, i64, CommandFlags)] = &[
    ("ping", -1, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("echo", 2, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("get", 2, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("set", -3, CommandFlags::WRITE),
    ("del", -2, CommandFlags::WRITE),
    ("exists", -2, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("keys", 2, CommandFlags::READONLY),
    ("ttl", 2, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("incr", 2, CommandFlags::WRITE.union(CommandFlags::FAST)),
    ("decr", 2, CommandFlags::WRITE.union(CommandFlags::FAST)),
    ("incrby", 3, CommandFlags::WRITE.union(CommandFlags::FAST)),
    ("decrby", 3, CommandFlags::WRITE.union(CommandFlags::FAST)),
    ("mget", -2, CommandFlags::READONLY),
    ("mset", -3, CommandFlags::WRITE),
    ("hset", -4, CommandFlags::WRITE),
    ("hget", 3, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("hgetall", 2, CommandFlags::READONLY),
    ("hdel", -3, CommandFlags::WRITE),
    ("hlen", 2, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("hexists", 3, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("hkeys", 2, CommandFlags::READONLY),
    ("hvals", 2, CommandFlags::READONLY),
    ("lpush", -3, CommandFlags::WRITE),
    ("rpush", -3, CommandFlags::WRITE),
    ("lpop", -2, CommandFlags::WRITE),
    ("rpop", -2, CommandFlags::WRITE),
    ("llen", 2, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("lrange", 4, CommandFlags::READONLY),
    ("lindex", 3, CommandFlags::READONLY),
    ("sadd", -3, CommandFlags::WRITE),
    ("srem", -3, CommandFlags::WRITE),
    ("scard", 2, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("smembers", 2, CommandFlags::READONLY),
    ("sismember", 3, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("spop", -2, CommandFlags::WRITE),
    ("zadd", -4, CommandFlags::WRITE),
    ("zrem", -3, CommandFlags::WRITE),
    ("zcard", 2, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("zrange", -4, CommandFlags::READONLY),
    ("zrangebyscore", -4, CommandFlags::READONLY),
    ("zscore", 3, CommandFlags::READONLY.union(CommandFlags::FAST)),
    ("subscribe", -2, CommandFlags::PUBSUB),
    ("unsubscribe", -1, CommandFlags::PUBSUB),
    ("psubscribe", -2, CommandFlags::PUBSUB),
    ("punsubscribe", -1, CommandFlags::PUBSUB),
    ("publish", 3, CommandFlags::PUBSUB.union(CommandFlags::FAST)),
    ("pubsub", -2, CommandFlags::PUBSUB.union(CommandFlags::FAST)),
    ("eval", -3, CommandFlags::SCRIPTING.union(CommandFlags::MOVABLEKEYS)),
    ("evalsha", -3, CommandFlags::SCRIPTING.union(CommandFlags::MOVABLEKEYS)),
    ("info", -1, CommandFlags::READONLY),
    ("command", -1, CommandFlags::READONLY),
    ("cluster", -2, CommandFlags::ADMIN),
    ("client", -2, CommandFlags::ADMIN),
];

fn flag_names(flags: CommandFlags) -> Vec<RespValue> {
    let mut out = Vec::new();
    if flags.contains(CommandFlags::WRITE) {
        out.push(RespValue::SimpleString("write".into()));
    }
    if flags.contains(CommandFlags::READONLY) {
        out.push(RespValue::SimpleString("readonly".into()));
    }
    if flags.contains(CommandFlags::ADMIN) {
        out.push(RespValue::SimpleString("admin".into()));
    }
    if flags.contains(CommandFlags::PUBSUB) {
        out.push(RespValue::SimpleString("pubsub".into()));
    }
    if flags.contains(CommandFlags::SCRIPTING) {
        out.push(RespValue::SimpleString("scripting".into()));
    }
    if flags.contains(CommandFlags::MOVABLEKEYS) {
        out.push(RespValue::SimpleString("movablekeys".into()));
    }
    if flags.contains(CommandFlags::FAST) {
        out.push(RespValue::SimpleString("fast".into()));
    }
    out
}

pub fn exec_command(sub: &CommandSubcommand) -> RespValue {
    match sub {
        CommandSubcommand::Count => RespValue::Integer(COMMAND_TABLE.len() as i64),
        CommandSubcommand::List => RespValue::Array(
            COMMAND_TABLE
                .iter()
                .map(|(name, arity, flags)| {
                    RespValue::Array(vec![
                        RespValue::BulkString(Bytes::from_static(name.as_bytes())),
                        RespValue::Integer(*arity),
                        RespValue::Array(flag_names(*flags)),
                    ])
                })
                .collect(),
        ),
        CommandSubcommand::Docs => RespValue::Array(
            COMMAND_TABLE
                .iter()
                .flat_map(|(name, arity, _)| {
                    vec![
                        RespValue::BulkString(Bytes::from_static(name.as_bytes())),
                        RespValue::Array(vec![
                            RespValue::BulkString(Bytes::from_static(b"summary")),
                            RespValue::BulkString(Bytes::from_static(name.as_bytes())),
                            RespValue::BulkString(Bytes::from_static(b"arity")),
                            RespValue::Integer(*arity),
                        ]),
                    ]
                })
                .collect(),
        ),
    }
}

/// Renders the sections `INFO` knows about. `section` restricts output to a
/// single section name (case-insensitive), matching the real `INFO`'s
/// `INFO <section>` form; `None` renders everything.
pub fn exec_info(
    section: Option<&Bytes>,
    start_time: Instant,
    db: &Db,
    status: &StatusCollector,
    cluster_enabled: bool,
) -> Result<RespValue, CacheError> {
    let wanted = section
        .map(|s| super::helpers::parse_utf8(s).map(|s| s.to_ascii_lowercase()))
        .transpose()?;
    let want = |name: &str| wanted.as_deref().is_none_or(|w| w == name);

    let mut out = String::new();

    if want("server") {
        out.push_str("# Server\r\n");
        out.push_str("astra_cache_version:1.0.0\r\n");
        out.push_str(&format!("uptime_in_seconds:{}\r\n", start_time.elapsed().as_secs()));
        out.push_str("run_id:astra\r\n");
        out.push_str("\r\n");
    }
    if want("clients") {
        out.push_str("# Clients\r\n");
        out.push_str(&format!("connected_clients:{}\r\n", status.connected_clients()));
        out.push_str(&format!(
            "connected_clients_peak:{}\r\n",
            status.connected_clients_peak()
        ));
        out.push_str("\r\n");
    }
    if want("memory") {
        out.push_str("# Memory\r\n");
        out.push_str(&format!("used_memory:{}\r\n", db.get_current_memory()));
        out.push_str(&format!(
            "os_used_memory:{}\r\n",
            status.os_used_memory_bytes.load(std::sync::atomic::Ordering::Relaxed)
        ));
        out.push_str("\r\n");
    }
    if want("stats") {
        out.push_str("# Stats\r\n");
        out.push_str(&format!(
            "total_connections_received:{}\r\n",
            status.connections_received_total.load(std::sync::atomic::Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "total_commands_processed:{}\r\n",
            status.commands_processed_total.load(std::sync::atomic::Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "expired_keys:{}\r\n",
            status.expired_keys_total.load(std::sync::atomic::Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "evicted_keys:{}\r\n",
            status.evicted_keys_total.load(std::sync::atomic::Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "keyspace_hits:{}\r\n",
            status.keyspace_hits.load(std::sync::atomic::Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "keyspace_misses:{}\r\n",
            status.keyspace_misses.load(std::sync::atomic::Ordering::Relaxed)
        ));
        out.push_str("\r\n");
    }
    if want("keyspace") {
        out.push_str("# Keyspace\r\n");
        out.push_str(&format!("db0:keys={}\r\n", db.get_key_count()));
        out.push_str("\r\n");
    }
    if want("cluster") {
        out.push_str("# Cluster\r\n");
        out.push_str(&format!("cluster_enabled:{}\r\n", if cluster_enabled { 1 } else { 0 }));
        out.push_str("\r\n");
    }

    Ok(RespValue::BulkString(Bytes::from(out)))
}
