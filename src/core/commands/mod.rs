// src/core/commands/mod.rs

//! Parses RESP argument vectors into a `Command`, the typed representation
//! the rest of the server dispatches on. Each command category (strings,
//! hashes, lists, sets, sorted sets, pub/sub, scripting, cluster, server
//! introspection) has its own module holding the execution logic; this file
//! only holds the enum, parsing, and the metadata (`CommandFlags`, key
//! positions) the router and `COMMAND` introspection need.

use crate::core::errors::CacheError;
use bitflags::bitflags;
use bytes::Bytes;

pub mod client;
pub mod cluster;
pub mod generic;
pub mod hash;
pub mod helpers;
pub mod list;
pub mod pubsub;
pub mod scripting;
pub mod server_info;
pub mod set;
pub mod string;
pub mod zset;

use helpers::{parse_f64, parse_i64, parse_usize};

bitflags! {
    /// Properties the router and `COMMAND` introspection care about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u32 {
        const WRITE      = 1 << 0;
        const READONLY   = 1 << 1;
        const ADMIN      = 1 << 2;
        const PUBSUB     = 1 << 3;
        const SCRIPTING  = 1 << 4;
        const MOVABLEKEYS = 1 << 5;
        const FAST       = 1 << 6;
    }
}

#[derive(Debug, Clone)]
pub struct SetArgs {
    pub key: Bytes,
    pub value: Bytes,
    pub ex_seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum Command {
    Ping { message: Option<Bytes> },
    Echo { message: Bytes },
    Get { key: Bytes },
    Set(SetArgs),
    Del { keys: Vec<Bytes> },
    Exists { keys: Vec<Bytes> },
    Keys { pattern: Bytes },
    Ttl { key: Bytes },
    Incr { key: Bytes },
    Decr { key: Bytes },
    IncrBy { key: Bytes, delta: i64 },
    DecrBy { key: Bytes, delta: i64 },
    MGet { keys: Vec<Bytes> },
    MSet { pairs: Vec<(Bytes, Bytes)> },

    HSet { key: Bytes, pairs: Vec<(Bytes, Bytes)> },
    HGet { key: Bytes, field: Bytes },
    HGetAll { key: Bytes },
    HDel { key: Bytes, fields: Vec<Bytes> },
    HLen { key: Bytes },
    HExists { key: Bytes, field: Bytes },
    HKeys { key: Bytes },
    HVals { key: Bytes },

    LPush { key: Bytes, values: Vec<Bytes> },
    RPush { key: Bytes, values: Vec<Bytes> },
    LPop { key: Bytes, count: Option<usize> },
    RPop { key: Bytes, count: Option<usize> },
    LLen { key: Bytes },
    LRange { key: Bytes, start: i64, stop: i64 },
    LIndex { key: Bytes, index: i64 },

    SAdd { key: Bytes, members: Vec<Bytes> },
    SRem { key: Bytes, members: Vec<Bytes> },
    SCard { key: Bytes },
    SMembers { key: Bytes },
    SIsMember { key: Bytes, member: Bytes },
    SPop { key: Bytes, count: Option<usize> },

    ZAdd { key: Bytes, pairs: Vec<(f64, Bytes)> },
    ZRem { key: Bytes, members: Vec<Bytes> },
    ZCard { key: Bytes },
    ZRange { key: Bytes, start: i64, stop: i64, with_scores: bool },
    ZRangeByScore {
        key: Bytes,
        min: crate::core::storage::zset::ScoreBoundary,
        max: crate::core::storage::zset::ScoreBoundary,
        with_scores: bool,
    },
    ZScore { key: Bytes, member: Bytes },

    Subscribe { channels: Vec<Bytes> },
    Unsubscribe { channels: Vec<Bytes> },
    PSubscribe { patterns: Vec<Bytes> },
    PUnsubscribe { patterns: Vec<Bytes> },
    Publish { channel: Bytes, message: Bytes },
    PubSub(pubsub::PubSubSubcommand),

    Eval { script: Bytes, keys: Vec<Bytes>, args: Vec<Bytes> },
    EvalSha { sha1: String, keys: Vec<Bytes>, args: Vec<Bytes> },

    Info { section: Option<Bytes> },
    Command(server_info::CommandSubcommand),
    Cluster(cluster::ClusterSubcommand),
    Client(client::ClientSubcommand),
}

impl Command {
    /// Parses a full argv (command name at index 0) into a `Command`.
    pub fn parse(argv: Vec<Bytes>) -> Result<Self, CacheError> {
        let Some((name, args)) = argv.split_first() else {
            return Err(CacheError::Protocol("empty command".into()));
        };
        let name_upper = helpers::parse_utf8(name)?.to_ascii_uppercase();
        let args: Vec<Bytes> = args.to_vec();

        match name_upper.as_str() {
            "PING" => Ok(Command::Ping {
                message: args.first().cloned(),
            }),
            "ECHO" => {
                helpers::require_arity(&args, 1, "ECHO")?;
                Ok(Command::Echo { message: args[0].clone() })
            }
            "GET" => {
                helpers::require_arity(&args, 1, "GET")?;
                Ok(Command::Get { key: args[0].clone() })
            }
            "SET" => string::parse_set(&args),
            "DEL" => {
                helpers::require_arity(&args, 1, "DEL")?;
                Ok(Command::Del { keys: args })
            }
            "EXISTS" => {
                helpers::require_arity(&args, 1, "EXISTS")?;
                Ok(Command::Exists { keys: args })
            }
            "KEYS" => {
                helpers::require_arity(&args, 1, "KEYS")?;
                Ok(Command::Keys { pattern: args[0].clone() })
            }
            "TTL" => {
                helpers::require_arity(&args, 1, "TTL")?;
                Ok(Command::Ttl { key: args[0].clone() })
            }
            "INCR" => {
                helpers::require_arity(&args, 1, "INCR")?;
                Ok(Command::Incr { key: args[0].clone() })
            }
            "DECR" => {
                helpers::require_arity(&args, 1, "DECR")?;
                Ok(Command::Decr { key: args[0].clone() })
            }
            "INCRBY" => {
                helpers::require_arity(&args, 2, "INCRBY")?;
                Ok(Command::IncrBy { key: args[0].clone(), delta: parse_i64(&args[1])? })
            }
            "DECRBY" => {
                helpers::require_arity(&args, 2, "DECRBY")?;
                Ok(Command::DecrBy { key: args[0].clone(), delta: parse_i64(&args[1])? })
            }
            "MGET" => {
                helpers::require_arity(&args, 1, "MGET")?;
                Ok(Command::MGet { keys: args })
            }
            "MSET" => string::parse_mset(&args),

            "HSET" => hash::parse_hset(&args),
            "HGET" => {
                helpers::require_arity(&args, 2, "HGET")?;
                Ok(Command::HGet { key: args[0].clone(), field: args[1].clone() })
            }
            "HGETALL" => {
                helpers::require_arity(&args, 1, "HGETALL")?;
                Ok(Command::HGetAll { key: args[0].clone() })
            }
            "HDEL" => {
                helpers::require_arity(&args, 2, "HDEL")?;
                Ok(Command::HDel { key: args[0].clone(), fields: args[1..].to_vec() })
            }
            "HLEN" => {
                helpers::require_arity(&args, 1, "HLEN")?;
                Ok(Command::HLen { key: args[0].clone() })
            }
            "HEXISTS" => {
                helpers::require_arity(&args, 2, "HEXISTS")?;
                Ok(Command::HExists { key: args[0].clone(), field: args[1].clone() })
            }
            "HKEYS" => {
                helpers::require_arity(&args, 1, "HKEYS")?;
                Ok(Command::HKeys { key: args[0].clone() })
            }
            "HVALS" => {
                helpers::require_arity(&args, 1, "HVALS")?;
                Ok(Command::HVals { key: args[0].clone() })
            }

            "LPUSH" => {
                helpers::require_arity(&args, 2, "LPUSH")?;
                Ok(Command::LPush { key: args[0].clone(), values: args[1..].to_vec() })
            }
            "RPUSH" => {
                helpers::require_arity(&args, 2, "RPUSH")?;
                Ok(Command::RPush { key: args[0].clone(), values: args[1..].to_vec() })
            }
            "LPOP" => list::parse_pop(&args, "LPOP").map(|(key, count)| Command::LPop { key, count }),
            "RPOP" => list::parse_pop(&args, "RPOP").map(|(key, count)| Command::RPop { key, count }),
            "LLEN" => {
                helpers::require_arity(&args, 1, "LLEN")?;
                Ok(Command::LLen { key: args[0].clone() })
            }
            "LRANGE" => {
                helpers::require_arity(&args, 3, "LRANGE")?;
                Ok(Command::LRange {
                    key: args[0].clone(),
                    start: parse_i64(&args[1])?,
                    stop: parse_i64(&args[2])?,
                })
            }
            "LINDEX" => {
                helpers::require_arity(&args, 2, "LINDEX")?;
                Ok(Command::LIndex { key: args[0].clone(), index: parse_i64(&args[1])? })
            }

            "SADD" => {
                helpers::require_arity(&args, 2, "SADD")?;
                Ok(Command::SAdd { key: args[0].clone(), members: args[1..].to_vec() })
            }
            "SREM" => {
                helpers::require_arity(&args, 2, "SREM")?;
                Ok(Command::SRem { key: args[0].clone(), members: args[1..].to_vec() })
            }
            "SCARD" => {
                helpers::require_arity(&args, 1, "SCARD")?;
                Ok(Command::SCard { key: args[0].clone() })
            }
            "SMEMBERS" => {
                helpers::require_arity(&args, 1, "SMEMBERS")?;
                Ok(Command::SMembers { key: args[0].clone() })
            }
            "SISMEMBER" => {
                helpers::require_arity(&args, 2, "SISMEMBER")?;
                Ok(Command::SIsMember { key: args[0].clone(), member: args[1].clone() })
            }
            "SPOP" => {
                helpers::require_arity(&args, 1, "SPOP")?;
                let count = args.get(1).map(parse_usize).transpose()?;
                Ok(Command::SPop { key: args[0].clone(), count })
            }

            "ZADD" => zset::parse_zadd(&args),
            "ZREM" => {
                helpers::require_arity(&args, 2, "ZREM")?;
                Ok(Command::ZRem { key: args[0].clone(), members: args[1..].to_vec() })
            }
            "ZCARD" => {
                helpers::require_arity(&args, 1, "ZCARD")?;
                Ok(Command::ZCard { key: args[0].clone() })
            }
            "ZRANGE" => zset::parse_zrange(&args),
            "ZRANGEBYSCORE" => zset::parse_zrangebyscore(&args),
            "ZSCORE" => {
                helpers::require_arity(&args, 2, "ZSCORE")?;
                Ok(Command::ZScore { key: args[0].clone(), member: args[1].clone() })
            }

            "SUBSCRIBE" => {
                helpers::require_arity(&args, 1, "SUBSCRIBE")?;
                Ok(Command::Subscribe { channels: args })
            }
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe { channels: args }),
            "PSUBSCRIBE" => {
                helpers::require_arity(&args, 1, "PSUBSCRIBE")?;
                Ok(Command::PSubscribe { patterns: args })
            }
            "PUNSUBSCRIBE" => Ok(Command::PUnsubscribe { patterns: args }),
            "PUBLISH" => {
                helpers::require_arity(&args, 2, "PUBLISH")?;
                Ok(Command::Publish { channel: args[0].clone(), message: args[1].clone() })
            }
            "PUBSUB" => pubsub::parse_pubsub(&args).map(Command::PubSub),

            "EVAL" => scripting::parse_eval(&args, false),
            "EVALSHA" => scripting::parse_eval(&args, true),

            "INFO" => Ok(Command::Info { section: args.first().cloned() }),
            "COMMAND" => server_info::parse_command(&args).map(Command::Command),
            "CLUSTER" => cluster::parse_cluster(&args).map(Command::Cluster),
            "CLIENT" => client::parse_client(&args).map(Command::Client),

            other => Err(CacheError::UnknownCommand(other.to_ascii_lowercase())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping { .. } => "ping",
            Command::Echo { .. } => "echo",
            Command::Get { .. } => "get",
            Command::Set(_) => "set",
            Command::Del { .. } => "del",
            Command::Exists { .. } => "exists",
            Command::Keys { .. } => "keys",
            Command::Ttl { .. } => "ttl",
            Command::Incr { .. } => "incr",
            Command::Decr { .. } => "decr",
            Command::IncrBy { .. } => "incrby",
            Command::DecrBy { .. } => "decrby",
            Command::MGet { .. } => "mget",
            Command::MSet { .. } => "mset",
            Command::HSet { .. } => "hset",
            Command::HGet { .. } => "hget",
            Command::HGetAll { .. } => "hgetall",
            Command::HDel { .. } => "hdel",
            Command::HLen { .. } => "hlen",
            Command::HExists { .. } => "hexists",
            Command::HKeys { .. } => "hkeys",
            Command::HVals { .. } => "hvals",
            Command::LPush { .. } => "lpush",
            Command::RPush { .. } => "rpush",
            Command::LPop { .. } => "lpop",
            Command::RPop { .. } => "rpop",
            Command::LLen { .. } => "llen",
            Command::LRange { .. } => "lrange",
            Command::LIndex { .. } => "lindex",
            Command::SAdd { .. } => "sadd",
            Command::SRem { .. } => "srem",
            Command::SCard { .. } => "scard",
            Command::SMembers { .. } => "smembers",
            Command::SIsMember { .. } => "sismember",
            Command::SPop { .. } => "spop",
            Command::ZAdd { .. } => "zadd",
            Command::ZRem { .. } => "zrem",
            Command::ZCard { .. } => "zcard",
            Command::ZRange { .. } => "zrange",
            Command::ZRangeByScore { .. } => "zrangebyscore",
            Command::ZScore { .. } => "zscore",
            Command::Subscribe { .. } => "subscribe",
            Command::Unsubscribe { .. } => "unsubscribe",
            Command::PSubscribe { .. } => "psubscribe",
            Command::PUnsubscribe { .. } => "punsubscribe",
            Command::Publish { .. } => "publish",
            Command::PubSub(_) => "pubsub",
            Command::Eval { .. } => "eval",
            Command::EvalSha { .. } => "evalsha",
            Command::Info { .. } => "info",
            Command::Command(_) => "command",
            Command::Cluster(_) => "cluster",
            Command::Client(_) => "client",
        }
    }

    pub fn flags(&self) -> CommandFlags {
        use CommandFlags as F;
        match self {
            Command::Ping { .. } | Command::Echo { .. } => F::READONLY | F::FAST,
            Command::Get { .. }
            | Command::MGet { .. }
            | Command::Exists { .. }
            | Command::Keys { .. }
            | Command::Ttl { .. }
            | Command::HGet { .. }
            | Command::HGetAll { .. }
            | Command::HLen { .. }
            | Command::HExists { .. }
            | Command::HKeys { .. }
            | Command::HVals { .. }
            | Command::LLen { .. }
            | Command::LRange { .. }
            | Command::LIndex { .. }
            | Command::SCard { .. }
            | Command::SMembers { .. }
            | Command::SIsMember { .. }
            | Command::ZCard { .. }
            | Command::ZRange { .. }
            | Command::ZRangeByScore { .. }
            | Command::ZScore { .. } => F::READONLY,
            Command::Set(_)
            | Command::Del { .. }
            | Command::Incr { .. }
            | Command::Decr { .. }
            | Command::IncrBy { .. }
            | Command::DecrBy { .. }
            | Command::MSet { .. }
            | Command::HSet { .. }
            | Command::HDel { .. }
            | Command::LPush { .. }
            | Command::RPush { .. }
            | Command::LPop { .. }
            | Command::RPop { .. }
            | Command::SAdd { .. }
            | Command::SRem { .. }
            | Command::SPop { .. }
            | Command::ZAdd { .. }
            | Command::ZRem { .. } => F::WRITE,
            Command::Subscribe { .. }
            | Command::Unsubscribe { .. }
            | Command::PSubscribe { .. }
            | Command::PUnsubscribe { .. }
            | Command::Publish { .. }
            | Command::PubSub(_) => F::PUBSUB,
            Command::Eval { .. } | Command::EvalSha { .. } => F::SCRIPTING | F::MOVABLEKEYS,
            Command::Info { .. } | Command::Command(_) => F::READONLY | F::ADMIN,
            Command::Cluster(_) | Command::Client(_) => F::ADMIN,
        }
    }

    /// Keys touched by this command, for cluster slot routing. Commands that
    /// touch no keys (PING, pub/sub, admin) return an empty vec.
    pub fn get_keys(&self) -> Vec<Bytes> {
        match self {
            Command::Get { key }
            | Command::Ttl { key }
            | Command::Incr { key }
            | Command::Decr { key }
            | Command::IncrBy { key, .. }
            | Command::DecrBy { key, .. }
            | Command::HGetAll { key }
            | Command::HLen { key }
            | Command::HKeys { key }
            | Command::HVals { key }
            | Command::LLen { key }
            | Command::LRange { key, .. }
            | Command::LIndex { key, .. }
            | Command::SCard { key }
            | Command::SMembers { key }
            | Command::SPop { key, .. }
            | Command::ZCard { key }
            | Command::ZRange { key, .. }
            | Command::ZRangeByScore { key, .. } => vec![key.clone()],
            Command::Set(args) => vec![args.key.clone()],
            Command::Del { keys } | Command::Exists { keys } | Command::MGet { keys } => keys.clone(),
            Command::MSet { pairs } => pairs.iter().map(|(k, _)| k.clone()).collect(),
            Command::HGet { key, .. }
            | Command::HDel { key, .. }
            | Command::HExists { key, .. }
            | Command::HSet { key, .. }
            | Command::LPush { key, .. }
            | Command::RPush { key, .. }
            | Command::LPop { key, .. }
            | Command::RPop { key, .. }
            | Command::SAdd { key, .. }
            | Command::SRem { key, .. }
            | Command::SIsMember { key, .. }
            | Command::ZAdd { key, .. }
            | Command::ZRem { key, .. }
            | Command::ZScore { key, .. } => vec![key.clone()],
            Command::Eval { keys, .. } | Command::EvalSha { keys, .. } => keys.clone(),
            _ => vec![],
        }
    }
}
