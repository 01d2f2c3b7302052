// src/core/handler/mod.rs

//! The central command dispatcher. Given a parsed `Command`, acquires the
//! locks its keys need and routes to the category module that knows how to
//! execute it. Both the connection layer (for ordinary client traffic) and
//! `core::scripting::ScriptManager` (for `redis.call`/`redis.pcall` bodies
//! inside `EVAL`/`EVALSHA`) go through this single entry point.

use crate::core::cluster::ClusterState;
use crate::core::commands::{Command, client, cluster, generic, hash, list, pubsub, server_info, set, string, zset};
use crate::core::errors::CacheError;
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;
use crate::core::storage::db::{Db, LockScope};
use bytes::Bytes;
use std::sync::Arc;

/// Checks a keyed command's target slot(s) against the local cluster's
/// ownership table before any lock is acquired: a key whose slot is owned
/// by a remote node is rejected with `MOVED` rather than served locally.
/// Keys spanning more than one slot are rejected with `CROSSSLOT`, matching
/// the redirect behavior real cluster clients expect. Unassigned slots (no
/// owner recorded yet) are served locally for compatibility.
fn check_cluster_redirect(cluster: &ClusterState, keys: &[Bytes]) -> Result<(), CacheError> {
    if keys.is_empty() {
        return Ok(());
    }
    let mut slot = None;
    for key in keys {
        let key_slot = Db::slot_for_key(key);
        match slot {
            None => slot = Some(key_slot),
            Some(s) if s != key_slot => return Err(CacheError::CrossSlot),
            _ => {}
        }
    }
    let slot = slot.expect("keys is non-empty");
    if cluster.i_own_slot(slot) {
        return Ok(());
    }
    match cluster.owner_of(slot) {
        Some(owner) => Err(CacheError::Moved { slot, addr: owner.addr() }),
        None => Ok(()),
    }
}

/// Runs `command` against `state` on behalf of `session_id`, acquiring
/// whatever shard locks its keys require.
///
/// `SUBSCRIBE`/`UNSUBSCRIBE`/`PSUBSCRIBE`/`PUNSUBSCRIBE` are not handled
/// here: they mutate per-session subscription state and need the session's
/// own `MessageSink`, so the connection layer intercepts and executes them
/// before a command ever reaches this dispatcher.
pub async fn execute(state: &Arc<ServerState>, command: Command, session_id: u64) -> Result<RespValue, CacheError> {
    let keys = command.get_keys();
    if let Some(cluster) = state.cluster.as_deref() {
        check_cluster_redirect(cluster, &keys)?;
    }

    let scope = LockScope::Keys(keys);
    let mut locks = state.db.acquire_locks(&scope).await;

    match command {
        Command::Ping { message } => Ok(generic::exec_ping(message).await),
        Command::Echo { message } => Ok(generic::exec_echo(message)),
        Command::Get { key } => string::exec_get(&key, &mut locks, &state.db, &state.status),
        Command::Set(args) => Ok(string::exec_set(&args, &mut locks, &state.db, &state.status)),
        Command::Del { keys } => Ok(generic::exec_del(&keys, &mut locks).await),
        Command::Exists { keys } => Ok(generic::exec_exists(&keys, &mut locks).await),
        Command::Keys { pattern } => Ok(generic::exec_keys(&state.db, &pattern).await),
        Command::Ttl { key } => Ok(generic::exec_ttl(&key, &mut locks).await),
        Command::Incr { key } => string::exec_incr_by(&key, 1, &mut locks, &state.db, &state.status),
        Command::Decr { key } => string::exec_incr_by(&key, -1, &mut locks, &state.db, &state.status),
        Command::IncrBy { key, delta } => string::exec_incr_by(&key, delta, &mut locks, &state.db, &state.status),
        Command::DecrBy { key, delta } => string::exec_incr_by(&key, -delta, &mut locks, &state.db, &state.status),
        Command::MGet { keys } => Ok(string::exec_mget(&keys, &mut locks, &state.db, &state.status)),
        Command::MSet { pairs } => Ok(string::exec_mset(&pairs, &mut locks, &state.db, &state.status)),

        Command::HSet { key, pairs } => hash::exec_hset(&key, &pairs, &mut locks, &state.db, &state.status),
        Command::HGet { key, field } => hash::exec_hget(&key, &field, &mut locks, &state.db, &state.status),
        Command::HGetAll { key } => hash::exec_hgetall(&key, &mut locks, &state.db, &state.status),
        Command::HDel { key, fields } => hash::exec_hdel(&key, &fields, &mut locks),
        Command::HLen { key } => hash::exec_hlen(&key, &mut locks, &state.db, &state.status),
        Command::HExists { key, field } => hash::exec_hexists(&key, &field, &mut locks, &state.db, &state.status),
        Command::HKeys { key } => hash::exec_hkeys(&key, &mut locks, &state.db, &state.status),
        Command::HVals { key } => hash::exec_hvals(&key, &mut locks, &state.db, &state.status),

        Command::LPush { key, values } => list::exec_push(
            &key,
            &values,
            crate::core::storage::db::PushDirection::Left,
            &mut locks,
            &state.db,
            &state.status,
        ),
        Command::RPush { key, values } => list::exec_push(
            &key,
            &values,
            crate::core::storage::db::PushDirection::Right,
            &mut locks,
            &state.db,
            &state.status,
        ),
        Command::LPop { key, count } => {
            list::exec_pop(&key, count, crate::core::storage::db::PopDirection::Left, &mut locks)
        }
        Command::RPop { key, count } => {
            list::exec_pop(&key, count, crate::core::storage::db::PopDirection::Right, &mut locks)
        }
        Command::LLen { key } => list::exec_llen(&key, &mut locks, &state.db, &state.status),
        Command::LRange { key, start, stop } => {
            list::exec_lrange(&key, start, stop, &mut locks, &state.db, &state.status)
        }
        Command::LIndex { key, index } => list::exec_lindex(&key, index, &mut locks, &state.db, &state.status),

        Command::SAdd { key, members } => set::exec_sadd(&key, &members, &mut locks, &state.db, &state.status),
        Command::SRem { key, members } => set::exec_srem(&key, &members, &mut locks),
        Command::SCard { key } => set::exec_scard(&key, &mut locks, &state.db, &state.status),
        Command::SMembers { key } => set::exec_smembers(&key, &mut locks, &state.db, &state.status),
        Command::SIsMember { key, member } => {
            set::exec_sismember(&key, &member, &mut locks, &state.db, &state.status)
        }
        Command::SPop { key, count } => set::exec_spop(&key, count, &mut locks),

        Command::ZAdd { key, pairs } => zset::exec_zadd(&key, &pairs, &mut locks, &state.db, &state.status),
        Command::ZRem { key, members } => zset::exec_zrem(&key, &members, &mut locks),
        Command::ZCard { key } => zset::exec_zcard(&key, &mut locks, &state.db, &state.status),
        Command::ZRange { key, start, stop, with_scores } => {
            zset::exec_zrange(&key, start, stop, with_scores, &mut locks, &state.db, &state.status)
        }
        Command::ZRangeByScore { key, min, max, with_scores } => {
            zset::exec_zrangebyscore(&key, &min, &max, with_scores, &mut locks, &state.db, &state.status)
        }
        Command::ZScore { key, member } => zset::exec_zscore(&key, &member, &mut locks, &state.db, &state.status),

        Command::Publish { channel, message } => Ok(pubsub::exec_publish(&channel, &message, &state.channel_manager)),
        Command::PubSub(sub) => Ok(pubsub::exec_pubsub(&sub, &state.channel_manager)),
        Command::Subscribe { .. }
        | Command::Unsubscribe { .. }
        | Command::PSubscribe { .. }
        | Command::PUnsubscribe { .. } => Err(CacheError::InvalidRequest(
            "this command can't be called that way".into(),
        )),

        Command::Eval { script, keys, args } => {
            state.scripting.eval_script(state, script, keys, args, session_id).await
        }
        Command::EvalSha { sha1, keys, args } => {
            state.scripting.eval_sha(state, &sha1, keys, args, session_id).await
        }

        Command::Info { section } => server_info::exec_info(
            section.as_ref(),
            state.start_time,
            &state.db,
            &state.status,
            state.cluster.is_some(),
        ),
        Command::Command(sub) => Ok(server_info::exec_command(&sub)),
        Command::Cluster(sub) => {
            cluster::exec_cluster(&sub, state.cluster.as_deref(), &state.db, state.cluster_gossip_tx.as_ref()).await
        }
        Command::Client(sub) => Ok(match sub {
            client::ClientSubcommand::List => client::exec_client_list(&state.clients).await,
            client::ClientSubcommand::GetName => client::exec_client_getname(&state.clients, session_id).await,
            client::ClientSubcommand::SetName { name } => {
                client::exec_client_setname(&state.clients, session_id, name).await
            }
        }),
    }
}
