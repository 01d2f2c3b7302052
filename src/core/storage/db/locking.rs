// src/core/storage/db/locking.rs

use super::core::{Db, NUM_SHARDS};
use super::shard::ShardCache;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::MutexGuard;

/// Describes which shards a command needs locked before it can run, decided
/// by the command itself (`Command::lock_scope`) from its key list.
#[derive(Debug, Clone)]
pub enum LockScope {
    /// No keys touched; no lock needed (e.g. PING, COMMAND COUNT).
    None,
    /// Operates on exactly the given keys.
    Keys(Vec<Bytes>),
    /// Needs a consistent view of the whole keyspace (KEYS, FLUSHALL, DBSIZE-like scans).
    AllShards,
}

/// Holds the `MutexGuard`s acquired for executing a command. The variant
/// mirrors the `LockScope` that produced it.
pub enum ExecutionLocks<'a> {
    Single {
        shard_index: usize,
        guard: MutexGuard<'a, ShardCache>,
    },
    Multi {
        guards: BTreeMap<usize, MutexGuard<'a, ShardCache>>,
    },
    All {
        guards: Vec<MutexGuard<'a, ShardCache>>,
    },
    None,
}

impl Db {
    /// Acquires the locks described by `scope`. Multi-key and whole-keyspace
    /// locks are always taken in ascending shard-index order to prevent
    /// deadlocks between concurrently executing commands.
    pub async fn acquire_locks<'a>(&'a self, scope: &LockScope) -> ExecutionLocks<'a> {
        match scope {
            LockScope::None => ExecutionLocks::None,
            LockScope::AllShards => ExecutionLocks::All {
                guards: self.lock_all_shards().await,
            },
            LockScope::Keys(keys) if keys.len() == 1 => {
                let shard_index = Self::get_shard_index(&keys[0]);
                ExecutionLocks::Single {
                    shard_index,
                    guard: self.get_shard(shard_index).entries.lock().await,
                }
            }
            LockScope::Keys(keys) if keys.is_empty() => ExecutionLocks::None,
            LockScope::Keys(keys) => ExecutionLocks::Multi {
                guards: self.lock_shards_for_keys(keys).await,
            },
        }
    }

    /// Locks multiple shards based on a list of keys, sorting shard indices
    /// first to guarantee a consistent acquisition order across callers.
    pub async fn lock_shards_for_keys<'a>(
        &'a self,
        keys: &[Bytes],
    ) -> BTreeMap<usize, MutexGuard<'a, ShardCache>> {
        let indices: BTreeSet<usize> = keys.iter().map(|key| Self::get_shard_index(key)).collect();
        let mut guards = BTreeMap::new();
        for index in indices {
            guards.insert(index, self.get_shard(index).entries.lock().await);
        }
        guards
    }

    /// Locks all shards in ascending order.
    pub async fn lock_all_shards<'a>(&'a self) -> Vec<MutexGuard<'a, ShardCache>> {
        let mut guards = Vec::with_capacity(NUM_SHARDS);
        for i in 0..NUM_SHARDS {
            guards.push(self.get_shard(i).entries.lock().await);
        }
        guards
    }
}
