// src/core/cluster/mod.rs

//! Cluster gossip bus: slot hashing, node state tracking, and the PING/PONG/MEET
//! wire protocol used to keep a multi-node deployment's slot ownership map in sync.

pub mod gossip;
pub mod slot;
pub mod state;

pub use gossip::GossipTaskMessage;
pub use state::{ClusterNode, ClusterState};
