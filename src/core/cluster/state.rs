// src/core/cluster/state.rs

//! Tracks the cluster's node registry and hash-slot ownership map.
//! Failover/promotion/voting are explicitly not implemented here: a node
//! that stops answering PONG is marked `fail_pending` and nothing further
//! happens automatically.

use super::slot::NUM_SLOTS;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A node as known to this process, either itself or a gossip peer.
#[derive(Debug, Clone)]
pub struct ClusterNode {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub bus_port: u16,
    pub is_master: bool,
    pub config_epoch: u64,
    pub last_ping_ms: u64,
    pub last_pong_ms: u64,
    pub fail_pending: bool,
    pub fail_confirmed: bool,
    pub slots: BTreeSet<u16>,
}

impl ClusterNode {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The full set of cluster bookkeeping held by this node: its own identity,
/// every peer it has learned about via MEET/gossip, and the 16384-slot
/// ownership table.
#[derive(Debug)]
pub struct ClusterState {
    pub local_node_id: String,
    pub nodes: DashMap<String, ClusterNode>,
    slot_owner: RwLock<Vec<Option<String>>>,
    pub current_epoch: AtomicU64,
}

impl ClusterState {
    pub fn new(host: &str, port: u16, bus_port: u16) -> Self {
        let local_node_id = hex::encode(rand::random::<[u8; 20]>());
        let myself = ClusterNode {
            id: local_node_id.clone(),
            host: host.to_string(),
            port,
            bus_port,
            is_master: true,
            config_epoch: 0,
            last_ping_ms: 0,
            last_pong_ms: now_ms(),
            fail_pending: false,
            fail_confirmed: false,
            slots: BTreeSet::new(),
        };
        let nodes = DashMap::new();
        nodes.insert(local_node_id.clone(), myself);
        Self {
            local_node_id,
            nodes,
            slot_owner: RwLock::new(vec![None; NUM_SLOTS]),
            current_epoch: AtomicU64::new(0),
        }
    }

    pub fn myself(&self) -> ClusterNode {
        self.nodes
            .get(&self.local_node_id)
            .expect("local node always present")
            .clone()
    }

    /// `CLUSTER ADDSLOTS`: assigns a set of slots to the local node.
    pub fn add_slots_local(&self, slots: &[u16]) {
        let mut owner = self.slot_owner.write();
        for &slot in slots {
            owner[slot as usize] = Some(self.local_node_id.clone());
        }
        if let Some(mut myself) = self.nodes.get_mut(&self.local_node_id) {
            myself.slots.extend(slots.iter().copied());
        }
    }

    pub fn owner_of(&self, slot: u16) -> Option<ClusterNode> {
        let owner_id = self.slot_owner.read()[slot as usize].clone()?;
        self.nodes.get(&owner_id).map(|n| n.clone())
    }

    pub fn i_own_slot(&self, slot: u16) -> bool {
        self.slot_owner.read()[slot as usize].as_deref() == Some(self.local_node_id.as_str())
    }

    /// Merges a node observation learned via MEET or a gossip entry in a PING/PONG
    /// frame. Never downgrades a node whose known `config_epoch` is higher.
    pub fn merge_node(&self, node: ClusterNode) {
        if node.id == self.local_node_id {
            return;
        }
        match self.nodes.get(&node.id) {
            Some(existing) if existing.config_epoch > node.config_epoch => {}
            _ => {
                let mut owner = self.slot_owner.write();
                for &slot in &node.slots {
                    owner[slot as usize] = Some(node.id.clone());
                }
                self.nodes.insert(node.id.clone(), node);
            }
        }
    }

    pub fn mark_ping_sent(&self, node_id: &str) {
        if let Some(mut node) = self.nodes.get_mut(node_id) {
            node.last_ping_ms = now_ms();
        }
    }

    pub fn mark_pong_received(&self, node_id: &str) {
        if let Some(mut node) = self.nodes.get_mut(node_id) {
            node.last_pong_ms = now_ms();
            node.fail_pending = false;
        }
    }

    /// Scans for nodes that haven't PONGed within `timeout_ms` and flags them.
    pub fn check_timeouts(&self, timeout_ms: u64) {
        let now = now_ms();
        for mut entry in self.nodes.iter_mut() {
            if entry.id == self.local_node_id {
                continue;
            }
            if now.saturating_sub(entry.last_pong_ms) > timeout_ms {
                entry.fail_pending = true;
            }
        }
    }

    pub fn known_node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Renders `CLUSTER NODES`' plain-text table.
    pub fn render_nodes_text(&self) -> String {
        let mut out = String::new();
        for entry in self.nodes.iter() {
            let node = entry.value();
            let flags = if node.id == self.local_node_id {
                "myself,master"
            } else if node.is_master {
                "master"
            } else {
                "slave"
            };
            let slots: Vec<String> = ranges(&node.slots)
                .into_iter()
                .map(|(a, b)| if a == b { a.to_string() } else { format!("{a}-{b}") })
                .collect();
            out.push_str(&format!(
                "{} {} {} - 0 {} {} connected {}\n",
                node.id,
                format!("{}:{}@{}", node.host, node.port, node.bus_port),
                flags,
                node.last_pong_ms,
                node.config_epoch,
                slots.join(" "),
            ));
        }
        out
    }

    /// Renders `CLUSTER SLOTS`' array shape: one entry per contiguous range.
    pub fn render_slots(&self) -> Vec<(u16, u16, ClusterNode)> {
        let mut out = Vec::new();
        for entry in self.nodes.iter() {
            let node = entry.value();
            for (a, b) in ranges(&node.slots) {
                out.push((a, b, node.clone()));
            }
        }
        out
    }

}

/// Collapses a sorted slot set into contiguous `(start, end)` ranges.
fn ranges(slots: &BTreeSet<u16>) -> Vec<(u16, u16)> {
    let mut out = Vec::new();
    let mut iter = slots.iter().copied();
    let Some(mut start) = iter.next() else {
        return out;
    };
    let mut prev = start;
    for s in iter {
        if s == prev + 1 {
            prev = s;
            continue;
        }
        out.push((start, prev));
        start = s;
        prev = s;
    }
    out.push((start, prev));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addslots_assigns_local_ownership() {
        let cs = ClusterState::new("127.0.0.1", 6380, 16380);
        cs.add_slots_local(&[0, 1, 2]);
        assert!(cs.i_own_slot(0));
        assert!(cs.i_own_slot(2));
        assert!(!cs.i_own_slot(3));
    }

    #[test]
    fn merge_ignores_stale_epoch() {
        let cs = ClusterState::new("127.0.0.1", 6380, 16380);
        let newer = ClusterNode {
            id: "peer".into(),
            host: "10.0.0.2".into(),
            port: 7000,
            bus_port: 17000,
            is_master: true,
            config_epoch: 5,
            last_ping_ms: 0,
            last_pong_ms: 0,
            fail_pending: false,
            fail_confirmed: false,
            slots: BTreeSet::new(),
        };
        cs.merge_node(newer.clone());
        let mut stale = newer.clone();
        stale.config_epoch = 1;
        stale.host = "10.0.0.3".into();
        cs.merge_node(stale);
        assert_eq!(cs.nodes.get("peer").unwrap().host, "10.0.0.2");
    }
}
