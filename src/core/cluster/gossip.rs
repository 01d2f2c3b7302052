// src/core/cluster/gossip.rs

//! The cluster bus wire protocol: a binary, length-prefixed framing distinct
//! from RESP, carrying MEET/PING/PONG only. No failover, voting, or epoch
//! bumping lives here -- see `ClusterState`'s doc comment.

use crate::core::cluster::state::{ClusterNode, ClusterState, now_ms};
use crate::core::errors::CacheError;
use bytes::{Buf, BufMut, BytesMut};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, info, warn};

/// A request from the command layer (`CLUSTER MEET`) to the gossip task,
/// which owns the only `TcpStream`s this node opens proactively.
#[derive(Debug)]
pub enum GossipTaskMessage {
    Meet { addr: String },
}

/// The 4-byte magic every frame starts with.
pub const SIGNATURE: &[u8; 4] = b"RCmb";
/// Frames with a declared total length above this are rejected outright.
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

const ID_LEN: usize = 40;
const IP_LEN: usize = 46;
/// signature(4) + total_len(4) + msg_type(2) + reserved(16) + sender_id(40)
/// + port(2) + cluster_port(2) + flags(2) + current_epoch(8) + config_epoch(8)
/// + sender_ip(46) + gossip_count(2)
const HEADER_LEN: usize = 4 + 4 + 2 + 16 + ID_LEN + 2 + 2 + 2 + 8 + 8 + IP_LEN + 2;
/// id(40) + ip(46) + port(2) + cluster_port(2) + flags(2) + last_ping_ms(4) + last_pong_ms(4)
const ENTRY_LEN: usize = ID_LEN + IP_LEN + 2 + 2 + 2 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Meet,
    Ping,
    Pong,
}

impl MessageType {
    fn from_u16(v: u16) -> Result<Self, CacheError> {
        match v {
            0 => Ok(Self::Meet),
            1 => Ok(Self::Ping),
            2 => Ok(Self::Pong),
            other => Err(CacheError::Protocol(format!(
                "unknown cluster bus message type {other}"
            ))),
        }
    }

    fn as_u16(self) -> u16 {
        match self {
            Self::Meet => 0,
            Self::Ping => 1,
            Self::Pong => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GossipEntry {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub bus_port: u16,
    pub is_master: bool,
    pub last_ping_ms: u32,
    pub last_pong_ms: u32,
}

impl From<ClusterNode> for GossipEntry {
    fn from(n: ClusterNode) -> Self {
        Self {
            id: n.id,
            host: n.host,
            port: n.port,
            bus_port: n.bus_port,
            is_master: n.is_master,
            last_ping_ms: n.last_ping_ms as u32,
            last_pong_ms: n.last_pong_ms as u32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GossipFrame {
    pub msg_type: MessageType,
    pub sender_id: String,
    pub sender_host: String,
    pub sender_port: u16,
    pub sender_bus_port: u16,
    pub is_master: bool,
    pub current_epoch: u64,
    pub config_epoch: u64,
    pub entries: Vec<GossipEntry>,
}

fn write_fixed(dst: &mut BytesMut, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len);
    dst.extend_from_slice(&bytes[..n]);
    dst.extend(std::iter::repeat_n(0u8, len - n));
}

fn read_fixed(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[derive(Default)]
pub struct GossipCodec;

impl Decoder for GossipCodec {
    type Item = GossipFrame;
    type Error = CacheError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<GossipFrame>, CacheError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        if &src[0..4] != SIGNATURE {
            return Err(CacheError::Protocol("bad cluster bus signature".into()));
        }
        let total_len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]);
        if total_len > MAX_FRAME_LEN {
            return Err(CacheError::Protocol("cluster bus frame too large".into()));
        }
        if (src.len() as u32) < total_len {
            return Ok(None);
        }

        let mut frame = src.split_to(total_len as usize);
        frame.advance(8); // signature + total_len, already validated
        let msg_type = MessageType::from_u16(frame.get_u16())?;
        frame.advance(16); // reserved
        let sender_id = read_fixed(&frame[..ID_LEN]);
        frame.advance(ID_LEN);
        let sender_port = frame.get_u16();
        let sender_bus_port = frame.get_u16();
        let flags = frame.get_u16();
        let current_epoch = frame.get_u64();
        let config_epoch = frame.get_u64();
        let sender_host = read_fixed(&frame[..IP_LEN]);
        frame.advance(IP_LEN);
        let gossip_count = frame.get_u16() as usize;

        if frame.len() < gossip_count * ENTRY_LEN {
            return Err(CacheError::Protocol(
                "cluster bus frame truncated gossip section".into(),
            ));
        }

        let mut entries = Vec::with_capacity(gossip_count);
        for _ in 0..gossip_count {
            let id = read_fixed(&frame[..ID_LEN]);
            frame.advance(ID_LEN);
            let host = read_fixed(&frame[..IP_LEN]);
            frame.advance(IP_LEN);
            let port = frame.get_u16();
            let bus_port = frame.get_u16();
            let entry_flags = frame.get_u16();
            let last_ping_ms = frame.get_u32();
            let last_pong_ms = frame.get_u32();
            entries.push(GossipEntry {
                id,
                host,
                port,
                bus_port,
                is_master: entry_flags & 0x1 != 0,
                last_ping_ms,
                last_pong_ms,
            });
        }

        Ok(Some(GossipFrame {
            msg_type,
            sender_id,
            sender_host,
            sender_port,
            sender_bus_port,
            is_master: flags & 0x1 != 0,
            current_epoch,
            config_epoch,
            entries,
        }))
    }
}

impl Encoder<GossipFrame> for GossipCodec {
    type Error = CacheError;

    fn encode(&mut self, item: GossipFrame, dst: &mut BytesMut) -> Result<(), CacheError> {
        let total_len = HEADER_LEN + item.entries.len() * ENTRY_LEN;
        dst.extend_from_slice(SIGNATURE);
        dst.put_u32(total_len as u32);
        dst.put_u16(item.msg_type.as_u16());
        dst.extend(std::iter::repeat_n(0u8, 16));
        write_fixed(dst, &item.sender_id, ID_LEN);
        dst.put_u16(item.sender_port);
        dst.put_u16(item.sender_bus_port);
        dst.put_u16(if item.is_master { 1 } else { 0 });
        dst.put_u64(item.current_epoch);
        dst.put_u64(item.config_epoch);
        write_fixed(dst, &item.sender_host, IP_LEN);
        dst.put_u16(item.entries.len() as u16);
        for entry in &item.entries {
            write_fixed(dst, &entry.id, ID_LEN);
            write_fixed(dst, &entry.host, IP_LEN);
            dst.put_u16(entry.port);
            dst.put_u16(entry.bus_port);
            dst.put_u16(if entry.is_master { 1 } else { 0 });
            dst.put_u32(entry.last_ping_ms);
            dst.put_u32(entry.last_pong_ms);
        }
        Ok(())
    }
}

const GOSSIP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
const MAX_GOSSIP_ENTRIES: usize = 3;

fn sample_gossip_entries(cluster: &ClusterState) -> Vec<GossipEntry> {
    let mut entries: Vec<GossipEntry> = cluster
        .nodes
        .iter()
        .filter(|n| n.id != cluster.local_node_id)
        .map(|n| GossipEntry::from(n.value().clone()))
        .collect();
    entries.truncate(MAX_GOSSIP_ENTRIES);
    entries
}

fn build_frame(cluster: &ClusterState, msg_type: MessageType) -> GossipFrame {
    let myself = cluster.myself();
    GossipFrame {
        msg_type,
        sender_id: myself.id,
        sender_host: myself.host,
        sender_port: myself.port,
        sender_bus_port: myself.bus_port,
        is_master: myself.is_master,
        current_epoch: cluster.current_epoch.load(std::sync::atomic::Ordering::Relaxed),
        config_epoch: myself.config_epoch,
        entries: sample_gossip_entries(cluster),
    }
}

fn merge_frame(cluster: &ClusterState, frame: &GossipFrame) {
    cluster.merge_node(ClusterNode {
        id: frame.sender_id.clone(),
        host: frame.sender_host.clone(),
        port: frame.sender_port,
        bus_port: frame.sender_bus_port,
        is_master: frame.is_master,
        config_epoch: frame.config_epoch,
        last_ping_ms: now_ms(),
        last_pong_ms: now_ms(),
        fail_pending: false,
        fail_confirmed: false,
        slots: BTreeSet::new(),
    });
    for entry in &frame.entries {
        cluster.merge_node(ClusterNode {
            id: entry.id.clone(),
            host: entry.host.clone(),
            port: entry.port,
            bus_port: entry.bus_port,
            is_master: entry.is_master,
            config_epoch: 0,
            last_ping_ms: entry.last_ping_ms as u64,
            last_pong_ms: entry.last_pong_ms as u64,
            fail_pending: false,
            fail_confirmed: false,
            slots: BTreeSet::new(),
        });
    }
}

async fn handle_connection(stream: TcpStream, cluster: Arc<ClusterState>) {
    let mut framed = Framed::new(stream, GossipCodec);
    use futures::{SinkExt, StreamExt};
    while let Some(result) = framed.next().await {
        let frame = match result {
            Ok(f) => f,
            Err(e) => {
                warn!("cluster bus frame error, dropping connection: {}", e);
                return;
            }
        };
        match frame.msg_type {
            MessageType::Meet => {
                info!("cluster MEET received from {}", frame.sender_id);
                merge_frame(&cluster, &frame);
                let reply = build_frame(&cluster, MessageType::Pong);
                if framed.send(reply).await.is_err() {
                    return;
                }
            }
            MessageType::Ping => {
                merge_frame(&cluster, &frame);
                cluster.mark_pong_received(&frame.sender_id);
                let reply = build_frame(&cluster, MessageType::Pong);
                if framed.send(reply).await.is_err() {
                    return;
                }
            }
            MessageType::Pong => {
                merge_frame(&cluster, &frame);
                cluster.mark_pong_received(&frame.sender_id);
            }
        }
    }
}

/// Accepts inbound bus connections, runs the periodic PING timer against
/// every known peer, and services `CLUSTER MEET` requests from the command
/// layer, until `shutdown_rx` fires.
pub async fn run(
    cluster: Arc<ClusterState>,
    bus_port: u16,
    mut task_rx: mpsc::Receiver<GossipTaskMessage>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let addr = format!("0.0.0.0:{bus_port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("failed to bind cluster bus on {}: {}", addr, e);
            return;
        }
    };
    info!("cluster bus listening on {}", addr);

    let mut ping_tick = tokio::time::interval(GOSSIP_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("cluster bus shutting down");
                return;
            }
            _ = ping_tick.tick() => {
                ping_known_peers(&cluster).await;
            }
            Some(msg) = task_rx.recv() => {
                match msg {
                    GossipTaskMessage::Meet { addr } => {
                        if let Err(e) = meet(&cluster, &addr).await {
                            warn!("CLUSTER MEET to {} failed: {}", addr, e);
                        }
                    }
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!("cluster bus accepted connection from {}", peer);
                        let cluster = cluster.clone();
                        tokio::spawn(handle_connection(stream, cluster));
                    }
                    Err(e) => warn!("cluster bus accept error: {}", e),
                }
            }
        }
    }
}

async fn ping_known_peers(cluster: &Arc<ClusterState>) {
    const NODE_TIMEOUT_MS: u64 = 15_000;
    cluster.check_timeouts(NODE_TIMEOUT_MS);

    let peers: Vec<ClusterNode> = cluster
        .nodes
        .iter()
        .filter(|n| n.id != cluster.local_node_id)
        .map(|n| n.value().clone())
        .collect();

    for peer in peers {
        let addr = format!("{}:{}", peer.host, peer.bus_port);
        let frame = build_frame(cluster, MessageType::Ping);
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                use futures::SinkExt;
                let mut framed = Framed::new(stream, GossipCodec);
                if framed.send(frame).await.is_ok() {
                    cluster.mark_ping_sent(&peer.id);
                }
            }
            Err(e) => {
                debug!("failed to connect to cluster peer {}: {}", addr, e);
            }
        }
    }
}

/// Opens a connection to `addr` and sends a MEET frame, the initial handshake
/// by which a node is introduced to the cluster.
pub async fn meet(cluster: &Arc<ClusterState>, addr: &str) -> Result<(), CacheError> {
    use futures::SinkExt;
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| CacheError::Internal(format!("cluster MEET connect failed: {e}")))?;
    let mut framed = Framed::new(stream, GossipCodec);
    let frame = build_frame(cluster, MessageType::Meet);
    framed
        .send(frame)
        .await
        .map_err(|e| CacheError::Internal(format!("cluster MEET send failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_through_codec() {
        let frame = GossipFrame {
            msg_type: MessageType::Ping,
            sender_id: "a".repeat(40),
            sender_host: "127.0.0.1".into(),
            sender_port: 6380,
            sender_bus_port: 16380,
            is_master: true,
            current_epoch: 7,
            config_epoch: 3,
            entries: vec![GossipEntry {
                id: "b".repeat(40),
                host: "127.0.0.2".into(),
                port: 6381,
                bus_port: 16381,
                is_master: false,
                last_ping_ms: 100,
                last_pong_ms: 200,
            }],
        };
        let mut codec = GossipCodec;
        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.sender_id, frame.sender_id);
        assert_eq!(decoded.entries.len(), 1);
        assert_eq!(decoded.entries[0].host, "127.0.0.2");
    }

    #[test]
    fn rejects_bad_signature() {
        let mut buf = BytesMut::from(&b"XXXX"[..]);
        buf.extend(std::iter::repeat_n(0u8, HEADER_LEN));
        let mut codec = GossipCodec;
        assert!(codec.decode(&mut buf).is_err());
    }
}
