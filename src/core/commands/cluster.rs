// src/core/commands/cluster.rs

//! `CLUSTER` subcommands: ADDSLOTS, NODES, SLOTS, GETKEYSINSLOT, MEET.

use crate::core::cluster::ClusterState;
use crate::core::errors::CacheError;
use crate::core::protocol::RespValue;
use crate::core::storage::db::Db;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub enum ClusterSubcommand {
    AddSlots { slots: Vec<u16> },
    Nodes,
    Slots,
    GetKeysInSlot { slot: u16, count: usize },
    Meet { addr: String },
}

pub fn parse_cluster(args: &[Bytes]) -> Result<ClusterSubcommand, CacheError> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(CacheError::WrongArgumentCount("CLUSTER".into()));
    };
    let sub = super::helpers::parse_utf8(sub)?.to_ascii_uppercase();
    match sub.as_str() {
        "ADDSLOTS" => {
            super::helpers::require_arity(rest, 1, "CLUSTER ADDSLOTS")?;
            let slots = rest
                .iter()
                .map(|b| super::helpers::parse_usize(b).map(|v| v as u16))
                .collect::<Result<_, _>>()?;
            Ok(ClusterSubcommand::AddSlots { slots })
        }
        "NODES" => Ok(ClusterSubcommand::Nodes),
        "SLOTS" => Ok(ClusterSubcommand::Slots),
        "GETKEYSINSLOT" => {
            super::helpers::require_arity(rest, 2, "CLUSTER GETKEYSINSLOT")?;
            let slot = super::helpers::parse_usize(&rest[0])? as u16;
            let count = super::helpers::parse_usize(&rest[1])?;
            Ok(ClusterSubcommand::GetKeysInSlot { slot, count })
        }
        "MEET" => {
            super::helpers::require_arity(rest, 2, "CLUSTER MEET")?;
            let host = super::helpers::parse_utf8(&rest[0])?;
            let port = super::helpers::parse_utf8(&rest[1])?;
            Ok(ClusterSubcommand::Meet { addr: format!("{host}:{port}") })
        }
        other => Err(CacheError::UnknownCommand(format!("cluster {}", other.to_ascii_lowercase()))),
    }
}

pub async fn exec_cluster(
    sub: &ClusterSubcommand,
    cluster: Option<&ClusterState>,
    db: &Db,
    gossip_tx: Option<&tokio::sync::mpsc::Sender<crate::core::cluster::GossipTaskMessage>>,
) -> Result<RespValue, CacheError> {
    let Some(cluster) = cluster else {
        return Err(CacheError::ClusterDown);
    };
    match sub {
        ClusterSubcommand::AddSlots { slots } => {
            cluster.add_slots_local(slots);
            Ok(RespValue::SimpleString("OK".into()))
        }
        ClusterSubcommand::Nodes => Ok(RespValue::BulkString(Bytes::from(cluster.render_nodes_text()))),
        ClusterSubcommand::Slots => {
            let rows = cluster
                .render_slots()
                .into_iter()
                .map(|(start, end, node)| {
                    RespValue::Array(vec![
                        RespValue::Integer(start as i64),
                        RespValue::Integer(end as i64),
                        RespValue::Array(vec![
                            RespValue::BulkString(Bytes::from(node.host.clone())),
                            RespValue::Integer(node.port as i64),
                            RespValue::BulkString(Bytes::from(node.id.clone())),
                        ]),
                    ])
                })
                .collect();
            Ok(RespValue::Array(rows))
        }
        ClusterSubcommand::GetKeysInSlot { slot, count } => {
            let keys = db.get_keys_in_slot(*slot, *count).await;
            Ok(RespValue::Array(keys.into_iter().map(RespValue::BulkString).collect()))
        }
        ClusterSubcommand::Meet { addr } => {
            let Some(tx) = gossip_tx else {
                return Err(CacheError::ClusterDown);
            };
            tx.send(crate::core::cluster::GossipTaskMessage::Meet { addr: addr.clone() })
                .await
                .map_err(|_| CacheError::Internal("cluster gossip task unavailable".into()))?;
            Ok(RespValue::SimpleString("OK".into()))
        }
    }
}
