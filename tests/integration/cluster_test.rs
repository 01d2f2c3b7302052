// tests/integration/cluster_test.rs

use super::test_helpers::TestContext;
use astra_cache::config::Config;
use astra_cache::core::cluster::ClusterNode;
use astra_cache::core::errors::CacheError;
use astra_cache::core::protocol::RespValue;
use bytes::Bytes;
use std::collections::BTreeSet;

fn cluster_config() -> Config {
    let mut config = Config::default();
    config.cluster.enabled = true;
    config.cluster.port = config.port + 10_000;
    config
}

#[tokio::test]
async fn get_on_a_locally_owned_slot_is_served_normally() {
    let ctx = TestContext::with_config(cluster_config()).await;
    ctx.state.cluster.as_ref().unwrap().add_slots_local(&(0..16384).collect::<Vec<u16>>());

    ctx.run(&["SET", "foo", "bar"]).await.unwrap();
    let reply = ctx.run(&["GET", "foo"]).await.unwrap();
    assert_eq!(reply, RespValue::BulkString(Bytes::from_static(b"bar")));
}

#[tokio::test]
async fn key_owned_by_a_remote_node_returns_moved() {
    let ctx = TestContext::with_config(cluster_config()).await;
    let cluster = ctx.state.cluster.as_ref().unwrap();

    // Slot 5000 is remote; everything else stays unassigned and is served
    // locally for compatibility.
    let mut remote_slots = BTreeSet::new();
    remote_slots.insert(5000u16);
    cluster.merge_node(ClusterNode {
        id: "b".repeat(40),
        host: "10.0.0.2".into(),
        port: 7000,
        bus_port: 17000,
        is_master: true,
        config_epoch: 1,
        last_ping_ms: 0,
        last_pong_ms: 0,
        fail_pending: false,
        fail_confirmed: false,
        slots: remote_slots,
    });

    // "key:5000" doesn't necessarily hash to slot 5000; find a key that does.
    let key = find_key_in_slot(5000);
    let err = ctx.run(&["GET", &key]).await.unwrap_err();
    match err {
        CacheError::Moved { slot, addr } => {
            assert_eq!(slot, 5000);
            assert_eq!(addr, "10.0.0.2:7000");
        }
        other => panic!("expected MOVED, got {other:?}"),
    }
}

#[tokio::test]
async fn unassigned_slots_are_served_locally() {
    let ctx = TestContext::with_config(cluster_config()).await;
    // No ADDSLOTS call at all: every slot is unassigned.
    let reply = ctx.run(&["SET", "foo", "bar"]).await.unwrap();
    assert_eq!(reply, RespValue::SimpleString("OK".into()));
}

#[tokio::test]
async fn cross_slot_multi_key_command_is_rejected() {
    let ctx = TestContext::with_config(cluster_config()).await;
    ctx.state.cluster.as_ref().unwrap().add_slots_local(&(0..16384).collect::<Vec<u16>>());

    // Two keys picked to land in different slots.
    let err = ctx.run(&["MGET", "foo", "bar"]).await.unwrap_err();
    assert!(matches!(err, CacheError::CrossSlot));
}

#[tokio::test]
async fn cluster_addslots_then_nodes_reports_the_range() {
    let ctx = TestContext::with_config(cluster_config()).await;
    ctx.run(&["CLUSTER", "ADDSLOTS", "0", "1", "2"]).await.unwrap();

    let reply = ctx.run(&["CLUSTER", "NODES"]).await.unwrap();
    match reply {
        RespValue::BulkString(body) => {
            let text = String::from_utf8_lossy(&body);
            assert!(text.contains("0-2"), "expected a 0-2 slot range, got: {text}");
            assert!(text.contains("myself,master"));
        }
        other => panic!("expected a bulk string, got {other:?}"),
    }
}

/// Searches for a key whose slot hash equals `target`, for tests that need
/// a key deterministically owned by a specific slot.
fn find_key_in_slot(target: u16) -> String {
    for i in 0.. {
        let candidate = format!("probe-{i}");
        if astra_cache::core::storage::db::Db::slot_for_key(&Bytes::from(candidate.clone().into_bytes())) == target {
            return candidate;
        }
    }
    unreachable!()
}
