// tests/integration/pubsub_test.rs

use super::test_helpers::TestContext;
use astra_cache::core::protocol::RespValue;
use astra_cache::core::pubsub::{MessageSink, PubSubMessage, SessionSink};
use bytes::Bytes;
use std::sync::Arc;

#[tokio::test]
async fn publish_delivers_to_an_exact_subscriber() {
    let ctx = TestContext::new().await;
    let sink: Arc<SessionSink> = Arc::new(SessionSink::new());
    let as_trait: Arc<dyn MessageSink> = sink.clone();

    ctx.state.channel_manager.subscribe(&Bytes::from_static(b"news"), 42, &as_trait);

    let reply = ctx.run(&["PUBLISH", "news", "hello"]).await.unwrap();
    assert_eq!(reply, RespValue::Integer(1));

    match sink.try_recv() {
        Some(PubSubMessage::Message { channel, payload }) => {
            assert_eq!(channel, Bytes::from_static(b"news"));
            assert_eq!(payload, Bytes::from_static(b"hello"));
        }
        other => panic!("expected a Message, got {other:?}"),
    }
}

#[tokio::test]
async fn publish_with_no_subscribers_reports_zero_receivers() {
    let ctx = TestContext::new().await;
    let reply = ctx.run(&["PUBLISH", "nobody-listens", "hi"]).await.unwrap();
    assert_eq!(reply, RespValue::Integer(0));
}

#[tokio::test]
async fn pattern_subscriber_receives_a_pmessage_with_the_matched_channel() {
    let ctx = TestContext::new().await;
    let sink: Arc<SessionSink> = Arc::new(SessionSink::new());
    let as_trait: Arc<dyn MessageSink> = sink.clone();

    ctx.state
        .channel_manager
        .subscribe_pattern(&Bytes::from_static(b"room.*"), 7, as_trait);

    let reply = ctx.run(&["PUBLISH", "room.42", "ping"]).await.unwrap();
    assert_eq!(reply, RespValue::Integer(1));

    match sink.try_recv() {
        Some(PubSubMessage::PMessage { pattern, channel, payload }) => {
            assert_eq!(pattern, Bytes::from_static(b"room.*"));
            assert_eq!(channel, Bytes::from_static(b"room.42"));
            assert_eq!(payload, Bytes::from_static(b"ping"));
        }
        other => panic!("expected a PMessage, got {other:?}"),
    }
}

#[tokio::test]
async fn pubsub_numsub_reports_per_channel_subscriber_counts() {
    let ctx = TestContext::new().await;
    let sink: Arc<SessionSink> = Arc::new(SessionSink::new());
    let as_trait: Arc<dyn MessageSink> = sink.clone();
    ctx.state.channel_manager.subscribe(&Bytes::from_static(b"a"), 1, &as_trait);

    let reply = ctx.run(&["PUBSUB", "NUMSUB", "a", "b"]).await.unwrap();
    assert_eq!(
        reply,
        RespValue::Array(vec![
            RespValue::BulkString(Bytes::from_static(b"a")),
            RespValue::Integer(1),
            RespValue::BulkString(Bytes::from_static(b"b")),
            RespValue::Integer(0),
        ])
    );
}
