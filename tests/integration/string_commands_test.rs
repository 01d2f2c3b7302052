// tests/integration/string_commands_test.rs

use super::fixtures::{TEST_KEY1, TEST_VALUE1, constants};
use super::test_helpers::{TestContext, bulk};
use astra_cache::core::errors::CacheError;
use astra_cache::core::protocol::RespValue;

#[tokio::test]
async fn set_then_get_roundtrips_the_value() {
    let ctx = TestContext::new().await;

    let reply = ctx.run(&["SET", TEST_KEY1, TEST_VALUE1]).await.unwrap();
    assert_eq!(reply, RespValue::SimpleString("OK".into()));

    let reply = ctx.run(&["GET", TEST_KEY1]).await.unwrap();
    assert_eq!(reply, bulk(TEST_VALUE1));
}

#[tokio::test]
async fn get_on_a_missing_key_returns_nil() {
    let ctx = TestContext::new().await;
    let reply = ctx.run(&["GET", "no_such_key"]).await.unwrap();
    assert_eq!(reply, RespValue::Null);
}

#[tokio::test]
async fn set_with_ex_reports_a_positive_ttl() {
    let ctx = TestContext::new().await;
    ctx.run(&["SET", TEST_KEY1, TEST_VALUE1, "EX", "60"]).await.unwrap();

    let reply = ctx.run(&["TTL", TEST_KEY1]).await.unwrap();
    match reply {
        RespValue::Integer(ttl) => assert!(ttl > 0 && ttl <= 60),
        other => panic!("expected an integer TTL, got {other:?}"),
    }
}

#[tokio::test]
async fn ttl_on_a_key_without_an_expiry_is_negative_one() {
    let ctx = TestContext::new().await;
    ctx.run(&["SET", TEST_KEY1, TEST_VALUE1]).await.unwrap();
    assert_eq!(ctx.run(&["TTL", TEST_KEY1]).await.unwrap(), RespValue::Integer(-1));
}

#[tokio::test]
async fn mget_returns_positional_nils_for_missing_keys() {
    let ctx = TestContext::new().await;
    ctx.run(&["SET", "k1", "v1"]).await.unwrap();

    let reply = ctx.run(&["MGET", "k1", "missing", "k1"]).await.unwrap();
    assert_eq!(
        reply,
        RespValue::Array(vec![bulk("v1"), RespValue::Null, bulk("v1")])
    );
}

#[tokio::test]
async fn incr_on_a_fresh_key_starts_from_zero() {
    let ctx = TestContext::new().await;
    assert_eq!(ctx.run(&["INCR", "counter"]).await.unwrap(), RespValue::Integer(1));
    assert_eq!(ctx.run(&["INCR", "counter"]).await.unwrap(), RespValue::Integer(2));
    assert_eq!(ctx.run(&["DECRBY", "counter", "2"]).await.unwrap(), RespValue::Integer(0));
}

#[tokio::test]
async fn incr_on_a_non_numeric_string_is_an_error() {
    let ctx = TestContext::new().await;
    ctx.run(&["SET", "k", "not a number"]).await.unwrap();
    let err = ctx.run(&["INCR", "k"]).await.unwrap_err();
    assert!(matches!(err, CacheError::NotAnInteger));
}

#[tokio::test]
async fn incr_near_i64_max_overflows_cleanly() {
    let ctx = TestContext::new().await;
    ctx.run(&["SET", "k", constants::NEAR_I64_MAX]).await.unwrap();
    ctx.run(&["INCR", "k"]).await.unwrap();
    let err = ctx.run(&["INCR", "k"]).await.unwrap_err();
    assert!(matches!(err, CacheError::Overflow));
}

#[tokio::test]
async fn list_command_on_a_string_key_is_wrongtype() {
    let ctx = TestContext::new().await;
    ctx.run(&["SET", TEST_KEY1, TEST_VALUE1]).await.unwrap();
    let err = ctx.run(&["LPUSH", TEST_KEY1, "x"]).await.unwrap_err();
    assert!(matches!(err, CacheError::WrongType));
}

#[tokio::test]
async fn del_removes_multiple_keys_and_reports_the_count() {
    let ctx = TestContext::new().await;
    ctx.run(&["SET", "a", "1"]).await.unwrap();
    ctx.run(&["SET", "b", "2"]).await.unwrap();

    let reply = ctx.run(&["DEL", "a", "b", "missing"]).await.unwrap();
    assert_eq!(reply, RespValue::Integer(2));
    assert_eq!(ctx.run(&["EXISTS", "a"]).await.unwrap(), RespValue::Integer(0));
}
