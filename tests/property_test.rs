// tests/property_test.rs

//! Property tests for batch get/put size and order preservation, RESP
//! encode/decode round-trips, and parser idempotence under arbitrary
//! chunking of the same input bytes.

use astra_cache::config::{CacheConfig, EvictionPolicy};
use astra_cache::core::protocol::{RespFrame, RespFrameCodec};
use astra_cache::core::storage::data_types::{DataValue, StoredValue};
use astra_cache::core::storage::db::Db;
use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

fn test_db() -> Db {
    let cache_config = CacheConfig {
        entry_capacity: 4096,
        lfu_decay_minutes: 1,
        hot_key_threshold: 250,
    };
    Db::new(&cache_config, EvictionPolicy::NoEviction, None)
}

fn arb_key() -> impl Strategy<Value = Bytes> {
    "[a-zA-Z0-9_-]{1,16}".prop_map(Bytes::from)
}

fn arb_value() -> impl Strategy<Value = Bytes> {
    proptest::collection::vec(any::<u8>(), 0..32).prop_map(Bytes::from)
}

proptest! {
    /// `batch_get(ks).len() == ks.len()` unconditionally, and every slot a
    /// prior `batch_put` covered is present.
    #[test]
    fn batch_get_preserves_length_and_order(
        keys in proptest::collection::vec(arb_key(), 1..20),
        values in proptest::collection::vec(arb_value(), 1..20),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let db = test_db();
            let n = keys.len().min(values.len());
            let keys = &keys[..n];
            let values = &values[..n];

            let items: Vec<(Bytes, StoredValue)> = keys
                .iter()
                .zip(values.iter())
                .map(|(k, v)| (k.clone(), StoredValue::new(DataValue::String(v.clone()))))
                .collect();
            db.batch_put(items).await;

            let results = db.batch_get(keys).await;
            prop_assert_eq!(results.len(), keys.len());

            // Dedup: later writes to a repeated key win, so only check the
            // last occurrence of each key matches its expected value.
            for (i, key) in keys.iter().enumerate() {
                let is_last_occurrence = keys[i + 1..].iter().all(|k| k != key);
                if !is_last_occurrence {
                    continue;
                }
                match &results[i] {
                    Some(stored) => match &stored.data {
                        DataValue::String(got) => prop_assert_eq!(got, &values[i]),
                        other => prop_assert!(false, "expected a string, got {:?}", other),
                    },
                    None => prop_assert!(false, "expected key {:?} to be present", key),
                }
            }
        });
    }

    /// `batch_get` on keys never written returns all-`None`, never panics or
    /// shrinks the result vector.
    #[test]
    fn batch_get_on_unknown_keys_is_all_none(keys in proptest::collection::vec(arb_key(), 0..20)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let db = test_db();
            let results = db.batch_get(&keys).await;
            prop_assert_eq!(results.len(), keys.len());
            prop_assert!(results.iter().all(Option::is_none));
        });
    }

    /// Encoding an arbitrary frame and decoding it back yields the same frame.
    #[test]
    fn resp_round_trip(frame in arb_resp_frame()) {
        let mut codec = RespFrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap();
        prop_assert_eq!(decoded, Some(frame));
    }

    /// Feeding the same request bytes to the decoder split into arbitrary
    /// chunks produces the same frame sequence as feeding it all at once.
    #[test]
    fn parser_is_idempotent_under_chunking(
        argv in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..12), 1..6),
        split_points in proptest::collection::vec(0usize..200, 0..10),
    ) {
        let bytes = encode_request(&argv);

        let mut whole_codec = RespFrameCodec::new();
        let mut whole_buf = BytesMut::from(&bytes[..]);
        let whole_result = whole_codec.decode(&mut whole_buf).unwrap();

        let mut chunked_codec = RespFrameCodec::new();
        let mut chunked_buf = BytesMut::new();
        let mut chunked_result = None;
        let mut offset = 0;
        let mut splits: Vec<usize> = split_points.into_iter().map(|p| p % (bytes.len() + 1)).collect();
        splits.sort_unstable();
        splits.push(bytes.len());
        for split in splits {
            if split < offset {
                continue;
            }
            chunked_buf.extend_from_slice(&bytes[offset..split]);
            offset = split;
            if let Some(frame) = chunked_codec.decode(&mut chunked_buf).unwrap() {
                chunked_result = Some(frame);
            }
        }

        prop_assert_eq!(whole_result, chunked_result);
    }
}

fn arb_resp_frame() -> impl Strategy<Value = RespFrame> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,20}".prop_map(RespFrame::SimpleString),
        "[a-zA-Z0-9 ]{0,20}".prop_map(RespFrame::Error),
        any::<i64>().prop_map(RespFrame::Integer),
        proptest::collection::vec(any::<u8>(), 0..32)
            .prop_map(|b| RespFrame::BulkString(Bytes::from(b))),
        Just(RespFrame::Null),
        Just(RespFrame::NullArray),
    ]
}

/// Encodes an argv (as raw byte strings) into a multibulk request frame,
/// the same shape the session read loop feeds through the decoder.
fn encode_request(argv: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("*{}\r\n", argv.len()).as_bytes());
    for arg in argv {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}
