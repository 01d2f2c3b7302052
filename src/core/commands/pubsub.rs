// src/core/commands/pubsub.rs

//! Pub/sub commands. SUBSCRIBE/UNSUBSCRIBE/PSUBSCRIBE/PUNSUBSCRIBE mutate
//! per-session subscription state, so their execution lives in the connection
//! layer where the session's `MessageSink` is available; this module only
//! parses the introspective `PUBSUB` subcommand and renders its replies.

use crate::core::errors::CacheError;
use crate::core::protocol::RespValue;
use crate::core::pubsub::ChannelManager;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub enum PubSubSubcommand {
    Channels { pattern: Option<Bytes> },
    NumSub { channels: Vec<Bytes> },
    NumPat,
    Patterns,
}

pub fn parse_pubsub(args: &[Bytes]) -> Result<PubSubSubcommand, CacheError> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(CacheError::WrongArgumentCount("PUBSUB".into()));
    };
    let sub = super::helpers::parse_utf8(sub)?.to_ascii_uppercase();
    match sub.as_str() {
        "CHANNELS" => Ok(PubSubSubcommand::Channels { pattern: rest.first().cloned() }),
        "NUMSUB" => Ok(PubSubSubcommand::NumSub { channels: rest.to_vec() }),
        "NUMPAT" => Ok(PubSubSubcommand::NumPat),
        "PATTERNS" => Ok(PubSubSubcommand::Patterns),
        other => Err(CacheError::UnknownCommand(format!("pubsub {}", other.to_ascii_lowercase()))),
    }
}

pub fn exec_pubsub(sub: &PubSubSubcommand, channels: &ChannelManager) -> RespValue {
    match sub {
        PubSubSubcommand::Channels { pattern } => RespValue::Array(
            channels
                .get_active_channels(pattern.as_ref())
                .into_iter()
                .map(RespValue::BulkString)
                .collect(),
        ),
        PubSubSubcommand::NumSub { channels: names } => {
            let mut out = Vec::with_capacity(names.len() * 2);
            for name in names {
                out.push(RespValue::BulkString(name.clone()));
                out.push(RespValue::Integer(channels.get_channel_subscriber_count(name) as i64));
            }
            RespValue::Array(out)
        }
        PubSubSubcommand::NumPat => RespValue::Integer(channels.pattern_subscriber_count() as i64),
        PubSubSubcommand::Patterns => RespValue::Array(
            channels
                .get_active_patterns()
                .into_iter()
                .map(RespValue::BulkString)
                .collect(),
        ),
    }
}

pub fn exec_publish(channel: &Bytes, message: &Bytes, channels: &ChannelManager) -> RespValue {
    RespValue::Integer(channels.publish(channel, message.clone()) as i64)
}
