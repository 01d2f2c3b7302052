// src/core/protocol/resp_frame.rs

//! The wire-level RESP frame type plus the incremental decoder/encoder pair
//! that sits between a raw socket and the command dispatcher.
//!
//! Only the five response types this server speaks are represented, plus
//! the two null shapes (`$-1` and `*-1`) a client must be able to tell apart.

use crate::core::errors::CacheError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Requests with more bulk elements than this are rejected as protocol errors.
pub const MAX_ARRAY_LEN: i64 = 1024 * 1024;
/// Bulk strings longer than this are rejected as protocol errors.
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
/// An inline header line longer than this without a terminator is a protocol error.
const MAX_HEADER_LINE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum RespFrame {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    Array(Vec<RespFrame>),
    Null,
    NullArray,
}

impl RespFrame {
    /// Converts a decoded request frame (always an array of bulk strings) into
    /// the argv the command registry expects.
    pub fn into_command_args(self) -> Result<Vec<Bytes>, CacheError> {
        match self {
            RespFrame::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    RespFrame::BulkString(b) => Ok(b),
                    _ => Err(CacheError::Protocol("expected bulk string argument".into())),
                })
                .collect(),
            _ => Err(CacheError::Protocol("expected multibulk request".into())),
        }
    }
}

/// The three-state incremental request parser.
#[derive(Debug)]
enum ParseState {
    ReadArrayHeader,
    ReadBulkHeader {
        remaining: i64,
        argv: Vec<Bytes>,
    },
    ReadBulkContent {
        remaining: i64,
        argv: Vec<Bytes>,
        current_bulk: usize,
    },
}

/// A `tokio_util` codec implementing the incremental RESP parser on decode
/// and a straightforward recursive writer on encode.
#[derive(Debug)]
pub struct RespFrameCodec {
    state: ParseState,
}

impl Default for RespFrameCodec {
    fn default() -> Self {
        Self {
            state: ParseState::ReadArrayHeader,
        }
    }
}

impl RespFrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Scans for a `\r\n`-terminated line, returning it (without the terminator)
/// and advancing `src` past it. Returns `None` if the line isn't complete yet.
fn read_line(src: &mut BytesMut) -> Result<Option<Bytes>, CacheError> {
    match src.as_ref().windows(2).position(|w| w == b"\r\n") {
        Some(pos) => {
            let line = src.split_to(pos).freeze();
            src.advance(2);
            Ok(Some(line))
        }
        None => {
            if src.len() > MAX_HEADER_LINE {
                return Err(CacheError::Protocol("too long inline request".into()));
            }
            Ok(None)
        }
    }
}

fn parse_prefixed_int(line: &[u8], prefix: u8) -> Result<i64, CacheError> {
    if line.first().copied() != Some(prefix) {
        return Err(CacheError::Protocol(format!(
            "expected '{}', got {:?}",
            prefix as char,
            String::from_utf8_lossy(line)
        )));
    }
    std::str::from_utf8(&line[1..])
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| CacheError::Protocol("invalid multibulk length".into()))
}

impl Decoder for RespFrameCodec {
    type Item = RespFrame;
    type Error = CacheError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RespFrame>, CacheError> {
        loop {
            match &mut self.state {
                ParseState::ReadArrayHeader => {
                    let Some(line) = read_line(src)? else {
                        return Ok(None);
                    };
                    let n = parse_prefixed_int(&line, b'*')?;
                    if n == -1 {
                        return Ok(Some(RespFrame::NullArray));
                    }
                    if !(0..=MAX_ARRAY_LEN).contains(&n) {
                        return Err(CacheError::Protocol("invalid multibulk length".into()));
                    }
                    if n == 0 {
                        return Ok(Some(RespFrame::Array(Vec::new())));
                    }
                    self.state = ParseState::ReadBulkHeader {
                        remaining: n,
                        argv: Vec::with_capacity(n as usize),
                    };
                }
                ParseState::ReadBulkHeader { remaining, argv } => {
                    let Some(line) = read_line(src)? else {
                        return Ok(None);
                    };
                    let len = match parse_prefixed_int(&line, b'$') {
                        Ok(len) => len,
                        Err(e) => {
                            self.state = ParseState::ReadArrayHeader;
                            return Err(e);
                        }
                    };
                    if len == -1 {
                        argv.push(Bytes::new());
                        *remaining -= 1;
                        if *remaining == 0 {
                            let argv = std::mem::take(argv);
                            self.state = ParseState::ReadArrayHeader;
                            return Ok(Some(RespFrame::Array(
                                argv.into_iter().map(RespFrame::BulkString).collect(),
                            )));
                        }
                        continue;
                    }
                    if !(0..=MAX_BULK_LEN).contains(&len) {
                        self.state = ParseState::ReadArrayHeader;
                        return Err(CacheError::Protocol("invalid bulk length".into()));
                    }
                    self.state = ParseState::ReadBulkContent {
                        remaining: *remaining,
                        argv: std::mem::take(argv),
                        current_bulk: len as usize,
                    };
                }
                ParseState::ReadBulkContent {
                    remaining,
                    argv,
                    current_bulk,
                } => {
                    if src.len() < *current_bulk + 2 {
                        return Ok(None);
                    }
                    let data = src.split_to(*current_bulk).freeze();
                    src.advance(2);
                    argv.push(data);
                    *remaining -= 1;
                    if *remaining == 0 {
                        let argv = std::mem::take(argv);
                        self.state = ParseState::ReadArrayHeader;
                        return Ok(Some(RespFrame::Array(
                            argv.into_iter().map(RespFrame::BulkString).collect(),
                        )));
                    }
                    self.state = ParseState::ReadBulkHeader {
                        remaining: *remaining,
                        argv: std::mem::take(argv),
                    };
                }
            }
        }
    }
}

fn write_frame(frame: &RespFrame, dst: &mut BytesMut) {
    let mut int_buf = itoa::Buffer::new();
    match frame {
        RespFrame::SimpleString(s) => {
            dst.extend_from_slice(b"+");
            dst.extend_from_slice(s.as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
        RespFrame::Error(s) => {
            dst.extend_from_slice(b"-");
            dst.extend_from_slice(s.as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
        RespFrame::Integer(i) => {
            dst.extend_from_slice(b":");
            dst.extend_from_slice(int_buf.format(*i).as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
        RespFrame::BulkString(b) => {
            dst.extend_from_slice(b"$");
            dst.extend_from_slice(int_buf.format(b.len()).as_bytes());
            dst.extend_from_slice(b"\r\n");
            dst.extend_from_slice(b);
            dst.extend_from_slice(b"\r\n");
        }
        RespFrame::Null => dst.extend_from_slice(b"$-1\r\n"),
        RespFrame::NullArray => dst.extend_from_slice(b"*-1\r\n"),
        RespFrame::Array(items) => {
            dst.extend_from_slice(b"*");
            dst.extend_from_slice(int_buf.format(items.len()).as_bytes());
            dst.extend_from_slice(b"\r\n");
            for item in items {
                write_frame(item, dst);
            }
        }
    }
}

impl Encoder<RespFrame> for RespFrameCodec {
    type Error = CacheError;

    fn encode(&mut self, item: RespFrame, dst: &mut BytesMut) -> Result<(), CacheError> {
        write_frame(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<RespFrame> {
        let mut codec = RespFrameCodec::new();
        let mut buf = BytesMut::from(bytes);
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn decodes_inline_set_request() {
        let frames = decode_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
        assert_eq!(
            frames,
            vec![RespFrame::Array(vec![
                RespFrame::BulkString(Bytes::from_static(b"SET")),
                RespFrame::BulkString(Bytes::from_static(b"foo")),
                RespFrame::BulkString(Bytes::from_static(b"bar")),
            ])]
        );
    }

    #[test]
    fn decodes_frame_byte_by_byte() {
        let input = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n";
        let mut codec = RespFrameCodec::new();
        let mut buf = BytesMut::new();
        let mut result = None;
        for &byte in input {
            buf.extend_from_slice(&[byte]);
            if let Some(frame) = codec.decode(&mut buf).unwrap() {
                result = Some(frame);
            }
        }
        assert_eq!(
            result,
            Some(RespFrame::Array(vec![
                RespFrame::BulkString(Bytes::from_static(b"GET")),
                RespFrame::BulkString(Bytes::from_static(b"foo")),
            ]))
        );
    }

    #[test]
    fn rejects_oversized_multibulk_length() {
        let mut codec = RespFrameCodec::new();
        let mut buf = BytesMut::from(&b"*99999999999\r\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn encodes_bulk_get_reply() {
        let mut codec = RespFrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(RespFrame::BulkString(Bytes::from_static(b"bar")), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"$3\r\nbar\r\n");
    }

    #[test]
    fn encodes_nil_bulk_and_array() {
        let mut codec = RespFrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(RespFrame::Null, &mut buf).unwrap();
        assert_eq!(&buf[..], b"$-1\r\n");

        let mut buf = BytesMut::new();
        codec
            .encode(
                RespFrame::Array(vec![
                    RespFrame::BulkString(Bytes::from_static(b"1")),
                    RespFrame::Null,
                    RespFrame::Null,
                ]),
                &mut buf,
            )
            .unwrap();
        assert_eq!(&buf[..], b"*3\r\n$1\r\n1\r\n$-1\r\n$-1\r\n");
    }

    #[test]
    fn array_len_zero_round_trips() {
        let frames = decode_all(b"*0\r\n");
        assert_eq!(frames, vec![RespFrame::Array(Vec::new())]);
    }
}
