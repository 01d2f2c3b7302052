// src/core/errors.rs

//! The central error type for the cache engine, spanning protocol parsing,
//! command execution, storage, cluster routing, and scripting.

use std::io;
use std::num::{ParseFloatError, ParseIntError};
use std::str::Utf8Error;
use std::sync::Arc;
use thiserror::Error;

/// All failure modes a command, session, or background task can surface.
///
/// `std::io::Error` isn't `Clone`, so it's wrapped in an `Arc` to let this
/// type derive `Clone`/`PartialEq` the way the rest of the command layer
/// expects (errors are frequently cloned into a RESP frame and logged).
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] Arc<io::Error>),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("incomplete frame")]
    IncompleteData,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("syntax error")]
    SyntaxError,

    #[error("wrong number of arguments for '{0}' command")]
    WrongArgumentCount(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("value is not an integer or out of range")]
    NotAnInteger,

    #[error("value is not a valid float")]
    NotAFloat,

    #[error("increment or decrement would overflow")]
    Overflow,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("could not acquire lock: {0}")]
    Locking(String),

    #[error("MOVED {slot} {addr}")]
    Moved { slot: u16, addr: String },

    #[error("ASK {slot} {addr}")]
    Ask { slot: u16, addr: String },

    #[error("CROSSSLOT Keys in request don't hash to the same slot")]
    CrossSlot,

    #[error("CLUSTERDOWN The cluster is down")]
    ClusterDown,

    #[error("script error: {0}")]
    Script(String),
}

impl PartialEq for CacheError {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl From<io::Error> for CacheError {
    fn from(e: io::Error) -> Self {
        CacheError::Io(Arc::new(e))
    }
}

impl From<ParseIntError> for CacheError {
    fn from(_: ParseIntError) -> Self {
        CacheError::NotAnInteger
    }
}

impl From<ParseFloatError> for CacheError {
    fn from(_: ParseFloatError) -> Self {
        CacheError::NotAFloat
    }
}

impl From<Utf8Error> for CacheError {
    fn from(_: Utf8Error) -> Self {
        CacheError::Protocol("invalid utf-8".into())
    }
}

impl From<std::string::FromUtf8Error> for CacheError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        CacheError::Protocol("invalid utf-8".into())
    }
}

impl From<mlua::Error> for CacheError {
    fn from(e: mlua::Error) -> Self {
        CacheError::Script(e.to_string())
    }
}

impl CacheError {
    /// Renders the error in the `-PREFIX message` shape a client expects on the wire.
    pub fn to_resp_error_string(&self) -> String {
        match self {
            CacheError::WrongType => self.to_string(),
            CacheError::Moved { .. } | CacheError::Ask { .. } | CacheError::CrossSlot => {
                self.to_string()
            }
            CacheError::ClusterDown => self.to_string(),
            _ => format!("ERR {self}"),
        }
    }
}
