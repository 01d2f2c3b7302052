// src/core/protocol/mod.rs

//! RESP wire protocol: the incremental frame codec and the simplified value
//! type the command layer produces.

mod resp_frame;
mod resp_value;

pub use resp_frame::{MAX_ARRAY_LEN, MAX_BULK_LEN, RespFrame, RespFrameCodec};
pub use resp_value::RespValue;
