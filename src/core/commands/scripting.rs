// src/core/commands/scripting.rs

//! `EVAL`/`EVALSHA` argv parsing. Execution itself is bridged through
//! `core::scripting::ScriptManager`, which needs a handle back into the
//! command dispatcher to run `redis.call`/`redis.pcall` bodies.

use super::Command;
use crate::core::errors::CacheError;
use bytes::Bytes;

pub fn parse_eval(args: &[Bytes], is_sha: bool) -> Result<Command, CacheError> {
    let name = if is_sha { "EVALSHA" } else { "EVAL" };
    super::helpers::require_arity(args, 2, name)?;
    let script_or_sha = args[0].clone();
    let num_keys = super::helpers::parse_usize(&args[1])?;
    let rest = &args[2..];
    if num_keys > rest.len() {
        return Err(CacheError::InvalidRequest("Number of keys can't be greater than number of args".into()));
    }
    let keys = rest[..num_keys].to_vec();
    let script_args = rest[num_keys..].to_vec();

    if is_sha {
        let sha1 = super::helpers::parse_utf8(&script_or_sha)?.to_ascii_lowercase();
        Ok(Command::EvalSha { sha1, keys, args: script_args })
    } else {
        Ok(Command::Eval { script: script_or_sha, keys, args: script_args })
    }
}
