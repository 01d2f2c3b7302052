// src/core/scripting/mod.rs

//! Caches Lua scripts for `EVAL`/`EVALSHA` and bridges their body into the
//! command dispatcher through a sandboxed `cache.call`/`cache.pcall` pair.
//! Scripting is command-callback-only: there is no notion of a persistent
//! interpreter session, replication-aware script cache, or transaction
//! awareness, since none of those exist in this server.

use crate::core::errors::CacheError;
use crate::core::protocol::RespValue;
use crate::core::state::ServerState;
use bytes::Bytes;
use dashmap::DashMap;
use mlua::Lua;
use mlua::prelude::*;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::Arc;

/// Caches scripts submitted through `EVAL` (and registered for `EVALSHA`)
/// keyed by their lowercase hex SHA1 digest.
#[derive(Debug, Default)]
pub struct ScriptManager {
    scripts: DashMap<String, Bytes>,
}

impl ScriptManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes and stores a script, returning its SHA1 digest.
    pub fn load(&self, script: Bytes) -> String {
        let mut hasher = Sha1::new();
        hasher.update(&script);
        let sha1 = hex::encode(hasher.finalize());
        self.scripts.insert(sha1.clone(), script);
        sha1
    }

    pub fn get(&self, sha1: &str) -> Option<Bytes> {
        self.scripts.get(sha1).map(|v| v.value().clone())
    }

    pub fn get_all_scripts(&self) -> HashMap<String, Bytes> {
        self.scripts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn exists(&self, sha1s: &[String]) -> Vec<i64> {
        sha1s.iter().map(|sha1| self.scripts.contains_key(sha1) as i64).collect()
    }

    pub fn flush(&self) {
        self.scripts.clear();
    }

    /// `EVAL`: runs `script` directly, caching it under its SHA1 as a side
    /// effect so a later `EVALSHA` can find it.
    pub async fn eval_script(
        &self,
        state: &Arc<ServerState>,
        script: Bytes,
        keys: Vec<Bytes>,
        args: Vec<Bytes>,
        session_id: u64,
    ) -> Result<RespValue, CacheError> {
        self.load(script.clone());
        run_script(Arc::clone(state), script, keys, args, session_id).await
    }

    /// `EVALSHA`: looks the script up by its digest; `NOSCRIPT` if it was
    /// never submitted via `EVAL` (or `SCRIPT LOAD`, which we don't expose).
    pub async fn eval_sha(
        &self,
        state: &Arc<ServerState>,
        sha1: &str,
        keys: Vec<Bytes>,
        args: Vec<Bytes>,
        session_id: u64,
    ) -> Result<RespValue, CacheError> {
        let Some(script) = self.get(sha1) else {
            return Err(CacheError::Script(format!(
                "NOSCRIPT No matching script. Please use EVAL. ({sha1})"
            )));
        };
        run_script(Arc::clone(state), script, keys, args, session_id).await
    }
}

/// Runs `script` in a sandboxed `mlua::Lua` VM on a blocking thread, since
/// `mlua::Lua` isn't `Send`. `cache.call`/`cache.pcall` re-enter the command
/// dispatcher for each `redis.call`-style invocation from inside the script.
async fn run_script(
    state: Arc<ServerState>,
    script: Bytes,
    keys: Vec<Bytes>,
    args: Vec<Bytes>,
    session_id: u64,
) -> Result<RespValue, CacheError> {
    let join_result = tokio::task::spawn_blocking(move || -> mlua::Result<RespValue> {
        let lua = Lua::new();
        let globals = lua.globals();

        // Sandbox: a script can compute and call back into the keyspace, but
        // can't touch the filesystem, spawn processes, or exit the server.
        globals.set("loadfile", mlua::Value::Nil)?;
        globals.set("dofile", mlua::Value::Nil)?;
        globals.set("collectgarbage", mlua::Value::Nil)?;
        if let Ok(mlua::Value::Table(os_table)) = globals.get::<mlua::Value>("os") {
            os_table.set("execute", mlua::Value::Nil)?;
            os_table.set("exit", mlua::Value::Nil)?;
        }
        if let Ok(mlua::Value::Table(io_table)) = globals.get::<mlua::Value>("io") {
            io_table.set("open", mlua::Value::Nil)?;
            io_table.set("popen", mlua::Value::Nil)?;
        }

        let cache_table = lua.create_table()?;

        let call_state = Arc::clone(&state);
        let call_callback = lua.create_async_function(move |lua, call_args: mlua::Variadic<LuaValue>| {
            let state = Arc::clone(&call_state);
            async move {
                let command = build_command(call_args)?;
                match crate::core::handler::execute(&state, command, session_id).await {
                    Ok(resp) => resp_value_to_lua(&lua, resp),
                    Err(e) => Err(mlua::Error::external(e)),
                }
            }
        })?;
        cache_table.set("call", call_callback)?;

        let pcall_state = Arc::clone(&state);
        let pcall_callback = lua.create_async_function(move |lua, call_args: mlua::Variadic<LuaValue>| {
            let state = Arc::clone(&pcall_state);
            async move {
                let command = build_command(call_args)?;
                match crate::core::handler::execute(&state, command, session_id).await {
                    Ok(resp) => resp_value_to_lua(&lua, resp),
                    Err(e) => {
                        let err_table = lua.create_table()?;
                        err_table.set("err", e.to_resp_error_string())?;
                        Ok(LuaValue::Table(err_table))
                    }
                }
            }
        })?;
        cache_table.set("pcall", pcall_callback)?;

        globals.set("cache", cache_table)?;

        let keys_table = lua.create_table_from(keys.iter().enumerate().map(|(i, k)| (i + 1, k.as_ref())))?;
        globals.set("KEYS", keys_table)?;
        let argv_table = lua.create_table_from(args.iter().enumerate().map(|(i, a)| (i + 1, a.as_ref())))?;
        globals.set("ARGV", argv_table)?;

        drop(globals);

        let result: LuaValue =
            tokio::runtime::Handle::current().block_on(lua.load(&*script).eval_async())?;
        lua_to_resp_value(result)
    })
    .await;

    match join_result {
        Ok(Ok(resp)) => Ok(resp),
        Ok(Err(e)) => Err(CacheError::from(e)),
        Err(join_err) => Err(CacheError::Internal(format!("script task panicked: {join_err}"))),
    }
}

/// Builds the `Command` a `cache.call`/`cache.pcall` invocation requests from
/// its Lua argument list; every argument must be a string or number.
fn build_command(call_args: mlua::Variadic<LuaValue>) -> mlua::Result<crate::core::Command> {
    let mut argv = Vec::with_capacity(call_args.len());
    for val in call_args.into_iter() {
        argv.push(lua_to_resp_frame_bytes(val)?);
    }
    crate::core::Command::parse(argv).map_err(mlua::Error::external)
}

fn lua_to_resp_frame_bytes(val: LuaValue) -> mlua::Result<Bytes> {
    match val {
        LuaValue::String(s) => Ok(Bytes::copy_from_slice(&s.as_bytes())),
        LuaValue::Integer(i) => Ok(Bytes::from(i.to_string())),
        LuaValue::Number(n) => Ok(Bytes::from(n.to_string())),
        other => Err(mlua::Error::FromLuaConversionError {
            from: other.type_name(),
            to: "command argument".to_string(),
            message: Some("cache.call arguments must be strings or numbers".to_string()),
        }),
    }
}

fn resp_value_to_lua(lua: &Lua, value: RespValue) -> mlua::Result<LuaValue> {
    match value {
        RespValue::SimpleString(s) => s.into_lua(lua),
        RespValue::BulkString(b) => b.to_vec().into_lua(lua),
        RespValue::Integer(i) => i.into_lua(lua),
        RespValue::Null | RespValue::NullArray => Ok(LuaValue::Boolean(false)),
        RespValue::Error(e) => {
            let table = lua.create_table()?;
            table.set("err", e)?;
            Ok(LuaValue::Table(table))
        }
        RespValue::Array(items) => {
            let table = lua.create_table_with_capacity(items.len(), 0)?;
            for (i, item) in items.into_iter().enumerate() {
                table.set(i + 1, resp_value_to_lua(lua, item)?)?;
            }
            Ok(LuaValue::Table(table))
        }
    }
}

/// Converts the script's final return value into the client-facing reply.
fn lua_to_resp_value(val: LuaValue) -> mlua::Result<RespValue> {
    match val {
        LuaValue::Nil => Ok(RespValue::Null),
        LuaValue::Boolean(true) => Ok(RespValue::Integer(1)),
        LuaValue::Boolean(false) => Ok(RespValue::Null),
        LuaValue::Integer(i) => Ok(RespValue::Integer(i)),
        LuaValue::Number(n) => Ok(RespValue::Integer(n as i64)),
        LuaValue::String(s) => Ok(RespValue::BulkString(Bytes::copy_from_slice(&s.as_bytes()))),
        LuaValue::Table(t) => {
            if let Ok(err) = t.get::<String>("err") {
                return Ok(RespValue::Error(err));
            }
            if let Ok(ok) = t.get::<String>("ok") {
                return Ok(RespValue::SimpleString(ok));
            }
            let mut items = Vec::new();
            for pair in t.pairs::<LuaValue, LuaValue>() {
                let (_, v) = pair?;
                items.push(lua_to_resp_value(v)?);
            }
            Ok(RespValue::Array(items))
        }
        other => Err(mlua::Error::FromLuaConversionError {
            from: other.type_name(),
            to: "RespValue".to_string(),
            message: Some("unsupported Lua return type".to_string()),
        }),
    }
}

impl From<CacheError> for mlua::Error {
    fn from(e: CacheError) -> Self {
        mlua::Error::external(e)
    }
}
