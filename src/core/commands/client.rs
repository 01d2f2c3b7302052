// src/core/commands/client.rs

//! `CLIENT` subcommands: LIST, GETNAME, SETNAME.

use crate::core::errors::CacheError;
use crate::core::protocol::RespValue;
use crate::core::state::{ClientMap, ClientInfo};
use bytes::Bytes;

#[derive(Debug, Clone)]
pub enum ClientSubcommand {
    List,
    GetName,
    SetName { name: String },
}

pub fn parse_client(args: &[Bytes]) -> Result<ClientSubcommand, CacheError> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(CacheError::WrongArgumentCount("CLIENT".into()));
    };
    let sub = super::helpers::parse_utf8(sub)?.to_ascii_uppercase();
    match sub.as_str() {
        "LIST" => Ok(ClientSubcommand::List),
        "GETNAME" => Ok(ClientSubcommand::GetName),
        "SETNAME" => {
            super::helpers::require_arity(rest, 1, "CLIENT SETNAME")?;
            let name = super::helpers::parse_utf8(&rest[0])?.to_string();
            if name.contains(' ') || name.contains('\n') {
                return Err(CacheError::InvalidRequest(
                    "client names cannot contain spaces or newlines".into(),
                ));
            }
            Ok(ClientSubcommand::SetName { name })
        }
        other => Err(CacheError::UnknownCommand(format!("client {}", other.to_ascii_lowercase()))),
    }
}

pub async fn exec_client_list(clients: &ClientMap) -> RespValue {
    let mut lines = String::new();
    for entry in clients.iter() {
        let (info_lock, _) = entry.value();
        let info = info_lock.lock().await;
        lines.push_str(&format!(
            "id={} addr={} name={} age={}\n",
            info.id,
            info.addr,
            info.name.as_deref().unwrap_or(""),
            info.created.elapsed().as_secs(),
        ));
    }
    RespValue::BulkString(Bytes::from(lines))
}

pub async fn exec_client_getname(clients: &ClientMap, session_id: u64) -> RespValue {
    match clients.get(&session_id) {
        Some(entry) => {
            let (info_lock, _) = entry.value();
            let info = info_lock.lock().await;
            match &info.name {
                Some(name) => RespValue::BulkString(Bytes::from(name.clone())),
                None => RespValue::Null,
            }
        }
        None => RespValue::Null,
    }
}

pub async fn exec_client_setname(clients: &ClientMap, session_id: u64, name: String) -> RespValue {
    if let Some(entry) = clients.get(&session_id) {
        let (info_lock, _) = entry.value();
        let mut info = info_lock.lock().await;
        set_name(&mut info, name);
    }
    RespValue::SimpleString("OK".into())
}

fn set_name(info: &mut ClientInfo, name: String) {
    info.name = Some(name);
}
