//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! An Engine.IO frame is a one-digit packet type followed by its payload.
//! Type `4` (message) carries a Socket.IO packet: its own type digit, an
//! optional `/namespace,` prefix, an optional ack id, then a JSON payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::DEFAULT_NAMESPACE;

/// Handshake data sent by the server in the Engine.IO open packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        payload: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        data: Value,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        data: Value,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine packet type {0:?}")]
    UnknownEngineType(char),
    #[error("unknown socket packet type {0:?}")]
    UnknownSocketType(char),
    #[error("binary packets are not supported")]
    Binary,
    #[error("invalid JSON payload: {0}")]
    Json(String),
    #[error("event payload must be a non-empty array starting with the event name")]
    EventShape,
    #[error("ack packet without id")]
    MissingAckId,
}

pub fn decode(frame: &str) -> Result<EnginePacket, WireError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(WireError::Empty)?;
    let rest = chars.as_str();

    match kind {
        '0' => {
            let info: OpenInfo =
                serde_json::from_str(rest).map_err(|e| WireError::Json(e.to_string()))?;
            Ok(EnginePacket::Open(info))
        }
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(WireError::UnknownEngineType(other)),
    }
}

fn decode_socket(frame: &str) -> Result<SocketPacket, WireError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(WireError::Empty)?;
    match kind {
        '0'..='4' => {}
        '5' | '6' => return Err(WireError::Binary),
        other => return Err(WireError::UnknownSocketType(other)),
    }
    let mut rest = chars.as_str();

    let namespace = if rest.starts_with('/') {
        match rest.find(',') {
            Some(idx) => {
                let ns = &rest[..idx];
                rest = &rest[idx + 1..];
                ns.to_string()
            }
            None => {
                let ns = rest.to_string();
                rest = "";
                ns
            }
        }
    } else {
        DEFAULT_NAMESPACE.to_string()
    };

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let ack_id = if digits > 0 {
        let id = rest[..digits].parse::<u64>().ok();
        rest = &rest[digits..];
        id
    } else {
        None
    };

    let payload = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(rest).map_err(|e| WireError::Json(e.to_string()))?)
    };

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace, payload }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let (name, data) = split_event(payload)?;
            Ok(SocketPacket::Event {
                namespace,
                ack_id,
                name,
                data,
            })
        }
        '3' => {
            let ack_id = ack_id.ok_or(WireError::MissingAckId)?;
            let data = match payload {
                Some(Value::Array(mut args)) if args.len() == 1 => args.remove(0),
                Some(other) => other,
                None => Value::Null,
            };
            Ok(SocketPacket::Ack {
                namespace,
                ack_id,
                data,
            })
        }
        '4' => {
            let message = match payload {
                Some(Value::Object(obj)) => obj
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                Some(Value::String(message)) => message,
                _ => String::new(),
            };
            Ok(SocketPacket::ConnectError { namespace, message })
        }
        '5' | '6' => Err(WireError::Binary),
        other => Err(WireError::UnknownSocketType(other)),
    }
}

/// `["name", data]` into its parts. Extra arguments are kept as an array.
fn split_event(payload: Option<Value>) -> Result<(String, Value), WireError> {
    let Some(Value::Array(mut args)) = payload else {
        return Err(WireError::EventShape);
    };
    if args.is_empty() {
        return Err(WireError::EventShape);
    }
    let name = match args.remove(0) {
        Value::String(name) => name,
        _ => return Err(WireError::EventShape),
    };
    let data = match args.len() {
        0 => Value::Null,
        1 => args.remove(0),
        _ => Value::Array(args),
    };
    Ok((name, data))
}

pub fn encode(packet: &EnginePacket) -> String {
    match packet {
        EnginePacket::Open(info) => {
            format!("0{}", serde_json::to_string(info).unwrap_or_default())
        }
        EnginePacket::Close => "1".to_string(),
        EnginePacket::Ping => "2".to_string(),
        EnginePacket::Pong => "3".to_string(),
        EnginePacket::Message(packet) => format!("4{}", encode_socket(packet)),
        EnginePacket::Upgrade => "5".to_string(),
        EnginePacket::Noop => "6".to_string(),
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE || namespace.is_empty() {
        String::new()
    } else {
        format!("{},", namespace)
    }
}

fn encode_socket(packet: &SocketPacket) -> String {
    match packet {
        SocketPacket::Connect { namespace, payload } => {
            let payload = payload
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_default();
            format!("0{}{}", namespace_prefix(namespace), payload)
        }
        SocketPacket::Disconnect { namespace } => format!("1{}", namespace_prefix(namespace)),
        SocketPacket::Event {
            namespace,
            ack_id,
            name,
            data,
        } => {
            let args = if data.is_null() {
                Value::Array(vec![Value::String(name.clone())])
            } else {
                Value::Array(vec![Value::String(name.clone()), data.clone()])
            };
            format!(
                "2{}{}{}",
                namespace_prefix(namespace),
                ack_id.map(|id| id.to_string()).unwrap_or_default(),
                args
            )
        }
        SocketPacket::Ack {
            namespace,
            ack_id,
            data,
        } => format!(
            "3{}{}{}",
            namespace_prefix(namespace),
            ack_id,
            Value::Array(vec![data.clone()])
        ),
        SocketPacket::ConnectError { namespace, message } => format!(
            "4{}{}",
            namespace_prefix(namespace),
            serde_json::json!({ "message": message })
        ),
    }
}
