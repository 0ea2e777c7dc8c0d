//! Engine.IO v4 / Socket.IO v5 framing, as spoken by the python-socketio backend.
//!
//! Every websocket text frame carries one Engine.IO packet: a single digit
//! type followed by its data. Socket.IO packets travel inside Engine.IO
//! `message` packets, so an event on the default namespace looks like
//! `42["edf_data",{"files":[]}]`.

use serde::Deserialize;
use serde_json::Value;

use crate::session::error::PacketError;

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, PacketError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let data = chars.as_str();
        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(data)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping),
            '3' => Ok(EnginePacket::Pong),
            '4' => Ok(EnginePacket::Message(data.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            kind => Err(PacketError::UnknownType {
                layer: "engine.io",
                kind,
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping => "2".to_string(),
            EnginePacket::Pong => "3".to_string(),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: Option<u64>,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

pub const DEFAULT_NAMESPACE: &str = "/";

impl SocketPacket {
    pub fn connect() -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data: None,
        }
    }

    /// A `null` payload sends the event without arguments.
    pub fn event(name: &str, payload: Value) -> Self {
        let args = match payload {
            Value::Null => Vec::new(),
            payload => vec![payload],
        };
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: None,
            name: name.to_string(),
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    pub fn decode(data: &str) -> Result<Self, PacketError> {
        let mut chars = data.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let mut rest = chars.as_str();

        let mut namespace = DEFAULT_NAMESPACE.to_string();
        if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            namespace = rest[..end].to_string();
            rest = rest.get(end + 1..).unwrap_or("");
        }

        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        let id = match digits {
            0 => None,
            _ => Some(
                rest[..digits]
                    .parse::<u64>()
                    .map_err(|err| PacketError::Payload(err.to_string()))?,
            ),
        };
        rest = &rest[digits..];

        let data = match rest {
            "" => None,
            json => Some(serde_json::from_str::<Value>(json)?),
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace, data }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let mut args = match data {
                    Some(Value::Array(args)) => args,
                    _ => {
                        return Err(PacketError::Payload(
                            "event data must be an array".to_string(),
                        ))
                    }
                };
                if args.is_empty() {
                    return Err(PacketError::Payload("event without a name".to_string()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(PacketError::Payload(format!(
                            "event name must be a string, got {other}"
                        )))
                    }
                };
                Ok(SocketPacket::Event {
                    namespace,
                    id,
                    name,
                    args,
                })
            }
            '3' => {
                let args = match data {
                    Some(Value::Array(args)) => args,
                    _ => Vec::new(),
                };
                Ok(SocketPacket::Ack {
                    namespace,
                    id,
                    args,
                })
            }
            '4' => Ok(SocketPacket::ConnectError { namespace, data }),
            kind => Err(PacketError::UnknownType {
                layer: "socket.io",
                kind,
            }),
        }
    }

    pub fn encode(&self) -> String {
        let prefix = |kind: char, namespace: &str| {
            if namespace == DEFAULT_NAMESPACE {
                kind.to_string()
            } else {
                format!("{kind}{namespace},")
            }
        };
        let json = |value: &Value| serde_json::to_string(value).unwrap_or_default();

        match self {
            SocketPacket::Connect { namespace, data } => {
                let mut out = prefix('0', namespace);
                if let Some(data) = data {
                    out.push_str(&json(data));
                }
                out
            }
            SocketPacket::Disconnect { namespace } => prefix('1', namespace),
            SocketPacket::Event {
                namespace,
                id,
                name,
                args,
            } => {
                let mut out = prefix('2', namespace);
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut array = vec![Value::String(name.clone())];
                array.extend(args.iter().cloned());
                out.push_str(&json(&Value::Array(array)));
                out
            }
            SocketPacket::Ack {
                namespace,
                id,
                args,
            } => {
                let mut out = prefix('3', namespace);
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                out.push_str(&json(&Value::Array(args.clone())));
                out
            }
            SocketPacket::ConnectError { namespace, data } => {
                let mut out = prefix('4', namespace);
                if let Some(data) = data {
                    out.push_str(&json(data));
                }
                out
            }
        }
    }

    /// Wraps the packet into the Engine.IO frame that goes on the wire.
    pub fn into_frame(self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

/// Collapses the argument list of an inbound event into one payload.
pub fn event_payload(mut args: Vec<Value>) -> Value {
    match args.len() {
        0 => Value::Null,
        1 => args.remove(0),
        _ => Value::Array(args),
    }
}
