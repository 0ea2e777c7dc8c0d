use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("unsupported transport `{0}`, only `websocket` is available")]
    UnsupportedTransport(String),

    #[error("invalid backend endpoint `{uri}`: {reason}")]
    InvalidEndpoint { uri: String, reason: String },
}

/// Malformed Engine.IO / Socket.IO frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,

    #[error("unknown {layer} packet type `{kind}`")]
    UnknownType { layer: &'static str, kind: char },

    #[error("invalid packet payload: {0}")]
    Payload(String),
}

impl From<serde_json::Error> for PacketError {
    fn from(err: serde_json::Error) -> Self {
        PacketError::Payload(err.to_string())
    }
}

/// Failures of the backend channel. These are never raised to callers; the
/// driver reports them through the connection state.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not reach backend: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("timed out {0}")]
    Timeout(&'static str),

    #[error("backend refused the connection: {0}")]
    Refused(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] PacketError),

    #[error("backend closed the channel")]
    Closed,
}
