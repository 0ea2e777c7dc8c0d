mod driver;
pub mod packet;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::error::SessionError;
use super::SessionEvent;
use packet::SocketPacket;

pub const DEFAULT_BACKEND_URI: &str = "http://127.0.0.1:7301";
pub const WEBSOCKET_TRANSPORT: &str = "websocket";

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Errored => "error",
        };
        f.write_str(label)
    }
}

/// Lifecycle and traffic of the backend channel, as reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Message { event: String, payload: Value },
    Errored(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_transports")]
    pub transports: Vec<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_uri() -> String {
    DEFAULT_BACKEND_URI.to_string()
}

fn default_transports() -> Vec<String> {
    vec![WEBSOCKET_TRANSPORT.to_string()]
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            transports: default_transports(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// The websocket URL of the Engine.IO endpoint behind `uri`.
    ///
    /// Only the `websocket` transport is spoken; there is no long-polling
    /// fallback, so any other configured transport is rejected.
    pub fn endpoint(&self) -> Result<Url, SessionError> {
        if let Some(other) = self
            .transports
            .iter()
            .find(|transport| transport.as_str() != WEBSOCKET_TRANSPORT)
        {
            return Err(SessionError::UnsupportedTransport(other.clone()));
        }
        if self.transports.is_empty() {
            return Err(SessionError::UnsupportedTransport(String::new()));
        }

        let invalid = |reason: &str| SessionError::InvalidEndpoint {
            uri: self.uri.clone(),
            reason: reason.to_string(),
        };
        let mut url = Url::parse(&self.uri).map_err(|err| invalid(&err.to_string()))?;
        match url.scheme() {
            "http" | "ws" => url
                .set_scheme("ws")
                .map_err(|_| invalid("cannot use a websocket scheme"))?,
            "https" | "wss" => return Err(invalid("TLS endpoints are not supported")),
            _ => return Err(invalid("expected an http:// or ws:// address")),
        }
        if url.path().is_empty() || url.path() == "/" {
            url.set_path("/socket.io/");
        }
        url.set_query(Some("EIO=4&transport=websocket"));
        Ok(url)
    }
}

type Handler = Box<dyn FnMut(&Value) + Send>;

/// The session's single channel to the backend.
///
/// Inbound events are not delivered by the driver task directly: they arrive
/// through the session event queue and are handed to the subscribed handlers
/// by [`Connection::handle`], on the task that owns the session.
pub struct Connection {
    state: ConnectionState,
    last_error: Option<String>,
    outbound: Option<UnboundedSender<String>>,
    handlers: HashMap<String, Vec<Handler>>,
    shutdown: Option<CancellationToken>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .field("subscriptions", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Connection {
    /// A connection that is never established.
    pub fn detached() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_error: None,
            outbound: None,
            handlers: HashMap::new(),
            shutdown: None,
        }
    }

    /// Starts connecting to the backend described by `config`.
    pub fn open(
        config: &ConnectionConfig,
        events: UnboundedSender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let url = config.endpoint()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        tokio::spawn(driver::run(
            url.to_string(),
            config.connect_timeout(),
            outbound_rx,
            events,
            shutdown.clone(),
        ));

        Ok(Self {
            state: ConnectionState::Connecting,
            last_error: None,
            outbound: Some(outbound_tx),
            handlers: HashMap::new(),
            shutdown: Some(shutdown),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Emits `event` with `payload`. Until the channel is connected the
    /// message waits in the driver's queue; it is dropped if the channel
    /// fails before that. Returns whether the message was queued at all.
    pub fn send(&self, event: &str, payload: Value) -> bool {
        let Some(outbound) = &self.outbound else {
            debug!("no backend channel, dropping `{event}`");
            return false;
        };
        if outbound
            .send(SocketPacket::event(event, payload).into_frame())
            .is_err()
        {
            warn!("backend channel is gone, dropping `{event}`");
            return false;
        }
        true
    }

    /// Subscribes `handler` to inbound `event`s.
    pub fn on<F>(&mut self, event: &str, handler: F)
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(Box::new(handler));
    }

    /// Applies a driver event. Returns the new state if it changed.
    pub fn handle(&mut self, event: ChannelEvent) -> Option<ConnectionState> {
        let next = match event {
            ChannelEvent::Opened => ConnectionState::Connected,
            ChannelEvent::Errored(reason) => {
                self.last_error = Some(reason);
                ConnectionState::Errored
            }
            ChannelEvent::Closed => ConnectionState::Disconnected,
            ChannelEvent::Message { event, payload } => {
                self.dispatch(&event, &payload);
                return None;
            }
        };
        if matches!(next, ConnectionState::Errored | ConnectionState::Disconnected) {
            self.outbound = None;
        }
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }

    fn dispatch(&mut self, event: &str, payload: &Value) {
        match self.handlers.get_mut(event) {
            Some(handlers) => {
                for handler in handlers.iter_mut() {
                    handler(payload);
                }
            }
            None => debug!("no handler for `{event}`"),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn endpoint_targets_the_engine_io_websocket() {
        let url = ConnectionConfig::default().endpoint().unwrap();
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:7301/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn endpoint_rejects_other_transports() {
        let config = ConnectionConfig {
            transports: vec!["websocket".to_string(), "polling".to_string()],
            ..Default::default()
        };
        assert_eq!(
            config.endpoint(),
            Err(SessionError::UnsupportedTransport("polling".to_string()))
        );
        assert!(ConnectionConfig::with_uri("https://loris.ca").endpoint().is_err());
        assert!(ConnectionConfig::with_uri("not a url").endpoint().is_err());
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut connection = Connection::detached();
        for label in ["first", "second"] {
            let seen = seen.clone();
            connection.on("bids", move |payload| {
                seen.lock().unwrap().push((label, payload.clone()));
            });
        }

        let changed = connection.handle(ChannelEvent::Message {
            event: "bids".to_string(),
            payload: json!({"output_time": "output-1"}),
        });
        connection.handle(ChannelEvent::Message {
            event: "response".to_string(),
            payload: json!({}),
        });

        assert_eq!(changed, None);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("first", json!({"output_time": "output-1"})),
                ("second", json!({"output_time": "output-1"})),
            ]
        );
    }

    #[test]
    fn lifecycle_events_drive_the_state() {
        let mut connection = Connection::detached();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(
            connection.handle(ChannelEvent::Opened),
            Some(ConnectionState::Connected)
        );
        assert_eq!(connection.handle(ChannelEvent::Opened), None);
        assert_eq!(
            connection.handle(ChannelEvent::Errored("reset".to_string())),
            Some(ConnectionState::Errored)
        );
        assert_eq!(connection.last_error(), Some("reset"));
    }

    #[test]
    fn sending_without_a_channel_is_refused() {
        let connection = Connection::detached();
        assert!(!connection.send("get_loris_projects", Value::Null));
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn failed_channel_stops_accepting_messages() {
        let (events, _rx) = mpsc::unbounded_channel();
        let mut connection =
            Connection::open(&ConnectionConfig::with_uri("http://127.0.0.1:9"), events).unwrap();
        assert!(connection.send("get_loris_projects", Value::Null));

        connection.handle(ChannelEvent::Errored("refused".to_string()));
        assert!(!connection.send("get_loris_projects", Value::Null));
    }
}
