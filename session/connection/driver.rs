use std::time::Duration;

use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::packet::{event_payload, EnginePacket, SocketPacket, DEFAULT_NAMESPACE};
use super::ChannelEvent;
use crate::session::error::{ConnectionError, PacketError};
use crate::session::SessionEvent;

/// Runs the websocket for the lifetime of one session. Lifecycle changes and
/// inbound events are posted to `events`; frames queued on `outbound` before
/// the namespace handshake completes are written right after it.
pub(super) async fn run(
    url: String,
    connect_timeout: Duration,
    mut outbound: UnboundedReceiver<String>,
    events: UnboundedSender<SessionEvent>,
    shutdown: CancellationToken,
) {
    let result = tokio::select! {
        _ = shutdown.cancelled() => {
            debug!("backend channel torn down");
            return;
        }
        result = drive(&url, connect_timeout, &mut outbound, &events) => result,
    };

    let event = match result {
        Ok(()) => {
            info!("backend channel closed");
            ChannelEvent::Closed
        }
        Err(err) => {
            warn!("backend channel failed: {err}");
            ChannelEvent::Errored(err.to_string())
        }
    };

    outbound.close();
    let mut dropped = 0;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        warn!("dropped {dropped} unsent message(s)");
    }

    events.send(SessionEvent::Channel(event)).ok();
}

async fn drive(
    url: &str,
    connect_timeout: Duration,
    outbound: &mut UnboundedReceiver<String>,
    events: &UnboundedSender<SessionEvent>,
) -> Result<(), ConnectionError> {
    info!("connecting to {url}");
    let (socket, _) = timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_| ConnectionError::Timeout("connecting to the backend"))??;
    let (mut sink, mut stream) = socket.split();

    let handshake = match next_packet(&mut stream, connect_timeout).await? {
        EnginePacket::Open(handshake) => handshake,
        other => {
            return Err(PacketError::Payload(format!("expected open packet, got {other:?}")).into())
        }
    };
    debug!("engine.io session {}", handshake.sid);

    sink.send(Message::Text(SocketPacket::connect().into_frame()))
        .await?;
    loop {
        match next_packet(&mut stream, connect_timeout).await? {
            EnginePacket::Ping => sink.send(Message::Text(EnginePacket::Pong.encode())).await?,
            EnginePacket::Message(data) => match SocketPacket::decode(&data)? {
                SocketPacket::Connect { namespace, .. } if namespace == DEFAULT_NAMESPACE => break,
                SocketPacket::ConnectError { data, .. } => {
                    let reason = data.map(|data| data.to_string()).unwrap_or_default();
                    return Err(ConnectionError::Refused(reason));
                }
                packet => debug!("ignoring {packet:?} before connect"),
            },
            EnginePacket::Close => return Err(ConnectionError::Closed),
            _ => {}
        }
    }
    events.send(SessionEvent::Channel(ChannelEvent::Opened)).ok();

    // only inbound traffic proves the backend is alive
    let heartbeat = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
    let deadline = sleep(heartbeat);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => sink.send(Message::Text(frame)).await?,
                None => {
                    sink.send(Message::Text(EnginePacket::Close.encode())).await.ok();
                    return Ok(());
                }
            },
            message = stream.next() => {
                deadline.as_mut().reset(Instant::now() + heartbeat);
                let Some(packet) = packet_of(message)? else {
                    continue;
                };
                match packet {
                    EnginePacket::Ping => sink.send(Message::Text(EnginePacket::Pong.encode())).await?,
                    EnginePacket::Message(data) => match SocketPacket::decode(&data) {
                        Ok(SocketPacket::Event { namespace, name, args, .. }) if namespace == DEFAULT_NAMESPACE => {
                            let event = ChannelEvent::Message {
                                event: name,
                                payload: event_payload(args),
                            };
                            events.send(SessionEvent::Channel(event)).ok();
                        }
                        Ok(SocketPacket::Disconnect { .. }) | Ok(SocketPacket::ConnectError { .. }) => {
                            return Ok(());
                        }
                        Ok(packet) => debug!("ignoring {packet:?}"),
                        Err(err) => warn!("discarding malformed packet: {err}"),
                    },
                    EnginePacket::Close => return Ok(()),
                    _ => {}
                }
            }
            _ = &mut deadline => return Err(ConnectionError::Timeout("waiting for the backend")),
        }
    }
}

/// The engine.io packet carried by a websocket message, if any.
fn packet_of(
    message: Option<Result<Message, tungstenite::Error>>,
) -> Result<Option<EnginePacket>, ConnectionError> {
    match message {
        None => Err(ConnectionError::Closed),
        Some(Err(err)) => Err(err.into()),
        Some(Ok(Message::Text(text))) => Ok(Some(EnginePacket::decode(&text)?)),
        Some(Ok(Message::Close(_))) => Ok(Some(EnginePacket::Close)),
        Some(Ok(_)) => Ok(None),
    }
}

async fn next_packet<S>(stream: &mut S, wait: Duration) -> Result<EnginePacket, ConnectionError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let message = timeout(wait, stream.next())
            .await
            .map_err(|_| ConnectionError::Timeout("waiting for the backend"))?;
        if let Some(packet) = packet_of(message)? {
            return Ok(packet);
        }
    }
}
