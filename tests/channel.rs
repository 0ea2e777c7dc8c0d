use std::time::Duration;

use eeg2bids::session::{
    ChannelEvent, ConnectionConfig, ConnectionState, Session, SessionEvent, SessionOptions,
};
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const OPEN: &str = r#"0{"sid":"zXq8","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

async fn next_text<S>(stream: &mut S) -> String
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return text,
            Some(Ok(_)) => continue,
            other => panic!("backend lost the client: {other:?}"),
        }
    }
}

fn options(uri: String) -> SessionOptions {
    SessionOptions {
        splash_delay: Duration::from_secs(3600),
        backend: Some(ConnectionConfig::with_uri(uri)),
    }
}

async fn next_channel_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> ChannelEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no channel event in time")
            .expect("session events closed");
        if let SessionEvent::Channel(event) = event {
            return event;
        }
    }
}

#[tokio::test]
async fn exchanges_events_with_a_socketio_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let backend = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let socket = accept_async(tcp).await.unwrap();
        let (mut sink, mut stream) = socket.split();

        sink.send(Message::Text(OPEN.to_string())).await.unwrap();
        assert_eq!(next_text(&mut stream).await, "40");
        sink.send(Message::Text(r#"40{"sid":"nsp1"}"#.to_string()))
            .await
            .unwrap();

        sink.send(Message::Text("2".to_string())).await.unwrap();

        // the pong and the queued event may arrive in either order
        let mut frames = vec![next_text(&mut stream).await, next_text(&mut stream).await];
        let pong = frames.iter().position(|frame| frame == "3").expect("no pong");
        frames.remove(pong);
        let request = frames.remove(0);

        sink.send(Message::Text(
            r#"42["response",{"file_paths":["sub-01"],"result":[true]}]"#.to_string(),
        ))
        .await
        .unwrap();
        request
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = Session::start(&options(format!("http://{addr}")), tx);
    assert_eq!(session.connection_state(), ConnectionState::Connecting);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Value>();
    session.on("response", move |payload| {
        seen_tx.send(payload.clone()).ok();
    });

    // queued until the namespace handshake completes
    session.emit(
        "validate_bids",
        json!({"bids_directory": "/out", "output_time": "output-1"}),
    );

    let opened = next_channel_event(&mut rx).await;
    assert_eq!(opened, ChannelEvent::Opened);
    session.handle(SessionEvent::Channel(opened));
    assert_eq!(session.connection_state(), ConnectionState::Connected);

    let message = next_channel_event(&mut rx).await;
    session.handle(SessionEvent::Channel(message));
    assert_eq!(
        seen_rx.try_recv().unwrap(),
        json!({"file_paths": ["sub-01"], "result": [true]})
    );

    assert_eq!(
        backend.await.unwrap(),
        r#"42["validate_bids",{"bids_directory":"/out","output_time":"output-1"}]"#
    );
}

#[tokio::test]
async fn unreachable_backend_ends_in_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = Session::start(&options(format!("http://{addr}")), tx);
    session.emit("get_loris_projects", Value::Null);

    let event = next_channel_event(&mut rx).await;
    assert!(matches!(event, ChannelEvent::Errored(_)));
    session.handle(SessionEvent::Channel(event));
    assert_eq!(session.connection_state(), ConnectionState::Errored);
    assert!(session.connection().last_error().is_some());
}

#[tokio::test]
async fn backend_disconnect_closes_the_channel() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let socket = accept_async(tcp).await.unwrap();
        let (mut sink, mut stream) = socket.split();
        sink.send(Message::Text(OPEN.to_string())).await.unwrap();
        next_text(&mut stream).await;
        sink.send(Message::Text("40".to_string())).await.unwrap();
        sink.send(Message::Text("41".to_string())).await.unwrap();
        // keep the socket open until the client hangs up
        while stream.next().await.is_some() {}
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = Session::start(&options(format!("http://{addr}")), tx);

    assert_eq!(next_channel_event(&mut rx).await, ChannelEvent::Opened);
    assert_eq!(next_channel_event(&mut rx).await, ChannelEvent::Closed);
    session.handle(SessionEvent::Channel(ChannelEvent::Closed));
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn silent_backend_times_out_while_the_client_keeps_sending() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let socket = accept_async(tcp).await.unwrap();
        let (mut sink, mut stream) = socket.split();
        let open = r#"0{"sid":"zXq8","upgrades":[],"pingInterval":100,"pingTimeout":100,"maxPayload":1000000}"#;
        sink.send(Message::Text(open.to_string())).await.unwrap();
        next_text(&mut stream).await;
        sink.send(Message::Text("40".to_string())).await.unwrap();
        // read everything, answer nothing, never ping
        while stream.next().await.is_some() {}
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = Session::start(&options(format!("http://{addr}")), tx);
    assert_eq!(next_channel_event(&mut rx).await, ChannelEvent::Opened);

    let started = tokio::time::Instant::now();
    let failure = loop {
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "outbound traffic kept a silent backend alive"
        );
        session.emit("get_loris_projects", Value::Null);
        match tokio::time::timeout(Duration::from_millis(20), rx.recv()).await {
            Ok(Some(SessionEvent::Channel(event))) => break event,
            Ok(Some(_)) | Err(_) => continue,
            Ok(None) => panic!("session events closed"),
        }
    };
    assert!(matches!(failure, ChannelEvent::Errored(_)), "{failure:?}");
}
