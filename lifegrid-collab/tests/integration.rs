//! End-to-end tests against an in-process WebSocket server.
//!
//! The server side is scripted per test: each accepted connection is handed
//! back to the test, which reads and writes raw frames on it.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use lifegrid_collab::protocol::{Envelope, Inbound, MessageType, Outbound, WorldData};
use lifegrid_collab::{ClientConfig, ClientEvent, ConnectionPhase, SyncClient};
use lifegrid_core::{Command, PackedCell, Player};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerSide = WebSocketStream<TcpStream>;

/// Bind on a free port and forward each accepted WebSocket to the test.
async fn start_test_server() -> (String, mpsc::Receiver<ServerSide>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                if tx.send(ws).await.is_err() {
                    break;
                }
            }
        }
    });
    (format!("ws://127.0.0.1:{port}/ws"), rx)
}

fn fast_config(url: String) -> ClientConfig {
    ClientConfig {
        url,
        initial_retry: Duration::from_millis(20),
        max_retry: Duration::from_millis(80),
        ..ClientConfig::default()
    }
}

async fn next_event(rx: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for client event")
        .expect("event channel closed")
}

async fn accept(server: &mut mpsc::Receiver<ServerSide>) -> ServerSide {
    timeout(Duration::from_secs(5), server.recv())
        .await
        .expect("timed out waiting for connection")
        .expect("listener stopped")
}

/// Next binary frame the client sent, decoded as an outbound message.
async fn read_outbound(ws: &mut ServerSide) -> Outbound {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for client frame")
            .expect("client went away")
            .expect("read error");
        if let Message::Binary(data) = msg {
            let envelope = Envelope::decode(data).unwrap();
            return Outbound::decode(&envelope).unwrap().unwrap();
        }
    }
}

#[tokio::test]
async fn test_client_connects() {
    let (url, mut server) = start_test_server().await;
    let mut client = SyncClient::spawn(fast_config(url));
    let mut events = client.take_event_rx().unwrap();

    let _ws = accept(&mut server).await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    assert_eq!(client.phase(), ConnectionPhase::Connected);

    client.shutdown().await;
}

#[tokio::test]
async fn test_register_acknowledgement() {
    let (url, mut server) = start_test_server().await;
    let mut client = SyncClient::spawn(fast_config(url));
    let mut events = client.take_event_rx().unwrap();
    let handle = client.handle();

    let mut ws = accept(&mut server).await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    let alice = Player::new("alice", 0xFF88_0000);
    assert!(handle.send_frame(Outbound::Register(alice.clone()).encode()));

    // Echo the registration back, as the server does on acceptance.
    let received = read_outbound(&mut ws).await;
    assert_eq!(received, Outbound::Register(alice.clone()));
    let ack = Inbound::Registered(alice.clone()).encode();
    ws.send(Message::Binary(ack)).await.unwrap();

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Message(Inbound::Registered(alice))
    );
    assert_eq!(client.phase(), ConnectionPhase::Registered);

    client.shutdown().await;
}

#[tokio::test]
async fn test_commands_reach_server() {
    let (url, mut server) = start_test_server().await;
    let mut client = SyncClient::spawn(fast_config(url));
    let mut events = client.take_event_rx().unwrap();
    let handle = client.handle();

    let mut ws = accept(&mut server).await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    for command in [
        Command::TogglePause,
        Command::MarkCell { x: 10, y: 20 },
        Command::place_pattern("glider", 3, 4),
    ] {
        assert!(handle.send_frame(Outbound::Command(command.clone()).encode()));
        assert_eq!(read_outbound(&mut ws).await, Outbound::Command(command));
    }

    client.shutdown().await;
}

#[tokio::test]
async fn test_garbled_frame_does_not_block_next() {
    let (url, mut server) = start_test_server().await;
    let mut client = SyncClient::spawn(fast_config(url));
    let mut events = client.take_event_rx().unwrap();

    let mut ws = accept(&mut server).await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    let world = WorldData {
        width: 4,
        height: 2,
        cells: vec![PackedCell(0x03), PackedCell(0x02), PackedCell(0x03)],
        tick: 7,
        paused: false,
    };
    ws.send(Message::Binary(Bytes::from_static(&[0xFF, 0xFF, 0xFF])))
        .await
        .unwrap();
    // Unknown kinds are ignored too.
    let unknown = Envelope::new(MessageType::Unknown(99), Bytes::from_static(b"x"));
    ws.send(Message::Binary(unknown.encode())).await.unwrap();
    ws.send(Message::Text("hello".into())).await.unwrap();
    ws.send(Message::Binary(Inbound::World(world.clone()).encode()))
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Message(Inbound::World(world))
    );

    client.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_after_server_drop() {
    let (url, mut server) = start_test_server().await;
    let mut client = SyncClient::spawn(fast_config(url));
    let mut events = client.take_event_rx().unwrap();

    let ws = accept(&mut server).await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    drop(ws);
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Disconnected {
            retry_in: Duration::from_millis(40)
        }
    );

    let _ws = accept(&mut server).await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    assert_eq!(client.phase(), ConnectionPhase::Connected);

    client.shutdown().await;
}

#[tokio::test]
async fn test_backoff_without_server() {
    // Reserve a port, then free it so connects are refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut client = SyncClient::spawn(fast_config(format!("ws://127.0.0.1:{port}/ws")));
    let mut events = client.take_event_rx().unwrap();

    let mut delays = Vec::new();
    for _ in 0..4 {
        match next_event(&mut events).await {
            ClientEvent::Disconnected { retry_in } => delays.push(retry_in.as_millis()),
            other => panic!("expected Disconnected, got {other:?}"),
        }
    }
    assert_eq!(delays, vec![40, 80, 80, 80]);
    assert_eq!(client.phase(), ConnectionPhase::Unconnected);

    client.shutdown().await;
}

#[tokio::test]
async fn test_stalled_handshake_is_retried() {
    // Accepts TCP but never answers the upgrade request.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (accepted_tx, mut accepted) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
            if accepted_tx.send(()).await.is_err() {
                break;
            }
        }
    });

    let mut client = SyncClient::spawn(ClientConfig {
        connect_timeout: Duration::from_millis(100),
        watchdog_interval: Duration::from_millis(50),
        ..fast_config(format!("ws://127.0.0.1:{port}/ws"))
    });
    let mut events = client.take_event_rx().unwrap();

    for _ in 0..2 {
        timeout(Duration::from_secs(3), accepted.recv())
            .await
            .expect("client never retried a stalled handshake")
            .expect("listener stopped");
    }
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Disconnected {
            retry_in: Duration::from_millis(40)
        }
    );
    assert_eq!(client.phase(), ConnectionPhase::Unconnected);

    client.shutdown().await;
}

#[tokio::test]
async fn test_frames_dropped_while_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = SyncClient::spawn(fast_config(format!("ws://127.0.0.1:{port}/ws")));
    let handle = client.handle();
    // Accepted by the queue, then discarded by the driver: no writer exists.
    assert!(handle.send_frame(Outbound::Command(Command::TogglePause).encode()));
    assert_eq!(handle.phase(), ConnectionPhase::Unconnected);

    client.shutdown().await;
}
