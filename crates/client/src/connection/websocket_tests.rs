// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lifeline_core::protocol::{ClientFrame, ServerFrame};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use super::transport::{RoomCallbacks, Transport, TransportError, TransportEvent};
use super::websocket::WebSocketTransport;

/// Minimal room backend: acks everything, echoes publishes as events,
/// refuses room "forbidden" and hangs up on room "kick".
async fn spawn_backend() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                while let Some(Ok(Message::Text(text))) = ws.next().await {
                    let frame = ClientFrame::from_json(&text).unwrap();
                    let replies = match frame {
                        ClientFrame::Publish { room, .. } if room == "kick" => {
                            let _ = ws.close(None).await;
                            return;
                        }
                        ClientFrame::Publish { id, room, .. } if room == "forbidden" => {
                            vec![ServerFrame::error(id, "room is read-only")]
                        }
                        ClientFrame::Publish { id, room, payload } => vec![
                            ServerFrame::Event { room, payload },
                            ServerFrame::Ack { id },
                        ],
                        ClientFrame::Ping { id } => vec![ServerFrame::Pong { id }],
                        other => vec![ServerFrame::Ack { id: other.id() }],
                    };
                    for reply in replies {
                        let json = reply.to_json().unwrap();
                        ws.send(Message::Text(json.into())).await.unwrap();
                    }
                }
            });
        }
    });

    (format!("ws://{}", addr), connections)
}

fn recording_callbacks() -> (RoomCallbacks, Arc<Mutex<Vec<serde_json::Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callbacks = RoomCallbacks::new(move |v| sink.lock().unwrap().push(v.clone()));
    (callbacks, seen)
}

#[tokio::test]
async fn publish_is_acked_and_echo_reaches_room() {
    let (url, _) = spawn_backend().await;
    let transport = WebSocketTransport::new(url);
    let (callbacks, seen) = recording_callbacks();

    let handle = transport.open("lobby", callbacks).await.unwrap();
    transport
        .publish(&handle, json!({"text": "hello"}))
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!({"text": "hello"})]);
}

#[tokio::test]
async fn rooms_share_one_socket() {
    let (url, connections) = spawn_backend().await;
    let transport = WebSocketTransport::new(url);

    transport.open("a", RoomCallbacks::noop()).await.unwrap();
    transport.open("b", RoomCallbacks::noop()).await.unwrap();
    transport.ping().await.unwrap();

    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backend_error_is_rejection() {
    let (url, _) = spawn_backend().await;
    let transport = WebSocketTransport::new(url);
    let handle = transport.open("forbidden", RoomCallbacks::noop()).await.unwrap();

    let err = transport.publish(&handle, json!(1)).await.unwrap_err();

    assert!(matches!(err, TransportError::Rejected(msg) if msg == "room is read-only"));
}

#[tokio::test]
async fn publish_on_closed_channel_fails() {
    let (url, _) = spawn_backend().await;
    let transport = WebSocketTransport::new(url);
    let handle = transport.open("lobby", RoomCallbacks::noop()).await.unwrap();

    transport.close(handle.clone()).await.unwrap();
    let err = transport.publish(&handle, json!(1)).await.unwrap_err();

    assert!(matches!(err, TransportError::ConnectionClosed));
}

#[tokio::test]
async fn unreachable_backend_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let transport = WebSocketTransport::new(format!("ws://{}", addr));

    let err = transport.open("lobby", RoomCallbacks::noop()).await.unwrap_err();

    assert!(matches!(err, TransportError::ConnectionFailed(_)));
}

#[tokio::test]
async fn hangup_emits_closed_and_next_request_redials() {
    let (url, connections) = spawn_backend().await;
    let transport = WebSocketTransport::new(url);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    transport.set_event_sink(events_tx);

    let kick = transport.open("kick", RoomCallbacks::noop()).await.unwrap();
    assert_eq!(events_rx.recv().await, Some(TransportEvent::Opened));

    let err = transport.publish(&kick, json!(1)).await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectionClosed));

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events_rx.recv().await {
                Some(TransportEvent::Closed { .. }) => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    })
    .await
    .unwrap();
    assert!(closed);
    assert!(!transport.is_connected().await);

    transport.open("lobby", RoomCallbacks::noop()).await.unwrap();
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}
