// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport multiplexing rooms over one socket.
//!
//! Every request frame carries an id; the backend answers with `ack`,
//! `pong` or `error` echoing it. Room events arrive unsolicited and are
//! fanned out to every channel open on that room. The socket is dialed
//! lazily by the first request and re-dialed after it drops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use lifeline_core::protocol::{ClientFrame, ServerFrame};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::transport::{
    ChannelHandle, RoomCallbacks, Transport, TransportError, TransportEvent, TransportResult,
};
use crate::lock;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the live socket.
struct Link {
    sink: SplitSink<WsStream, Message>,
    generation: u64,
}

struct Shared {
    link: tokio::sync::Mutex<Option<Link>>,
    generation: AtomicU64,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<ServerFrame>>>,
    channels: Mutex<HashMap<u64, (String, RoomCallbacks)>>,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    cancel: CancellationToken,
}

/// WebSocket transport implementation using tokio-tungstenite.
pub struct WebSocketTransport {
    url: String,
    shared: Arc<Shared>,
}

impl WebSocketTransport {
    /// Creates a transport for `url`. Nothing is dialed until first use.
    pub fn new(url: impl Into<String>) -> Self {
        WebSocketTransport {
            url: url.into(),
            shared: Arc::new(Shared {
                link: tokio::sync::Mutex::new(None),
                generation: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
                channels: Mutex::new(HashMap::new()),
                events: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a socket is currently up.
    pub async fn is_connected(&self) -> bool {
        self.shared.link.lock().await.is_some()
    }

    fn next_id(&self) -> u64 {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends `frame` and waits for the reply carrying its id.
    async fn request(&self, frame: ClientFrame) -> TransportResult<ServerFrame> {
        let id = frame.id();
        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.shared.pending).insert(id, reply_tx);

        if let Err(e) = self.write(&frame).await {
            lock(&self.shared.pending).remove(&id);
            return Err(e);
        }

        match reply_rx.await {
            Ok(ServerFrame::Error { message, .. }) => Err(TransportError::Rejected(message)),
            Ok(reply) => Ok(reply),
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }

    async fn write(&self, frame: &ClientFrame) -> TransportResult<()> {
        let json = frame
            .to_json()
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;

        let mut link = self.shared.link.lock().await;
        if link.is_none() {
            *link = Some(self.dial().await?);
        }
        let Some(live) = link.as_mut() else {
            return Err(TransportError::ConnectionClosed);
        };

        if let Err(e) = live.sink.send(Message::Text(json.into())).await {
            // Connection is broken, clear it
            *link = None;
            return Err(TransportError::SendFailed(e.to_string()));
        }
        if let Err(e) = live.sink.flush().await {
            *link = None;
            return Err(TransportError::SendFailed(e.to_string()));
        }
        Ok(())
    }

    /// Connects and spawns the reader for the new socket.
    async fn dial(&self) -> TransportResult<Link> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (sink, stream) = ws_stream.split();

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(read_loop(self.shared.clone(), stream, generation));

        debug!(url = %self.url, generation, "websocket connected");
        self.shared.emit(TransportEvent::Opened);
        Ok(Link { sink, generation })
    }
}

impl Shared {
    fn emit(&self, event: TransportEvent) {
        if let Some(events) = lock(&self.events).as_ref() {
            let _ = events.send(event);
        }
    }

    fn dispatch(&self, frame: ServerFrame) {
        if let ServerFrame::Event { room, payload } = &frame {
            let callbacks: Vec<RoomCallbacks> = lock(&self.channels)
                .values()
                .filter(|(r, _)| r == room)
                .map(|(_, cb)| cb.clone())
                .collect();
            for cb in callbacks {
                cb.dispatch(payload);
            }
            return;
        }

        let Some(id) = frame.reply_id() else { return };
        match lock(&self.pending).remove(&id) {
            Some(reply) => {
                let _ = reply.send(frame);
            }
            None => debug!(id, "reply for unknown request"),
        }
    }

    /// Forgets the socket for `generation` and fails everything waiting on it.
    async fn drop_link(&self, generation: u64, reason: String) {
        {
            let mut link = self.link.lock().await;
            if link.as_ref().map(|l| l.generation) == Some(generation) {
                *link = None;
            }
        }
        // dropping the senders wakes waiters with ConnectionClosed
        lock(&self.pending).clear();
        lock(&self.channels).clear();
        warn!(generation, reason = %reason, "websocket closed");
        self.emit(TransportEvent::Closed { reason });
    }
}

async fn read_loop(shared: Arc<Shared>, mut stream: SplitStream<WsStream>, generation: u64) {
    let reason = loop {
        let next = tokio::select! {
            _ = shared.cancel.cancelled() => return,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(Message::Text(text))) => match ServerFrame::from_json(&text) {
                Ok(frame) => shared.dispatch(frame),
                Err(e) => warn!(error = %e, "dropping malformed frame"),
            },
            Some(Ok(Message::Close(_))) => break "closed by peer".to_string(),
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                shared.emit(TransportEvent::Error {
                    message: e.to_string(),
                });
                break e.to_string();
            }
            None => break "stream ended".to_string(),
        }
    };
    shared.drop_link(generation, reason).await;
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl Transport for WebSocketTransport {
    fn open(
        &self,
        room: &str,
        callbacks: RoomCallbacks,
    ) -> BoxFuture<'_, TransportResult<ChannelHandle>> {
        let room = room.to_string();
        Box::pin(async move {
            let id = self.next_id();
            // registered first so events racing the ack are not lost
            lock(&self.shared.channels).insert(id, (room.clone(), callbacks));
            let frame = ClientFrame::Subscribe {
                id,
                room: room.clone(),
            };
            match self.request(frame).await {
                Ok(_) => Ok(ChannelHandle::new(id, room)),
                Err(e) => {
                    lock(&self.shared.channels).remove(&id);
                    Err(e)
                }
            }
        })
    }

    fn close(&self, handle: ChannelHandle) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let removed = lock(&self.shared.channels).remove(&handle.id());
            let room_still_open = lock(&self.shared.channels)
                .values()
                .any(|(r, _)| r == handle.room());
            if removed.is_none() || room_still_open || !self.is_connected().await {
                return Ok(());
            }
            let frame = ClientFrame::Unsubscribe {
                id: self.next_id(),
                room: handle.room().to_string(),
            };
            self.request(frame).await.map(|_| ())
        })
    }

    fn publish(
        &self,
        handle: &ChannelHandle,
        payload: Value,
    ) -> BoxFuture<'_, TransportResult<()>> {
        let handle = handle.clone();
        Box::pin(async move {
            if !lock(&self.shared.channels).contains_key(&handle.id()) {
                return Err(TransportError::ConnectionClosed);
            }
            let frame = ClientFrame::Publish {
                id: self.next_id(),
                room: handle.room().to_string(),
                payload,
            };
            self.request(frame).await.map(|_| ())
        })
    }

    fn ping(&self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            match self.request(ClientFrame::Ping { id: self.next_id() }).await? {
                ServerFrame::Pong { .. } => Ok(()),
                other => Err(TransportError::SerializationError(format!(
                    "expected pong, got {:?}",
                    other
                ))),
            }
        })
    }

    fn set_event_sink(&self, sink: mpsc::UnboundedSender<TransportEvent>) {
        *lock(&self.shared.events) = Some(sink);
    }
}
