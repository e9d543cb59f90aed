// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for room-multiplexed streaming connections.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production
//! - Mock transports for unit testing

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use lifeline_core::error::{Classify, ErrorKind};
use lifeline_core::ConnectionStatus;
use serde_json::Value;
use tokio::sync::mpsc;

/// Error type for transport operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Backend refused the request.
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// Operation did not finish in time.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl Classify for TransportError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransientNetwork
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Connection lifecycle notifications pushed by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The underlying connection came up.
    Opened,
    /// The underlying connection went away.
    Closed { reason: String },
    /// The underlying connection reported an error.
    Error { message: String },
}

/// Identifies one open room channel on a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    id: u64,
    room: String,
}

impl ChannelHandle {
    pub fn new(id: u64, room: impl Into<String>) -> Self {
        ChannelHandle {
            id,
            room: room.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn room(&self) -> &str {
        &self.room
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.room, self.id)
    }
}

type EventFn = dyn Fn(&Value) + Send + Sync;
type StatusFn = dyn Fn(ConnectionStatus) + Send + Sync;

/// Callbacks registered for a room.
///
/// Cheap to clone; the connection manager keeps a copy so the
/// subscription can be rebuilt identically after a reconnect.
#[derive(Clone)]
pub struct RoomCallbacks {
    on_event: Arc<EventFn>,
    on_status: Option<Arc<StatusFn>>,
}

impl RoomCallbacks {
    /// Creates callbacks invoking `on_event` for every room event.
    pub fn new<F>(on_event: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        RoomCallbacks {
            on_event: Arc::new(on_event),
            on_status: None,
        }
    }

    /// Callbacks that ignore everything.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Also invoke `on_status` whenever the connection status changes.
    pub fn with_status<F>(mut self, on_status: F) -> Self
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        self.on_status = Some(Arc::new(on_status));
        self
    }

    pub fn dispatch(&self, payload: &Value) {
        (self.on_event)(payload);
    }

    pub fn notify_status(&self, status: ConnectionStatus) {
        if let Some(on_status) = &self.on_status {
            on_status(status);
        }
    }
}

impl fmt::Debug for RoomCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomCallbacks")
            .field("on_status", &self.on_status.is_some())
            .finish_non_exhaustive()
    }
}

/// Transport trait for room-based streaming.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations.
pub trait Transport: Send + Sync {
    /// Opens a channel delivering events for `room` to `callbacks`.
    fn open(
        &self,
        room: &str,
        callbacks: RoomCallbacks,
    ) -> BoxFuture<'_, TransportResult<ChannelHandle>>;

    /// Closes a channel.
    fn close(&self, handle: ChannelHandle) -> BoxFuture<'_, TransportResult<()>>;

    /// Publishes a payload on a channel and waits for the backend's ack.
    fn publish(&self, handle: &ChannelHandle, payload: Value)
        -> BoxFuture<'_, TransportResult<()>>;

    /// Round-trips a keepalive.
    fn ping(&self) -> BoxFuture<'_, TransportResult<()>>;

    /// Installs the sink that receives lifecycle events.
    fn set_event_sink(&self, sink: mpsc::UnboundedSender<TransportEvent>);
}
