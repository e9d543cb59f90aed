// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket frames exchanged between the room transport and the backend.
//!
//! The protocol is small:
//! - Client subscribes to rooms, publishes payloads and pings.
//! - Server acknowledges requests by id and pushes room events.
//!
//! Every client frame carries a client-chosen `id`; the server answers
//! with exactly one `Ack`, `Pong` or `Error` carrying the same id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start receiving events for a room.
    Subscribe { id: u64, room: String },

    /// Stop receiving events for a room.
    Unsubscribe { id: u64, room: String },

    /// Publish a payload to a room.
    Publish {
        id: u64,
        room: String,
        payload: Value,
    },

    /// Keepalive.
    Ping { id: u64 },
}

/// Frames sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Request with the given id succeeded.
    Ack { id: u64 },

    /// Answer to a Ping.
    Pong { id: u64 },

    /// Request with the given id failed.
    Error { id: u64, message: String },

    /// Event pushed to every subscriber of a room.
    Event { room: String, payload: Value },
}

impl ClientFrame {
    /// The request id this frame expects an answer for.
    pub fn id(&self) -> u64 {
        match self {
            ClientFrame::Subscribe { id, .. }
            | ClientFrame::Unsubscribe { id, .. }
            | ClientFrame::Publish { id, .. }
            | ClientFrame::Ping { id } => *id,
        }
    }

    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the frame from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerFrame {
    /// Creates an Error frame.
    pub fn error(id: u64, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            id,
            message: message.into(),
        }
    }

    /// Id of the request this frame answers, if it answers one.
    pub fn reply_id(&self) -> Option<u64> {
        match self {
            ServerFrame::Ack { id } | ServerFrame::Pong { id } | ServerFrame::Error { id, .. } => {
                Some(*id)
            }
            ServerFrame::Event { .. } => None,
        }
    }

    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the frame from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
