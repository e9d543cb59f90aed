// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Room connection management.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ ConnectionManager │────►│  Transport  │────►│   Backend   │
//! │  (state machine)  │◄────│   (trait)   │◄────│             │
//! └───────────────────┘     └─────────────┘     └─────────────┘
//!        │        ▲ lifecycle events
//!        ▼
//! ┌─────────────┐
//! │  SendQueue  │  (sends issued while disconnected)
//! └─────────────┘
//! ```
//!
//! # Features
//!
//! - One subscription per room, rebuilt from a callback side-table on reconnect
//! - Exponential backoff reconnection with a bounded attempt budget
//! - FIFO replay of sends queued while disconnected
//! - Bounded per-send retry with linear step backoff
//! - Heartbeat pings while connected
//! - Injectable transport trait for testing

mod manager;
mod queue;
mod transport;
mod websocket;

pub use manager::{reconnect_delay, ConnectionError, ConnectionManager};
pub use transport::{
    ChannelHandle, RoomCallbacks, Transport, TransportError, TransportEvent, TransportResult,
};
pub use websocket::WebSocketTransport;

#[cfg(test)]
mod manager_tests;


#[cfg(test)]
mod websocket_tests;
