// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue of sends issued while the connection was down.
//!
//! Entries are replayed in enqueue order once the connection is back.
//! Every entry is settled exactly once: with the outcome of its replay,
//! or with [`ConnectionError::Destroyed`] when the manager is torn down.

use std::collections::VecDeque;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::manager::ConnectionError;

/// Receiver side handed back to the caller of `send`.
pub(crate) type SendReceipt = oneshot::Receiver<Result<(), ConnectionError>>;

/// One deferred send.
pub(crate) struct QueuedSend {
    pub room: String,
    pub payload: Value,
    pub enqueued_at: Instant,
    reply: oneshot::Sender<Result<(), ConnectionError>>,
}

impl QueuedSend {
    /// Creates an entry and the receipt its caller awaits.
    pub fn new(room: impl Into<String>, payload: Value) -> (Self, SendReceipt) {
        let (reply, receipt) = oneshot::channel();
        let entry = QueuedSend {
            room: room.into(),
            payload,
            enqueued_at: Instant::now(),
            reply,
        };
        (entry, receipt)
    }

    /// Delivers the outcome to the waiting caller.
    ///
    /// A caller that stopped waiting is not an error.
    pub fn settle(self, result: Result<(), ConnectionError>) {
        let _ = self.reply.send(result);
    }
}

/// FIFO of deferred sends.
#[derive(Default)]
pub(crate) struct SendQueue {
    entries: VecDeque<QueuedSend>,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: QueuedSend) {
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<QueuedSend> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry, oldest first.
    pub fn take_all(&mut self) -> Vec<QueuedSend> {
        self.entries.drain(..).collect()
    }
}
