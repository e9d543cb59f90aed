// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection manager: room subscriptions, reconnection and send queuing.
//!
//! State machine:
//!
//! ```text
//! disconnected ──subscribe──► connecting ──open ok──► connected
//!      ▲                                                  │
//!      │ budget spent                        transport closes / heartbeat fails
//!      │                                                  ▼
//!      └──────────── reconnecting ◄──── schedule ──── disconnected
//!                        │  re-open every room
//!                        └──────────── ok ──────────► connected
//! ```
//!
//! Attempt `n` fires `base * 2^(n-1)` after it is scheduled. Once
//! `max_reconnect_attempts` is spent the manager stays disconnected until
//! [`ConnectionManager::reconnect`] is called or a new room is subscribed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use lifeline_core::error::{Classify, ErrorKind};
use lifeline_core::{ConnectionState, ConnectionStatus};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::queue::{QueuedSend, SendQueue};
use super::transport::{
    ChannelHandle, RoomCallbacks, Transport, TransportError, TransportEvent, TransportResult,
};
use crate::config::ConnectionConfig;
use crate::lock;
use crate::metrics::MetricsSink;

/// Error type for connection manager operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    /// Every publish attempt failed.
    #[error("send to room '{room}' failed after {attempts} attempts: {reason}")]
    SendFailed {
        room: String,
        attempts: u32,
        reason: String,
    },

    /// The manager was destroyed while the operation was pending.
    #[error("connection manager destroyed")]
    Destroyed,

    /// Send to a room nobody subscribed to.
    #[error("room '{0}' is not subscribed")]
    NotSubscribed(String),

    /// A newer subscribe for the same room replaced this one mid-flight.
    #[error("subscription to room '{0}' was replaced")]
    Superseded(String),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl Classify for ConnectionError {
    fn kind(&self) -> ErrorKind {
        match self {
            ConnectionError::SendFailed { .. } => ErrorKind::RetryExhausted,
            ConnectionError::Destroyed => ErrorKind::Destroyed,
            ConnectionError::NotSubscribed(_) => ErrorKind::Configuration,
            ConnectionError::Superseded(_) | ConnectionError::Transport(_) => {
                ErrorKind::TransientNetwork
            }
        }
    }
}

/// Result type for connection manager operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Delay before a reconnection attempt, given the attempts already made.
pub fn reconnect_delay(base: Duration, attempts_made: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempts_made))
}

/// Side-table entry: everything needed to rebuild a room subscription.
struct Subscription {
    id: u64,
    callbacks: RoomCallbacks,
    handle: Option<ChannelHandle>,
}

struct State {
    connection: ConnectionState,
    rooms: HashMap<String, Subscription>,
    queue: SendQueue,
    next_subscription_id: u64,
    draining: bool,
    destroyed: bool,
    /// Bumped by manual reconnects; timers armed under an older epoch do nothing.
    epoch: u64,
}

#[derive(Default)]
struct Tasks {
    reconnect: Option<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
}

struct Inner {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    metrics: Arc<dyn MetricsSink>,
    state: Mutex<State>,
    tasks: Mutex<Tasks>,
    cancel: CancellationToken,
}

/// Owns the logical streaming connection for every subscribed room.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

/// Outcome of a room lookup before publishing.
enum Channel {
    Open(ChannelHandle),
    Pending,
    Unknown,
}

impl ConnectionManager {
    /// Creates a manager. Call [`start`](Self::start) to receive transport
    /// lifecycle events and run the heartbeat.
    pub fn new(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let state = State {
            connection: ConnectionState::new(config.max_reconnect_attempts),
            rooms: HashMap::new(),
            queue: SendQueue::new(),
            next_subscription_id: 0,
            draining: false,
            destroyed: false,
            epoch: 0,
        };

        ConnectionManager {
            inner: Arc::new(Inner {
                config,
                transport,
                metrics,
                state: Mutex::new(state),
                tasks: Mutex::new(Tasks::default()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Spawns the lifecycle event pump and, if enabled, the heartbeat.
    pub fn start(&self) {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        self.inner.transport.set_event_sink(event_tx);

        let manager = self.clone();
        let cancel = self.inner.cancel.clone();
        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = event_rx.recv() => match event {
                        Some(event) => manager.handle_transport_event(event),
                        None => return,
                    },
                }
            }
        });

        let mut tasks = lock(&self.inner.tasks);
        tasks.background.push(pump);

        if let Some(period) = self.inner.config.heartbeat_interval() {
            let manager = self.clone();
            let cancel = self.inner.cancel.clone();
            tasks.background.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = ticker.tick() => manager.heartbeat().await,
                    }
                }
            }));
        }
    }

    /// Snapshot of the connection state.
    pub fn connection_status(&self) -> ConnectionState {
        lock(&self.inner.state).connection.clone()
    }

    /// Rooms currently in the subscription side-table, sorted.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<_> = lock(&self.inner.state).rooms.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Number of sends waiting for the connection to come back.
    pub fn queued_sends(&self) -> usize {
        lock(&self.inner.state).queue.len()
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner.state).destroyed
    }

    /// Opens (or re-opens) the subscription for `room`.
    ///
    /// Any existing subscription for the room is closed first. The
    /// callbacks are kept so the subscription survives reconnects, even
    /// when this first open fails.
    ///
    /// Subscribing while disconnected with other rooms in the side-table
    /// runs a full reconnect with a fresh budget, so no room is left closed.
    pub async fn subscribe(
        &self,
        room: &str,
        callbacks: RoomCallbacks,
    ) -> ConnectionResult<ChannelHandle> {
        let (sub_id, previous, resume) = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return Err(ConnectionError::Destroyed);
            }
            state.next_subscription_id += 1;
            let sub_id = state.next_subscription_id;
            let previous = state.rooms.insert(
                room.to_string(),
                Subscription {
                    id: sub_id,
                    callbacks: callbacks.clone(),
                    handle: None,
                },
            );
            let disconnected = state.connection.status == ConnectionStatus::Disconnected;
            let resume = if disconnected && state.rooms.len() > 1 {
                state.epoch += 1;
                state.connection.reconnect_attempts = 0;
                state.connection.status = ConnectionStatus::Reconnecting;
                Some((state.epoch, room_callbacks(&state)))
            } else {
                let fresh = state.rooms.values().all(|s| s.handle.is_none());
                if fresh && disconnected {
                    state.connection.status = ConnectionStatus::Connecting;
                }
                None
            };
            (sub_id, previous.and_then(|s| s.handle), resume)
        };

        if let Some(previous) = previous {
            if let Err(e) = self.close_channel(previous).await {
                debug!(room, error = %e, "closing replaced subscription failed");
            }
        }

        if let Some((epoch, callbacks)) = resume {
            return self.subscribe_by_reconnect(room, sub_id, epoch, &callbacks).await;
        }

        let handle = match self.open_channel(room, callbacks).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(room, error = %e, "subscribe failed");
                if matches!(e, TransportError::Rejected(_)) {
                    let mut state = lock(&self.inner.state);
                    if state.connection.status == ConnectionStatus::Connecting {
                        state.connection.status = ConnectionStatus::Disconnected;
                    }
                } else {
                    self.connection_lost(&e.to_string());
                }
                return Err(e.into());
            }
        };

        enum Outcome {
            Kept { connected_now: bool },
            Replaced,
            Destroyed,
        }

        let (outcome, callbacks) = {
            let mut state = lock(&self.inner.state);
            let outcome = if state.destroyed {
                Outcome::Destroyed
            } else {
                match state.rooms.get_mut(room) {
                    Some(sub) if sub.id == sub_id => {
                        sub.handle = Some(handle.clone());
                        let connected_now =
                            state.connection.status == ConnectionStatus::Connecting;
                        if connected_now {
                            mark_connected(&mut state.connection);
                        }
                        Outcome::Kept { connected_now }
                    }
                    _ => Outcome::Replaced,
                }
            };
            (outcome, room_callbacks(&state))
        };

        match outcome {
            Outcome::Kept { connected_now } => {
                self.inner
                    .metrics
                    .increment_counter("connection.subscribe", &[("room", room)]);
                info!(room, channel = %handle, "subscribed");
                if connected_now {
                    info!("connected");
                    notify(&callbacks, ConnectionStatus::Connected);
                    self.drain_queue().await;
                }
                Ok(handle)
            }
            Outcome::Replaced => {
                if let Err(e) = self.close_channel(handle).await {
                    debug!(room, error = %e, "closing superseded channel failed");
                }
                Err(ConnectionError::Superseded(room.to_string()))
            }
            Outcome::Destroyed => {
                if let Err(e) = self.close_channel(handle).await {
                    debug!(room, error = %e, "closing channel after destroy failed");
                }
                Err(ConnectionError::Destroyed)
            }
        }
    }

    /// Opens `room` together with every other room in the side-table.
    async fn subscribe_by_reconnect(
        &self,
        room: &str,
        sub_id: u64,
        epoch: u64,
        callbacks: &[RoomCallbacks],
    ) -> ConnectionResult<ChannelHandle> {
        info!(room, "subscribing while disconnected, re-opening every room");
        self.inner
            .metrics
            .increment_counter("connection.reconnect.resubscribe", &[]);
        notify(callbacks, ConnectionStatus::Reconnecting);

        let failure = self.attempt_reconnect(epoch).await;

        let handle = {
            let state = lock(&self.inner.state);
            if state.destroyed {
                return Err(ConnectionError::Destroyed);
            }
            match state.rooms.get(room) {
                Some(sub) if sub.id == sub_id => sub.handle.clone(),
                _ => return Err(ConnectionError::Superseded(room.to_string())),
            }
        };

        match (failure, handle) {
            (None, Some(handle)) => {
                self.inner
                    .metrics
                    .increment_counter("connection.subscribe", &[("room", room)]);
                info!(room, channel = %handle, "subscribed");
                Ok(handle)
            }
            (Some(e), _) => {
                warn!(room, error = %e, "subscribe failed");
                Err(e.into())
            }
            (None, None) => Err(TransportError::ConnectionClosed.into()),
        }
    }

    /// Releases the subscription for `room`. No-op if there is none.
    pub async fn unsubscribe(&self, room: &str) {
        let removed = lock(&self.inner.state).rooms.remove(room);
        let Some(subscription) = removed else {
            debug!(room, "unsubscribe: not subscribed");
            return;
        };

        if let Some(handle) = subscription.handle {
            if let Err(e) = self.close_channel(handle).await {
                warn!(room, error = %e, "closing channel failed");
            }
        }
        self.inner
            .metrics
            .increment_counter("connection.unsubscribe", &[("room", room)]);
        info!(room, "unsubscribed");
    }

    /// Sends `payload` to `room`.
    ///
    /// While connected the publish is retried up to `send_retry_attempts`
    /// times, waiting `n * send_retry_step` after failed attempt `n`. While
    /// not connected the send is queued and this future settles when the
    /// queued entry is replayed (or the manager is destroyed).
    pub async fn send(&self, room: &str, payload: Value) -> ConnectionResult<()> {
        let queued = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return Err(ConnectionError::Destroyed);
            }
            let connected = state.connection.status == ConnectionStatus::Connected;
            if connected && !state.draining && state.queue.is_empty() {
                None
            } else {
                let (entry, receipt) = QueuedSend::new(room, payload.clone());
                state.queue.push(entry);
                Some((receipt, state.queue.len(), connected && !state.draining))
            }
        };

        let Some((receipt, depth, kick)) = queued else {
            return self.send_with_retry(room, payload).await;
        };

        debug!(room, depth, "send queued until connected");
        self.inner
            .metrics
            .record_gauge("connection.queue.size", depth as f64);
        if kick {
            self.drain_queue().await;
        }
        receipt.await.unwrap_or(Err(ConnectionError::Destroyed))
    }

    /// Resets the attempt budget and reconnects immediately.
    ///
    /// If this attempt fails, backoff resumes from the first delay.
    pub async fn reconnect(&self) {
        let (epoch, callbacks) = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return;
            }
            state.epoch += 1;
            state.connection.reconnect_attempts = 0;
            state.connection.status = ConnectionStatus::Reconnecting;
            (state.epoch, room_callbacks(&state))
        };

        info!("manual reconnect requested");
        self.inner
            .metrics
            .increment_counter("connection.reconnect.manual", &[]);
        notify(&callbacks, ConnectionStatus::Reconnecting);
        self.attempt_reconnect(epoch).await;
    }

    /// Cancels every timer, closes every room and rejects queued sends.
    pub async fn destroy(&self) {
        let (handles, pending, callbacks) = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.connection.status = ConnectionStatus::Disconnected;
            let subscriptions: Vec<Subscription> = state.rooms.drain().map(|(_, s)| s).collect();
            let callbacks: Vec<RoomCallbacks> =
                subscriptions.iter().map(|s| s.callbacks.clone()).collect();
            let handles: Vec<ChannelHandle> =
                subscriptions.into_iter().filter_map(|s| s.handle).collect();
            (handles, state.queue.take_all(), callbacks)
        };

        self.inner.cancel.cancel();
        {
            let mut tasks = lock(&self.inner.tasks);
            if let Some(reconnect) = tasks.reconnect.take() {
                reconnect.abort();
            }
            for task in tasks.background.drain(..) {
                task.abort();
            }
        }

        let rejected = pending.len();
        for entry in pending {
            entry.settle(Err(ConnectionError::Destroyed));
        }

        for handle in handles {
            if let Err(e) = self.close_channel(handle).await {
                debug!(error = %e, "closing channel during destroy failed");
            }
        }

        notify(&callbacks, ConnectionStatus::Disconnected);
        info!(rejected, "connection manager destroyed");
    }

    /// Feeds a transport lifecycle event into the state machine.
    pub fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => debug!("transport opened"),
            TransportEvent::Closed { reason } => self.connection_lost(&reason),
            TransportEvent::Error { message } => self.connection_lost(&message),
        }
    }

    async fn heartbeat(&self) {
        if !self.connection_status().is_connected() {
            return;
        }
        let start = Instant::now();
        match self.with_timeout("ping", self.inner.transport.ping()).await {
            Ok(()) => {
                self.inner.metrics.record_timing("connection.heartbeat", start);
                debug!("heartbeat ok");
            }
            Err(e) => {
                warn!(error = %e, "heartbeat failed");
                self.connection_lost(&format!("heartbeat failed: {}", e));
            }
        }
    }

    /// Moves a live connection to disconnected and schedules reconnection.
    fn connection_lost(&self, reason: &str) {
        let callbacks = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return;
            }
            match state.connection.status {
                ConnectionStatus::Connected | ConnectionStatus::Connecting => {}
                ConnectionStatus::Disconnected | ConnectionStatus::Reconnecting => {
                    debug!(reason, "connection already down");
                    return;
                }
            }
            state.connection.status = ConnectionStatus::Disconnected;
            room_callbacks(&state)
        };

        warn!(reason, "connection lost");
        self.inner.metrics.increment_counter("connection.lost", &[]);
        notify(&callbacks, ConnectionStatus::Disconnected);
        self.schedule_reconnect();
    }

    /// Arms the one-shot reconnect timer, or gives up if the budget is spent.
    fn schedule_reconnect(&self) {
        enum Plan {
            Exhausted(u32),
            Retry { delay: Duration, attempt: u32, epoch: u64 },
        }

        let (plan, callbacks) = {
            let mut guard = lock(&self.inner.state);
            let state = &mut *guard;
            if state.destroyed {
                return;
            }
            let connection = &mut state.connection;
            let plan = if connection.reconnect_attempts >= connection.max_reconnect_attempts {
                connection.status = ConnectionStatus::Disconnected;
                Plan::Exhausted(connection.reconnect_attempts)
            } else {
                let delay = reconnect_delay(
                    self.inner.config.base_reconnect_delay(),
                    connection.reconnect_attempts,
                );
                connection.reconnect_attempts += 1;
                connection.status = ConnectionStatus::Reconnecting;
                Plan::Retry {
                    delay,
                    attempt: connection.reconnect_attempts,
                    epoch: state.epoch,
                }
            };
            (plan, room_callbacks(state))
        };

        match plan {
            Plan::Exhausted(attempts) => {
                warn!(attempts, "reconnect attempts exhausted, staying disconnected");
                self.inner
                    .metrics
                    .increment_counter("connection.reconnect.exhausted", &[]);
                notify(&callbacks, ConnectionStatus::Disconnected);
            }
            Plan::Retry {
                delay,
                attempt,
                epoch,
            } => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
                self.inner
                    .metrics
                    .increment_counter("connection.reconnect.scheduled", &[]);
                notify(&callbacks, ConnectionStatus::Reconnecting);

                let manager = self.clone();
                let cancel = self.inner.cancel.clone();
                let timer = tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            manager.attempt_reconnect(epoch).await;
                        }
                    }
                });
                // Replacing the handle detaches the timer that may be calling us.
                lock(&self.inner.tasks).reconnect = Some(timer);
            }
        }
    }

    /// Re-opens every room in the side-table with its stored callbacks.
    ///
    /// Returns the open error that failed this attempt, if any.
    async fn attempt_reconnect(&self, epoch: u64) -> Option<TransportError> {
        let rooms: Vec<(String, RoomCallbacks, Option<ChannelHandle>)> = {
            let mut state = lock(&self.inner.state);
            if state.destroyed || state.epoch != epoch {
                return None;
            }
            state
                .rooms
                .iter_mut()
                .map(|(room, sub)| (room.clone(), sub.callbacks.clone(), sub.handle.take()))
                .collect()
        };

        let start = Instant::now();
        let mut reopened = Vec::with_capacity(rooms.len());
        let mut failure = None;

        for (room, callbacks, stale) in rooms {
            if let Some(stale) = stale {
                if let Err(e) = self.close_channel(stale).await {
                    debug!(room = %room, error = %e, "closing stale channel failed");
                }
            }
            if failure.is_some() {
                continue;
            }
            match self.open_channel(&room, callbacks).await {
                Ok(handle) => reopened.push((room, handle)),
                Err(e) => failure = Some((room, e)),
            }
        }

        let (orphans, callbacks) = {
            let mut state = lock(&self.inner.state);
            if state.destroyed || state.epoch != epoch {
                let orphans: Vec<ChannelHandle> = reopened.into_iter().map(|(_, h)| h).collect();
                (orphans, None)
            } else {
                let mut orphans = Vec::new();
                for (room, handle) in reopened {
                    match state.rooms.get_mut(&room) {
                        Some(sub) if sub.handle.is_none() => sub.handle = Some(handle),
                        _ => orphans.push(handle),
                    }
                }
                if failure.is_none() {
                    mark_connected(&mut state.connection);
                } else {
                    state.connection.status = ConnectionStatus::Disconnected;
                }
                (orphans, Some(room_callbacks(&state)))
            }
        };

        for orphan in orphans {
            if let Err(e) = self.close_channel(orphan).await {
                debug!(error = %e, "closing orphaned channel failed");
            }
        }

        let Some(callbacks) = callbacks else {
            debug!("reconnect attempt superseded");
            return None;
        };

        match failure {
            None => {
                info!("reconnected");
                self.inner
                    .metrics
                    .increment_counter("connection.reconnected", &[]);
                self.inner
                    .metrics
                    .record_timing("connection.reconnect", start);
                notify(&callbacks, ConnectionStatus::Connected);
                self.drain_queue().await;
                None
            }
            Some((room, e)) => {
                warn!(room = %room, error = %e, "reconnect attempt failed");
                self.schedule_reconnect();
                Some(e)
            }
        }
    }

    /// Replays queued sends in FIFO order while connected.
    ///
    /// Each entry is attempted to completion before the next; a failed
    /// entry is rejected without blocking the rest.
    async fn drain_queue(&self) {
        {
            let mut state = lock(&self.inner.state);
            if state.draining || state.queue.is_empty() {
                return;
            }
            state.draining = true;
        }

        let mut replayed = 0usize;
        loop {
            let next = {
                let mut state = lock(&self.inner.state);
                let next = if state.destroyed
                    || state.connection.status != ConnectionStatus::Connected
                {
                    None
                } else {
                    state.queue.pop()
                };
                if next.is_none() {
                    state.draining = false;
                }
                next
            };
            let Some(entry) = next else { break };

            let waited_ms = entry.enqueued_at.elapsed().as_millis() as u64;
            let result = self.send_with_retry(&entry.room, entry.payload.clone()).await;
            debug!(room = %entry.room, waited_ms, ok = result.is_ok(), "replayed queued send");
            entry.settle(result);
            replayed += 1;
        }

        if replayed > 0 {
            info!(replayed, "drained send queue");
        }
        self.inner
            .metrics
            .record_gauge("connection.queue.size", self.queued_sends() as f64);
    }

    async fn send_with_retry(&self, room: &str, payload: Value) -> ConnectionResult<()> {
        let attempts = self.inner.config.send_retry_attempts.max(1);
        let step = self.inner.config.send_retry_step();
        let start = Instant::now();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let channel = {
                let state = lock(&self.inner.state);
                if state.destroyed {
                    return Err(ConnectionError::Destroyed);
                }
                match state.rooms.get(room) {
                    Some(Subscription {
                        handle: Some(handle),
                        ..
                    }) => Channel::Open(handle.clone()),
                    Some(_) => Channel::Pending,
                    None => Channel::Unknown,
                }
            };

            let result = match channel {
                Channel::Unknown => return Err(ConnectionError::NotSubscribed(room.to_string())),
                Channel::Pending => Err(TransportError::ConnectionClosed),
                Channel::Open(handle) => {
                    self.with_timeout("publish", self.inner.transport.publish(&handle, payload.clone()))
                        .await
                }
            };

            match result {
                Ok(()) => {
                    self.inner.metrics.record_timing("connection.send", start);
                    return Ok(());
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        let wait = step * attempt;
                        debug!(
                            room,
                            attempt,
                            wait_ms = wait.as_millis() as u64,
                            error = %e,
                            "send failed, retrying"
                        );
                        tokio::select! {
                            _ = self.inner.cancel.cancelled() => return Err(ConnectionError::Destroyed),
                            _ = tokio::time::sleep(wait) => {}
                        }
                    }
                }
            }
        }

        warn!(room, attempts, error = %last_error, "send failed after retries");
        self.inner
            .metrics
            .increment_counter("connection.send.failed", &[("room", room)]);
        Err(ConnectionError::SendFailed {
            room: room.to_string(),
            attempts,
            reason: last_error,
        })
    }

    async fn open_channel(
        &self,
        room: &str,
        callbacks: RoomCallbacks,
    ) -> TransportResult<ChannelHandle> {
        self.with_timeout("open", self.inner.transport.open(room, callbacks))
            .await
    }

    async fn close_channel(&self, handle: ChannelHandle) -> TransportResult<()> {
        self.with_timeout("close", self.inner.transport.close(handle))
            .await
    }

    /// Races a transport operation against the operation timeout.
    ///
    /// On timeout the operation is abandoned, not aborted.
    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = TransportResult<T>>,
    ) -> TransportResult<T> {
        let limit = self.inner.config.operation_timeout();
        match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                operation,
                after_ms: limit.as_millis() as u64,
            }),
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.connection_status())
            .field("rooms", &self.rooms())
            .finish()
    }
}

fn mark_connected(connection: &mut ConnectionState) {
    connection.status = ConnectionStatus::Connected;
    connection.reconnect_attempts = 0;
    connection.last_connected_at = Some(Utc::now());
}

fn room_callbacks(state: &State) -> Vec<RoomCallbacks> {
    state.rooms.values().map(|s| s.callbacks.clone()).collect()
}

fn notify(callbacks: &[RoomCallbacks], status: ConnectionStatus) {
    for callbacks in callbacks {
        callbacks.notify_status(status);
    }
}
