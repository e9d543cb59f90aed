// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory collaborators shared by the unit tests.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use lifeline_core::{HealthCheckResult, HealthStatus, SystemHealth};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::backend::{BackendError, BackendResult, BlobStore, ResourceSampler, Storage};
use crate::connection::{
    ChannelHandle, RoomCallbacks, Transport, TransportError, TransportEvent, TransportResult,
};
use crate::health::{HealthSource, Probe, ProbeError, ProbeReport};
use crate::lock;
use crate::metrics::MetricsSink;

#[derive(Default)]
struct TransportState {
    next_id: u64,
    offline: bool,
    fail_opens: u32,
    fail_publishes: u32,
    fail_pings: bool,
    rejected_payloads: Vec<Value>,
    open_attempts: Vec<(String, Instant)>,
    closes: Vec<ChannelHandle>,
    publishes: Vec<(String, Value, Instant)>,
    channels: HashMap<u64, (String, RoomCallbacks)>,
}

/// Scriptable transport recording every call.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<TransportState>,
    sink: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// While offline every open fails.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    pub fn fail_next_opens(&self, n: u32) {
        lock(&self.state).fail_opens = n;
    }

    pub fn fail_next_publishes(&self, n: u32) {
        lock(&self.state).fail_publishes = n;
    }

    pub fn fail_pings(&self, fail: bool) {
        lock(&self.state).fail_pings = fail;
    }

    /// Every publish of exactly this payload fails.
    pub fn reject_payload(&self, payload: Value) {
        lock(&self.state).rejected_payloads.push(payload);
    }

    /// Pushes a lifecycle event to the installed sink.
    pub fn emit(&self, event: TransportEvent) {
        if let Some(sink) = lock(&self.sink).as_ref() {
            let _ = sink.send(event);
        }
    }

    /// Delivers an event to every open channel for `room`.
    pub fn deliver(&self, room: &str, payload: &Value) {
        let callbacks: Vec<RoomCallbacks> = lock(&self.state)
            .channels
            .values()
            .filter(|(r, _)| r == room)
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb.dispatch(payload);
        }
    }

    pub fn open_attempts(&self) -> Vec<String> {
        lock(&self.state)
            .open_attempts
            .iter()
            .map(|(room, _)| room.clone())
            .collect()
    }

    pub fn open_attempt_times(&self) -> Vec<Instant> {
        lock(&self.state)
            .open_attempts
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn closes(&self) -> Vec<ChannelHandle> {
        lock(&self.state).closes.clone()
    }

    /// Payloads of every publish attempt, successful or not.
    pub fn published(&self) -> Vec<Value> {
        lock(&self.state)
            .publishes
            .iter()
            .map(|(_, payload, _)| payload.clone())
            .collect()
    }

    pub fn publish_times(&self) -> Vec<Instant> {
        lock(&self.state)
            .publishes
            .iter()
            .map(|(_, _, at)| *at)
            .collect()
    }

    /// Rooms with an open channel, sorted.
    pub fn open_rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = lock(&self.state)
            .channels
            .values()
            .map(|(room, _)| room.clone())
            .collect();
        rooms.sort();
        rooms
    }
}

impl Transport for MockTransport {
    fn open(
        &self,
        room: &str,
        callbacks: RoomCallbacks,
    ) -> BoxFuture<'_, TransportResult<ChannelHandle>> {
        let room = room.to_string();
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.open_attempts.push((room.clone(), Instant::now()));
            if state.offline {
                return Err(TransportError::ConnectionFailed("offline".into()));
            }
            if state.fail_opens > 0 {
                state.fail_opens -= 1;
                return Err(TransportError::ConnectionFailed("scripted failure".into()));
            }
            state.next_id += 1;
            let id = state.next_id;
            state.channels.insert(id, (room.clone(), callbacks));
            Ok(ChannelHandle::new(id, room))
        })
    }

    fn close(&self, handle: ChannelHandle) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.channels.remove(&handle.id());
            state.closes.push(handle);
            Ok(())
        })
    }

    fn publish(
        &self,
        handle: &ChannelHandle,
        payload: Value,
    ) -> BoxFuture<'_, TransportResult<()>> {
        let room = handle.room().to_string();
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.publishes.push((room, payload.clone(), Instant::now()));
            if state.fail_publishes > 0 {
                state.fail_publishes -= 1;
                return Err(TransportError::SendFailed("scripted failure".into()));
            }
            if state.rejected_payloads.contains(&payload) {
                return Err(TransportError::Rejected("payload refused".into()));
            }
            Ok(())
        })
    }

    fn ping(&self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            if lock(&self.state).fail_pings {
                Err(TransportError::ConnectionClosed)
            } else {
                Ok(())
            }
        })
    }

    fn set_event_sink(&self, sink: mpsc::UnboundedSender<TransportEvent>) {
        *lock(&self.sink) = Some(sink);
    }
}

/// Storage and blob store double with a health switch.
pub struct MockBackend {
    healthy: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pings: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(MockBackend {
            healthy: AtomicBool::new(true),
            delay: Mutex::new(None),
            pings: AtomicUsize::new(0),
        })
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    fn respond(&self) -> BoxFuture<'_, BackendResult<()>> {
        Box::pin(async move {
            self.pings.fetch_add(1, Ordering::SeqCst);
            let delay = *lock(&self.delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(BackendError::Unavailable("mock backend down".into()))
            }
        })
    }
}

impl Storage for MockBackend {
    fn ping(&self) -> BoxFuture<'_, BackendResult<()>> {
        self.respond()
    }
}

impl BlobStore for MockBackend {
    fn ping(&self) -> BoxFuture<'_, BackendResult<()>> {
        self.respond()
    }
}

/// Memory sampler returning a fixed fraction, or an error when unset.
pub struct MockSampler {
    usage: Mutex<Option<f64>>,
}

impl MockSampler {
    pub fn new(usage: f64) -> Arc<Self> {
        Arc::new(MockSampler {
            usage: Mutex::new(Some(usage)),
        })
    }

    pub fn set(&self, usage: Option<f64>) {
        *lock(&self.usage) = usage;
    }
}

impl ResourceSampler for MockSampler {
    fn memory_usage(&self) -> BackendResult<f64> {
        lock(&self.usage)
            .ok_or_else(|| BackendError::Malformed("no sample".into()))
    }
}

/// Metrics sink remembering counter names.
#[derive(Default)]
pub struct RecordingMetrics {
    counters: Mutex<Vec<String>>,
    gauges: Mutex<Vec<(String, f64)>>,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, name: &str) -> usize {
        lock(&self.counters).iter().filter(|c| *c == name).count()
    }

    pub fn last_gauge(&self, name: &str) -> Option<f64> {
        lock(&self.gauges)
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

impl MetricsSink for RecordingMetrics {
    fn increment_counter(&self, name: &str, _tags: &[(&str, &str)]) {
        lock(&self.counters).push(name.to_string());
    }

    fn record_gauge(&self, name: &str, value: f64) {
        lock(&self.gauges).push((name.to_string(), value));
    }

    fn record_timing(&self, _name: &str, _start: Instant) {}
}

/// Probe answering from a script; repeats the last step once exhausted.
pub struct ScriptedProbe {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    calls: AtomicUsize,
}

#[derive(Clone)]
pub enum Step {
    Report(HealthStatus),
    Fail(&'static str),
    Sleep(Duration),
    Panic,
}

impl ScriptedProbe {
    pub fn new(name: &str, steps: Vec<Step>) -> Arc<Self> {
        let last = steps.last().cloned().unwrap_or(Step::Report(HealthStatus::Healthy));
        Arc::new(ScriptedProbe {
            name: name.to_string(),
            steps: Mutex::new(steps.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn healthy(name: &str) -> Arc<Self> {
        Self::new(name, vec![Step::Report(HealthStatus::Healthy)])
    }

    /// Replaces the script.
    pub fn then(&self, step: Step) {
        lock(&self.steps).clear();
        *lock(&self.last) = step;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Probe for ScriptedProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> BoxFuture<'_, Result<ProbeReport, ProbeError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = lock(&self.steps)
                .pop_front()
                .unwrap_or_else(|| lock(&self.last).clone());
            match step {
                Step::Report(status) => Ok(ProbeReport::new(status)),
                Step::Fail(reason) => Err(ProbeError::Failed(reason.to_string())),
                Step::Sleep(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(ProbeReport::ok())
                }
                Step::Panic => panic!("scripted probe panic"),
            }
        })
    }
}

/// Health source returning whatever the test last set.
pub struct FixedHealth {
    health: Mutex<SystemHealth>,
    calls: AtomicUsize,
}

impl FixedHealth {
    pub fn new() -> Arc<Self> {
        Arc::new(FixedHealth {
            health: Mutex::new(SystemHealth::from_checks(Vec::new(), 0)),
            calls: AtomicUsize::new(0),
        })
    }

    /// Sets the per-probe statuses returned from now on.
    pub fn set(&self, statuses: &[(&str, HealthStatus)]) {
        let checks = statuses
            .iter()
            .map(|(name, status)| HealthCheckResult::new(*name, *status, 1))
            .collect();
        *lock(&self.health) = SystemHealth::from_checks(checks, 0);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HealthSource for FixedHealth {
    fn check_health(&self) -> BoxFuture<'_, SystemHealth> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.health).clone()
        })
    }
}
