// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lifeline_core::error::{Classify, ErrorKind};
use lifeline_core::ConnectionStatus;
use serde_json::json;
use tokio::time::sleep;
use yare::parameterized;

use super::manager::{reconnect_delay, ConnectionError, ConnectionManager};
use super::transport::{RoomCallbacks, TransportEvent};
use crate::config::ConnectionConfig;
use crate::test_support::{MockTransport, RecordingMetrics};

fn config() -> ConnectionConfig {
    ConnectionConfig {
        max_reconnect_attempts: 3,
        base_reconnect_delay_ms: 100,
        send_retry_attempts: 3,
        send_retry_step_ms: 50,
        operation_timeout_ms: 1_000,
        heartbeat_interval_ms: 0,
    }
}

fn manager_with(config: ConnectionConfig) -> (ConnectionManager, Arc<MockTransport>, Arc<RecordingMetrics>) {
    let transport = MockTransport::new();
    let metrics = RecordingMetrics::new();
    let manager = ConnectionManager::new(config, transport.clone(), metrics.clone());
    (manager, transport, metrics)
}

fn manager() -> (ConnectionManager, Arc<MockTransport>, Arc<RecordingMetrics>) {
    manager_with(config())
}

fn closed() -> TransportEvent {
    TransportEvent::Closed {
        reason: "socket reset".into(),
    }
}

fn gaps_ms(times: &[tokio::time::Instant]) -> Vec<u128> {
    times
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).as_millis())
        .collect()
}

#[parameterized(
    first = { 0, 100 },
    second = { 1, 200 },
    third = { 2, 400 },
    tenth = { 9, 51_200 },
)]
fn reconnect_delay_doubles(attempts_made: u32, expected_ms: u64) {
    assert_eq!(
        reconnect_delay(Duration::from_millis(100), attempts_made),
        Duration::from_millis(expected_ms)
    );
}

#[test]
fn reconnect_delay_does_not_overflow() {
    assert_eq!(
        reconnect_delay(Duration::from_secs(1), 64),
        Duration::from_secs(u64::from(u32::MAX))
    );
}

#[parameterized(
    send_failed = { ConnectionError::SendFailed { room: "r".into(), attempts: 3, reason: "x".into() }, ErrorKind::RetryExhausted },
    destroyed = { ConnectionError::Destroyed, ErrorKind::Destroyed },
    not_subscribed = { ConnectionError::NotSubscribed("r".into()), ErrorKind::Configuration },
    transport = { ConnectionError::Transport(crate::connection::TransportError::ConnectionClosed), ErrorKind::TransientNetwork },
)]
fn connection_error_kinds(error: ConnectionError, kind: ErrorKind) {
    assert_eq!(error.kind(), kind);
}

#[tokio::test(start_paused = true)]
async fn first_subscribe_connects() {
    let (manager, transport, _) = manager();
    assert_eq!(manager.connection_status().status, ConnectionStatus::Disconnected);

    let handle = manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();

    assert_eq!(handle.room(), "lobby");
    let state = manager.connection_status();
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert!(state.last_connected_at.is_some());
    assert_eq!(transport.open_rooms(), vec!["lobby"]);
}

#[tokio::test(start_paused = true)]
async fn subscribe_events_reach_callbacks() {
    let (manager, transport, _) = manager();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager
        .subscribe("lobby", RoomCallbacks::new(move |v| sink.lock().unwrap().push(v.clone())))
        .await
        .unwrap();

    transport.deliver("lobby", &json!({"text": "hi"}));

    assert_eq!(*seen.lock().unwrap(), vec![json!({"text": "hi"})]);
}

#[tokio::test(start_paused = true)]
async fn resubscribe_closes_previous_channel() {
    let (manager, transport, _) = manager();
    let first = manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();
    let second = manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(transport.closes(), vec![first]);
    assert_eq!(transport.open_rooms(), vec!["lobby"]);
    assert_eq!(manager.rooms(), vec!["lobby"]);
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_twice_closes_once() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();

    manager.unsubscribe("lobby").await;
    manager.unsubscribe("lobby").await;

    assert_eq!(transport.closes().len(), 1);
    assert!(manager.rooms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn lost_connection_walks_through_reconnecting_back_to_connected() {
    let (manager, transport, metrics) = manager();
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    let callbacks =
        RoomCallbacks::noop().with_status(move |status| sink.lock().unwrap().push(status));
    manager.subscribe("lobby", callbacks).await.unwrap();

    transport.fail_next_opens(1);
    manager.handle_transport_event(closed());
    assert_eq!(manager.connection_status().status, ConnectionStatus::Reconnecting);
    assert_eq!(manager.connection_status().reconnect_attempts, 1);

    sleep(Duration::from_secs(5)).await;

    let state = manager.connection_status();
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert_eq!(state.reconnect_attempts, 0);
    assert_eq!(transport.open_rooms(), vec!["lobby"]);
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Reconnecting,
            ConnectionStatus::Reconnecting,
            ConnectionStatus::Connected,
        ]
    );
    assert_eq!(metrics.count("connection.reconnected"), 1);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_then_gives_up() {
    let (manager, transport, metrics) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();

    transport.set_offline(true);
    manager.handle_transport_event(closed());
    sleep(Duration::from_secs(60)).await;

    // initial open plus three failed reconnects
    let times = transport.open_attempt_times();
    assert_eq!(times.len(), 4);
    assert_eq!(gaps_ms(&times), vec![100, 200, 400]);

    let state = manager.connection_status();
    assert_eq!(state.status, ConnectionStatus::Disconnected);
    assert_eq!(state.reconnect_attempts, 3);
    assert!(state.is_exhausted());
    assert_eq!(metrics.count("connection.reconnect.exhausted"), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_resets_budget() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();
    transport.set_offline(true);
    manager.handle_transport_event(closed());
    sleep(Duration::from_secs(60)).await;
    assert!(manager.connection_status().is_exhausted());

    transport.set_offline(false);
    manager.reconnect().await;

    let state = manager.connection_status();
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert_eq!(state.reconnect_attempts, 0);
    assert_eq!(transport.open_rooms(), vec!["lobby"]);
}

#[tokio::test(start_paused = true)]
async fn subscribe_after_giving_up_reopens_every_room() {
    let (manager, transport, metrics) = manager();
    manager.subscribe("a", RoomCallbacks::noop()).await.unwrap();
    manager.subscribe("b", RoomCallbacks::noop()).await.unwrap();
    transport.set_offline(true);
    manager.handle_transport_event(closed());
    sleep(Duration::from_secs(10)).await;
    assert!(manager.connection_status().is_exhausted());

    transport.set_offline(false);
    let handle = manager.subscribe("c", RoomCallbacks::noop()).await.unwrap();

    assert_eq!(handle.room(), "c");
    let state = manager.connection_status();
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert_eq!(state.reconnect_attempts, 0);
    assert_eq!(transport.open_rooms(), vec!["a", "b", "c"]);
    assert_eq!(metrics.count("connection.reconnect.resubscribe"), 1);
    manager.send("a", json!({"n": 1})).await.unwrap();

    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_rooms(), vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn failed_subscribe_after_giving_up_resumes_backoff() {
    let (manager, transport, _) = manager();
    manager.subscribe("a", RoomCallbacks::noop()).await.unwrap();
    transport.set_offline(true);
    manager.handle_transport_event(closed());
    sleep(Duration::from_secs(10)).await;
    assert!(manager.connection_status().is_exhausted());

    let err = manager.subscribe("b", RoomCallbacks::noop()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    let state = manager.connection_status();
    assert_eq!(state.status, ConnectionStatus::Reconnecting);
    assert_eq!(state.reconnect_attempts, 1);

    transport.set_offline(false);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(manager.connection_status().status, ConnectionStatus::Connected);
    assert_eq!(transport.open_rooms(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn send_after_giving_up_is_queued_until_resubscribe() {
    let (manager, transport, _) = manager();
    manager.subscribe("a", RoomCallbacks::noop()).await.unwrap();
    transport.set_offline(true);
    manager.handle_transport_event(closed());
    sleep(Duration::from_secs(10)).await;

    let sender = manager.clone();
    let pending = tokio::spawn(async move { sender.send("a", json!({"n": 1})).await });
    sleep(Duration::from_millis(10)).await;
    assert_eq!(manager.queued_sends(), 1);

    transport.set_offline(false);
    manager.subscribe("b", RoomCallbacks::noop()).await.unwrap();

    pending.await.unwrap().unwrap();
    assert_eq!(manager.queued_sends(), 0);
    assert_eq!(transport.published(), vec![json!({"n": 1})]);
}

#[tokio::test(start_paused = true)]
async fn failed_manual_reconnect_restarts_backoff_from_base() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();
    transport.set_offline(true);
    manager.handle_transport_event(closed());
    sleep(Duration::from_secs(60)).await;

    manager.reconnect().await;
    assert_eq!(manager.connection_status().reconnect_attempts, 1);
    sleep(Duration::from_secs(60)).await;

    let times = transport.open_attempt_times();
    // 1 initial + 3 exhausted + 1 manual + 3 scheduled
    assert_eq!(times.len(), 8);
    assert_eq!(gaps_ms(&times[4..]), vec![100, 200, 400]);
}

#[tokio::test(start_paused = true)]
async fn closed_event_while_reconnecting_is_ignored() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();
    transport.set_offline(true);

    manager.handle_transport_event(closed());
    manager.handle_transport_event(closed());

    assert_eq!(manager.connection_status().reconnect_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn send_while_connected_publishes() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();

    manager.send("lobby", json!("hello")).await.unwrap();

    assert_eq!(transport.published(), vec![json!("hello")]);
}

#[tokio::test(start_paused = true)]
async fn send_to_unknown_room_fails_fast() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();

    let err = manager.send("elsewhere", json!(1)).await.unwrap_err();

    assert!(matches!(err, ConnectionError::NotSubscribed(room) if room == "elsewhere"));
    assert!(transport.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_retries_with_linear_step() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();
    transport.fail_next_publishes(2);

    manager.send("lobby", json!("x")).await.unwrap();

    let times = transport.publish_times();
    assert_eq!(times.len(), 3);
    assert_eq!(gaps_ms(&times), vec![50, 100]);
}

#[tokio::test(start_paused = true)]
async fn send_gives_up_after_budget() {
    let (manager, transport, metrics) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();
    transport.fail_next_publishes(10);

    let err = manager.send("lobby", json!("x")).await.unwrap_err();

    assert!(matches!(err, ConnectionError::SendFailed { attempts: 3, .. }));
    assert_eq!(err.kind(), ErrorKind::RetryExhausted);
    assert_eq!(transport.published().len(), 3);
    assert_eq!(metrics.count("connection.send.failed"), 1);
}

#[tokio::test(start_paused = true)]
async fn send_while_disconnected_settles_after_reconnect() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();
    transport.set_offline(true);
    manager.handle_transport_event(closed());

    let sender = manager.clone();
    let pending = tokio::spawn(async move { sender.send("lobby", json!("later")).await });
    while manager.queued_sends() < 1 {
        tokio::task::yield_now().await;
    }
    assert!(transport.published().is_empty());

    transport.set_offline(false);
    let result = pending.await.unwrap();

    assert!(result.is_ok());
    assert_eq!(transport.published(), vec![json!("later")]);
    assert_eq!(manager.queued_sends(), 0);
}

#[tokio::test(start_paused = true)]
async fn queued_sends_replay_in_order_past_a_failure() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();
    transport.set_offline(true);
    transport.reject_payload(json!("B"));
    manager.handle_transport_event(closed());

    let mut pending = Vec::new();
    for (i, payload) in ["A", "B", "C"].into_iter().enumerate() {
        let sender = manager.clone();
        pending.push(tokio::spawn(async move { sender.send("lobby", json!(payload)).await }));
        while manager.queued_sends() < i + 1 {
            tokio::task::yield_now().await;
        }
    }

    transport.set_offline(false);
    let mut results = Vec::new();
    for task in pending {
        results.push(task.await.unwrap());
    }

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(ConnectionError::SendFailed { attempts: 3, .. })));
    assert!(results[2].is_ok());
    assert_eq!(
        transport.published(),
        vec![json!("A"), json!("B"), json!("B"), json!("B"), json!("C")]
    );
}

#[tokio::test(start_paused = true)]
async fn destroy_rejects_queue_and_closes_rooms() {
    let (manager, transport, _) = manager();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();
    manager.subscribe("ops", RoomCallbacks::noop()).await.unwrap();
    transport.set_offline(true);
    manager.handle_transport_event(closed());

    let sender = manager.clone();
    let pending = tokio::spawn(async move { sender.send("lobby", json!("lost")).await });
    while manager.queued_sends() < 1 {
        tokio::task::yield_now().await;
    }

    manager.destroy().await;

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(ConnectionError::Destroyed)));
    assert!(manager.is_destroyed());
    assert!(manager.rooms().is_empty());
    assert_eq!(manager.connection_status().status, ConnectionStatus::Disconnected);

    // pending reconnect timer is gone
    let attempts = transport.open_attempts().len();
    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_attempts().len(), attempts);
}

#[tokio::test(start_paused = true)]
async fn operations_after_destroy_fail() {
    let (manager, _, _) = manager();
    manager.destroy().await;

    let sub = manager.subscribe("lobby", RoomCallbacks::noop()).await;
    let send = manager.send("lobby", json!(1)).await;

    assert!(matches!(sub, Err(ConnectionError::Destroyed)));
    assert!(matches!(send, Err(ConnectionError::Destroyed)));
}

#[tokio::test(start_paused = true)]
async fn failed_first_subscribe_keeps_room_for_reconnect() {
    let (manager, transport, _) = manager();
    transport.fail_next_opens(1);

    let err = manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    assert_eq!(manager.rooms(), vec!["lobby"]);

    sleep(Duration::from_secs(5)).await;

    assert_eq!(manager.connection_status().status, ConnectionStatus::Connected);
    assert_eq!(transport.open_rooms(), vec!["lobby"]);
}

#[tokio::test(start_paused = true)]
async fn transport_events_are_pumped_after_start() {
    let (manager, transport, _) = manager();
    manager.start();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();

    transport.emit(TransportEvent::Error {
        message: "boom".into(),
    });
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    assert_ne!(manager.connection_status().status, ConnectionStatus::Connected);
    manager.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn heartbeat_failure_triggers_reconnect() {
    let (manager, transport, metrics) = manager_with(ConnectionConfig {
        heartbeat_interval_ms: 1_000,
        ..config()
    });
    manager.start();
    manager.subscribe("lobby", RoomCallbacks::noop()).await.unwrap();

    transport.fail_pings(true);
    sleep(Duration::from_millis(1_050)).await;

    assert_eq!(metrics.count("connection.lost"), 1);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.connection_status().status, ConnectionStatus::Connected);
    assert!(transport.open_attempts().len() >= 2);
    manager.destroy().await;
}
