// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn client_frame_wire_format() {
    let frame = ClientFrame::Publish {
        id: 7,
        room: "room-1".to_string(),
        payload: json!({"text": "hi"}),
    };
    let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
    assert_eq!(value["type"], "publish");
    assert_eq!(value["id"], 7);
    assert_eq!(value["room"], "room-1");
    assert_eq!(value["payload"]["text"], "hi");
}

#[test]
fn server_event_parses() {
    let json = r#"{"type":"event","room":"room-1","payload":{"n":1}}"#;
    let frame = ServerFrame::from_json(json).unwrap();
    assert_eq!(
        frame,
        ServerFrame::Event {
            room: "room-1".to_string(),
            payload: json!({"n": 1}),
        }
    );
    assert_eq!(frame.reply_id(), None);
}

#[parameterized(
    subscribe = { ClientFrame::Subscribe { id: 1, room: "r".into() }, 1 },
    unsubscribe = { ClientFrame::Unsubscribe { id: 2, room: "r".into() }, 2 },
    ping = { ClientFrame::Ping { id: 3 }, 3 },
)]
fn client_frame_id(frame: ClientFrame, expected: u64) {
    assert_eq!(frame.id(), expected);
}

#[parameterized(
    ack = { ServerFrame::Ack { id: 4 }, Some(4) },
    pong = { ServerFrame::Pong { id: 5 }, Some(5) },
    error = { ServerFrame::error(6, "nope"), Some(6) },
)]
fn server_reply_id(frame: ServerFrame, expected: Option<u64>) {
    assert_eq!(frame.reply_id(), expected);
}

#[test]
fn unknown_frame_type_is_rejected() {
    assert!(ServerFrame::from_json(r#"{"type":"bogus"}"#).is_err());
}
