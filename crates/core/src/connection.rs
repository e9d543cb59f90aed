// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state snapshots published by the connection manager.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle status of the streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No live connection and no reconnect pending.
    Disconnected,
    /// First connection attempt in flight.
    Connecting,
    /// Every room subscription is open.
    Connected,
    /// A reconnect attempt is scheduled or running.
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disconnected" => Ok(ConnectionStatus::Disconnected),
            "connecting" => Ok(ConnectionStatus::Connecting),
            "connected" => Ok(ConnectionStatus::Connected),
            "reconnecting" => Ok(ConnectionStatus::Reconnecting),
            _ => Err(Error::InvalidConnectionStatus(s.to_string())),
        }
    }
}

/// Point-in-time copy of the connection manager's state.
///
/// `reconnect_attempts` only returns to zero on a transition into
/// [`ConnectionStatus::Connected`] (or an explicit manual reconnect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
}

impl ConnectionState {
    pub fn new(max_reconnect_attempts: u32) -> Self {
        ConnectionState {
            status: ConnectionStatus::Disconnected,
            last_connected_at: None,
            reconnect_attempts: 0,
            max_reconnect_attempts,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// True once automatic reconnection has given up.
    pub fn is_exhausted(&self) -> bool {
        self.status == ConnectionStatus::Disconnected
            && self.reconnect_attempts >= self.max_reconnect_attempts
    }

    /// Human-readable status, e.g. "reconnecting (attempt 2/5)".
    pub fn status_string(&self) -> String {
        match self.status {
            ConnectionStatus::Reconnecting => format!(
                "reconnecting (attempt {}/{})",
                self.reconnect_attempts, self.max_reconnect_attempts
            ),
            ConnectionStatus::Disconnected if self.is_exhausted() => {
                "disconnected (gave up)".to_string()
            }
            status => status.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
