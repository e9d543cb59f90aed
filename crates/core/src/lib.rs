// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! lifeline-core: Shared data model for the lifeline resilience layer.
//!
//! This crate holds the plain values that cross component boundaries:
//! connection snapshots, probe results, aggregated health, recovery
//! attempts, the wire protocol of the WebSocket room transport, and the
//! error taxonomy every lifeline error is classified into.

pub mod connection;
pub mod error;
pub mod health;
pub mod protocol;
pub mod recovery;

pub use connection::{ConnectionState, ConnectionStatus};
pub use error::{Error, ErrorKind, Result};
pub use health::{HealthCheckResult, HealthStatus, SystemHealth};
pub use recovery::{ActionStats, RecoveryAttempt, RecoveryStats};
