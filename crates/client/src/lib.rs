// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! lifeline - client-side resilience layer for real-time room connections.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐ status ┌──────────────────┐ health ┌──────────────────┐
//! │ ConnectionManager│───────►│  HealthMonitor   │───────►│  RecoveryEngine  │
//! │ (rooms, backoff, │        │ (probes, sweeps, │        │ (priority, cool- │
//! │  send queue)     │        │  history, alerts)│        │  down, budgets)  │
//! └──────────────────┘        └──────────────────┘        └──────────────────┘
//!          ▲                                                       │
//!          └──────────────── reconnect / cache purge ──────────────┘
//! ```
//!
//! The three components form a feedback loop: remediation mutates the
//! connection or cache state, and the next sweep observes the effect.
//!
//! # Main Components
//!
//! - [`ConnectionManager`] - room subscriptions, reconnection, send queue
//! - [`HealthMonitor`] - concurrent probe sweeps with worst-of aggregation
//! - [`RecoveryEngine`] - rate-limited, priority-ordered remediation
//! - [`Config`] - TOML configuration for all three

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod backend;
pub mod cache;
pub mod config;
pub mod connection;
pub mod health;
pub mod metrics;
pub mod recovery;

#[cfg(test)]
mod test_support;

pub use backend::{BackendError, BlobStore, ProcMemorySampler, ResourceSampler, Storage};
pub use cache::{Cache, CacheStats, MemoryCache};
pub use config::{Config, ConfigError};
pub use connection::{
    ChannelHandle, ConnectionError, ConnectionManager, RoomCallbacks, Transport, TransportError,
    TransportEvent, WebSocketTransport,
};
pub use health::{HealthAlert, HealthMonitor, HealthSource, Probe, ProbeReport};
pub use metrics::{MetricsSink, NoopMetrics, TracingMetrics};
pub use recovery::{RecoveryAction, RecoveryEngine, RecoveryError, RecoveryPolicy, Remediation};

pub use lifeline_core::{
    ConnectionState, ConnectionStatus, ErrorKind, HealthCheckResult, HealthStatus, RecoveryAttempt,
    RecoveryStats, SystemHealth,
};

/// Locks a std mutex, recovering the guard if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
