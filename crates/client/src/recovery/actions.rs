// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in remediation actions.
//!
//! | id                    | trigger                   | priority | cooldown | retries |
//! |-----------------------|---------------------------|----------|----------|---------|
//! | `reconnect-backend`   | storage unhealthy         | 10       | 30 s     | 3       |
//! | `reconnect-messaging` | connection unhealthy      | 9        | 30 s     | 5       |
//! | `restart-streaming`   | realtime unhealthy        | 8        | 60 s     | 3       |
//! | `relieve-memory`      | memory unhealthy          | 7        | 120 s    | 2       |
//! | `verify-blob-storage` | blob storage unhealthy    | 6        | 60 s     | 3       |
//! | `clear-cache`         | cache degraded or worse   | 5        | 300 s    | 3       |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use lifeline_core::{HealthStatus, SystemHealth};

use super::action::{RecoveryAction, RecoveryPolicy, RemediationError};
use crate::backend::{BlobStore, ResourceSampler, Storage};
use crate::cache::Cache;
use crate::config::ActionOverride;
use crate::connection::{ConnectionManager, Transport};
use crate::health::probes::{self, MemoryProbe};

pub const RECONNECT_BACKEND: &str = "reconnect-backend";
pub const RECONNECT_MESSAGING: &str = "reconnect-messaging";
pub const RESTART_STREAMING: &str = "restart-streaming";
pub const RELIEVE_MEMORY: &str = "relieve-memory";
pub const VERIFY_BLOB_STORAGE: &str = "verify-blob-storage";
pub const CLEAR_CACHE: &str = "clear-cache";

/// Wait after a forced reconnect before reading the connection status.
pub const RECONNECT_GRACE: Duration = Duration::from_millis(500);

/// Ids of every built-in action, highest priority first.
pub const DEFAULT_ACTION_IDS: &[&str] = &[
    RECONNECT_BACKEND,
    RECONNECT_MESSAGING,
    RESTART_STREAMING,
    RELIEVE_MEMORY,
    VERIFY_BLOB_STORAGE,
    CLEAR_CACHE,
];

/// Collaborators the built-in actions act upon.
#[derive(Clone)]
pub struct RecoveryContext {
    pub storage: Arc<dyn Storage>,
    pub connection: ConnectionManager,
    pub transport: Arc<dyn Transport>,
    pub blobs: Arc<dyn BlobStore>,
    pub sampler: Arc<dyn ResourceSampler>,
    pub cache: Arc<dyn Cache>,
}

fn unhealthy(probe: &'static str) -> impl Fn(&SystemHealth) -> bool + Send + Sync {
    move |health: &SystemHealth| health.is_at_least(probe, HealthStatus::Unhealthy)
}

fn policy(cooldown_secs: u64, max_retries: u32, priority: i32) -> RecoveryPolicy {
    RecoveryPolicy::new(Duration::from_secs(cooldown_secs), max_retries, priority)
}

fn failed(e: impl std::fmt::Display) -> RemediationError {
    RemediationError::Failed(e.to_string())
}

/// Forces a reconnect and reports whether the manager came back connected.
async fn force_reconnect(connection: &ConnectionManager) -> bool {
    connection.reconnect().await;
    tokio::time::sleep(RECONNECT_GRACE).await;
    connection.connection_status().is_connected()
}

/// Builds the built-in actions over `ctx`, applying `overrides` by id.
pub fn default_actions(
    ctx: &RecoveryContext,
    overrides: &BTreeMap<String, ActionOverride>,
) -> Vec<RecoveryAction> {
    let (storage, cache) = (ctx.storage.clone(), ctx.cache.clone());
    let reconnect_backend = RecoveryAction::from_fn(
        RECONNECT_BACKEND,
        policy(30, 3, 10),
        unhealthy(probes::STORAGE),
        move || {
            let (storage, cache) = (storage.clone(), cache.clone());
            async move {
                cache.clear();
                storage.ping().await.map_err(failed)?;
                Ok::<_, RemediationError>(true)
            }
        },
    );

    let connection = ctx.connection.clone();
    let reconnect_messaging = RecoveryAction::from_fn(
        RECONNECT_MESSAGING,
        policy(30, 5, 9),
        unhealthy(probes::CONNECTION),
        move || {
            let connection = connection.clone();
            async move { Ok::<_, RemediationError>(force_reconnect(&connection).await) }
        },
    );

    let (connection, transport) = (ctx.connection.clone(), ctx.transport.clone());
    let restart_streaming = RecoveryAction::from_fn(
        RESTART_STREAMING,
        policy(60, 3, 8),
        unhealthy(probes::REALTIME),
        move || {
            let (connection, transport) = (connection.clone(), transport.clone());
            async move {
                if !force_reconnect(&connection).await {
                    return Ok(false);
                }
                transport.ping().await.map_err(failed)?;
                Ok::<_, RemediationError>(true)
            }
        },
    );

    let (cache, sampler) = (ctx.cache.clone(), ctx.sampler.clone());
    let relieve_memory = RecoveryAction::from_fn(
        RELIEVE_MEMORY,
        policy(120, 2, 7),
        unhealthy(probes::MEMORY),
        move || {
            let (cache, sampler) = (cache.clone(), sampler.clone());
            async move {
                cache.clear();
                let usage = sampler.memory_usage().map_err(failed)?;
                Ok::<_, RemediationError>(usage <= MemoryProbe::UNHEALTHY_ABOVE)
            }
        },
    );

    let blobs = ctx.blobs.clone();
    let verify_blob_storage = RecoveryAction::from_fn(
        VERIFY_BLOB_STORAGE,
        policy(60, 3, 6),
        unhealthy(probes::BLOB_STORAGE),
        move || {
            let blobs = blobs.clone();
            async move {
                blobs.ping().await.map_err(failed)?;
                Ok::<_, RemediationError>(true)
            }
        },
    );

    let cache = ctx.cache.clone();
    let clear_cache = RecoveryAction::from_fn(
        CLEAR_CACHE,
        policy(300, 3, 5),
        |health: &SystemHealth| health.is_at_least(probes::CACHE, HealthStatus::Degraded),
        move || {
            let cache = cache.clone();
            async move {
                cache.clear();
                Ok::<_, RemediationError>(true)
            }
        },
    );

    [
        reconnect_backend,
        reconnect_messaging,
        restart_streaming,
        relieve_memory,
        verify_blob_storage,
        clear_cache,
    ]
    .into_iter()
    .map(|action| match overrides.get(action.id()) {
        Some(over) => action.with_override(over),
        None => action,
    })
    .collect()
}
