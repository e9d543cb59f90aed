// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in probes over the external collaborators.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use lifeline_core::ConnectionStatus;

use super::probe::{Probe, ProbeError, ProbeReport};
use crate::backend::{BlobStore, ResourceSampler, Storage};
use crate::cache::Cache;
use crate::connection::{ConnectionManager, RoomCallbacks, Transport};

pub const STORAGE: &str = "storage";
pub const REALTIME: &str = "realtime";
pub const CONNECTION: &str = "connection";
pub const BLOB_STORAGE: &str = "blob_storage";
pub const MEMORY: &str = "memory";
pub const CACHE: &str = "cache";

/// Room opened and closed again by [`StreamingProbe`].
pub const HEALTH_ROOM: &str = "lifeline:health";

/// Storage reachability via a trivial read.
pub struct StorageProbe {
    storage: Arc<dyn Storage>,
}

impl StorageProbe {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        StorageProbe { storage }
    }
}

impl Probe for StorageProbe {
    fn name(&self) -> &str {
        STORAGE
    }

    fn check(&self) -> BoxFuture<'_, Result<ProbeReport, ProbeError>> {
        Box::pin(async move {
            self.storage
                .ping()
                .await
                .map_err(|e| ProbeError::Failed(e.to_string()))?;
            Ok(ProbeReport::ok())
        })
    }
}

/// Streaming reachability: opens a throwaway channel and closes it.
pub struct StreamingProbe {
    transport: Arc<dyn Transport>,
}

impl StreamingProbe {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        StreamingProbe { transport }
    }
}

impl Probe for StreamingProbe {
    fn name(&self) -> &str {
        REALTIME
    }

    fn check(&self) -> BoxFuture<'_, Result<ProbeReport, ProbeError>> {
        Box::pin(async move {
            let handle = self
                .transport
                .open(HEALTH_ROOM, RoomCallbacks::noop())
                .await
                .map_err(|e| ProbeError::Failed(e.to_string()))?;
            match self.transport.close(handle).await {
                Ok(()) => Ok(ProbeReport::ok()),
                Err(e) => Ok(ProbeReport::degraded(format!("close failed: {}", e))),
            }
        })
    }
}

/// Connection manager status.
///
/// Reconnecting is degraded; disconnected with live subscriptions is
/// unhealthy. Disconnected with no rooms is an idle client and healthy.
pub struct ConnectionProbe {
    connection: ConnectionManager,
}

impl ConnectionProbe {
    pub fn new(connection: ConnectionManager) -> Self {
        ConnectionProbe { connection }
    }
}

impl Probe for ConnectionProbe {
    fn name(&self) -> &str {
        CONNECTION
    }

    fn check(&self) -> BoxFuture<'_, Result<ProbeReport, ProbeError>> {
        Box::pin(async move {
            let state = self.connection.connection_status();
            let report = match state.status {
                ConnectionStatus::Connected => ProbeReport::ok(),
                ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => {
                    ProbeReport::degraded(state.status_string())
                }
                ConnectionStatus::Disconnected if self.connection.rooms().is_empty() => {
                    ProbeReport::ok().with_detail("idle")
                }
                ConnectionStatus::Disconnected => ProbeReport::unhealthy(state.status_string()),
            };
            Ok(report)
        })
    }
}

/// Blob storage reachability.
pub struct BlobStoreProbe {
    blobs: Arc<dyn BlobStore>,
}

impl BlobStoreProbe {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        BlobStoreProbe { blobs }
    }
}

impl Probe for BlobStoreProbe {
    fn name(&self) -> &str {
        BLOB_STORAGE
    }

    fn check(&self) -> BoxFuture<'_, Result<ProbeReport, ProbeError>> {
        Box::pin(async move {
            self.blobs
                .ping()
                .await
                .map_err(|e| ProbeError::Failed(e.to_string()))?;
            Ok(ProbeReport::ok())
        })
    }
}

/// Memory pressure: degraded above 75 %, unhealthy above 90 %.
pub struct MemoryProbe {
    sampler: Arc<dyn ResourceSampler>,
    degraded_above: f64,
    unhealthy_above: f64,
}

impl MemoryProbe {
    pub const DEGRADED_ABOVE: f64 = 0.75;
    pub const UNHEALTHY_ABOVE: f64 = 0.90;

    pub fn new(sampler: Arc<dyn ResourceSampler>) -> Self {
        MemoryProbe {
            sampler,
            degraded_above: Self::DEGRADED_ABOVE,
            unhealthy_above: Self::UNHEALTHY_ABOVE,
        }
    }
}

impl Probe for MemoryProbe {
    fn name(&self) -> &str {
        MEMORY
    }

    fn check(&self) -> BoxFuture<'_, Result<ProbeReport, ProbeError>> {
        Box::pin(async move {
            let usage = self
                .sampler
                .memory_usage()
                .map_err(|e| ProbeError::Failed(e.to_string()))?;
            let detail = format!("memory usage {:.0}%", usage * 100.0);
            let report = if usage > self.unhealthy_above {
                ProbeReport::unhealthy(detail)
            } else if usage > self.degraded_above {
                ProbeReport::degraded(detail)
            } else {
                ProbeReport::ok()
            };
            Ok(report)
        })
    }
}

/// Cache effectiveness: degraded when the hit rate is poor over enough lookups.
pub struct CacheProbe {
    cache: Arc<dyn Cache>,
    min_hit_rate: f64,
    min_lookups: u64,
}

impl CacheProbe {
    pub const MIN_HIT_RATE: f64 = 0.5;
    pub const MIN_LOOKUPS: u64 = 20;

    pub fn new(cache: Arc<dyn Cache>) -> Self {
        CacheProbe {
            cache,
            min_hit_rate: Self::MIN_HIT_RATE,
            min_lookups: Self::MIN_LOOKUPS,
        }
    }
}

impl Probe for CacheProbe {
    fn name(&self) -> &str {
        CACHE
    }

    fn check(&self) -> BoxFuture<'_, Result<ProbeReport, ProbeError>> {
        Box::pin(async move {
            let stats = self.cache.stats();
            if stats.lookups >= self.min_lookups && stats.hit_rate < self.min_hit_rate {
                return Ok(ProbeReport::degraded(format!(
                    "hit rate {:.0}% over {} lookups",
                    stats.hit_rate * 100.0,
                    stats.lookups
                )));
            }
            Ok(ProbeReport::ok())
        })
    }
}
