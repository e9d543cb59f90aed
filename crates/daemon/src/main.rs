// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! lifelined - keeps a real-time room connection alive.
//!
//! Subscribes to the given rooms over a WebSocket, sweeps the health of
//! the connection and its backends, and runs remediation when a sweep
//! comes back unhealthy.
//!
//! Usage:
//!   lifelined --url ws://host/rooms --room orders --room chat

mod blobs;
mod env;
mod storage;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lifeline::health::probes::{
    BlobStoreProbe, CacheProbe, ConnectionProbe, MemoryProbe, StorageProbe, StreamingProbe,
};
use lifeline::recovery::{default_actions, RecoveryContext};
use lifeline::{
    Config, ConnectionManager, HealthMonitor, MemoryCache, MetricsSink, Probe, ProcMemorySampler,
    RecoveryEngine, RoomCallbacks, TracingMetrics, Transport, WebSocketTransport,
};
use tracing::{debug, info, warn};

use blobs::DirBlobStore;
use storage::SqliteStorage;

/// lifelined: connection resilience daemon
#[derive(Parser, Debug)]
#[command(name = "lifelined", version)]
#[command(about = "Keeps a real-time room connection alive and repairs its dependencies")]
struct Args {
    /// Configuration file (default: $LIFELINE_CONFIG or <config dir>/lifeline/lifeline.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket endpoint of the messaging backend
    #[arg(short, long, default_value = "ws://127.0.0.1:7890/rooms")]
    url: String,

    /// Room to subscribe to (repeatable)
    #[arg(short, long = "room")]
    rooms: Vec<String>,

    /// SQLite database probed as the storage backend
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory probed as the blob store
    #[arg(long)]
    blob_dir: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Seconds between status log lines
    #[arg(long, default_value = "60")]
    status_interval: u64,

    /// Entries held by the in-memory cache
    #[arg(long, default_value = "1024")]
    cache_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_logging(args.log_file.as_deref());

    let config_path = args.config.clone().unwrap_or_else(env::default_config_path);
    let config = Config::load_or_default(&config_path)?;
    info!(config = %config_path.display(), url = %args.url, "lifelined starting");

    let state_dir = env::default_state_dir();
    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| state_dir.join("probe.db"));
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let blob_dir = args
        .blob_dir
        .clone()
        .unwrap_or_else(|| state_dir.join("blobs"));

    let storage = Arc::new(SqliteStorage::open(&db_path)?);
    let blobs = Arc::new(DirBlobStore::new(&blob_dir));
    let sampler = Arc::new(ProcMemorySampler::new());
    let cache = Arc::new(MemoryCache::new(args.cache_capacity));
    let metrics: Arc<dyn MetricsSink> = Arc::new(TracingMetrics);
    let transport: Arc<dyn Transport> = Arc::new(WebSocketTransport::new(args.url.as_str()));

    let connection =
        ConnectionManager::new(config.connection.clone(), transport.clone(), metrics.clone());
    connection.start();

    let probes: Vec<Arc<dyn Probe>> = vec![
        Arc::new(StorageProbe::new(storage.clone())),
        Arc::new(StreamingProbe::new(transport.clone())),
        Arc::new(ConnectionProbe::new(connection.clone())),
        Arc::new(BlobStoreProbe::new(blobs.clone())),
        Arc::new(MemoryProbe::new(sampler.clone())),
        Arc::new(CacheProbe::new(cache.clone())),
    ];
    let monitor = HealthMonitor::new(config.health.clone(), probes, metrics.clone())?;
    let engine = RecoveryEngine::new(
        config.recovery.clone(),
        Arc::new(monitor.clone()),
        metrics.clone(),
    );

    // An alert runs a recovery cycle now instead of waiting for the next tick.
    let alert_engine = engine.clone();
    monitor.on_alert(move |alert| {
        info!(
            probe = %alert.probe,
            overall = %alert.overall,
            "escalating health alert to recovery"
        );
        let engine = alert_engine.clone();
        tokio::spawn(async move {
            engine.run_cycle().await;
        });
    });

    let ctx = RecoveryContext {
        storage,
        connection: connection.clone(),
        transport,
        blobs,
        sampler,
        cache,
    };
    for action in default_actions(&ctx, &config.recovery.actions) {
        engine.register_action(action)?;
    }

    for room in &args.rooms {
        if let Err(e) = connection.subscribe(room, room_callbacks(room)).await {
            warn!(room = %room, error = %e, "initial subscribe failed, retrying on reconnect");
        }
    }

    monitor.start();
    engine.start_monitoring();
    info!(
        rooms = args.rooms.len(),
        actions = engine.action_ids().len(),
        "lifelined running"
    );

    let period = Duration::from_secs(args.status_interval.max(1));
    let mut status = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                info!("interrupt received, shutting down");
                break;
            }
            _ = status.tick() => log_status(&connection, &monitor, &engine),
        }
    }

    engine.stop_monitoring();
    monitor.stop();
    connection.destroy().await;
    info!("lifelined stopped");
    Ok(())
}

fn room_callbacks(room: &str) -> RoomCallbacks {
    let events_room = room.to_string();
    let status_room = room.to_string();
    RoomCallbacks::new(move |payload| debug!(room = %events_room, %payload, "room event"))
        .with_status(move |status| info!(room = %status_room, %status, "room connection status"))
}

fn log_status(connection: &ConnectionManager, monitor: &HealthMonitor, engine: &RecoveryEngine) {
    let state = connection.connection_status();
    let stats = engine.recovery_stats();
    let Some(health) = monitor.last_health() else {
        info!(connection = %state.status_string(), "status: no sweep yet");
        return;
    };

    info!(
        connection = %state.status_string(),
        rooms = connection.rooms().len(),
        queued = connection.queued_sends(),
        overall = %health.overall,
        failing = ?health.failing(),
        recoveries = stats.total,
        recovery_failures = stats.failed,
        "status"
    );
    match serde_json::to_string(&health) {
        Ok(json) => debug!(snapshot = %json, "health snapshot"),
        Err(e) => warn!(error = %e, "failed to serialize health snapshot"),
    }
}

fn setup_logging(log_path: Option<&Path>) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Try to open log file, fall back to stderr
    let file = log_path.and_then(|path| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    if let Some(file) = file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
