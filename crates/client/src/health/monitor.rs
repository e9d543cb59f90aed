// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic probe sweeps, aggregation, history and alerting.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use lifeline_core::{HealthCheckResult, HealthStatus, SystemHealth};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::history::HealthHistory;
use super::probe::{grade, Probe, ProbeError};
use crate::config::{ConfigError, HealthConfig};
use crate::lock;
use crate::metrics::MetricsSink;

/// Handle returned by [`HealthMonitor::on_alert`].
pub type AlertId = u64;

/// Raised when a probe has been unhealthy for the configured number of
/// consecutive sweeps.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthAlert {
    pub probe: String,
    pub consecutive_failures: u32,
    /// The result that crossed the threshold.
    pub result: HealthCheckResult,
    /// Overall status of the sweep that raised the alert.
    pub overall: HealthStatus,
}

type AlertFn = dyn Fn(&HealthAlert) + Send + Sync;

/// Anything able to produce a fresh [`SystemHealth`] on demand.
pub trait HealthSource: Send + Sync {
    fn check_health(&self) -> BoxFuture<'_, SystemHealth>;
}

struct State {
    history: HealthHistory,
    consecutive_failures: HashMap<String, u32>,
    last: Option<SystemHealth>,
    alerts: BTreeMap<AlertId, Arc<AlertFn>>,
    next_alert_id: AlertId,
    sweeps: u64,
}

struct Inner {
    config: HealthConfig,
    probes: Vec<Arc<dyn Probe>>,
    metrics: Arc<dyn MetricsSink>,
    started_at: Instant,
    state: Mutex<State>,
    timer: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

/// Runs health sweeps on demand and on a fixed interval.
///
/// Cheap to clone; all clones share history, counters and alert callbacks.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

impl HealthMonitor {
    /// Creates a monitor over `probes`. Probe names must be unique.
    pub fn new(
        config: HealthConfig,
        probes: Vec<Arc<dyn Probe>>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for probe in &probes {
            if !seen.insert(probe.name().to_string()) {
                return Err(ConfigError::DuplicateProbe(probe.name().to_string()));
            }
        }

        let state = State {
            history: HealthHistory::new(config.history_size),
            consecutive_failures: HashMap::new(),
            last: None,
            alerts: BTreeMap::new(),
            next_alert_id: 1,
            sweeps: 0,
        };

        Ok(HealthMonitor {
            inner: Arc::new(Inner {
                config,
                probes,
                metrics,
                started_at: Instant::now(),
                state: Mutex::new(state),
                timer: Mutex::new(None),
            }),
        })
    }

    pub fn probe_names(&self) -> Vec<&str> {
        self.inner.probes.iter().map(|p| p.name()).collect()
    }

    /// Runs every probe concurrently and publishes the aggregate.
    ///
    /// Never fails: probe errors, timeouts and panics become unhealthy
    /// results. Sweeps may overlap; each one updates shared state
    /// atomically once all of its probes have settled.
    pub async fn perform_health_check(&self) -> SystemHealth {
        let start = Instant::now();
        let probe_timeout = self.inner.config.probe_timeout();
        let default_threshold = self.inner.config.latency_threshold();

        let checks = join_all(
            self.inner
                .probes
                .iter()
                .map(|probe| run_probe(probe.clone(), probe_timeout, default_threshold)),
        )
        .await;

        let uptime_ms = self.inner.started_at.elapsed().as_millis() as u64;
        let health = SystemHealth::from_checks(checks, uptime_ms);
        let threshold = self.inner.config.consecutive_failure_threshold;

        let (alerts, callbacks, sweep) = {
            let mut state = lock(&self.inner.state);
            let mut alerts = Vec::new();
            for check in &health.checks {
                state.history.push(check.clone());
                let counter = state
                    .consecutive_failures
                    .entry(check.name.clone())
                    .or_insert(0);
                if check.is_unhealthy() {
                    *counter += 1;
                    if *counter == threshold {
                        alerts.push(HealthAlert {
                            probe: check.name.clone(),
                            consecutive_failures: *counter,
                            result: check.clone(),
                            overall: health.overall,
                        });
                    }
                } else {
                    *counter = 0;
                }
            }
            state.sweeps += 1;
            state.last = Some(health.clone());
            let callbacks: Vec<Arc<AlertFn>> = state.alerts.values().cloned().collect();
            (alerts, callbacks, state.sweeps)
        };

        self.record(&health, start);

        for alert in &alerts {
            warn!(
                probe = %alert.probe,
                consecutive_failures = alert.consecutive_failures,
                error = alert.result.error.as_deref().unwrap_or(""),
                "health alert"
            );
            self.inner
                .metrics
                .increment_counter("health.alert", &[("probe", alert.probe.as_str())]);
            for callback in &callbacks {
                callback(alert);
            }
        }

        debug!(sweep, overall = %health.overall, "health sweep complete");
        health
    }

    /// A fresh sweep; never served from cache.
    pub async fn current_health(&self) -> SystemHealth {
        self.perform_health_check().await
    }

    /// The most recently published sweep, without probing.
    pub fn last_health(&self) -> Option<SystemHealth> {
        lock(&self.inner.state).last.clone()
    }

    /// Registers an alert callback.
    pub fn on_alert<F>(&self, callback: F) -> AlertId
    where
        F: Fn(&HealthAlert) + Send + Sync + 'static,
    {
        let mut state = lock(&self.inner.state);
        let id = state.next_alert_id;
        state.next_alert_id += 1;
        state.alerts.insert(id, Arc::new(callback));
        id
    }

    /// Unregisters an alert callback. Returns false if it was not registered.
    pub fn remove_alert(&self, id: AlertId) -> bool {
        lock(&self.inner.state).alerts.remove(&id).is_some()
    }

    /// Up to `limit` most recent results for `probe`, oldest first.
    pub fn health_history(&self, probe: &str, limit: Option<usize>) -> Vec<HealthCheckResult> {
        lock(&self.inner.state).history.recent(probe, limit)
    }

    /// Current run of consecutive unhealthy results for `probe`.
    pub fn consecutive_failures(&self, probe: &str) -> u32 {
        lock(&self.inner.state)
            .consecutive_failures
            .get(probe)
            .copied()
            .unwrap_or(0)
    }

    /// Starts the recurring sweep; the first one runs immediately.
    /// No-op if already running.
    pub fn start(&self) {
        let mut timer = lock(&self.inner.timer);
        if timer.is_some() {
            return;
        }

        let period = self.inner.config.check_interval();
        let cancel = CancellationToken::new();
        let monitor = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {
                        monitor.perform_health_check().await;
                    }
                }
            }
        });

        info!(
            interval_ms = period.as_millis() as u64,
            probes = self.inner.probes.len(),
            "health monitor started"
        );
        *timer = Some((cancel, handle));
    }

    /// Stops the recurring sweep. A sweep already in flight completes.
    pub fn stop(&self) {
        if let Some((cancel, _handle)) = lock(&self.inner.timer).take() {
            cancel.cancel();
            info!("health monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.timer).is_some()
    }

    fn record(&self, health: &SystemHealth, start: Instant) {
        let metrics = &self.inner.metrics;
        for check in &health.checks {
            metrics.record_gauge(
                &format!("health.{}.latency_ms", check.name),
                check.latency_ms as f64,
            );
            metrics.record_gauge(&format!("health.{}.status", check.name), check.status.as_gauge());
            let error = check.error.as_deref().unwrap_or("");
            match check.status {
                HealthStatus::Healthy => {}
                HealthStatus::Degraded => {
                    info!(probe = %check.name, latency_ms = check.latency_ms, error, "probe degraded")
                }
                HealthStatus::Unhealthy => {
                    warn!(probe = %check.name, latency_ms = check.latency_ms, error, "probe unhealthy")
                }
            }
        }
        metrics.record_gauge("health.overall", health.overall.as_gauge());
        metrics.record_timing("health.sweep", start);
    }
}

impl HealthSource for HealthMonitor {
    fn check_health(&self) -> BoxFuture<'_, SystemHealth> {
        Box::pin(self.current_health())
    }
}

/// Runs one probe in its own task so a panic cannot escape the sweep.
///
/// On timeout the task is left to finish in the background.
async fn run_probe(
    probe: Arc<dyn Probe>,
    probe_timeout: Duration,
    default_threshold: Duration,
) -> HealthCheckResult {
    let name = probe.name().to_string();
    let threshold = probe.latency_threshold().unwrap_or(default_threshold);
    let start = Instant::now();

    let task = tokio::spawn({
        let probe = probe.clone();
        async move { probe.check().await }
    });

    let outcome = match timeout(probe_timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => Err(ProbeError::Panicked(join_error.to_string())),
        Err(_) => Err(ProbeError::Timeout {
            after_ms: probe_timeout.as_millis() as u64,
        }),
    };

    grade(&name, outcome, start.elapsed(), threshold)
}
