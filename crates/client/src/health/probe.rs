// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The probe contract and the rule turning probe outcomes into results.

use std::time::Duration;

use futures_util::future::BoxFuture;
use lifeline_core::error::{Classify, ErrorKind};
use lifeline_core::{HealthCheckResult, HealthStatus};

/// Why a probe produced no report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("probe panicked: {0}")]
    Panicked(String),
}

impl Classify for ProbeError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransientNetwork
    }
}

/// What a probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: HealthStatus,
    pub detail: Option<String>,
}

impl ProbeReport {
    pub fn new(status: HealthStatus) -> Self {
        ProbeReport {
            status,
            detail: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(HealthStatus::Healthy)
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self::new(HealthStatus::Degraded).with_detail(detail)
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unhealthy).with_detail(detail)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// One independent health check.
pub trait Probe: Send + Sync {
    /// Stable name; keys history, counters and alerts.
    fn name(&self) -> &str;

    /// Runs the check once.
    fn check(&self) -> BoxFuture<'_, Result<ProbeReport, ProbeError>>;

    /// Latency above which a healthy report is downgraded. `None` uses
    /// the monitor-wide threshold.
    fn latency_threshold(&self) -> Option<Duration> {
        None
    }
}

/// Turns a probe outcome into a result.
///
/// Errors of any kind are unhealthy. A healthy report that took longer
/// than `threshold` is degraded; worse reports keep their status.
pub fn grade(
    name: &str,
    outcome: Result<ProbeReport, ProbeError>,
    latency: Duration,
    threshold: Duration,
) -> HealthCheckResult {
    let latency_ms = latency.as_millis() as u64;
    match outcome {
        Ok(report) if report.status == HealthStatus::Healthy && latency > threshold => {
            HealthCheckResult::new(name, HealthStatus::Degraded, latency_ms).with_error(format!(
                "slow response: {}ms over {}ms",
                latency_ms,
                threshold.as_millis()
            ))
        }
        Ok(report) => {
            let result = HealthCheckResult::new(name, report.status, latency_ms);
            match report.detail {
                Some(detail) => result.with_error(detail),
                None => result,
            }
        }
        Err(e) => {
            HealthCheckResult::new(name, HealthStatus::Unhealthy, latency_ms).with_error(e.to_string())
        }
    }
}
