// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Health verdicts produced by probes and aggregated per sweep.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tri-state verdict of a single probe or of the whole system.
///
/// Variants are ordered from best to worst, so the worst of a set of
/// statuses is simply its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    /// Numeric form used for gauges (0 = healthy, 2 = unhealthy).
    pub fn as_gauge(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 0.0,
            HealthStatus::Degraded => 1.0,
            HealthStatus::Unhealthy => 2.0,
        }
    }

    /// Worst-of aggregation. An empty set is healthy.
    pub fn worst<I>(statuses: I) -> HealthStatus
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses.into_iter().max().unwrap_or(HealthStatus::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "healthy" => Ok(HealthStatus::Healthy),
            "degraded" => Ok(HealthStatus::Degraded),
            "unhealthy" => Ok(HealthStatus::Unhealthy),
            _ => Err(Error::InvalidHealthStatus(s.to_string())),
        }
    }
}

/// Outcome of one probe execution. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Probe name (e.g. "storage").
    pub name: String,
    pub status: HealthStatus,
    /// Wall time the probe took, or the timeout if it never finished.
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn new(name: impl Into<String>, status: HealthStatus, latency_ms: u64) -> Self {
        HealthCheckResult {
            name: name.into(),
            status,
            latency_ms,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches an error or reason message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_unhealthy(&self) -> bool {
        self.status == HealthStatus::Unhealthy
    }
}

/// Aggregated result of one sweep.
///
/// Recomputed from scratch every sweep and replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall: HealthStatus,
    pub checks: Vec<HealthCheckResult>,
    /// Time since the monitor was created.
    pub uptime_ms: u64,
    pub last_check_at: DateTime<Utc>,
}

impl SystemHealth {
    /// Builds the aggregate, deriving `overall` as the worst check status.
    pub fn from_checks(checks: Vec<HealthCheckResult>, uptime_ms: u64) -> Self {
        let overall = HealthStatus::worst(checks.iter().map(|c| c.status));
        SystemHealth {
            overall,
            checks,
            uptime_ms,
            last_check_at: Utc::now(),
        }
    }

    /// Looks up the result of one probe by name.
    pub fn check(&self, name: &str) -> Option<&HealthCheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Status of one probe, if it took part in the sweep.
    pub fn status_of(&self, name: &str) -> Option<HealthStatus> {
        self.check(name).map(|c| c.status)
    }

    /// True if the named probe reported at least the given severity.
    pub fn is_at_least(&self, name: &str, status: HealthStatus) -> bool {
        self.status_of(name).is_some_and(|s| s >= status)
    }

    pub fn is_healthy(&self) -> bool {
        self.overall == HealthStatus::Healthy
    }

    /// Names of probes that are not healthy.
    pub fn failing(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.status != HealthStatus::Healthy)
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
