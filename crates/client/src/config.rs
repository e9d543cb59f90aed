// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for the connection manager, health monitor and recovery engine.
//!
//! Configuration is stored in a TOML file with one table per component:
//! - `[connection]`: reconnection backoff, send retry, heartbeat
//! - `[health]`: sweep interval, probe timeout, alert threshold
//! - `[recovery]`: cycle interval plus per-action overrides under
//!   `[recovery.actions.<id>]`
//!
//! Every field has a default, so an empty (or absent) file is valid.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use lifeline_core::error::{Classify, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::recovery::actions::DEFAULT_ACTION_IDS;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unknown recovery action '{0}'\n  hint: known actions are: {known}", known = DEFAULT_ACTION_IDS.join(", "))]
    UnknownAction(String),

    #[error("duplicate probe name '{0}'")]
    DuplicateProbe(String),
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Connection manager settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Reconnection attempts before giving up (default: 5).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Delay before the first reconnection attempt; doubles each attempt (default: 1000).
    #[serde(default = "default_base_reconnect_delay_ms")]
    pub base_reconnect_delay_ms: u64,
    /// Publish attempts per send before failing (default: 3).
    #[serde(default = "default_send_retry_attempts")]
    pub send_retry_attempts: u32,
    /// Wait after failed attempt `n` is `n * send_retry_step_ms` (default: 1000).
    #[serde(default = "default_send_retry_step_ms")]
    pub send_retry_step_ms: u64,
    /// Timeout applied to every transport open, close, publish and ping (default: 10000).
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Heartbeat ping interval while connected. 0 = disabled (default: 30000).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

/// Health monitor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Interval between sweeps (default: 30000).
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Per-probe timeout (default: 5000).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Consecutive unhealthy results that raise an alert (default: 3).
    #[serde(default = "default_consecutive_failure_threshold")]
    pub consecutive_failure_threshold: u32,
    /// Results kept per probe (default: 100).
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Probes slower than this are degraded (default: 1000).
    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: u64,
}

/// Recovery engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Interval between recovery cycles (default: 15000).
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
    /// Upper bound on a single action's run time (default: 30000).
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,
    /// Whether automatic triggering starts enabled (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides for the built-in actions, keyed by action id.
    #[serde(default)]
    pub actions: BTreeMap<String, ActionOverride>,
}

/// Override of one built-in action's policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOverride {
    pub cooldown_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub priority: Option<i32>,
    pub enabled: Option<bool>,
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_base_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_send_retry_attempts() -> u32 {
    3
}

fn default_send_retry_step_ms() -> u64 {
    1_000
}

fn default_operation_timeout_ms() -> u64 {
    10_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_check_interval_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_consecutive_failure_threshold() -> u32 {
    3
}

fn default_history_size() -> usize {
    100
}

fn default_latency_threshold_ms() -> u64 {
    1_000
}

fn default_cycle_interval_ms() -> u64 {
    15_000
}

fn default_action_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            base_reconnect_delay_ms: default_base_reconnect_delay_ms(),
            send_retry_attempts: default_send_retry_attempts(),
            send_retry_step_ms: default_send_retry_step_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            check_interval_ms: default_check_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            consecutive_failure_threshold: default_consecutive_failure_threshold(),
            history_size: default_history_size(),
            latency_threshold_ms: default_latency_threshold_ms(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            cycle_interval_ms: default_cycle_interval_ms(),
            action_timeout_ms: default_action_timeout_ms(),
            enabled: true,
            actions: BTreeMap::new(),
        }
    }
}

impl ConnectionConfig {
    pub fn base_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_delay_ms)
    }

    pub fn send_retry_step(&self) -> Duration {
        Duration::from_millis(self.send_retry_step_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// `None` when the heartbeat is disabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }
}

impl HealthConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn latency_threshold(&self) -> Duration {
        Duration::from_millis(self.latency_threshold_ms)
    }
}

impl RecoveryConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }
}

impl Config {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Loads configuration, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parses and validates configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make a component spin or never act.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("health.check_interval_ms", self.health.check_interval_ms),
            ("health.probe_timeout_ms", self.health.probe_timeout_ms),
            ("recovery.cycle_interval_ms", self.recovery.cycle_interval_ms),
            ("recovery.action_timeout_ms", self.recovery.action_timeout_ms),
            ("connection.operation_timeout_ms", self.connection.operation_timeout_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.health.consecutive_failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "health.consecutive_failure_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.health.history_size == 0 {
            return Err(ConfigError::Invalid {
                field: "health.history_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.connection.send_retry_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "connection.send_retry_attempts",
                reason: "must be at least 1".to_string(),
            });
        }

        for (id, action) in &self.recovery.actions {
            if !DEFAULT_ACTION_IDS.contains(&id.as_str()) {
                return Err(ConfigError::UnknownAction(id.clone()));
            }
            if action.max_retries == Some(0) {
                return Err(ConfigError::Invalid {
                    field: "recovery.actions.max_retries",
                    reason: format!("for '{}' must be at least 1", id),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
