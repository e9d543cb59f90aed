// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Health monitoring.
//!
//! A sweep runs every registered [`Probe`] concurrently, each raced
//! against the probe timeout, and aggregates the results worst-of into a
//! [`SystemHealth`](lifeline_core::SystemHealth). Results are kept in a
//! bounded per-probe history, and a probe that stays unhealthy for
//! `consecutive_failure_threshold` sweeps raises one alert.

mod history;
mod monitor;
mod probe;
pub mod probes;

pub use history::HealthHistory;
pub use monitor::{AlertId, HealthAlert, HealthMonitor, HealthSource};
pub use probe::{grade, Probe, ProbeError, ProbeReport};
