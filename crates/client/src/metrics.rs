// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Metrics sink abstraction.
//!
//! Components only ever write into the sink; nothing in lifeline reads
//! metrics back.

use tokio::time::Instant;

/// Destination for counters, gauges and timings.
pub trait MetricsSink: Send + Sync {
    /// Increments a counter by one.
    fn increment_counter(&self, name: &str, tags: &[(&str, &str)]);

    /// Records the current value of a gauge.
    fn record_gauge(&self, name: &str, value: f64);

    /// Records the time elapsed since `start`.
    fn record_timing(&self, name: &str, start: Instant);
}

/// Emits every metric as a `tracing` event under the `lifeline::metrics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn increment_counter(&self, name: &str, tags: &[(&str, &str)]) {
        let tags = tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        tracing::debug!(target: "lifeline::metrics", counter = name, tags = %tags);
    }

    fn record_gauge(&self, name: &str, value: f64) {
        tracing::debug!(target: "lifeline::metrics", gauge = name, value);
    }

    fn record_timing(&self, name: &str, start: Instant) {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(target: "lifeline::metrics", timing = name, elapsed_ms);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment_counter(&self, _name: &str, _tags: &[(&str, &str)]) {}

    fn record_gauge(&self, _name: &str, _value: f64) {}

    fn record_timing(&self, _name: &str, _start: Instant) {}
}
