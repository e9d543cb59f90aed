// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded per-probe result history.

use std::collections::{HashMap, VecDeque};

use lifeline_core::HealthCheckResult;

/// Rolling window of the most recent results for each probe.
#[derive(Debug, Clone)]
pub struct HealthHistory {
    capacity: usize,
    by_probe: HashMap<String, VecDeque<HealthCheckResult>>,
}

impl HealthHistory {
    /// Keeps at most `capacity` results per probe (at least one).
    pub fn new(capacity: usize) -> Self {
        HealthHistory {
            capacity: capacity.max(1),
            by_probe: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a result, evicting the oldest one for that probe when full.
    pub fn push(&mut self, result: HealthCheckResult) {
        let entries = self.by_probe.entry(result.name.clone()).or_default();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    /// Up to `limit` most recent results for `probe`, oldest first.
    pub fn recent(&self, probe: &str, limit: Option<usize>) -> Vec<HealthCheckResult> {
        let Some(entries) = self.by_probe.get(probe) else {
            return Vec::new();
        };
        let take = limit.unwrap_or(entries.len()).min(entries.len());
        entries.iter().skip(entries.len() - take).cloned().collect()
    }

    pub fn len(&self, probe: &str) -> usize {
        self.by_probe.get(probe).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.by_probe.values().all(VecDeque::is_empty)
    }
}
