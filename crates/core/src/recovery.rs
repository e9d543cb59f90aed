// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Records of remediation attempts and the statistics derived from them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of most recent attempts included in [`RecoveryStats::recent`].
pub const RECENT_ATTEMPTS: usize = 10;

/// One execution of a remediation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub action_id: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attempts made in the current triggering episode, this one included.
    pub retry_count: u32,
}

/// Per-action breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStats {
    pub attempts: usize,
    pub successes: usize,
    pub failures: usize,
    pub last_attempt: Option<DateTime<Utc>>,
}

/// Aggregate counts over the retained attempt history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub by_action: BTreeMap<String, ActionStats>,
    /// Most recent attempts, newest last.
    pub recent: Vec<RecoveryAttempt>,
}

impl RecoveryStats {
    /// Computes statistics from a history ordered oldest first.
    pub fn from_history<'a, I>(history: I) -> Self
    where
        I: IntoIterator<Item = &'a RecoveryAttempt>,
    {
        let mut stats = RecoveryStats::default();
        let mut all = Vec::new();

        for attempt in history {
            stats.total += 1;
            let entry = stats.by_action.entry(attempt.action_id.clone()).or_default();
            entry.attempts += 1;
            entry.last_attempt = Some(attempt.timestamp);
            if attempt.success {
                stats.successful += 1;
                entry.successes += 1;
            } else {
                stats.failed += 1;
                entry.failures += 1;
            }
            all.push(attempt.clone());
        }

        let skip = all.len().saturating_sub(RECENT_ATTEMPTS);
        stats.recent = all.split_off(skip);
        stats
    }

    /// Fraction of attempts that succeeded, or `None` with no attempts.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.successful as f64 / self.total as f64)
        }
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
