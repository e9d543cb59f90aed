// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The recovery cycle: selection, rate limiting and attempt bookkeeping.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use lifeline_core::error::{Classify, ErrorKind};
use lifeline_core::{RecoveryAttempt, RecoveryStats, SystemHealth};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::action::{RecoveryAction, RemediationError};
use crate::config::RecoveryConfig;
use crate::health::HealthSource;
use crate::lock;
use crate::metrics::MetricsSink;

/// Attempts retained for stats and history queries.
pub const HISTORY_LIMIT: usize = 100;

/// Error type for recovery engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoveryError {
    #[error("unknown recovery action '{0}'")]
    UnknownAction(String),

    #[error("recovery action '{0}' is already registered")]
    DuplicateAction(String),

    #[error("invalid recovery action '{id}': {reason}")]
    InvalidAction { id: String, reason: String },
}

impl Classify for RecoveryError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Per-action rate limiting record.
#[derive(Debug, Clone, Copy, Default)]
struct Budget {
    /// Attempts since the trigger last evaluated false.
    retry_count: u32,
    /// Start of the most recent attempt.
    last_attempt: Option<Instant>,
}

struct State {
    /// Registration order; ties in priority keep it.
    actions: Vec<RecoveryAction>,
    budgets: HashMap<String, Budget>,
    history: VecDeque<RecoveryAttempt>,
    enabled: bool,
}

struct Inner {
    config: RecoveryConfig,
    source: Arc<dyn HealthSource>,
    metrics: Arc<dyn MetricsSink>,
    state: Mutex<State>,
    /// Held for the duration of every action run.
    exec: tokio::sync::Mutex<()>,
    timer: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

/// Matches unhealthy health to registered actions and runs them.
///
/// Cheap to clone; all clones share actions, budgets and history.
#[derive(Clone)]
pub struct RecoveryEngine {
    inner: Arc<Inner>,
}

impl RecoveryEngine {
    pub fn new(
        config: RecoveryConfig,
        source: Arc<dyn HealthSource>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let state = State {
            actions: Vec::new(),
            budgets: HashMap::new(),
            history: VecDeque::new(),
            enabled: config.enabled,
        };
        RecoveryEngine {
            inner: Arc::new(Inner {
                config,
                source,
                metrics,
                state: Mutex::new(state),
                exec: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Registers an action. Ids must be unique.
    pub fn register_action(&self, action: RecoveryAction) -> Result<(), RecoveryError> {
        action.validate()?;
        let mut state = lock(&self.inner.state);
        if state.actions.iter().any(|a| a.id() == action.id()) {
            return Err(RecoveryError::DuplicateAction(action.id().to_string()));
        }
        debug!(
            action = action.id(),
            priority = action.policy().priority,
            enabled = action.is_enabled(),
            "registered recovery action"
        );
        state.actions.push(action);
        Ok(())
    }

    /// Removes an action and forgets its budget. Its past attempts stay in history.
    pub fn remove_action(&self, id: &str) -> Result<(), RecoveryError> {
        let mut state = lock(&self.inner.state);
        let Some(index) = state.actions.iter().position(|a| a.id() == id) else {
            return Err(RecoveryError::UnknownAction(id.to_string()));
        };
        state.actions.remove(index);
        state.budgets.remove(id);
        Ok(())
    }

    pub fn action_ids(&self) -> Vec<String> {
        lock(&self.inner.state)
            .actions
            .iter()
            .map(|a| a.id().to_string())
            .collect()
    }

    /// Pauses or resumes automatic triggering. Manual triggers still run.
    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.inner.state).enabled = enabled;
        info!(enabled, "automatic recovery toggled");
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.inner.state).enabled
    }

    /// Includes or excludes one action from automatic selection.
    pub fn set_action_enabled(&self, id: &str, enabled: bool) -> Result<(), RecoveryError> {
        let mut state = lock(&self.inner.state);
        match state.actions.iter_mut().find(|a| a.id() == id) {
            Some(action) => {
                action.set_enabled(enabled);
                Ok(())
            }
            None => Err(RecoveryError::UnknownAction(id.to_string())),
        }
    }

    /// Attempts made for `id` in its current triggering episode.
    pub fn retry_count(&self, id: &str) -> u32 {
        lock(&self.inner.state)
            .budgets
            .get(id)
            .map_or(0, |b| b.retry_count)
    }

    /// Starts the recurring cycle. No-op if already running.
    pub fn start_monitoring(&self) {
        let mut timer = lock(&self.inner.timer);
        if timer.is_some() {
            return;
        }

        let period = self.inner.config.cycle_interval();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {
                        engine.run_cycle().await;
                    }
                }
            }
        });

        info!(interval_ms = period.as_millis() as u64, "recovery monitoring started");
        *timer = Some((cancel, handle));
    }

    /// Stops the recurring cycle. An action already running completes.
    pub fn stop_monitoring(&self) {
        if let Some((cancel, _handle)) = lock(&self.inner.timer).take() {
            cancel.cancel();
            info!("recovery monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.inner.timer).is_some()
    }

    /// Runs one selection cycle and returns the attempt it made, if any.
    ///
    /// Skipped while paused or while another action is running.
    pub async fn run_cycle(&self) -> Option<RecoveryAttempt> {
        if !self.is_enabled() {
            debug!("automatic recovery paused, skipping cycle");
            return None;
        }
        let Ok(_running) = self.inner.exec.try_lock() else {
            debug!("recovery action in flight, skipping cycle");
            return None;
        };

        let health = self.inner.source.check_health().await;
        let action = self.select(&health)?;
        Some(self.execute(&action).await)
    }

    /// Runs `id` now, bypassing its trigger, cooldown and retry budget.
    ///
    /// Waits for any action in flight. The attempt is recorded like an
    /// automatic one.
    pub async fn trigger_recovery(&self, id: &str) -> Result<RecoveryAttempt, RecoveryError> {
        let action = lock(&self.inner.state)
            .actions
            .iter()
            .find(|a| a.id() == id)
            .cloned()
            .ok_or_else(|| RecoveryError::UnknownAction(id.to_string()))?;

        let _running = self.inner.exec.lock().await;
        info!(action = id, "manual recovery requested");
        Ok(self.execute(&action).await)
    }

    /// Totals, per-action breakdown and the most recent attempts.
    pub fn recovery_stats(&self) -> RecoveryStats {
        RecoveryStats::from_history(lock(&self.inner.state).history.iter())
    }

    /// Up to `limit` most recent attempts, oldest first.
    pub fn recovery_history(&self, limit: Option<usize>) -> Vec<RecoveryAttempt> {
        let state = lock(&self.inner.state);
        let take = limit.unwrap_or(state.history.len()).min(state.history.len());
        state
            .history
            .iter()
            .skip(state.history.len() - take)
            .cloned()
            .collect()
    }

    /// Picks the action to run for `health`, updating budgets of actions
    /// whose trigger no longer matches.
    fn select(&self, health: &SystemHealth) -> Option<RecoveryAction> {
        let actions: Vec<RecoveryAction> = {
            let mut state = lock(&self.inner.state);
            if health.is_healthy() {
                for budget in state.budgets.values_mut() {
                    budget.retry_count = 0;
                }
                debug!("system healthy, nothing to recover");
                return None;
            }
            state.actions.iter().filter(|a| a.is_enabled()).cloned().collect()
        };

        // triggers are user code; evaluate them without holding the lock
        let evaluated: Vec<(RecoveryAction, bool)> = actions
            .into_iter()
            .map(|action| {
                let matched = catch_unwind(AssertUnwindSafe(|| action.matches(health)))
                    .unwrap_or_else(|_| {
                        warn!(action = action.id(), "recovery trigger panicked");
                        false
                    });
                (action, matched)
            })
            .collect();

        let now = Instant::now();
        let mut state = lock(&self.inner.state);
        let mut candidates = Vec::new();
        for (action, matched) in evaluated {
            if matched {
                candidates.push(action);
            } else if let Some(budget) = state.budgets.get_mut(action.id()) {
                budget.retry_count = 0;
            }
        }
        candidates.sort_by(|a, b| b.policy().priority.cmp(&a.policy().priority));

        for action in candidates {
            let policy = action.policy();
            let budget = state.budgets.get(action.id()).copied().unwrap_or_default();
            if let Some(last) = budget.last_attempt {
                if now.duration_since(last) < policy.cooldown {
                    debug!(action = action.id(), "skipping: cooling down");
                    continue;
                }
            }
            if budget.retry_count >= policy.max_retries {
                debug!(
                    action = action.id(),
                    retries = budget.retry_count,
                    "skipping: retry budget spent"
                );
                continue;
            }
            return Some(action);
        }
        None
    }

    /// Runs one action under the action timeout and records the attempt.
    async fn execute(&self, action: &RecoveryAction) -> RecoveryAttempt {
        let id = action.id().to_string();
        let start = Instant::now();
        let retry_count = {
            let mut state = lock(&self.inner.state);
            let budget = state.budgets.entry(id.clone()).or_default();
            budget.retry_count += 1;
            budget.last_attempt = Some(start);
            budget.retry_count
        };

        info!(
            action = %id,
            attempt = retry_count,
            priority = action.policy().priority,
            "running recovery action"
        );

        let limit = self.inner.config.action_timeout();
        let remediation = action.remediation();
        let task = tokio::spawn(async move { remediation.execute().await });
        let outcome = match timeout(limit, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => Err(RemediationError::Panicked(join_error.to_string())),
            Err(_) => Err(RemediationError::Timeout {
                after_ms: limit.as_millis() as u64,
            }),
        };

        let (success, error) = match outcome {
            Ok(true) => (true, None),
            Ok(false) => (false, Some("action reported failure".to_string())),
            Err(e) => (false, Some(e.to_string())),
        };

        let attempt = RecoveryAttempt {
            action_id: id.clone(),
            timestamp: Utc::now(),
            success,
            error,
            retry_count,
        };

        {
            let mut state = lock(&self.inner.state);
            if state.history.len() == HISTORY_LIMIT {
                state.history.pop_front();
            }
            state.history.push_back(attempt.clone());
        }

        let outcome_tag = if success { "success" } else { "failure" };
        self.inner.metrics.increment_counter(
            "recovery.attempt",
            &[("action", id.as_str()), ("outcome", outcome_tag)],
        );
        self.inner.metrics.record_timing("recovery.action", start);

        match &attempt.error {
            None => info!(action = %id, attempt = retry_count, "recovery action succeeded"),
            Some(error) => warn!(
                action = %id,
                attempt = retry_count,
                error = %error,
                "recovery action failed"
            ),
        }
        attempt
    }
}
