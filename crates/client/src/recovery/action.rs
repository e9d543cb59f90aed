// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remediation actions and their policies.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use lifeline_core::error::{Classify, ErrorKind};
use lifeline_core::SystemHealth;

use super::engine::RecoveryError;
use crate::config::ActionOverride;

/// Why an action did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemediationError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("action panicked: {0}")]
    Panicked(String),
}

impl Classify for RemediationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ActionFailure
    }
}

/// A triggerable recovery procedure.
pub trait Remediation: Send + Sync {
    /// Whether the procedure applies to `health`.
    fn matches(&self, health: &SystemHealth) -> bool;

    /// Runs the procedure. `Ok(false)` and `Err` both count as failure.
    fn execute(&self) -> BoxFuture<'_, Result<bool, RemediationError>>;
}

/// [`Remediation`] built from a trigger predicate and an async action.
pub struct FnRemediation<T, A> {
    trigger: T,
    action: A,
}

impl<T, A> FnRemediation<T, A> {
    pub fn new(trigger: T, action: A) -> Self {
        FnRemediation { trigger, action }
    }
}

impl<T, A, Fut> Remediation for FnRemediation<T, A>
where
    T: Fn(&SystemHealth) -> bool + Send + Sync,
    A: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, RemediationError>> + Send + 'static,
{
    fn matches(&self, health: &SystemHealth) -> bool {
        (self.trigger)(health)
    }

    fn execute(&self) -> BoxFuture<'_, Result<bool, RemediationError>> {
        Box::pin((self.action)())
    }
}

/// Rate limits for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Minimum time between the starts of two attempts.
    pub cooldown: Duration,
    /// Attempts allowed while the trigger keeps matching.
    pub max_retries: u32,
    /// Higher runs first.
    pub priority: i32,
}

impl RecoveryPolicy {
    pub fn new(cooldown: Duration, max_retries: u32, priority: i32) -> Self {
        RecoveryPolicy {
            cooldown,
            max_retries,
            priority,
        }
    }
}

/// A registered remediation with its identity and policy.
#[derive(Clone)]
pub struct RecoveryAction {
    id: String,
    policy: RecoveryPolicy,
    enabled: bool,
    remediation: Arc<dyn Remediation>,
}

impl RecoveryAction {
    pub fn new(
        id: impl Into<String>,
        policy: RecoveryPolicy,
        remediation: impl Remediation + 'static,
    ) -> Self {
        RecoveryAction {
            id: id.into(),
            policy,
            enabled: true,
            remediation: Arc::new(remediation),
        }
    }

    /// Shorthand for an action built from closures.
    pub fn from_fn<T, A, Fut>(
        id: impl Into<String>,
        policy: RecoveryPolicy,
        trigger: T,
        action: A,
    ) -> Self
    where
        T: Fn(&SystemHealth) -> bool + Send + Sync + 'static,
        A: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, RemediationError>> + Send + 'static,
    {
        Self::new(id, policy, FnRemediation::new(trigger, action))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn remediation(&self) -> Arc<dyn Remediation> {
        self.remediation.clone()
    }

    pub fn matches(&self, health: &SystemHealth) -> bool {
        self.remediation.matches(health)
    }

    /// Applies a configuration override on top of the built-in policy.
    pub fn with_override(mut self, over: &ActionOverride) -> Self {
        if let Some(ms) = over.cooldown_ms {
            self.policy.cooldown = Duration::from_millis(ms);
        }
        if let Some(retries) = over.max_retries {
            self.policy.max_retries = retries;
        }
        if let Some(priority) = over.priority {
            self.policy.priority = priority;
        }
        if let Some(enabled) = over.enabled {
            self.enabled = enabled;
        }
        self
    }

    /// Checks the id and budget before registration.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.id.trim().is_empty() || self.id.chars().any(char::is_whitespace) {
            return Err(RecoveryError::InvalidAction {
                id: self.id.clone(),
                reason: "id must be non-empty without whitespace".to_string(),
            });
        }
        if self.policy.max_retries == 0 {
            return Err(RecoveryError::InvalidAction {
                id: self.id.clone(),
                reason: "max_retries must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryAction")
            .field("id", &self.id)
            .field("policy", &self.policy)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
