// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types and the error taxonomy shared by all lifeline components.

use std::fmt;

use thiserror::Error;

/// Errors produced by lifeline-core parsing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid health status: '{0}'\n  hint: valid statuses are: healthy, degraded, unhealthy")]
    InvalidHealthStatus(String),

    #[error("invalid connection status: '{0}'\n  hint: valid statuses are: disconnected, connecting, connected, reconnecting")]
    InvalidConnectionStatus(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for lifeline-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of every failure the resilience layer can observe.
///
/// Each component's error enum maps its variants onto one of these, which
/// decides who deals with the failure:
///
/// - [`ErrorKind::TransientNetwork`] is retried by the owning component.
/// - [`ErrorKind::RetryExhausted`] is surfaced to the caller.
/// - [`ErrorKind::ActionFailure`] is recorded against a recovery budget.
/// - [`ErrorKind::Configuration`] fails at registration or load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Probe timeout, transport close, send failure before exhaustion.
    TransientNetwork,
    /// A send or reconnection gave up.
    RetryExhausted,
    /// A remediation action failed or returned false.
    ActionFailure,
    /// Malformed registration or configuration.
    Configuration,
    /// Pending work rejected because its owner was destroyed.
    Destroyed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::RetryExhausted => "retry_exhausted",
            ErrorKind::ActionFailure => "action_failure",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Destroyed => "destroyed",
        }
    }

    /// Whether the owning component retries this failure on its own.
    pub fn is_retried_internally(&self) -> bool {
        matches!(self, ErrorKind::TransientNetwork)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Implemented by every lifeline error enum.
pub trait Classify {
    /// The taxonomy bucket this error belongs to.
    fn kind(&self) -> ErrorKind;
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
