// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow interfaces to the collaborators lifeline probes and repairs.
//!
//! Lifeline never touches a storage schema or blob layout; it only needs
//! to know whether each backend answers.

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use lifeline_core::error::{Classify, ErrorKind};

/// Error type for backend reachability checks.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Backend answered with an error or not at all.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// I/O error while sampling local resources.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource report could not be parsed.
    #[error("malformed resource report: {0}")]
    Malformed(String),
}

impl Classify for BackendError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransientNetwork
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Durable storage backend.
pub trait Storage: Send + Sync {
    /// Performs a trivial read (e.g. fetch one row) to prove liveness.
    fn ping(&self) -> BoxFuture<'_, BackendResult<()>>;
}

/// Blob storage backend.
pub trait BlobStore: Send + Sync {
    /// Verifies the blob store is reachable.
    fn ping(&self) -> BoxFuture<'_, BackendResult<()>>;
}

/// Source of resource-pressure readings.
pub trait ResourceSampler: Send + Sync {
    /// Fraction of memory in use, in `[0.0, 1.0]`.
    fn memory_usage(&self) -> BackendResult<f64>;
}

/// Reads memory pressure from a Linux `/proc/meminfo` style file.
#[derive(Debug, Clone)]
pub struct ProcMemorySampler {
    path: PathBuf,
}

impl ProcMemorySampler {
    pub fn new() -> Self {
        Self::with_path("/proc/meminfo")
    }

    /// Reads from a different file (for testing).
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        ProcMemorySampler {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Default for ProcMemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for ProcMemorySampler {
    fn memory_usage(&self) -> BackendResult<f64> {
        let text = std::fs::read_to_string(&self.path)?;
        parse_meminfo(&text)
    }
}

/// Computes `1 - MemAvailable / MemTotal` from meminfo text.
pub fn parse_meminfo(text: &str) -> BackendResult<f64> {
    let field = |name: &str| -> Option<u64> {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|value| value.parse().ok())
    };

    let total = field("MemTotal").ok_or_else(|| BackendError::Malformed("no MemTotal".into()))?;
    let available = field("MemAvailable")
        .ok_or_else(|| BackendError::Malformed("no MemAvailable".into()))?;

    if total == 0 {
        return Err(BackendError::Malformed("MemTotal is zero".into()));
    }

    let used = total.saturating_sub(available);
    Ok(used as f64 / total as f64)
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
