// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Automatic remediation.
//!
//! Each cycle pulls a fresh [`SystemHealth`](lifeline_core::SystemHealth),
//! collects the enabled actions whose trigger matches, and runs at most
//! one of them: the highest priority action that is neither cooling
//! down nor out of retries. Every execution is recorded.

pub mod actions;
mod action;
mod engine;

pub use action::{FnRemediation, RecoveryAction, RecoveryPolicy, Remediation, RemediationError};
pub use actions::{default_actions, RecoveryContext, DEFAULT_ACTION_IDS};
pub use engine::{RecoveryEngine, RecoveryError, HISTORY_LIMIT};
