// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Environment lookups for default file locations.

use std::path::PathBuf;

pub mod names {
    include!(concat!(env!("OUT_DIR"), "/env_names.rs"));
}

fn path_var(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Config file named by `LIFELINE_CONFIG`, if set.
pub fn config_path() -> Option<PathBuf> {
    path_var(names::LIFELINE_CONFIG)
}

/// State directory named by `LIFELINE_STATE_DIR`, if set.
pub fn state_dir() -> Option<PathBuf> {
    path_var(names::LIFELINE_STATE_DIR)
}

pub fn xdg_config_home() -> Option<PathBuf> {
    path_var(names::XDG_CONFIG_HOME)
}

/// Config file location: `LIFELINE_CONFIG`, then `$XDG_CONFIG_HOME/lifeline`,
/// then the platform config directory.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = config_path() {
        return path;
    }
    xdg_config_home()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("lifeline").join("lifeline.toml"))
        .unwrap_or_else(|| PathBuf::from("lifeline.toml"))
}

/// Directory for the probe database and blob store.
pub fn default_state_dir() -> PathBuf {
    if let Some(dir) = state_dir() {
        return dir;
    }
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .map(|dir| dir.join("lifeline"))
        .unwrap_or_else(|| PathBuf::from(".lifeline"))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
