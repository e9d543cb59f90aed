// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cache layer interface and an in-memory implementation.
//!
//! The health monitor reads [`CacheStats`] to judge cache effectiveness;
//! remediation actions purge the cache when it misbehaves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use crate::lock;

/// Snapshot of cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Hits divided by lookups since the last clear (0.0 with no lookups).
    pub hit_rate: f64,
    /// Number of entries currently held.
    pub size: usize,
    /// Lookups since the last clear.
    pub lookups: u64,
}

/// Cache operations used by probes and remediation.
pub trait Cache: Send + Sync {
    /// Drops every entry and resets hit statistics.
    fn clear(&self);

    /// Drops every entry carrying `tag`; returns how many were removed.
    fn invalidate_by_tag(&self, tag: &str) -> usize;

    fn stats(&self) -> CacheStats;
}

struct Entry {
    value: Value,
    tags: Vec<String>,
}

/// Bounded in-memory cache keyed by string.
///
/// When full, inserting a new key evicts an arbitrary existing entry.
pub struct MemoryCache {
    capacity: usize,
    entries: Mutex<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        MemoryCache {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let value = lock(&self.entries).get(key).map(|e| e.value.clone());
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    pub fn insert(&self, key: impl Into<String>, value: Value, tags: &[&str]) {
        let key = key.into();
        let mut entries = lock(&self.entries);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(victim) = entries.keys().next().cloned() {
                entries.remove(&victim);
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Cache for MemoryCache {
    fn clear(&self) {
        lock(&self.entries).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    fn invalidate_by_tag(&self, tag: &str) -> usize {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, e| !e.tags.iter().any(|t| t == tag));
        before - entries.len()
    }

    fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let lookups = hits + self.misses.load(Ordering::Relaxed);
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        CacheStats {
            hit_rate,
            size: lock(&self.entries).len(),
            lookups,
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
