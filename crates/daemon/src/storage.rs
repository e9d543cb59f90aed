// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite database used as the storage probe target.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use lifeline::backend::{BackendError, BackendResult};
use lifeline::Storage;
use rusqlite::Connection;

/// Storage backend answering liveness checks with `SELECT 1`.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open or create a database at the given path. The parent directory
    /// must exist.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        SqliteStorage {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn select_one(conn: &Mutex<Connection>) -> BackendResult<()> {
        let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
        let one: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        if one == 1 {
            Ok(())
        } else {
            Err(BackendError::Unavailable(format!(
                "SELECT 1 returned {one}"
            )))
        }
    }
}

impl Storage for SqliteStorage {
    fn ping(&self) -> BoxFuture<'_, BackendResult<()>> {
        let conn = self.conn.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || Self::select_one(&conn))
                .await
                .map_err(|e| BackendError::Unavailable(e.to_string()))?
        })
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
