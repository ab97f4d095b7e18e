// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite connection handling

use crate::schema;
use chrono::{DateTime, TimeZone, Utc};
use dbsem_core::{Held, LockKey, Lease, StoreError, Token};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How long a caller waits for another process's transaction to finish
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors opening or migrating a database
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i64, supported: i64 },
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Map a driver error into the storage error the semaphores understand
pub(crate) fn backend(err: rusqlite::Error) -> StoreError {
    SqliteStoreError::from(err).into()
}

pub(crate) fn millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {ms}")))
}

/// Rebuild a lease from a nullable token and expiration column pair
pub(crate) fn lease(
    token: Option<String>,
    expires_at: Option<i64>,
) -> Result<Option<Lease>, StoreError> {
    match (token, expires_at) {
        (Some(token), Some(ms)) => Ok(Some(Lease::new(Token::from(token), from_millis(ms)?))),
        _ => Ok(None),
    }
}

/// Connection settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Semaphore storage in a SQLite database shared by many processes
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// The schema is not created; call [`SqliteStore::migrate`] first.
    pub fn open(path: &Path, config: &SqliteConfig) -> Result<Self, SqliteStoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(config.busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened semaphore database");
        Ok(Self::from_connection(conn))
    }

    /// Private database for a single process, mostly for tests
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Create missing tables and return the schema version
    pub fn migrate(&self) -> Result<i64, SqliteStoreError> {
        schema::migrate(&mut self.connection())
    }

    pub(crate) fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `section` in an immediate transaction after confirming the key's
    /// master row exists. Commits only if `section` succeeds.
    pub(crate) fn exclusive<T>(
        &self,
        select_master: &str,
        key: &LockKey,
        section: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<Held<T>, StoreError> {
        let mut conn = self.connection();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(backend)?;
        let acquired = Instant::now();

        let found = tx
            .query_row(select_master, [key.as_str()], |_| Ok(()))
            .optional()
            .map_err(backend)?;
        if found.is_none() {
            return Err(StoreError::KeyNotFound(key.to_string()));
        }
        tracing::trace!(key = %key, "locked master record");

        let value = section(&tx)?;
        tx.commit().map_err(backend)?;
        Ok(Held {
            value,
            held: acquired.elapsed(),
        })
    }

    /// Run `f` in an immediate transaction not tied to any key
    pub(crate) fn batch<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut conn = self.connection();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(backend)?;
        let value = f(&tx).map_err(backend)?;
        tx.commit().map_err(backend)?;
        Ok(value)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
