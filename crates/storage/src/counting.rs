// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counting semaphore tables

use crate::store::{backend, millis, SqliteStore};
use chrono::{DateTime, Utc};
use dbsem_core::{CountingStore, CountingTxn, Held, Lease, LockKey, StoreError, Token};
use rusqlite::{params, Connection};

const SELECT_MASTER: &str = "SELECT LOCK_KEY FROM COUNTING_MASTER WHERE LOCK_KEY = ?1";

impl CountingStore for SqliteStore {
    fn ensure_counting_master(&self, key: &LockKey) -> Result<(), StoreError> {
        self.connection()
            .execute(
                "INSERT OR IGNORE INTO COUNTING_MASTER (LOCK_KEY) VALUES (?1)",
                [key.as_str()],
            )
            .map_err(backend)?;
        tracing::trace!(key = %key, "created counting master record");
        Ok(())
    }

    fn lock_counting<T>(
        &self,
        key: &LockKey,
        section: &mut dyn FnMut(&mut dyn CountingTxn) -> Result<T, StoreError>,
    ) -> Result<Held<T>, StoreError> {
        self.exclusive(SELECT_MASTER, key, |conn| {
            section(&mut SqliteCountingTxn { conn, key })
        })
    }

    fn exists_unexpired_lock(
        &self,
        key: &LockKey,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.connection()
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM COUNTING_LOCK WHERE LOCK_KEY = ?1 AND EXPIRES_AT > ?2)",
                params![key.as_str(), millis(now)],
                |row| row.get(0),
            )
            .map_err(backend)
    }

    fn delete_expired_locks(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.connection()
            .execute(
                "DELETE FROM COUNTING_LOCK WHERE EXPIRES_AT <= ?1",
                [millis(now)],
            )
            .map_err(backend)
    }

    fn delete_all_locks(&self) -> Result<(), StoreError> {
        self.connection()
            .execute("DELETE FROM COUNTING_LOCK", [])
            .map_err(backend)?;
        Ok(())
    }
}

struct SqliteCountingTxn<'a> {
    conn: &'a Connection,
    key: &'a LockKey,
}

impl CountingTxn for SqliteCountingTxn<'_> {
    fn delete_expired(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.conn
            .execute(
                "DELETE FROM COUNTING_LOCK WHERE LOCK_KEY = ?1 AND EXPIRES_AT <= ?2",
                params![self.key.as_str(), millis(now)],
            )
            .map_err(backend)
    }

    fn count(&mut self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM COUNTING_LOCK WHERE LOCK_KEY = ?1",
                [self.key.as_str()],
                |row| row.get(0),
            )
            .map_err(backend)?;
        Ok(count as usize)
    }

    fn insert(&mut self, lease: &Lease) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO COUNTING_LOCK (LOCK_KEY, TOKEN, EXPIRES_AT) VALUES (?1, ?2, ?3)",
                params![self.key.as_str(), lease.token.as_str(), millis(lease.expires_at)],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn delete_unexpired(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.conn
            .execute(
                "DELETE FROM COUNTING_LOCK WHERE LOCK_KEY = ?1 AND TOKEN = ?2 AND EXPIRES_AT > ?3",
                params![self.key.as_str(), token.as_str(), millis(now)],
            )
            .map_err(backend)
    }

    fn refresh(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.conn
            .execute(
                "UPDATE COUNTING_LOCK SET EXPIRES_AT = ?4 \
                 WHERE LOCK_KEY = ?1 AND TOKEN = ?2 AND EXPIRES_AT > ?3",
                params![self.key.as_str(), token.as_str(), millis(now), millis(expires_at)],
            )
            .map_err(backend)
    }
}

#[cfg(test)]
#[path = "counting_tests.rs"]
mod tests;
