// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-read semaphore tables

use crate::store::{backend, lease, millis, SqliteStore};
use chrono::{DateTime, Utc};
use dbsem_core::{
    Held, Lease, LockKey, StoreError, Token, WriteReadMaster, WriteReadStore, WriteReadTxn,
};
use rusqlite::{params, Connection};

const SELECT_MASTER: &str = "SELECT LOCK_KEY FROM WRITE_READ_MASTER WHERE LOCK_KEY = ?1";

impl WriteReadStore for SqliteStore {
    fn ensure_write_read_master(&self, key: &LockKey) -> Result<(), StoreError> {
        self.connection()
            .execute(
                "INSERT OR IGNORE INTO WRITE_READ_MASTER (LOCK_KEY) VALUES (?1)",
                [key.as_str()],
            )
            .map_err(backend)?;
        tracing::trace!(key = %key, "created write-read master record");
        Ok(())
    }

    fn lock_write_read<T>(
        &self,
        key: &LockKey,
        section: &mut dyn FnMut(&mut dyn WriteReadTxn) -> Result<T, StoreError>,
    ) -> Result<Held<T>, StoreError> {
        self.exclusive(SELECT_MASTER, key, |conn| {
            section(&mut SqliteWriteReadTxn { conn, key })
        })
    }

    fn delete_expired_write_read(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let now = millis(now);
        self.batch(|conn| {
            let reads = conn.execute("DELETE FROM WRITE_READ_LOCK WHERE EXPIRES_AT <= ?1", [now])?;
            let precursors = conn.execute(
                "UPDATE WRITE_READ_MASTER SET PRECURSOR_TOKEN = NULL, PRECURSOR_EXPIRES_AT = NULL \
                 WHERE PRECURSOR_EXPIRES_AT <= ?1",
                [now],
            )?;
            let writes = conn.execute(
                "UPDATE WRITE_READ_MASTER SET WRITE_TOKEN = NULL, WRITE_EXPIRES_AT = NULL \
                 WHERE WRITE_EXPIRES_AT <= ?1",
                [now],
            )?;
            Ok(reads + precursors + writes)
        })
    }

    fn delete_all_write_read(&self) -> Result<(), StoreError> {
        self.batch(|conn| {
            conn.execute("DELETE FROM WRITE_READ_LOCK", [])?;
            conn.execute("DELETE FROM WRITE_READ_MASTER", [])?;
            Ok(())
        })
    }
}

struct SqliteWriteReadTxn<'a> {
    conn: &'a Connection,
    key: &'a LockKey,
}

impl SqliteWriteReadTxn<'_> {
    /// Update the master row; `sql` binds the key as ?1
    fn update_master(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<usize, StoreError> {
        self.conn.execute(sql, params).map_err(backend)
    }
}

impl WriteReadTxn for SqliteWriteReadTxn<'_> {
    fn master(&mut self) -> Result<WriteReadMaster, StoreError> {
        let (precursor_token, precursor_expires, write_token, write_expires) = self
            .conn
            .query_row(
                "SELECT PRECURSOR_TOKEN, PRECURSOR_EXPIRES_AT, WRITE_TOKEN, WRITE_EXPIRES_AT \
                 FROM WRITE_READ_MASTER WHERE LOCK_KEY = ?1",
                [self.key.as_str()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .map_err(backend)?;
        Ok(WriteReadMaster {
            precursor: lease(precursor_token, precursor_expires)?,
            write: lease(write_token, write_expires)?,
        })
    }

    fn set_precursor(&mut self, lease: &Lease) -> Result<(), StoreError> {
        self.update_master(
            "UPDATE WRITE_READ_MASTER SET PRECURSOR_TOKEN = ?2, PRECURSOR_EXPIRES_AT = ?3, \
             WRITE_TOKEN = NULL, WRITE_EXPIRES_AT = NULL WHERE LOCK_KEY = ?1",
            params![self.key.as_str(), lease.token.as_str(), millis(lease.expires_at)],
        )?;
        Ok(())
    }

    fn refresh_precursor(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.update_master(
            "UPDATE WRITE_READ_MASTER SET PRECURSOR_EXPIRES_AT = ?4 \
             WHERE LOCK_KEY = ?1 AND PRECURSOR_TOKEN = ?2 AND PRECURSOR_EXPIRES_AT > ?3",
            params![self.key.as_str(), token.as_str(), millis(now), millis(expires_at)],
        )
    }

    fn promote(
        &mut self,
        precursor: &Token,
        now: DateTime<Utc>,
        write: &Lease,
    ) -> Result<usize, StoreError> {
        self.update_master(
            "UPDATE WRITE_READ_MASTER SET PRECURSOR_TOKEN = NULL, PRECURSOR_EXPIRES_AT = NULL, \
             WRITE_TOKEN = ?4, WRITE_EXPIRES_AT = ?5 \
             WHERE LOCK_KEY = ?1 AND PRECURSOR_TOKEN = ?2 AND PRECURSOR_EXPIRES_AT > ?3",
            params![
                self.key.as_str(),
                precursor.as_str(),
                millis(now),
                write.token.as_str(),
                millis(write.expires_at)
            ],
        )
    }

    fn clear_write(&mut self, token: &Token, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.update_master(
            "UPDATE WRITE_READ_MASTER SET WRITE_TOKEN = NULL, WRITE_EXPIRES_AT = NULL \
             WHERE LOCK_KEY = ?1 AND WRITE_TOKEN = ?2 AND WRITE_EXPIRES_AT > ?3",
            params![self.key.as_str(), token.as_str(), millis(now)],
        )
    }

    fn refresh_write(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.update_master(
            "UPDATE WRITE_READ_MASTER SET WRITE_EXPIRES_AT = ?4 \
             WHERE LOCK_KEY = ?1 AND WRITE_TOKEN = ?2 AND WRITE_EXPIRES_AT > ?3",
            params![self.key.as_str(), token.as_str(), millis(now), millis(expires_at)],
        )
    }

    fn delete_expired_reads(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.conn
            .execute(
                "DELETE FROM WRITE_READ_LOCK WHERE LOCK_KEY = ?1 AND EXPIRES_AT <= ?2",
                params![self.key.as_str(), millis(now)],
            )
            .map_err(backend)
    }

    fn count_unexpired_reads(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM WRITE_READ_LOCK WHERE LOCK_KEY = ?1 AND EXPIRES_AT > ?2",
                params![self.key.as_str(), millis(now)],
                |row| row.get(0),
            )
            .map_err(backend)?;
        Ok(count as usize)
    }

    fn insert_read(&mut self, lease: &Lease) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO WRITE_READ_LOCK (LOCK_KEY, READ_TOKEN, EXPIRES_AT) VALUES (?1, ?2, ?3)",
                params![self.key.as_str(), lease.token.as_str(), millis(lease.expires_at)],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn delete_read(&mut self, token: &Token, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.conn
            .execute(
                "DELETE FROM WRITE_READ_LOCK WHERE LOCK_KEY = ?1 AND READ_TOKEN = ?2 AND EXPIRES_AT > ?3",
                params![self.key.as_str(), token.as_str(), millis(now)],
            )
            .map_err(backend)
    }

    fn refresh_read(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.conn
            .execute(
                "UPDATE WRITE_READ_LOCK SET EXPIRES_AT = ?4 \
                 WHERE LOCK_KEY = ?1 AND READ_TOKEN = ?2 AND EXPIRES_AT > ?3",
                params![self.key.as_str(), token.as_str(), millis(now), millis(expires_at)],
            )
            .map_err(backend)
    }
}

#[cfg(test)]
#[path = "write_read_tests.rs"]
mod tests;
