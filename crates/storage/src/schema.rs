// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema migration

use crate::store::SqliteStoreError;
use rusqlite::Connection;

/// Version recorded in `PRAGMA user_version` after migrating
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS COUNTING_MASTER (
    LOCK_KEY TEXT NOT NULL PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS COUNTING_LOCK (
    LOCK_KEY TEXT NOT NULL REFERENCES COUNTING_MASTER (LOCK_KEY) ON DELETE CASCADE,
    TOKEN TEXT NOT NULL,
    EXPIRES_AT INTEGER NOT NULL,
    PRIMARY KEY (LOCK_KEY, TOKEN)
);

CREATE INDEX IF NOT EXISTS COUNTING_LOCK_EXPIRES_AT ON COUNTING_LOCK (EXPIRES_AT);

CREATE TABLE IF NOT EXISTS WRITE_READ_MASTER (
    LOCK_KEY TEXT NOT NULL PRIMARY KEY,
    PRECURSOR_TOKEN TEXT,
    PRECURSOR_EXPIRES_AT INTEGER,
    WRITE_TOKEN TEXT,
    WRITE_EXPIRES_AT INTEGER
);

CREATE TABLE IF NOT EXISTS WRITE_READ_LOCK (
    LOCK_KEY TEXT NOT NULL REFERENCES WRITE_READ_MASTER (LOCK_KEY) ON DELETE CASCADE,
    READ_TOKEN TEXT NOT NULL,
    EXPIRES_AT INTEGER NOT NULL,
    PRIMARY KEY (LOCK_KEY, READ_TOKEN)
);

CREATE INDEX IF NOT EXISTS WRITE_READ_LOCK_EXPIRES_AT ON WRITE_READ_LOCK (EXPIRES_AT);
";

/// Create any missing tables. Safe to run on every start.
pub(crate) fn migrate(conn: &mut Connection) -> Result<i64, SqliteStoreError> {
    let found: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(SqliteStoreError::UnsupportedSchema {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    if found < SCHEMA_VERSION {
        tracing::info!(from = found, to = SCHEMA_VERSION, "migrated semaphore schema");
    }
    Ok(SCHEMA_VERSION)
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
