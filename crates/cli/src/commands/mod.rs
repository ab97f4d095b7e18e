// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod counting;
pub mod write_read;

use dbsem_core::{
    CountingSemaphore, LockKey, SemaphoreConfig, SystemClock, UuidTokenGen, WriteReadSemaphore,
};
use dbsem_storage::{SqliteConfig, SqliteStore};
use std::path::Path;
use std::sync::Arc;

/// Default lease length for acquire and refresh, in seconds
pub const DEFAULT_TIMEOUT_SEC: u64 = 60;

/// How a command finished when it did not fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Done,
    /// The lock was not granted, or is not present
    Refused,
}

/// An open database plus the settings the semaphores need
pub struct Context {
    store: Arc<SqliteStore>,
    semaphore: SemaphoreConfig,
    schema_version: i64,
}

impl Context {
    /// Open the database and bring its schema up to date
    pub fn open(
        path: &Path,
        sqlite: &SqliteConfig,
        semaphore: SemaphoreConfig,
    ) -> anyhow::Result<Self> {
        let store = SqliteStore::open(path, sqlite)?;
        let schema_version = store.migrate()?;
        tracing::debug!(path = %path.display(), schema_version, "database ready");
        Ok(Self {
            store: Arc::new(store),
            semaphore,
            schema_version,
        })
    }

    pub fn schema_version(&self) -> i64 {
        self.schema_version
    }

    pub fn counting(&self) -> CountingSemaphore<SqliteStore> {
        CountingSemaphore::with_parts(
            Arc::clone(&self.store),
            SystemClock,
            UuidTokenGen,
            &self.semaphore,
        )
    }

    pub fn write_read(&self) -> WriteReadSemaphore<SqliteStore> {
        WriteReadSemaphore::with_parts(
            Arc::clone(&self.store),
            SystemClock,
            UuidTokenGen,
            &self.semaphore,
        )
    }
}

fn key(key: &str) -> anyhow::Result<LockKey> {
    Ok(LockKey::new(key)?)
}
