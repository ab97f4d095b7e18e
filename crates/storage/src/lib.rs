// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dbsem-storage: SQLite backend for dbsem semaphores
//!
//! Many processes open the same database file. Each key-locked section runs
//! in a `BEGIN IMMEDIATE` transaction, so sections are serialized by SQLite's
//! write lock and waiting callers block up to the configured busy timeout.

mod counting;
mod schema;
mod store;
mod write_read;

pub use schema::SCHEMA_VERSION;
pub use store::{SqliteConfig, SqliteStore, SqliteStoreError, DEFAULT_BUSY_TIMEOUT};
