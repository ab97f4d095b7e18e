// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage interface consumed by the semaphores
//!
//! A backend provides two things: an exclusive, blocking lock on one key's
//! master row for the duration of a transaction, and conditional row
//! mutations that match on both key and token. Everything else (reclamation,
//! capacity checks, the writer precursor protocol) lives in the semaphores.
//!
//! All mutations inside a section commit together when the section returns
//! `Ok` and roll back when it returns `Err`.

pub mod memory;

pub use memory::MemoryStore;

use crate::token::{LockKey, Token};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a storage backend
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("master record not found for key: {0}")]
    KeyNotFound(String),
    #[error("{0}")]
    Backend(String),
}

/// Output of a key-locked section
#[derive(Debug)]
pub struct Held<T> {
    pub value: T,
    /// Time between acquiring the master row and committing
    pub held: Duration,
}

/// A token with its expiration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lease {
    pub token: Token,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(token: Token, expires_at: DateTime<Utc>) -> Self {
        Self { token, expires_at }
    }

    /// A lease expiring exactly at `now` is already expired
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// The write-read master record of one key
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteReadMaster {
    pub precursor: Option<Lease>,
    pub write: Option<Lease>,
}

impl WriteReadMaster {
    pub fn live_precursor(&self, now: DateTime<Utc>) -> Option<&Lease> {
        self.precursor.as_ref().filter(|l| l.is_live(now))
    }

    pub fn live_write(&self, now: DateTime<Utc>) -> Option<&Lease> {
        self.write.as_ref().filter(|l| l.is_live(now))
    }

    /// A pending or active writer turns new readers away
    pub fn blocks_readers(&self, now: DateTime<Utc>) -> bool {
        self.live_precursor(now).is_some() || self.live_write(now).is_some()
    }
}

/// Row operations available while a counting key's master row is held
pub trait CountingTxn {
    /// Delete the key's rows whose expiration has passed
    fn delete_expired(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Count the key's remaining rows
    fn count(&mut self) -> Result<usize, StoreError>;

    fn insert(&mut self, lease: &Lease) -> Result<(), StoreError>;

    /// Delete the unexpired row matching the token
    fn delete_unexpired(&mut self, token: &Token, now: DateTime<Utc>)
        -> Result<usize, StoreError>;

    /// Move the expiration of the unexpired row matching the token
    fn refresh(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;
}

/// Persisted state of the counting semaphore
pub trait CountingStore: Send + Sync {
    /// Insert the key's master row if absent, in its own transaction
    fn ensure_counting_master(&self, key: &LockKey) -> Result<(), StoreError>;

    /// Run `section` while holding the key's master row exclusively.
    ///
    /// Fails with [`StoreError::KeyNotFound`] before running `section` when
    /// the master row does not exist.
    fn lock_counting<T>(
        &self,
        key: &LockKey,
        section: &mut dyn FnMut(&mut dyn CountingTxn) -> Result<T, StoreError>,
    ) -> Result<Held<T>, StoreError>;

    /// Read-only; does not take the master row
    fn exists_unexpired_lock(&self, key: &LockKey, now: DateTime<Utc>)
        -> Result<bool, StoreError>;

    /// Delete expired rows of every key
    fn delete_expired_locks(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Delete every row of every key. Master rows are kept.
    fn delete_all_locks(&self) -> Result<(), StoreError>;
}

/// Row operations available while a write-read key's master row is held
pub trait WriteReadTxn {
    fn master(&mut self) -> Result<WriteReadMaster, StoreError>;

    /// Install a precursor and clear the write fields
    fn set_precursor(&mut self, lease: &Lease) -> Result<(), StoreError>;

    fn refresh_precursor(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Clear the unexpired precursor matching `precursor` and install `write`
    fn promote(
        &mut self,
        precursor: &Token,
        now: DateTime<Utc>,
        write: &Lease,
    ) -> Result<usize, StoreError>;

    fn clear_write(&mut self, token: &Token, now: DateTime<Utc>) -> Result<usize, StoreError>;

    fn refresh_write(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    fn delete_expired_reads(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    fn count_unexpired_reads(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    fn insert_read(&mut self, lease: &Lease) -> Result<(), StoreError>;

    fn delete_read(&mut self, token: &Token, now: DateTime<Utc>) -> Result<usize, StoreError>;

    fn refresh_read(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;
}

/// Persisted state of the write-read semaphore
pub trait WriteReadStore: Send + Sync {
    fn ensure_write_read_master(&self, key: &LockKey) -> Result<(), StoreError>;

    /// Same contract as [`CountingStore::lock_counting`]
    fn lock_write_read<T>(
        &self,
        key: &LockKey,
        section: &mut dyn FnMut(&mut dyn WriteReadTxn) -> Result<T, StoreError>,
    ) -> Result<Held<T>, StoreError>;

    /// Delete expired read rows and clear lapsed precursor and write fields
    /// across every key
    fn delete_expired_write_read(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Delete every master record and read row
    fn delete_all_write_read(&self) -> Result<(), StoreError>;
}
