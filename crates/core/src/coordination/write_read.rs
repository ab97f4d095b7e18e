// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-read semaphore with a two-phase writer
//!
//! A writer first takes a precursor, which turns new readers away while the
//! existing ones drain. The writer then polls [`WriteReadSemaphore::acquire_write_lock`]
//! until no unexpired read remains; every poll that finds readers keeps the
//! precursor alive. A precursor that is not polled expires and readers are
//! admitted again.
//!
//! ```text
//! Free ──read──► Reading ──precursor──► WritePending ──drained──► WriteHeld
//!   ▲                                        │                        │
//!   └──────────── precursor expires ─────────┘◄───── release/expire ──┘
//! ```

use super::{expires_at, validate_timeout, validate_token, KeyGate};
use crate::clock::{Clock, SystemClock};
use crate::config::SemaphoreConfig;
use crate::error::SemaphoreError;
use crate::storage::{Lease, StoreError, WriteReadMaster, WriteReadStore, WriteReadTxn};
use crate::token::{LockKey, Token, TokenGen, UuidTokenGen};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Observed state of one key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteReadState {
    Free,
    Reading(usize),
    /// A precursor is waiting for `readers` to drain
    WritePending { readers: usize },
    WriteHeld,
}

impl WriteReadState {
    fn observe(master: &WriteReadMaster, readers: usize, now: DateTime<Utc>) -> Self {
        if master.live_write(now).is_some() {
            Self::WriteHeld
        } else if master.live_precursor(now).is_some() {
            Self::WritePending { readers }
        } else if readers > 0 {
            Self::Reading(readers)
        } else {
            Self::Free
        }
    }
}

impl fmt::Display for WriteReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Reading(n) => write!(f, "reading ({n} readers)"),
            Self::WritePending { readers } => write!(f, "write pending ({readers} readers)"),
            Self::WriteHeld => write!(f, "write held"),
        }
    }
}

enum WriteAttempt {
    PrecursorLapsed,
    Waiting { readers: usize },
    Granted(Token),
}

/// Reader-writer semaphore over a [`WriteReadStore`]
pub struct WriteReadSemaphore<S, C = SystemClock, G = UuidTokenGen> {
    store: Arc<S>,
    clock: C,
    tokens: G,
    gate: KeyGate,
}

impl<S: WriteReadStore> WriteReadSemaphore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_parts(store, SystemClock, UuidTokenGen, &SemaphoreConfig::default())
    }
}

impl<S, C, G> WriteReadSemaphore<S, C, G>
where
    S: WriteReadStore,
    C: Clock,
    G: TokenGen,
{
    pub fn with_parts(store: Arc<S>, clock: C, tokens: G, config: &SemaphoreConfig) -> Self {
        Self {
            store,
            clock,
            tokens,
            gate: KeyGate::new(config),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Take a shared read lock unless a writer is pending or active
    pub fn acquire_read_lock(
        &self,
        key: &LockKey,
        timeout_sec: u64,
    ) -> Result<Option<Token>, SemaphoreError> {
        validate_timeout(timeout_sec)?;

        self.locked(key, |txn, now| {
            let reclaimed = txn.delete_expired_reads(now)?;
            tracing::trace!(key = %key, count = reclaimed, "deleted expired read locks");

            if txn.master()?.blocks_readers(now) {
                tracing::debug!(key = %key, "read refused, writer pending");
                return Ok(None);
            }
            let lease = Lease::new(self.tokens.next(), expires_at(now, timeout_sec));
            txn.insert_read(&lease)?;
            tracing::trace!(key = %key, token = %lease.token, "issued read lock");
            Ok(Some(lease.token))
        })
    }

    pub fn release_read_lock(&self, key: &LockKey, token: &Token) -> Result<(), SemaphoreError> {
        validate_token(token, "Token")?;

        let released = self.locked(key, |txn, now| txn.delete_read(token, now))?;
        if released == 0 {
            return Err(SemaphoreError::release_failed(key, token));
        }
        tracing::trace!(key = %key, token = %token, "released read lock");
        Ok(())
    }

    /// Extend a read lock. A lapsed read lock is reported as
    /// [`SemaphoreError::LockExpired`] since a writer may already be running.
    pub fn refresh_read_lock(
        &self,
        key: &LockKey,
        token: &Token,
        timeout_sec: u64,
    ) -> Result<(), SemaphoreError> {
        validate_token(token, "Token")?;
        validate_timeout(timeout_sec)?;

        let refreshed = self.locked(key, |txn, now| {
            txn.refresh_read(token, now, expires_at(now, timeout_sec))
        })?;
        if refreshed == 0 {
            return Err(SemaphoreError::expired(key, token));
        }
        Ok(())
    }

    /// Reserve the writer's place in line. Only one unexpired precursor or
    /// write lock may exist per key.
    pub fn acquire_write_lock_precursor(
        &self,
        key: &LockKey,
        timeout_sec: u64,
    ) -> Result<Option<Token>, SemaphoreError> {
        validate_timeout(timeout_sec)?;

        self.locked(key, |txn, now| {
            if txn.master()?.blocks_readers(now) {
                tracing::debug!(key = %key, "precursor refused, writer already in line");
                return Ok(None);
            }
            let lease = Lease::new(self.tokens.next(), expires_at(now, timeout_sec));
            txn.set_precursor(&lease)?;
            tracing::trace!(key = %key, token = %lease.token, "issued write precursor");
            Ok(Some(lease.token))
        })
    }

    /// Promote a precursor to the write lock once readers have drained.
    ///
    /// Returns `None` while unexpired readers remain, after pushing the
    /// precursor's expiration to `timeout_sec` from now. Fails with
    /// [`SemaphoreError::LockExpired`] when `precursor` is no longer the
    /// key's live precursor; the caller must start over with a new one.
    pub fn acquire_write_lock(
        &self,
        key: &LockKey,
        precursor: &Token,
        timeout_sec: u64,
    ) -> Result<Option<Token>, SemaphoreError> {
        validate_token(precursor, "Precursor token")?;
        validate_timeout(timeout_sec)?;

        let attempt = self.locked(key, |txn, now| {
            let master = txn.master()?;
            if master.live_precursor(now).map(|l| &l.token) != Some(precursor) {
                return Ok(WriteAttempt::PrecursorLapsed);
            }

            txn.delete_expired_reads(now)?;
            let readers = txn.count_unexpired_reads(now)?;
            let expiry = expires_at(now, timeout_sec);
            if readers > 0 {
                txn.refresh_precursor(precursor, now, expiry)?;
                return Ok(WriteAttempt::Waiting { readers });
            }

            let lease = Lease::new(self.tokens.next(), expiry);
            txn.promote(precursor, now, &lease)?;
            Ok(WriteAttempt::Granted(lease.token))
        })?;

        match attempt {
            WriteAttempt::PrecursorLapsed => {
                tracing::debug!(key = %key, token = %precursor, "write precursor expired");
                Err(SemaphoreError::expired(key, precursor))
            }
            WriteAttempt::Waiting { readers } => {
                tracing::debug!(key = %key, readers, "write waiting for readers to drain");
                Ok(None)
            }
            WriteAttempt::Granted(token) => {
                tracing::trace!(key = %key, token = %token, "issued write lock");
                Ok(Some(token))
            }
        }
    }

    pub fn release_write_lock(&self, key: &LockKey, token: &Token) -> Result<(), SemaphoreError> {
        validate_token(token, "Token")?;

        let released = self.locked(key, |txn, now| txn.clear_write(token, now))?;
        if released == 0 {
            return Err(SemaphoreError::release_failed(key, token));
        }
        tracing::trace!(key = %key, token = %token, "released write lock");
        Ok(())
    }

    pub fn refresh_write_lock(
        &self,
        key: &LockKey,
        token: &Token,
        timeout_sec: u64,
    ) -> Result<(), SemaphoreError> {
        validate_token(token, "Token")?;
        validate_timeout(timeout_sec)?;

        let refreshed = self.locked(key, |txn, now| {
            txn.refresh_write(token, now, expires_at(now, timeout_sec))
        })?;
        if refreshed == 0 {
            return Err(SemaphoreError::expired(key, token));
        }
        Ok(())
    }

    /// Current state of `key`. Never provisions the key.
    pub fn state(&self, key: &LockKey) -> Result<WriteReadState, SemaphoreError> {
        let observed = self
            .store
            .lock_write_read(key, &mut |txn: &mut dyn WriteReadTxn| {
                let now = self.clock.now();
                let master = txn.master()?;
                let readers = txn.count_unexpired_reads(now)?;
                Ok(WriteReadState::observe(&master, readers, now))
            });
        match observed {
            Ok(held) => Ok(held.value),
            Err(StoreError::KeyNotFound(_)) => Ok(WriteReadState::Free),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete expired read locks and clear lapsed precursors and write locks
    /// of every key
    pub fn run_garbage_collection(&self) -> Result<usize, SemaphoreError> {
        let deleted = self.store.delete_expired_write_read(self.clock.now())?;
        tracing::debug!(count = deleted, "garbage collected expired write-read locks");
        Ok(deleted)
    }

    /// Forcibly drop all write-read state. Keys are provisioned again on
    /// next use.
    pub fn release_all_locks(&self) -> Result<(), SemaphoreError> {
        self.store.delete_all_write_read()?;
        tracing::debug!("released all write-read locks");
        Ok(())
    }

    fn locked<T>(
        &self,
        key: &LockKey,
        mut f: impl FnMut(&mut dyn WriteReadTxn, DateTime<Utc>) -> Result<T, StoreError>,
    ) -> Result<T, SemaphoreError> {
        self.gate.with_key_locked(
            key,
            || {
                self.store
                    .lock_write_read(key, &mut |txn: &mut dyn WriteReadTxn| {
                        f(txn, self.clock.now())
                    })
            },
            || self.store.ensure_write_read_master(key),
        )
    }
}

impl<S, C: Clone, G: Clone> Clone for WriteReadSemaphore<S, C, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            tokens: self.tokens.clone(),
            gate: self.gate.clone(),
        }
    }
}

#[cfg(test)]
#[path = "write_read_tests.rs"]
mod tests;
