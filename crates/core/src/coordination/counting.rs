// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counting semaphore with expiring permits
//!
//! Up to `max_lock_count` tokens may be outstanding for a key. Holders that
//! stop refreshing simply expire; their rows are reclaimed the next time
//! anyone acquires on the same key, or by the garbage collection sweep.

use super::{expires_at, validate_max_lock_count, validate_timeout, validate_token, KeyGate};
use crate::clock::{Clock, SystemClock};
use crate::config::SemaphoreConfig;
use crate::error::SemaphoreError;
use crate::storage::{CountingStore, CountingTxn, Lease, StoreError};
use crate::token::{LockKey, Token, TokenGen, UuidTokenGen};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Counting semaphore over a [`CountingStore`]
pub struct CountingSemaphore<S, C = SystemClock, G = UuidTokenGen> {
    store: Arc<S>,
    clock: C,
    tokens: G,
    gate: KeyGate,
}

impl<S: CountingStore> CountingSemaphore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_parts(store, SystemClock, UuidTokenGen, &SemaphoreConfig::default())
    }
}

impl<S, C, G> CountingSemaphore<S, C, G>
where
    S: CountingStore,
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

    /// Attempt to take one of `max_lock_count` permits for `key`.
    ///
    /// Returns `None` immediately when every permit is held by an unexpired
    /// token. A granted token expires `timeout_sec` seconds from now unless
    /// refreshed.
    pub fn attempt_to_acquire_lock(
        &self,
        key: &LockKey,
        timeout_sec: u64,
        max_lock_count: u32,
    ) -> Result<Option<Token>, SemaphoreError> {
        validate_timeout(timeout_sec)?;
        validate_max_lock_count(max_lock_count)?;

        self.locked(key, |txn, now| {
            let reclaimed = txn.delete_expired(now)?;
            tracing::trace!(key = %key, count = reclaimed, "deleted expired locks");

            let count = txn.count()?;
            tracing::trace!(key = %key, count, "locks issued");
            if count >= max_lock_count as usize {
                tracing::debug!(key = %key, count, max_lock_count, "no locks available");
                return Ok(None);
            }

            let lease = Lease::new(self.tokens.next(), expires_at(now, timeout_sec));
            txn.insert(&lease)?;
            tracing::trace!(key = %key, token = %lease.token, "issued new lock");
            Ok(Some(lease.token))
        })
    }

    /// Give a permit back. Fails with [`SemaphoreError::ReleaseFailed`] when
    /// the token is unknown or has already expired.
    pub fn release_lock(&self, key: &LockKey, token: &Token) -> Result<(), SemaphoreError> {
        validate_token(token, "Token")?;

        let released = self.locked(key, |txn, now| txn.delete_unexpired(token, now))?;
        if released == 0 {
            tracing::trace!(key = %key, token = %token, "failed to release lock");
            return Err(SemaphoreError::release_failed(key, token));
        }
        tracing::trace!(key = %key, token = %token, "released lock");
        Ok(())
    }

    /// Push the token's expiration to `timeout_sec` seconds from now
    pub fn refresh_lock_timeout(
        &self,
        key: &LockKey,
        token: &Token,
        timeout_sec: u64,
    ) -> Result<(), SemaphoreError> {
        validate_token(token, "Token")?;
        validate_timeout(timeout_sec)?;

        let refreshed = self.locked(key, |txn, now| {
            txn.refresh(token, now, expires_at(now, timeout_sec))
        })?;
        if refreshed == 0 {
            tracing::trace!(key = %key, token = %token, "failed to refresh lock");
            return Err(SemaphoreError::release_failed(key, token));
        }
        tracing::trace!(key = %key, token = %token, timeout_sec, "refreshed lock");
        Ok(())
    }

    /// Read-only check that skips the key's master row
    pub fn exists_unexpired_lock(&self, key: &LockKey) -> Result<bool, SemaphoreError> {
        Ok(self.store.exists_unexpired_lock(key, self.clock.now())?)
    }

    /// Delete expired permits of every key
    pub fn run_garbage_collection(&self) -> Result<usize, SemaphoreError> {
        let deleted = self.store.delete_expired_locks(self.clock.now())?;
        tracing::debug!(count = deleted, "garbage collected expired locks");
        Ok(deleted)
    }

    /// Forcibly drop every permit of every key
    pub fn release_all_locks(&self) -> Result<(), SemaphoreError> {
        self.store.delete_all_locks()?;
        tracing::debug!("released all counting locks");
        Ok(())
    }

    /// Run `f` on the key's rows with the master row held. `now` is read once
    /// the row is held.
    fn locked<T>(
        &self,
        key: &LockKey,
        mut f: impl FnMut(&mut dyn CountingTxn, DateTime<Utc>) -> Result<T, StoreError>,
    ) -> Result<T, SemaphoreError> {
        self.gate.with_key_locked(
            key,
            || {
                self.store
                    .lock_counting(key, &mut |txn: &mut dyn CountingTxn| {
                        f(txn, self.clock.now())
                    })
            },
            || self.store.ensure_counting_master(key),
        )
    }
}

impl<S, C: Clone, G: Clone> Clone for CountingSemaphore<S, C, G> {
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
#[path = "counting_tests.rs"]
mod tests;
