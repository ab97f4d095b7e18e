// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs a unit of work only while holding a counting permit
//!
//! The work reports progress through a [`ProgressCallback`], and each report
//! pushes the permit's expiration out by the configured timeout. The permit
//! is released exactly once when the work returns, fails, or panics.
//!
//! A run never surfaces an error to its caller. Every failure, including a
//! failure to acquire, is logged and reported as [`RunOutcome::Failed`].

use super::{validate_max_lock_count, validate_timeout, CountingSemaphore};
use crate::clock::{Clock, SystemClock};
use crate::error::SemaphoreError;
use crate::storage::CountingStore;
use crate::token::{LockKey, Token, TokenGen, UuidTokenGen};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Error type a unit of work may fail with
pub type WorkError = Box<dyn std::error::Error + Send + Sync>;

/// Signal raised by a unit of work to keep its permit alive
pub trait ProgressCallback {
    fn progress_made(&self) -> Result<(), SemaphoreError>;
}

/// A unit of work that reports its progress
pub trait ProgressingRunner {
    fn run(&mut self, progress: &dyn ProgressCallback) -> Result<(), WorkError>;
}

impl<F> ProgressingRunner for F
where
    F: FnMut(&dyn ProgressCallback) -> Result<(), WorkError>,
{
    fn run(&mut self, progress: &dyn ProgressCallback) -> Result<(), WorkError> {
        self(progress)
    }
}

/// Which permit a gated runner holds while working
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatedRunnerConfig {
    pub lock_key: String,
    pub lock_timeout_sec: u64,
    pub max_lock_count: u32,
}

impl GatedRunnerConfig {
    pub fn new(lock_key: impl Into<String>, lock_timeout_sec: u64, max_lock_count: u32) -> Self {
        Self {
            lock_key: lock_key.into(),
            lock_timeout_sec,
            max_lock_count,
        }
    }

    fn validate(&self) -> Result<LockKey, SemaphoreError> {
        let key = LockKey::new(self.lock_key.as_str())?;
        validate_timeout(self.lock_timeout_sec)?;
        validate_max_lock_count(self.max_lock_count)?;
        Ok(key)
    }
}

/// Result of one gated run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every permit was taken; the work did not run
    Skipped,
    Completed,
    /// Acquisition, the work, or the release failed
    Failed(String),
}

/// Holds one permit and gives it back exactly once
pub struct LeaseGuard<'a, S, C, G>
where
    S: CountingStore,
    C: Clock,
    G: TokenGen,
{
    semaphore: &'a CountingSemaphore<S, C, G>,
    key: &'a LockKey,
    token: Option<Token>,
    timeout_sec: u64,
}

impl<'a, S, C, G> LeaseGuard<'a, S, C, G>
where
    S: CountingStore,
    C: Clock,
    G: TokenGen,
{
    pub fn new(
        semaphore: &'a CountingSemaphore<S, C, G>,
        key: &'a LockKey,
        token: Token,
        timeout_sec: u64,
    ) -> Self {
        Self {
            semaphore,
            key,
            token: Some(token),
            timeout_sec,
        }
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Release the permit now instead of on drop
    pub fn release(mut self) -> Result<(), SemaphoreError> {
        match self.token.take() {
            Some(token) => self.semaphore.release_lock(self.key, &token),
            None => Ok(()),
        }
    }
}

impl<S, C, G> ProgressCallback for LeaseGuard<'_, S, C, G>
where
    S: CountingStore,
    C: Clock,
    G: TokenGen,
{
    fn progress_made(&self) -> Result<(), SemaphoreError> {
        match &self.token {
            Some(token) => self
                .semaphore
                .refresh_lock_timeout(self.key, token, self.timeout_sec),
            None => Ok(()),
        }
    }
}

impl<S, C, G> Drop for LeaseGuard<'_, S, C, G>
where
    S: CountingStore,
    C: Clock,
    G: TokenGen,
{
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(e) = self.semaphore.release_lock(self.key, &token) {
                tracing::warn!(key = %self.key, token = %token, error = %e, "failed to release lock on drop");
            }
        }
    }
}

/// Runs `R` at most `max_lock_count` at a time across every process sharing
/// the store
pub struct SemaphoreGatedRunner<R, S, C = SystemClock, G = UuidTokenGen>
where
    S: CountingStore,
    C: Clock,
    G: TokenGen,
{
    semaphore: CountingSemaphore<S, C, G>,
    key: LockKey,
    lock_timeout_sec: u64,
    max_lock_count: u32,
    runner: R,
}

impl<R, S, C, G> SemaphoreGatedRunner<R, S, C, G>
where
    R: ProgressingRunner,
    S: CountingStore,
    C: Clock,
    G: TokenGen,
{
    pub fn configure(
        semaphore: CountingSemaphore<S, C, G>,
        config: GatedRunnerConfig,
        runner: R,
    ) -> Result<Self, SemaphoreError> {
        let key = config.validate()?;
        Ok(Self {
            semaphore,
            key,
            lock_timeout_sec: config.lock_timeout_sec,
            max_lock_count: config.max_lock_count,
            runner,
        })
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Acquire a permit, run the work, release. Never fails and never unwinds.
    pub fn run(&mut self) -> RunOutcome {
        match self.try_run() {
            Ok(outcome) => outcome,
            Err(message) => {
                tracing::error!(key = %self.key, error = %message, "gated run failed");
                RunOutcome::Failed(message)
            }
        }
    }

    fn try_run(&mut self) -> Result<RunOutcome, String> {
        let granted = self
            .semaphore
            .attempt_to_acquire_lock(&self.key, self.lock_timeout_sec, self.max_lock_count)
            .map_err(|e| e.to_string())?;
        let Some(token) = granted else {
            tracing::debug!(key = %self.key, "no permit available, skipping run");
            return Ok(RunOutcome::Skipped);
        };

        let guard = LeaseGuard::new(&self.semaphore, &self.key, token, self.lock_timeout_sec);
        let runner = &mut self.runner;
        let result = panic::catch_unwind(AssertUnwindSafe(|| runner.run(&guard)));
        let released = guard.release();

        let work = match result {
            Ok(work) => work.map_err(|e| e.to_string()),
            Err(payload) => Err(format!("unit of work panicked: {}", panic_message(&*payload))),
        };
        match (work, released) {
            (Ok(()), Ok(())) => Ok(RunOutcome::Completed),
            (Ok(()), Err(e)) => Err(e.to_string()),
            (Err(message), Ok(())) => Err(message),
            (Err(message), Err(e)) => {
                tracing::error!(key = %self.key, error = %e, "failed to release lock");
                Err(message)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
