// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serialization primitive
//!
//! Every read-modify-write on a key runs while that key's master row is held.
//! The gate provisions a missing master row once, retries, and reports
//! sections that hold the row longer than the configured threshold.

use crate::config::SemaphoreConfig;
use crate::error::SemaphoreError;
use crate::storage::{Held, StoreError};
use crate::token::LockKey;
use std::time::Duration;

/// Runs key-locked sections and watches how long they hold the master row
#[derive(Clone, Debug)]
pub struct KeyGate {
    max_hold_time: Duration,
}

impl KeyGate {
    pub fn new(config: &SemaphoreConfig) -> Self {
        Self {
            max_hold_time: config.max_hold_time,
        }
    }

    pub fn max_hold_time(&self) -> Duration {
        self.max_hold_time
    }

    /// Run `section` with the key's master row held.
    ///
    /// `section` must acquire the row itself and fail with
    /// [`StoreError::KeyNotFound`] when it does not exist. In that case
    /// `provision` creates the row and `section` runs exactly once more; a
    /// second miss is returned as [`SemaphoreError::KeyNotFound`].
    pub fn with_key_locked<T>(
        &self,
        key: &LockKey,
        mut section: impl FnMut() -> Result<Held<T>, StoreError>,
        provision: impl FnOnce() -> Result<(), StoreError>,
    ) -> Result<T, SemaphoreError> {
        let held = match section() {
            Err(StoreError::KeyNotFound(_)) => {
                tracing::debug!(key = %key, "master record missing, provisioning");
                provision()?;
                section()?
            }
            other => other?,
        };
        self.report(key, held.held);
        Ok(held.value)
    }

    fn report(&self, key: &LockKey, held: Duration) {
        let held_ms = held.as_millis() as u64;
        tracing::debug!(key = %key, held_ms, "master record released");
        if held > self.max_hold_time {
            tracing::warn!(
                key = %key,
                held_ms,
                max_hold_ms = self.max_hold_time.as_millis() as u64,
                "master record held longer than allowed"
            );
        }
    }
}

impl Default for KeyGate {
    fn default() -> Self {
        Self::new(&SemaphoreConfig::default())
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
