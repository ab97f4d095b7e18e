// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expiring semaphores over a shared store
//!
//! This module provides:
//! - **KeyGate** - Per-key serialization over the store's master rows
//! - **CountingSemaphore** - Up to N concurrent holders per key
//! - **WriteReadSemaphore** - Many readers or one writer, with a writer precursor
//! - **SemaphoreGatedRunner** - Runs a unit of work only while holding a permit

pub mod counting;
pub mod gate;
pub mod runner;
pub mod write_read;

pub use counting::CountingSemaphore;
pub use gate::KeyGate;
pub use runner::{
    GatedRunnerConfig, LeaseGuard, ProgressCallback, ProgressingRunner, RunOutcome,
    SemaphoreGatedRunner, WorkError,
};
pub use write_read::{WriteReadSemaphore, WriteReadState};

use crate::config::MAX_TIMEOUT_SEC;
use crate::error::SemaphoreError;
use crate::token::Token;
use chrono::{DateTime, Utc};

pub(crate) fn validate_timeout(timeout_sec: u64) -> Result<(), SemaphoreError> {
    if timeout_sec < 1 {
        return Err(SemaphoreError::InvalidArgument(
            "Timeout cannot be less than one".to_string(),
        ));
    }
    if timeout_sec > MAX_TIMEOUT_SEC {
        return Err(SemaphoreError::InvalidArgument(format!(
            "Timeout cannot exceed {MAX_TIMEOUT_SEC} seconds"
        )));
    }
    Ok(())
}

pub(crate) fn validate_max_lock_count(max_lock_count: u32) -> Result<(), SemaphoreError> {
    if max_lock_count < 1 {
        return Err(SemaphoreError::InvalidArgument(
            "MaxLockCount cannot be less than one".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_token(token: &Token, what: &str) -> Result<(), SemaphoreError> {
    if token.is_empty() {
        return Err(SemaphoreError::InvalidArgument(format!(
            "{what} cannot be empty"
        )));
    }
    Ok(())
}

/// Expiration of a lease granted at `now`; callers validate `timeout_sec` first
pub(crate) fn expires_at(now: DateTime<Utc>, timeout_sec: u64) -> DateTime<Utc> {
    now + chrono::Duration::seconds(timeout_sec as i64)
}
