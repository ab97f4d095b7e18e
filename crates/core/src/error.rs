// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for semaphore operations

use crate::storage::StoreError;
use crate::token::{LockKey, Token};
use thiserror::Error;

/// Errors surfaced by the counting and write-read semaphores
#[derive(Debug, Error)]
pub enum SemaphoreError {
    /// Rejected before touching the store
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The key's master record was missing even after provisioning it
    #[error("key not found: {0}")]
    KeyNotFound(String),
    /// A release (or counting refresh) named a token that is gone or expired
    #[error("key: {key} token: {token} has expired")]
    ReleaseFailed { key: String, token: String },
    /// A write-read precursor, write, or read lease lapsed
    #[error("lock expired for key: {key} token: {token}")]
    LockExpired { key: String, token: String },
    /// Transient infrastructure failure from the backing store
    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl SemaphoreError {
    pub(crate) fn release_failed(key: &LockKey, token: &Token) -> Self {
        Self::ReleaseFailed {
            key: key.to_string(),
            token: token.to_string(),
        }
    }

    pub(crate) fn expired(key: &LockKey, token: &Token) -> Self {
        Self::LockExpired {
            key: key.to_string(),
            token: token.to_string(),
        }
    }

    /// True for the expected writer/reader contention outcome
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::LockExpired { .. })
    }

    pub fn is_release_failed(&self) -> bool {
        matches!(self, Self::ReleaseFailed { .. })
    }
}

impl From<StoreError> for SemaphoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::KeyNotFound(key) => Self::KeyNotFound(key),
            StoreError::Backend(message) => Self::Storage(message),
        }
    }
}
