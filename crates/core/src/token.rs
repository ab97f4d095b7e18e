// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock keys, tokens, and token generation

use crate::error::SemaphoreError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Caller-chosen name of a protected resource. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    pub fn new(key: impl Into<String>) -> Result<Self, SemaphoreError> {
        let key = key.into();
        if key.is_empty() {
            return Err(SemaphoreError::InvalidArgument(
                "Key cannot be empty".to_string(),
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque credential for one granted lock
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Token {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Generates globally unique tokens
pub trait TokenGen: Clone + Send + Sync {
    fn next(&self) -> Token;
}

/// UUID-based token generator for production use
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidTokenGen;

impl TokenGen for UuidTokenGen {
    fn next(&self) -> Token {
        Token(uuid::Uuid::new_v4().to_string())
    }
}

/// Sequential token generator for testing
#[derive(Clone, Debug)]
pub struct SequentialTokenGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialTokenGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialTokenGen {
    fn default() -> Self {
        Self::new("token")
    }
}

impl TokenGen for SequentialTokenGen {
    fn next(&self) -> Token {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Token(format!("{}-{}", self.prefix, n))
    }
}
