// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dbsem-core: expiring semaphores over a shared relational store
//!
//! This crate provides:
//! - A counting semaphore (up to N holders per key) and a write-read
//!   semaphore (many readers or one writer) whose locks expire unless refreshed
//! - A gated runner that does work only while holding a counting permit
//! - The storage traits a backend implements, with an in-memory backend
//! - Clock and token generator seams for deterministic tests

pub mod clock;
pub mod config;
pub mod coordination;
pub mod error;
pub mod storage;
pub mod token;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{SemaphoreConfig, DEFAULT_MAX_HOLD_TIME, MAX_TIMEOUT_SEC};
pub use coordination::{
    CountingSemaphore, GatedRunnerConfig, KeyGate, LeaseGuard, ProgressCallback,
    ProgressingRunner, RunOutcome, SemaphoreGatedRunner, WorkError, WriteReadSemaphore,
    WriteReadState,
};
pub use error::SemaphoreError;
pub use storage::{
    CountingStore, CountingTxn, Held, Lease, MemoryStore, StoreError, WriteReadMaster,
    WriteReadStore, WriteReadTxn,
};
pub use token::{LockKey, SequentialTokenGen, Token, TokenGen, UuidTokenGen};
