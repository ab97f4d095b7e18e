// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hold time above which a key-locked section is reported
pub const DEFAULT_MAX_HOLD_TIME: Duration = Duration::from_millis(1000);

/// Largest accepted lease, in seconds (ten years)
pub const MAX_TIMEOUT_SEC: u64 = 10 * 365 * 24 * 60 * 60;

/// Configuration shared by both semaphore kinds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemaphoreConfig {
    /// The master row of a key is the only serialization point for that key,
    /// so holding it longer than this is logged as a warning
    #[serde(with = "humantime_serde")]
    pub max_hold_time: Duration,
}

impl SemaphoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_hold_time(mut self, max_hold_time: Duration) -> Self {
        self.max_hold_time = max_hold_time;
        self
    }
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self {
            max_hold_time: DEFAULT_MAX_HOLD_TIME,
        }
    }
}
