// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration file

use anyhow::{bail, Context};
use dbsem_core::{SemaphoreConfig, DEFAULT_MAX_HOLD_TIME};
use dbsem_storage::{SqliteConfig, DEFAULT_BUSY_TIMEOUT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the database when neither `--db` nor the
/// config file does
pub const DB_ENV: &str = "DBSEM_DB";

/// Settings read from the optional TOML file
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub database: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub max_hold_time: Duration,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            max_hold_time: DEFAULT_MAX_HOLD_TIME,
        }
    }
}

impl CliConfig {
    /// Load `path`, or the defaults when no file was given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// `--db` wins over the file, which wins over the environment
    pub fn database(
        &self,
        flag: Option<PathBuf>,
        env: Option<PathBuf>,
    ) -> anyhow::Result<PathBuf> {
        match flag.or_else(|| self.database.clone()).or(env) {
            Some(path) => Ok(path),
            None => bail!(
                "no database given: pass --db, set {DB_ENV}, or set `database` in the config file"
            ),
        }
    }

    pub fn sqlite(&self) -> SqliteConfig {
        SqliteConfig {
            busy_timeout: self.busy_timeout,
        }
    }

    pub fn semaphore(&self) -> SemaphoreConfig {
        SemaphoreConfig::new().with_max_hold_time(self.max_hold_time)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
