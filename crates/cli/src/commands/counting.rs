// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counting semaphore commands

use super::{key, Context, Status, DEFAULT_TIMEOUT_SEC};
use anyhow::bail;
use clap::Subcommand;
use dbsem_core::Token;

#[derive(Subcommand)]
pub enum CountingCommand {
    /// Take one of at most --max permits on a key
    Acquire {
        key: String,
        /// Seconds until the permit expires
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SEC)]
        timeout: u64,
        /// Number of permits the key allows
        #[arg(long, default_value_t = 1)]
        max: u32,
    },
    /// Give a permit back
    Release { key: String, token: String },
    /// Push a permit's expiration out
    Refresh {
        key: String,
        token: String,
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SEC)]
        timeout: u64,
    },
    /// Check whether a key has any unexpired permit
    Exists { key: String },
    /// Delete expired permits of every key
    Gc,
    /// Delete every permit of every key
    ReleaseAll {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

pub fn handle(command: CountingCommand, ctx: &Context) -> anyhow::Result<Status> {
    let semaphore = ctx.counting();
    match command {
        CountingCommand::Acquire { key: k, timeout, max } => {
            let k = key(&k)?;
            match semaphore.attempt_to_acquire_lock(&k, timeout, max)? {
                Some(token) => println!("{token}"),
                None => {
                    eprintln!("no permit available for {k} ({max} held)");
                    return Ok(Status::Refused);
                }
            }
        }
        CountingCommand::Release { key: k, token } => {
            semaphore.release_lock(&key(&k)?, &Token::new(token))?;
        }
        CountingCommand::Refresh {
            key: k,
            token,
            timeout,
        } => {
            semaphore.refresh_lock_timeout(&key(&k)?, &Token::new(token), timeout)?;
        }
        CountingCommand::Exists { key: k } => {
            if semaphore.exists_unexpired_lock(&key(&k)?)? {
                println!("{k}: held");
            } else {
                println!("{k}: free");
                return Ok(Status::Refused);
            }
        }
        CountingCommand::Gc => {
            let deleted = semaphore.run_garbage_collection()?;
            println!("deleted {deleted} expired permits");
        }
        CountingCommand::ReleaseAll { yes } => {
            if !yes {
                bail!("release-all drops every permit; pass --yes to confirm");
            }
            semaphore.release_all_locks()?;
            println!("released all permits");
        }
    }
    Ok(Status::Done)
}
