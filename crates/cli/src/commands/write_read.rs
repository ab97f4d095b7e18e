// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-read semaphore commands

use super::{key, Context, Status, DEFAULT_TIMEOUT_SEC};
use anyhow::bail;
use clap::{Args, Subcommand};
use dbsem_core::Token;

#[derive(Args)]
pub struct ReadArgs {
    #[command(subcommand)]
    pub command: ReadCommand,
}

#[derive(Subcommand)]
pub enum ReadCommand {
    /// Take a shared read lock unless a writer is waiting or active
    Acquire {
        key: String,
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SEC)]
        timeout: u64,
    },
    /// Release a read lock
    Release { key: String, token: String },
    /// Extend a read lock
    Refresh {
        key: String,
        token: String,
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SEC)]
        timeout: u64,
    },
}

#[derive(Args)]
pub struct WriteArgs {
    #[command(subcommand)]
    pub command: WriteCommand,
}

#[derive(Subcommand)]
pub enum WriteCommand {
    /// Get in line for the write lock, turning new readers away
    Precursor {
        key: String,
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SEC)]
        timeout: u64,
    },
    /// Exchange a precursor for the write lock once readers drain
    Acquire {
        key: String,
        precursor: String,
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SEC)]
        timeout: u64,
    },
    /// Release the write lock
    Release { key: String, token: String },
    /// Extend the write lock
    Refresh {
        key: String,
        token: String,
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SEC)]
        timeout: u64,
    },
}

#[derive(Args)]
pub struct RwArgs {
    #[command(subcommand)]
    pub command: RwCommand,
}

#[derive(Subcommand)]
pub enum RwCommand {
    /// Show who holds a key
    State { key: String },
    /// Delete expired read locks and lapsed writers of every key
    Gc,
    /// Drop all write-read state
    ReleaseAll {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

pub fn handle_read(command: ReadCommand, ctx: &Context) -> anyhow::Result<Status> {
    let semaphore = ctx.write_read();
    match command {
        ReadCommand::Acquire { key: k, timeout } => {
            let k = key(&k)?;
            return Ok(granted(semaphore.acquire_read_lock(&k, timeout)?, || {
                eprintln!("read refused for {k}: a writer is waiting or active");
            }));
        }
        ReadCommand::Release { key: k, token } => {
            semaphore.release_read_lock(&key(&k)?, &Token::new(token))?;
        }
        ReadCommand::Refresh {
            key: k,
            token,
            timeout,
        } => {
            semaphore.refresh_read_lock(&key(&k)?, &Token::new(token), timeout)?;
        }
    }
    Ok(Status::Done)
}

pub fn handle_write(command: WriteCommand, ctx: &Context) -> anyhow::Result<Status> {
    let semaphore = ctx.write_read();
    match command {
        WriteCommand::Precursor { key: k, timeout } => {
            let k = key(&k)?;
            return Ok(granted(
                semaphore.acquire_write_lock_precursor(&k, timeout)?,
                || eprintln!("precursor refused for {k}: another writer is in line"),
            ));
        }
        WriteCommand::Acquire {
            key: k,
            precursor,
            timeout,
        } => {
            let k = key(&k)?;
            let precursor = Token::new(precursor);
            return Ok(granted(
                semaphore.acquire_write_lock(&k, &precursor, timeout)?,
                || eprintln!("write pending for {k}: readers still hold the key"),
            ));
        }
        WriteCommand::Release { key: k, token } => {
            semaphore.release_write_lock(&key(&k)?, &Token::new(token))?;
        }
        WriteCommand::Refresh {
            key: k,
            token,
            timeout,
        } => {
            semaphore.refresh_write_lock(&key(&k)?, &Token::new(token), timeout)?;
        }
    }
    Ok(Status::Done)
}

pub fn handle_rw(command: RwCommand, ctx: &Context) -> anyhow::Result<Status> {
    let semaphore = ctx.write_read();
    match command {
        RwCommand::State { key: k } => {
            let state = semaphore.state(&key(&k)?)?;
            println!("{:<20} {}", k, state);
        }
        RwCommand::Gc => {
            let deleted = semaphore.run_garbage_collection()?;
            println!("deleted {deleted} expired write-read locks");
        }
        RwCommand::ReleaseAll { yes } => {
            if !yes {
                bail!("release-all drops every read and write lock; pass --yes to confirm");
            }
            semaphore.release_all_locks()?;
            println!("released all write-read locks");
        }
    }
    Ok(Status::Done)
}

/// Print a granted token, or report the refusal
fn granted(token: Option<Token>, refused: impl FnOnce()) -> Status {
    match token {
        Some(token) => {
            println!("{token}");
            Status::Done
        }
        None => {
            refused();
            Status::Refused
        }
    }
}
