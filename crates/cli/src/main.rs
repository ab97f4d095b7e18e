// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dbsem - administer expiring semaphores stored in SQLite

mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::counting::CountingCommand;
use commands::write_read::{ReadArgs, RwArgs, WriteArgs};
use commands::{Context, Status};
use config::{CliConfig, DB_ENV};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "dbsem",
    version,
    about = "Expiring counting and write-read semaphores in a shared database"
)]
struct Cli {
    /// SQLite database holding the semaphores
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Init,
    #[command(flatten)]
    Counting(CountingCommand),
    /// Shared read locks
    Read(ReadArgs),
    /// Exclusive write locks
    Write(WriteArgs),
    /// Write-read maintenance
    Rw(RwArgs),
}

fn main() -> ExitCode {
    setup_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(Status::Done) => ExitCode::SUCCESS,
        Ok(Status::Refused) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<Status> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let path = config.database(cli.db, std::env::var_os(DB_ENV).map(PathBuf::from))?;
    let ctx = Context::open(&path, &config.sqlite(), config.semaphore())?;

    match cli.command {
        Commands::Init => {
            println!("schema version {}", ctx.schema_version());
            Ok(Status::Done)
        }
        Commands::Counting(command) => commands::counting::handle(command, &ctx),
        Commands::Read(args) => commands::write_read::handle_read(args.command, &ctx),
        Commands::Write(args) => commands::write_read::handle_write(args.command, &ctx),
        Commands::Rw(args) => commands::write_read::handle_rw(args.command, &ctx),
    }
}

/// Log to stderr so stdout carries only command output
fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
