//! Shared helpers for CLI specs

use assert_cmd::assert::Assert;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory holding one semaphore database
pub struct Db {
    dir: TempDir,
}

impl Db {
    /// A directory with no database yet; the first command creates it
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// A database whose schema has already been created
    pub fn init() -> Self {
        let db = Self::empty();
        db.dbsem().args(&["init"]).passes();
        db
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("locks.db")
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the scratch directory
    pub fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// `dbsem --db <this database>`
    pub fn dbsem(&self) -> Cli {
        let mut cli = Cli::bare();
        cli.cmd.arg("--db").arg(self.path());
        cli
    }

    /// A granted token from `args`, which must succeed
    pub fn token(&self, args: &[&str]) -> String {
        self.dbsem().args(args).passes().stdout_line()
    }
}

/// One pending invocation of the binary
pub struct Cli {
    cmd: Command,
}

impl Cli {
    /// `dbsem` with no database flag
    pub fn bare() -> Self {
        let mut cmd = Command::cargo_bin("dbsem").unwrap();
        cmd.env_remove("DBSEM_DB").env_remove("RUST_LOG");
        Self { cmd }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    /// Exit code 0
    pub fn passes(mut self) -> Run {
        Run(self.cmd.assert().code(0))
    }

    /// Exit code 1: not granted, or not present
    pub fn refused(mut self) -> Run {
        Run(self.cmd.assert().code(1))
    }

    /// Exit code 2: the command failed
    pub fn fails(mut self) -> Run {
        Run(self.cmd.assert().code(2))
    }
}

/// A finished invocation
pub struct Run(Assert);

impl Run {
    pub fn stdout_has(self, text: &str) -> Self {
        Self(self.0.stdout(predicate::str::contains(text)))
    }

    pub fn stderr_has(self, text: &str) -> Self {
        Self(self.0.stderr(predicate::str::contains(text)))
    }

    pub fn stdout_is_empty(self) -> Self {
        Self(self.0.stdout(predicate::str::is_empty()))
    }

    /// The single line printed on stdout
    pub fn stdout_line(&self) -> String {
        let stdout = String::from_utf8_lossy(&self.0.get_output().stdout).into_owned();
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 1, "expected one line on stdout, got {stdout:?}");
        lines[0].to_string()
    }
}
