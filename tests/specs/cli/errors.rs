//! Error reporting specs
//!
//! Failures exit 2 with a message on stderr and nothing on stdout.

use crate::prelude::*;

#[test]
fn missing_database_is_an_error() {
    Cli::bare()
        .args(&["gc"])
        .fails()
        .stderr_has("no database given")
        .stderr_has("DBSEM_DB");
}

#[test]
fn empty_key_is_rejected() {
    let db = Db::init();
    db.dbsem()
        .args(&["acquire", ""])
        .fails()
        .stderr_has("Key cannot be empty")
        .stdout_is_empty();
}

#[test]
fn zero_timeout_is_rejected() {
    let db = Db::init();
    db.dbsem()
        .args(&["acquire", "jobs", "--timeout", "0"])
        .fails()
        .stderr_has("Timeout cannot be less than one");
}

#[test]
fn zero_max_is_rejected() {
    let db = Db::init();
    db.dbsem()
        .args(&["acquire", "jobs", "--max", "0"])
        .fails()
        .stderr_has("MaxLockCount cannot be less than one");
}

#[test]
fn releasing_an_unknown_token_fails() {
    let db = Db::init();
    db.dbsem()
        .args(&["release", "jobs", "not-a-token"])
        .fails()
        .stderr_has("key: jobs token: not-a-token has expired");
}

#[test]
fn refreshing_an_unknown_read_lock_reports_expiry() {
    let db = Db::init();
    db.dbsem()
        .args(&["read", "refresh", "table", "not-a-token"])
        .fails()
        .stderr_has("lock expired for key: table token: not-a-token");
}

#[test]
fn unknown_command_is_a_usage_error() {
    Cli::bare().args(&["frobnicate"]).fails();
}
