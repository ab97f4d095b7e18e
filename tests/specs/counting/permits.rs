//! Counting semaphore specs
//!
//! Each invocation is its own process, so these also cover permits shared
//! across processes through the database.

use crate::prelude::*;
use std::time::Duration;

#[test]
fn acquire_prints_a_fresh_token() {
    let db = Db::init();
    let first = db.token(&["acquire", "jobs", "--max", "2"]);
    let second = db.token(&["acquire", "jobs", "--max", "2"]);

    assert_eq!(first.len(), 36);
    assert_ne!(first, second);
}

#[test]
fn acquire_is_refused_at_capacity() {
    let db = Db::init();
    db.token(&["acquire", "jobs", "--max", "2"]);
    db.token(&["acquire", "jobs", "--max", "2"]);

    db.dbsem()
        .args(&["acquire", "jobs", "--max", "2"])
        .refused()
        .stdout_is_empty()
        .stderr_has("no permit available for jobs");
}

#[test]
fn release_frees_a_permit() {
    let db = Db::init();
    let token = db.token(&["acquire", "jobs"]);
    db.dbsem().args(&["acquire", "jobs"]).refused();

    db.dbsem().args(&["release", "jobs", &token]).passes();
    db.token(&["acquire", "jobs"]);
}

#[test]
fn release_twice_fails() {
    let db = Db::init();
    let token = db.token(&["acquire", "jobs"]);
    db.dbsem().args(&["release", "jobs", &token]).passes();

    db.dbsem()
        .args(&["release", "jobs", &token])
        .fails()
        .stderr_has("has expired");
}

#[test]
fn keys_are_independent() {
    let db = Db::init();
    db.token(&["acquire", "jobs"]);
    db.token(&["acquire", "reports"]);
}

#[test]
fn refresh_keeps_a_permit() {
    let db = Db::init();
    let token = db.token(&["acquire", "jobs"]);

    db.dbsem()
        .args(&["refresh", "jobs", &token, "--timeout", "120"])
        .passes();
    db.dbsem().args(&["release", "jobs", &token]).passes();
}

#[test]
fn exists_reports_held_and_free() {
    let db = Db::init();
    db.dbsem()
        .args(&["exists", "jobs"])
        .refused()
        .stdout_has("jobs: free");

    let token = db.token(&["acquire", "jobs"]);
    db.dbsem()
        .args(&["exists", "jobs"])
        .passes()
        .stdout_has("jobs: held");

    db.dbsem().args(&["release", "jobs", &token]).passes();
    db.dbsem().args(&["exists", "jobs"]).refused();
}

#[test]
fn expired_permit_is_reclaimed_by_the_next_acquire() {
    let db = Db::init();
    let stale = db.token(&["acquire", "jobs", "--timeout", "1"]);
    std::thread::sleep(Duration::from_millis(1100));

    db.dbsem().args(&["exists", "jobs"]).refused();
    let fresh = db.token(&["acquire", "jobs"]);
    assert_ne!(stale, fresh);

    db.dbsem()
        .args(&["release", "jobs", &stale])
        .fails()
        .stderr_has("has expired");
}
