//! Counting semaphore maintenance specs

use crate::prelude::*;
use std::time::Duration;

#[test]
fn gc_on_an_empty_database_deletes_nothing() {
    let db = Db::init();
    db.dbsem()
        .args(&["gc"])
        .passes()
        .stdout_has("deleted 0 expired permits");
}

#[test]
fn gc_deletes_only_expired_permits() {
    let db = Db::init();
    db.token(&["acquire", "jobs", "--timeout", "1", "--max", "3"]);
    db.token(&["acquire", "reports", "--timeout", "1"]);
    let live = db.token(&["acquire", "jobs", "--max", "3"]);
    std::thread::sleep(Duration::from_millis(1100));

    db.dbsem()
        .args(&["gc"])
        .passes()
        .stdout_has("deleted 2 expired permits");
    db.dbsem().args(&["release", "jobs", &live]).passes();
}

#[test]
fn release_all_requires_confirmation() {
    let db = Db::init();
    db.token(&["acquire", "jobs"]);

    db.dbsem()
        .args(&["release-all"])
        .fails()
        .stderr_has("pass --yes");
    db.dbsem().args(&["exists", "jobs"]).passes();
}

#[test]
fn release_all_drops_every_permit() {
    let db = Db::init();
    let token = db.token(&["acquire", "jobs"]);
    db.token(&["acquire", "reports"]);

    db.dbsem()
        .args(&["release-all", "--yes"])
        .passes()
        .stdout_has("released all permits");

    db.dbsem().args(&["exists", "jobs"]).refused();
    db.dbsem().args(&["exists", "reports"]).refused();
    db.dbsem()
        .args(&["release", "jobs", &token])
        .fails()
        .stderr_has("has expired");
    db.token(&["acquire", "jobs"]);
}
