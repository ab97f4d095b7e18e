//! Write-read maintenance specs

use crate::prelude::*;
use std::time::Duration;

#[test]
fn state_of_an_unknown_key_is_free() {
    let db = Db::init();
    db.dbsem()
        .args(&["rw", "state", "never-used"])
        .passes()
        .stdout_has("free");
}

#[test]
fn gc_clears_lapsed_locks() {
    let db = Db::init();
    db.token(&["read", "acquire", "table", "--timeout", "1"]);
    db.token(&["write", "precursor", "table", "--timeout", "1"]);
    std::thread::sleep(Duration::from_millis(1100));

    db.dbsem()
        .args(&["rw", "gc"])
        .passes()
        .stdout_has("deleted 2 expired write-read locks");
    db.dbsem()
        .args(&["rw", "state", "table"])
        .passes()
        .stdout_has("free");
}

#[test]
fn release_all_requires_confirmation() {
    let db = Db::init();
    db.token(&["write", "precursor", "table"]);

    db.dbsem()
        .args(&["rw", "release-all"])
        .fails()
        .stderr_has("pass --yes");
    db.dbsem().args(&["read", "acquire", "table"]).refused();
}

#[test]
fn release_all_drops_readers_and_writers() {
    let db = Db::init();
    db.token(&["read", "acquire", "table"]);
    db.token(&["write", "precursor", "table"]);
    db.token(&["read", "acquire", "index"]);

    db.dbsem()
        .args(&["rw", "release-all", "--yes"])
        .passes()
        .stdout_has("released all write-read locks");

    db.dbsem()
        .args(&["rw", "state", "table"])
        .passes()
        .stdout_has("free");
    db.token(&["write", "precursor", "table"]);
    db.token(&["read", "acquire", "index"]);
}
