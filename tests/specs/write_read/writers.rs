//! Write lock specs
//!
//! A writer first takes a precursor, then polls `write acquire` until the
//! readers drain.

use crate::prelude::*;

#[test]
fn writer_waits_for_readers_to_drain() {
    let db = Db::init();
    let reader = db.token(&["read", "acquire", "table"]);
    let precursor = db.token(&["write", "precursor", "table"]);

    db.dbsem()
        .args(&["write", "acquire", "table", &precursor])
        .refused()
        .stdout_is_empty()
        .stderr_has("readers still hold the key");
    db.dbsem()
        .args(&["rw", "state", "table"])
        .passes()
        .stdout_has("write pending (1 readers)");

    db.dbsem().args(&["read", "release", "table", &reader]).passes();
    let write = db.token(&["write", "acquire", "table", &precursor]);
    assert_ne!(write, precursor);

    db.dbsem()
        .args(&["rw", "state", "table"])
        .passes()
        .stdout_has("write held");
}

#[test]
fn write_acquire_on_a_free_key_needs_no_waiting() {
    let db = Db::init();
    let precursor = db.token(&["write", "precursor", "table"]);
    db.token(&["write", "acquire", "table", &precursor]);
}

#[test]
fn only_one_writer_gets_in_line() {
    let db = Db::init();
    db.token(&["write", "precursor", "table"]);

    db.dbsem()
        .args(&["write", "precursor", "table"])
        .refused()
        .stderr_has("another writer is in line");
}

#[test]
fn unknown_precursor_is_an_error() {
    let db = Db::init();
    db.dbsem()
        .args(&["write", "acquire", "table", "not-a-precursor"])
        .fails()
        .stdout_is_empty()
        .stderr_has("lock expired for key: table token: not-a-precursor");
}

#[test]
fn precursor_cannot_be_used_twice() {
    let db = Db::init();
    let precursor = db.token(&["write", "precursor", "table"]);
    db.token(&["write", "acquire", "table", &precursor]);

    db.dbsem()
        .args(&["write", "acquire", "table", &precursor])
        .fails()
        .stderr_has("lock expired");
}

#[test]
fn released_write_lock_frees_the_key() {
    let db = Db::init();
    let precursor = db.token(&["write", "precursor", "table"]);
    let write = db.token(&["write", "acquire", "table", &precursor]);

    db.dbsem()
        .args(&["read", "acquire", "table"])
        .refused();
    db.dbsem()
        .args(&["write", "refresh", "table", &write, "--timeout", "120"])
        .passes();
    db.dbsem().args(&["write", "release", "table", &write]).passes();

    db.dbsem()
        .args(&["rw", "state", "table"])
        .passes()
        .stdout_has("free");
    db.token(&["read", "acquire", "table"]);
}

#[test]
fn releasing_a_write_lock_twice_fails() {
    let db = Db::init();
    let precursor = db.token(&["write", "precursor", "table"]);
    let write = db.token(&["write", "acquire", "table", &precursor]);
    db.dbsem().args(&["write", "release", "table", &write]).passes();

    db.dbsem()
        .args(&["write", "release", "table", &write])
        .fails()
        .stderr_has("has expired");
}
