//! Read lock specs

use crate::prelude::*;

#[test]
fn many_readers_share_a_key() {
    let db = Db::init();
    let first = db.token(&["read", "acquire", "table"]);
    let second = db.token(&["read", "acquire", "table"]);
    assert_ne!(first, second);

    db.dbsem()
        .args(&["rw", "state", "table"])
        .passes()
        .stdout_has("reading (2 readers)");
}

#[test]
fn pending_writer_turns_readers_away() {
    let db = Db::init();
    db.token(&["read", "acquire", "table"]);
    db.token(&["write", "precursor", "table"]);

    db.dbsem()
        .args(&["read", "acquire", "table"])
        .refused()
        .stdout_is_empty()
        .stderr_has("a writer is waiting or active");
}

#[test]
fn read_release_and_refresh() {
    let db = Db::init();
    let token = db.token(&["read", "acquire", "table", "--timeout", "30"]);

    db.dbsem()
        .args(&["read", "refresh", "table", &token, "--timeout", "90"])
        .passes();
    db.dbsem().args(&["read", "release", "table", &token]).passes();
    db.dbsem()
        .args(&["read", "release", "table", &token])
        .fails()
        .stderr_has("has expired");
}
