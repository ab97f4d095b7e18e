//! Database selection and configuration file specs

use crate::prelude::*;

#[test]
fn init_creates_the_schema() {
    let db = Db::empty();
    db.dbsem()
        .args(&["init"])
        .passes()
        .stdout_has("schema version 1");
    assert!(db.path().is_file());
}

#[test]
fn init_is_idempotent() {
    let db = Db::init();
    db.dbsem()
        .args(&["init"])
        .passes()
        .stdout_has("schema version 1");
}

#[test]
fn commands_create_the_schema_on_first_use() {
    let db = Db::empty();
    let token = db.token(&["acquire", "jobs"]);
    assert!(!token.is_empty());
}

#[test]
fn database_can_come_from_the_environment() {
    let db = Db::init();
    let token = Cli::bare()
        .env("DBSEM_DB", db.path())
        .args(&["acquire", "jobs"])
        .passes()
        .stdout_line();

    // Same database: the --db handle sees the permit
    db.dbsem().args(&["exists", "jobs"]).passes();
    db.dbsem().args(&["release", "jobs", &token]).passes();
}

#[test]
fn database_can_come_from_the_config_file() {
    let db = Db::init();
    let config = db.file(
        "dbsem.toml",
        &format!("database = {:?}\nmax_hold_time = \"5s\"\n", db.path()),
    );
    let config = config.to_str().unwrap();

    Cli::bare()
        .args(&["--config", config, "acquire", "jobs"])
        .passes();
    db.dbsem().args(&["exists", "jobs"]).passes();
}

#[test]
fn db_flag_overrides_the_config_file() {
    let db = Db::init();
    let other = db.dir().join("other.db");
    let config = db.file("dbsem.toml", &format!("database = {:?}\n", other));
    let config = config.to_str().unwrap();

    db.dbsem()
        .args(&["--config", config, "acquire", "jobs"])
        .passes();
    db.dbsem().args(&["exists", "jobs"]).passes();
    assert!(!other.exists());
}

#[test]
fn unreadable_config_file_is_an_error() {
    let db = Db::init();
    let missing = db.dir().join("missing.toml");
    db.dbsem()
        .args(&["--config", missing.to_str().unwrap(), "gc"])
        .fails()
        .stderr_has("reading config");
}

#[test]
fn malformed_config_file_is_an_error() {
    let db = Db::init();
    let config = db.file("dbsem.toml", "busy_timeout = \"soon\"\n");
    db.dbsem()
        .args(&["--config", config.to_str().unwrap(), "gc"])
        .fails()
        .stderr_has("parsing config");
}
