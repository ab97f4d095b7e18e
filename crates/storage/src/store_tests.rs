// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/dir/locks.db");

    let store = SqliteStore::open(&path, &SqliteConfig::default()).unwrap();
    store.migrate().unwrap();

    assert!(path.is_file());
}

#[test]
fn file_database_uses_wal() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("locks.db"), &SqliteConfig::default()).unwrap();

    let mode: String = store
        .connection()
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn exclusive_reports_missing_master() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.migrate().unwrap();
    let key = LockKey::new("absent").unwrap();

    let result = store.exclusive(
        "SELECT LOCK_KEY FROM COUNTING_MASTER WHERE LOCK_KEY = ?1",
        &key,
        |_| Ok(()),
    );

    assert!(matches!(result, Err(StoreError::KeyNotFound(k)) if k == "absent"));
}

#[test]
fn exclusive_rolls_back_failed_section() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.migrate().unwrap();
    store
        .connection()
        .execute("INSERT INTO COUNTING_MASTER (LOCK_KEY) VALUES ('k')", [])
        .unwrap();
    let key = LockKey::new("k").unwrap();

    let result: Result<Held<()>, _> = store.exclusive(
        "SELECT LOCK_KEY FROM COUNTING_MASTER WHERE LOCK_KEY = ?1",
        &key,
        |conn| {
            conn.execute(
                "INSERT INTO COUNTING_LOCK (LOCK_KEY, TOKEN, EXPIRES_AT) VALUES ('k', 't', 1)",
                [],
            )
            .map_err(backend)?;
            Err(StoreError::Backend("abort".to_string()))
        },
    );

    assert!(result.is_err());
    let rows: i64 = store
        .connection()
        .query_row("SELECT COUNT(*) FROM COUNTING_LOCK", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn missing_schema_is_a_backend_error() {
    let store = SqliteStore::open_in_memory().unwrap();
    let key = LockKey::new("k").unwrap();

    let result = store.exclusive(
        "SELECT LOCK_KEY FROM COUNTING_MASTER WHERE LOCK_KEY = ?1",
        &key,
        |_| Ok(()),
    );

    assert!(matches!(result, Err(StoreError::Backend(m)) if m.contains("no such table")));
}

#[test]
fn timestamps_round_trip_at_millisecond_precision() {
    let time = from_millis(1_700_000_000_123).unwrap();
    assert_eq!(millis(time), 1_700_000_000_123);
    assert!(lease(Some("t".to_string()), None).unwrap().is_none());
    assert!(lease(None, Some(5)).unwrap().is_none());
}

#[test]
fn config_parses_humantime_busy_timeout() {
    let config: SqliteConfig = serde_json::from_str(r#"{"busy_timeout": "250ms"}"#).unwrap();
    assert_eq!(config.busy_timeout, Duration::from_millis(250));
    assert_eq!(SqliteConfig::default().busy_timeout, DEFAULT_BUSY_TIMEOUT);
}
