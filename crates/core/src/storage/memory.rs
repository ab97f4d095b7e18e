// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process storage backend
//!
//! Each master record sits behind its own mutex, so sections on different
//! keys never contend. A section works on a copy of the key's rows that is
//! written back only when the section succeeds.

use super::{
    CountingStore, CountingTxn, Held, Lease, StoreError, WriteReadMaster, WriteReadStore,
    WriteReadTxn,
};
use crate::token::{LockKey, Token};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

type Master<T> = Arc<Mutex<T>>;

/// Storage backend that keeps every row in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    counting: Mutex<HashMap<LockKey, Master<Vec<Lease>>>>,
    write_read: Mutex<HashMap<LockKey, Master<WriteReadRows>>>,
}

#[derive(Clone, Debug, Default)]
struct WriteReadRows {
    master: WriteReadMaster,
    reads: Vec<Lease>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn find<T>(
    masters: &Mutex<HashMap<LockKey, Master<T>>>,
    key: &LockKey,
) -> Result<Master<T>, StoreError> {
    lock(masters)
        .get(key)
        .cloned()
        .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
}

fn all<T>(masters: &Mutex<HashMap<LockKey, Master<T>>>) -> Vec<Master<T>> {
    lock(masters).values().cloned().collect()
}

/// Run `section` against a copy of `rows`, keeping the copy only on success
fn transact<R: Clone, X, T>(
    master: &Mutex<R>,
    wrap: impl FnOnce(R) -> X,
    unwrap: impl FnOnce(X) -> R,
    section: impl FnOnce(&mut X) -> Result<T, StoreError>,
) -> Result<Held<T>, StoreError> {
    let mut rows = lock(master);
    let acquired = Instant::now();
    let mut txn = wrap(rows.clone());
    let value = section(&mut txn)?;
    *rows = unwrap(txn);
    Ok(Held {
        value,
        held: acquired.elapsed(),
    })
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of counting rows stored for a key, expired or not
    pub fn counting_rows(&self, key: &LockKey) -> usize {
        find(&self.counting, key)
            .map(|master| lock(&master).len())
            .unwrap_or(0)
    }

    /// Number of read rows stored for a key, expired or not
    pub fn read_rows(&self, key: &LockKey) -> usize {
        find(&self.write_read, key)
            .map(|master| lock(&master).reads.len())
            .unwrap_or(0)
    }
}

impl CountingStore for MemoryStore {
    fn ensure_counting_master(&self, key: &LockKey) -> Result<(), StoreError> {
        lock(&self.counting).entry(key.clone()).or_default();
        Ok(())
    }

    fn lock_counting<T>(
        &self,
        key: &LockKey,
        section: &mut dyn FnMut(&mut dyn CountingTxn) -> Result<T, StoreError>,
    ) -> Result<Held<T>, StoreError> {
        let master = find(&self.counting, key)?;
        transact(
            &master,
            |rows| MemoryCountingTxn { rows },
            |txn| txn.rows,
            |txn| section(txn),
        )
    }

    fn exists_unexpired_lock(
        &self,
        key: &LockKey,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Ok(master) = find(&self.counting, key) else {
            return Ok(false);
        };
        let rows = lock(&master);
        Ok(rows.iter().any(|l| l.is_live(now)))
    }

    fn delete_expired_locks(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut deleted = 0;
        for master in all(&self.counting) {
            let mut rows = lock(&master);
            let before = rows.len();
            rows.retain(|l| l.is_live(now));
            deleted += before - rows.len();
        }
        Ok(deleted)
    }

    fn delete_all_locks(&self) -> Result<(), StoreError> {
        for master in all(&self.counting) {
            lock(&master).clear();
        }
        Ok(())
    }
}

struct MemoryCountingTxn {
    rows: Vec<Lease>,
}

impl CountingTxn for MemoryCountingTxn {
    fn delete_expired(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.rows.len();
        self.rows.retain(|l| l.is_live(now));
        Ok(before - self.rows.len())
    }

    fn count(&mut self) -> Result<usize, StoreError> {
        Ok(self.rows.len())
    }

    fn insert(&mut self, lease: &Lease) -> Result<(), StoreError> {
        self.rows.push(lease.clone());
        Ok(())
    }

    fn delete_unexpired(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let before = self.rows.len();
        self.rows
            .retain(|l| !(l.token == *token && l.is_live(now)));
        Ok(before - self.rows.len())
    }

    fn refresh(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(refresh_matching(&mut self.rows, token, now, expires_at))
    }
}

fn refresh_matching(
    rows: &mut [Lease],
    token: &Token,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> usize {
    let mut changed = 0;
    for lease in rows
        .iter_mut()
        .filter(|l| l.token == *token && l.is_live(now))
    {
        lease.expires_at = expires_at;
        changed += 1;
    }
    changed
}

/// Refresh an optional master field in place if it matches and is live
fn refresh_field(
    field: &mut Option<Lease>,
    token: &Token,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> usize {
    match field {
        Some(lease) if lease.token == *token && lease.is_live(now) => {
            lease.expires_at = expires_at;
            1
        }
        _ => 0,
    }
}

fn matches_live(field: &Option<Lease>, token: &Token, now: DateTime<Utc>) -> bool {
    field
        .as_ref()
        .is_some_and(|l| l.token == *token && l.is_live(now))
}

impl WriteReadStore for MemoryStore {
    fn ensure_write_read_master(&self, key: &LockKey) -> Result<(), StoreError> {
        lock(&self.write_read).entry(key.clone()).or_default();
        Ok(())
    }

    fn lock_write_read<T>(
        &self,
        key: &LockKey,
        section: &mut dyn FnMut(&mut dyn WriteReadTxn) -> Result<T, StoreError>,
    ) -> Result<Held<T>, StoreError> {
        let master = find(&self.write_read, key)?;
        transact(
            &master,
            |rows| MemoryWriteReadTxn { rows },
            |txn| txn.rows,
            |txn| section(txn),
        )
    }

    fn delete_expired_write_read(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut deleted = 0;
        for master in all(&self.write_read) {
            let mut guard = lock(&master);
            let rows = &mut *guard;
            let before = rows.reads.len();
            rows.reads.retain(|l| l.is_live(now));
            deleted += before - rows.reads.len();
            for field in [&mut rows.master.precursor, &mut rows.master.write] {
                if field.as_ref().is_some_and(|l| !l.is_live(now)) {
                    *field = None;
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    fn delete_all_write_read(&self) -> Result<(), StoreError> {
        lock(&self.write_read).clear();
        Ok(())
    }
}

struct MemoryWriteReadTxn {
    rows: WriteReadRows,
}

impl WriteReadTxn for MemoryWriteReadTxn {
    fn master(&mut self) -> Result<WriteReadMaster, StoreError> {
        Ok(self.rows.master.clone())
    }

    fn set_precursor(&mut self, lease: &Lease) -> Result<(), StoreError> {
        self.rows.master.precursor = Some(lease.clone());
        self.rows.master.write = None;
        Ok(())
    }

    fn refresh_precursor(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(refresh_field(
            &mut self.rows.master.precursor,
            token,
            now,
            expires_at,
        ))
    }

    fn promote(
        &mut self,
        precursor: &Token,
        now: DateTime<Utc>,
        write: &Lease,
    ) -> Result<usize, StoreError> {
        if !matches_live(&self.rows.master.precursor, precursor, now) {
            return Ok(0);
        }
        self.rows.master.precursor = None;
        self.rows.master.write = Some(write.clone());
        Ok(1)
    }

    fn clear_write(&mut self, token: &Token, now: DateTime<Utc>) -> Result<usize, StoreError> {
        if !matches_live(&self.rows.master.write, token, now) {
            return Ok(0);
        }
        self.rows.master.write = None;
        Ok(1)
    }

    fn refresh_write(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(refresh_field(
            &mut self.rows.master.write,
            token,
            now,
            expires_at,
        ))
    }

    fn delete_expired_reads(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.rows.reads.len();
        self.rows.reads.retain(|l| l.is_live(now));
        Ok(before - self.rows.reads.len())
    }

    fn count_unexpired_reads(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.rows.reads.iter().filter(|l| l.is_live(now)).count())
    }

    fn insert_read(&mut self, lease: &Lease) -> Result<(), StoreError> {
        self.rows.reads.push(lease.clone());
        Ok(())
    }

    fn delete_read(&mut self, token: &Token, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.rows.reads.len();
        self.rows
            .reads
            .retain(|l| !(l.token == *token && l.is_live(now)));
        Ok(before - self.rows.reads.len())
    }

    fn refresh_read(
        &mut self,
        token: &Token,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(refresh_matching(&mut self.rows.reads, token, now, expires_at))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
