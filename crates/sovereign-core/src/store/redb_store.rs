//! # redb-backed Store
//!
//! A disk-backed key-value store using the redb embedded database.
//!
//! redb provides:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Values are stored as UTF-8 JSON bytes in a single `kv` table. The single
//! writer is what makes [`KvStore::update`] atomic: the read and the write
//! happen inside one write transaction.

use super::KvStore;
use crate::SovereignError;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde_json::Value;
use std::path::Path;

/// Table for all entries: key string -> JSON bytes
const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

fn io_err(e: impl std::fmt::Display) -> SovereignError {
    SovereignError::StorageError(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<Value, SovereignError> {
    serde_json::from_slice(bytes).map_err(|e| SovereignError::SerializationError(e.to_string()))
}

fn encode(value: &Value) -> Result<Vec<u8>, SovereignError> {
    serde_json::to_vec(value).map_err(|e| SovereignError::SerializationError(e.to_string()))
}

/// A disk-backed store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SovereignError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Create the table up front so read transactions never see it missing
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(KV).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Value>, SovereignError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(KV).map_err(io_err)?;
        let found = table.get(key).map_err(io_err)?;
        found.map(|guard| decode(guard.value())).transpose()
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), SovereignError> {
        let bytes = encode(value)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(KV).map_err(io_err)?;
            table.insert(key, bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)
    }

    fn delete(&self, key: &str) -> Result<bool, SovereignError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let existed = {
            let mut table = write_txn.open_table(KV).map_err(io_err)?;
            let removed = table.remove(key).map_err(io_err)?;
            removed.is_some()
        };
        write_txn.commit().map_err(io_err)?;
        Ok(existed)
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<Value>) -> Value,
    ) -> Result<Value, SovereignError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let next = {
            let mut table = write_txn.open_table(KV).map_err(io_err)?;
            let previous = match table.get(key).map_err(io_err)? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            let next = f(previous);
            let bytes = encode(&next)?;
            table.insert(key, bytes.as_slice()).map_err(io_err)?;
            next
        };
        write_txn.commit().map_err(io_err)?;
        Ok(next)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, SovereignError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(KV).map_err(io_err)?;
        let mut out = Vec::new();
        for entry in table.range(prefix..).map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_string(), decode(value.value())?));
        }
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_and_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("store.redb");

        {
            let store = RedbStore::open(&path).expect("open");
            store.set("k", &json!({"a": [1, 2]})).expect("set");
        }

        let store = RedbStore::open(&path).expect("reopen");
        assert_eq!(store.get("k").expect("get"), Some(json!({"a": [1, 2]})));
        assert!(store.delete("k").expect("delete"));
        assert!(store.get("k").expect("get").is_none());
    }

    #[test]
    fn update_sees_previous_value() {
        let dir = tempdir().expect("tempdir");
        let store = RedbStore::open(dir.path().join("u.redb")).expect("open");

        let first = store
            .update("n", &mut |prev| json!(prev.is_some()))
            .expect("update");
        let second = store
            .update("n", &mut |prev| json!(prev.is_some()))
            .expect("update");
        assert_eq!(first, json!(false));
        assert_eq!(second, json!(true));
    }

    #[test]
    fn scan_prefix_stops_at_boundary() {
        let dir = tempdir().expect("tempdir");
        let store = RedbStore::open(dir.path().join("s.redb")).expect("open");
        store.set("sovereign:contact:b", &json!(2)).expect("set");
        store.set("sovereign:contact:a", &json!(1)).expect("set");
        store.set("sovereign:count", &json!(1500)).expect("set");
        store.set("sovereign:zzz", &json!(0)).expect("set");

        let found = store.scan_prefix("sovereign:contact:").expect("scan");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "sovereign:contact:a");
        assert_eq!(found[1].0, "sovereign:contact:b");
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let dir = tempdir().expect("tempdir");
        let store = Arc::new(RedbStore::open(dir.path().join("c.redb")).expect("open"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store
                            .update("n", &mut |prev| {
                                json!(prev.and_then(|v| v.as_u64()).unwrap_or(0) + 1)
                            })
                            .expect("update");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("join");
        }
        assert_eq!(store.get("n").expect("get"), Some(json!(100)));
    }
}
