//! # Key-Value Store
//!
//! The persistence capability every service borrows.
//!
//! Keys are flat strings (`sovereign:count`, `sovereign:contact:<uuid>`).
//! Values are arbitrary JSON.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: `BTreeMap` behind a mutex (tests, ephemeral servers)
//! - [`RedbStore`]: redb embedded database (ACID, crash safe)
//!
//! ## Atomicity
//!
//! [`KvStore::update`] is the only read-modify-write primitive. Both backends
//! run the closure while holding their single writer (the mutex, or the redb
//! write transaction), so concurrent updates to the same key never lose
//! writes. Callers must not emulate it with `get` followed by `set`.

mod redb_store;

pub use redb_store::RedbStore;

use crate::SovereignError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

// =============================================================================
// KVSTORE TRAIT
// =============================================================================

/// A persistent mapping from string keys to JSON values.
///
/// All methods take `&self`: backends synchronize internally so a single
/// store can be shared across request handlers.
pub trait KvStore: Send + Sync {
    /// Read the value under `key`.
    fn get(&self, key: &str) -> Result<Option<Value>, SovereignError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &Value) -> Result<(), SovereignError>;

    /// Remove `key`. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, SovereignError>;

    /// Atomically replace the value under `key` with `f(previous)`.
    ///
    /// Returns the value written.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<Value>) -> Value,
    ) -> Result<Value, SovereignError>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, SovereignError>;
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

/// A volatile store backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>, SovereignError> {
        self.entries
            .lock()
            .map_err(|_| SovereignError::StorageError("memory store lock poisoned".to_string()))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, SovereignError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), SovereignError> {
        self.lock()?.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, SovereignError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<Value>) -> Value,
    ) -> Result<Value, SovereignError> {
        let mut entries = self.lock()?;
        let next = f(entries.get(key).cloned());
        entries.insert(key.to_string(), next.clone());
        Ok(next)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, SovereignError> {
        let entries = self.lock()?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
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

    #[test]
    fn get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("nope").expect("get").is_none());
    }

    #[test]
    fn set_get_delete() {
        let store = MemoryStore::new();
        store.set("a", &json!({"x": 1})).expect("set");
        assert_eq!(store.get("a").expect("get"), Some(json!({"x": 1})));
        assert!(store.delete("a").expect("delete"));
        assert!(!store.delete("a").expect("delete"));
        assert!(store.get("a").expect("get").is_none());
    }

    #[test]
    fn scan_prefix_is_bounded() {
        let store = MemoryStore::new();
        store.set("p:1", &json!(1)).expect("set");
        store.set("p:2", &json!(2)).expect("set");
        store.set("q:1", &json!(3)).expect("set");
        store.set("o", &json!(0)).expect("set");

        let keys: Vec<String> = store
            .scan_prefix("p:")
            .expect("scan")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["p:1".to_string(), "p:2".to_string()]);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
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
        assert_eq!(store.get("n").expect("get"), Some(json!(800)));
    }
}
