//! Namespaced key/value state store
//!
//! A `StateStore` holds the live state of one session. It is mutated only
//! by applying a `StateDelta`; every application also discards the `temp:`
//! keys that were present before it. Readers always observe either the
//! state before a delta or the state after it.

use crate::error::Result;
use crate::types::{validate_key, Scope, StateDelta, StateMap};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read/write access to namespaced state
///
/// Implemented by the live `StateStore` and by `TurnContext`, which buffers
/// writes until the turn is committed.
pub trait StateAccess {
    /// Current value for a key
    fn get(&self, key: &str) -> Option<Value>;

    /// Apply a set of key writes as one logical step
    fn apply_delta(&self, delta: StateDelta) -> Result<()>;

    /// Current value for a key, or `default` when absent
    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }
}

/// In-memory namespaced state for a single session
///
/// Thread-safe via one internal `RwLock`.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: RwLock<StateMap>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a persisted snapshot
    pub fn from_snapshot(snapshot: StateMap) -> Result<Self> {
        snapshot.keys().try_for_each(|k| validate_key(k))?;
        Ok(Self {
            entries: RwLock::new(snapshot),
        })
    }

    /// Independent copy of every entry
    pub fn snapshot(&self) -> StateMap {
        self.read().clone()
    }

    /// Independent copy of the entries in one namespace
    pub fn scoped_snapshot(&self, scope: Scope) -> StateMap {
        self.read()
            .iter()
            .filter(|(k, _)| Scope::of(k) == scope)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Whether `key` currently holds a value
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Number of keys across all scopes
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store holds no keys at all
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Every mutation validates before it writes, so a poisoned lock never
    // guards a half-applied delta.
    fn read(&self) -> RwLockReadGuard<'_, StateMap> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StateMap> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateAccess for StateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    fn apply_delta(&self, delta: StateDelta) -> Result<()> {
        delta.validate()?;

        let mut entries = self.write();
        let stale_temp: HashSet<String> = entries
            .keys()
            .filter(|k| Scope::of(k) == Scope::Temp)
            .cloned()
            .collect();

        let written = delta.len();
        for (key, value) in delta {
            entries.insert(key, value);
        }
        for key in &stale_temp {
            entries.remove(key);
        }

        tracing::debug!(
            written,
            discarded_temp = stale_temp.len(),
            total = entries.len(),
            "State delta applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;
    use serde_json::json;

    fn seeded() -> StateStore {
        let mut snapshot = StateMap::new();
        snapshot.insert("user:login_count".to_string(), json!(0));
        snapshot.insert("task_status".to_string(), json!("idle"));
        StateStore::from_snapshot(snapshot).unwrap()
    }

    #[test]
    fn test_get_missing_returns_default() {
        let store = StateStore::new();
        assert!(store.get("missing").is_none());
        assert_eq!(store.get_or("missing", json!("fallback")), json!("fallback"));
    }

    #[test]
    fn test_apply_delta_values_readable_as_written() {
        let store = seeded();
        let nested = json!({"a": [1, 2.5, "x", null], "b": {"c": false}});

        store
            .apply_delta(
                StateDelta::new()
                    .set("task_status", "active")
                    .set("user:login_count", 1)
                    .set("nested", nested.clone())
                    .set("ratio", 0.5),
            )
            .unwrap();

        assert_eq!(store.get("task_status"), Some(json!("active")));
        assert_eq!(store.get("user:login_count"), Some(json!(1)));
        assert_eq!(store.get("nested"), Some(nested));
        assert_eq!(store.get("ratio"), Some(json!(0.5)));
    }

    #[test]
    fn test_temp_keys_discarded_by_next_delta() {
        let store = seeded();
        store
            .apply_delta(StateDelta::new().set("temp:validation_needed", true))
            .unwrap();
        // Visible for the rest of the turn that introduced it
        assert_eq!(store.get("temp:validation_needed"), Some(json!(true)));

        store
            .apply_delta(StateDelta::new().set("task_status", "active"))
            .unwrap();
        assert!(!store.contains_key("temp:validation_needed"));
        assert_eq!(store.get("user:login_count"), Some(json!(0)));
    }

    #[test]
    fn test_stale_temp_key_removed_even_when_rewritten() {
        let store = StateStore::new();
        store
            .apply_delta(StateDelta::new().set("temp:scratch", 1))
            .unwrap();
        store
            .apply_delta(StateDelta::new().set("temp:scratch", 2))
            .unwrap();
        assert!(store.get("temp:scratch").is_none());
    }

    #[test]
    fn test_empty_delta_still_discards_temp() {
        let store = StateStore::new();
        store
            .apply_delta(StateDelta::new().set("temp:a", "x").set("keep", "y"))
            .unwrap();
        store.apply_delta(StateDelta::new()).unwrap();
        assert!(store.get("temp:a").is_none());
        assert_eq!(store.get("keep"), Some(json!("y")));
    }

    #[test]
    fn test_invalid_key_fails_without_partial_write() {
        let store = seeded();
        store
            .apply_delta(StateDelta::new().set("temp:a", 1))
            .unwrap();

        let err = store
            .apply_delta(StateDelta::new().set("task_status", "active").set("user:", 1))
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidKey(_)));

        assert_eq!(store.get("task_status"), Some(json!("idle")));
        assert_eq!(store.get("temp:a"), Some(json!(1)));
    }

    #[test]
    fn test_from_snapshot_rejects_bad_key() {
        let mut snapshot = StateMap::new();
        snapshot.insert(String::new(), json!(1));
        assert!(matches!(
            StateStore::from_snapshot(snapshot),
            Err(StateError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let store = StateStore::new();
        store
            .apply_delta(StateDelta::new().set("reading_list", json!([{"title": "A"}])))
            .unwrap();

        let mut snap = store.snapshot();
        snap["reading_list"]
            .as_array_mut()
            .unwrap()
            .push(json!({"title": "B"}));
        snap.insert("extra".to_string(), json!(true));

        assert_eq!(store.get("reading_list"), Some(json!([{"title": "A"}])));
        assert!(store.get("extra").is_none());
    }

    #[test]
    fn test_scoped_snapshot() {
        let store = seeded();
        store
            .apply_delta(StateDelta::new().set("temp:x", 1))
            .unwrap();

        let user = store.scoped_snapshot(Scope::User);
        assert_eq!(user.len(), 1);
        assert!(user.contains_key("user:login_count"));

        let session = store.scoped_snapshot(Scope::Session);
        assert_eq!(session.len(), 1);
        assert!(session.contains_key("task_status"));

        assert_eq!(store.scoped_snapshot(Scope::Temp).len(), 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_len_counts_every_scope() {
        let store = StateStore::new();
        assert!(store.is_empty());
        assert!(!store.contains_key("temp:x"));

        store
            .apply_delta(StateDelta::new().set("temp:x", 1).set("user:y", 2))
            .unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains_key("temp:x"));

        store.apply_delta(StateDelta::new().set("z", 3)).unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.contains_key("temp:x"));
        assert!(!store.is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_whole_deltas() {
        use std::sync::Arc;

        let store = Arc::new(StateStore::new());
        store
            .apply_delta(StateDelta::new().set("a", 0).set("b", 0))
            .unwrap();

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 1..=500 {
                    store
                        .apply_delta(StateDelta::new().set("a", i).set("b", i))
                        .unwrap();
                }
            })
        };

        for _ in 0..500 {
            let snap = store.snapshot();
            assert_eq!(snap["a"], snap["b"]);
        }
        writer.join().unwrap();
        assert_eq!(store.get("a"), Some(json!(500)));
    }
}
