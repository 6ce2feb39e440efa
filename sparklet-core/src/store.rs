//! Spark data store and the "last active sparklet" pointer
//!
//! The data store is an opaque key -> JSON blob backend owned by the host.
//! The engine only keeps its own bookkeeping there; session `state` is
//! never persisted.

use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Spark key under which the engine keeps its bookkeeping
pub const INFINITE_SPARK_KEY: &str = "infinite";
/// Field holding the id of the last opened sparklet
pub const LAST_ACTIVE_FIELD: &str = "lastActiveSparkletId";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt data for '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Backend(String),
}

/// Get/set a JSON blob by key
pub trait SparkDataStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;
    fn set(&mut self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
}

/// In-memory store for tests and headless runs
#[derive(Debug, Default, Clone)]
pub struct MemoryDataStore {
    entries: HashMap<String, serde_json::Value>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SparkDataStore for MemoryDataStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Read the last active sparklet id. Failures are logged and read as none.
pub fn read_last_active(store: &dyn SparkDataStore) -> Option<String> {
    match store.get(INFINITE_SPARK_KEY) {
        Ok(Some(blob)) => blob
            .get(LAST_ACTIVE_FIELD)
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Could not read last active sparklet");
            None
        }
    }
}

/// Record `id` (or clear it with `None`) as the last active sparklet,
/// keeping any other fields stored under the same key. Returns false if
/// the store failed; the failure is logged.
pub fn write_last_active(store: &mut dyn SparkDataStore, id: Option<&str>) -> bool {
    let mut blob = match store.get(INFINITE_SPARK_KEY) {
        Ok(Some(serde_json::Value::Object(map))) => map,
        Ok(_) => serde_json::Map::new(),
        Err(e) => {
            warn!(error = %e, "Could not read spark data; overwriting");
            serde_json::Map::new()
        }
    };
    match id {
        Some(id) => blob.insert(LAST_ACTIVE_FIELD.to_string(), serde_json::Value::from(id)),
        None => blob.remove(LAST_ACTIVE_FIELD),
    };

    match store.set(INFINITE_SPARK_KEY, serde_json::Value::Object(blob)) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Could not record last active sparklet");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BrokenStore;

    impl SparkDataStore for BrokenStore {
        fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
            Err(StoreError::Backend(format!("cannot read {}", key)))
        }

        fn set(&mut self, key: &str, _value: serde_json::Value) -> Result<(), StoreError> {
            Err(StoreError::Backend(format!("cannot write {}", key)))
        }
    }

    #[test]
    fn test_pointer_round_trip_keeps_other_fields() {
        let mut store = MemoryDataStore::new();
        store
            .set(INFINITE_SPARK_KEY, json!({"favorites": ["a"]}))
            .unwrap();

        assert_eq!(read_last_active(&store), None);
        assert!(write_last_active(&mut store, Some("abc123")));
        assert_eq!(read_last_active(&store), Some("abc123".to_string()));
        assert_eq!(
            store.get(INFINITE_SPARK_KEY).unwrap(),
            Some(json!({"favorites": ["a"], "lastActiveSparkletId": "abc123"}))
        );

        assert!(write_last_active(&mut store, None));
        assert_eq!(read_last_active(&store), None);
    }

    #[test]
    fn test_store_failures_are_logged_not_raised() {
        let mut store = BrokenStore;
        assert_eq!(read_last_active(&store), None);
        assert!(!write_last_active(&mut store, Some("x")));
    }
}
