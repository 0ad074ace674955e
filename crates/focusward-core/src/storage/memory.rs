//! In-process key-value store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::{Modifier, Store, StoreKey};
use crate::error::{Result, StorageError};

/// Mutex-guarded map. `modify` holds the lock for the whole step, so
/// concurrent updates of one key never interleave.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StoreKey, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<StoreKey, Value>>> {
        self.entries.lock().map_err(|_| StorageError::Poisoned.into())
    }

    /// Keys currently holding a value.
    pub fn keys(&self) -> Result<Vec<StoreKey>> {
        Ok(self.entries()?.keys().copied().collect())
    }
}

impl Store for MemoryStore {
    fn load(&self, key: StoreKey) -> Result<Option<Value>> {
        Ok(self.entries()?.get(&key).cloned())
    }

    fn save(&self, key: StoreKey, value: Value) -> Result<()> {
        self.entries()?.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        self.entries()?.remove(&key);
        Ok(())
    }

    fn modify(&self, key: StoreKey, f: &mut Modifier<'_>) -> Result<()> {
        let mut entries = self.entries()?;
        let next = f(entries.get(&key).cloned())?;
        entries.insert(key, next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_load_remove() {
        let store = MemoryStore::new();
        assert!(store.load(StoreKey::WeeklyData).unwrap().is_none());

        store.save(StoreKey::WeeklyData, json!({"weekStart": "2026-10-12"})).unwrap();
        assert_eq!(
            store.load(StoreKey::WeeklyData).unwrap(),
            Some(json!({"weekStart": "2026-10-12"}))
        );
        assert_eq!(store.keys().unwrap(), vec![StoreKey::WeeklyData]);

        store.remove(StoreKey::WeeklyData).unwrap();
        assert!(store.load(StoreKey::WeeklyData).unwrap().is_none());
    }

    #[test]
    fn failed_modify_leaves_value_untouched() {
        let store = MemoryStore::new();
        store.save(StoreKey::SchemaVersion, json!(1)).unwrap();
        let result = store.modify(StoreKey::SchemaVersion, &mut |_| {
            Err(StorageError::QueryFailed("boom".into()).into())
        });
        assert!(result.is_err());
        assert_eq!(store.load(StoreKey::SchemaVersion).unwrap(), Some(json!(1)));
    }
}
