//! In-memory backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::{BatchOp, StateStore, StoreBatch, StoreError, StoreResult};

/// A [`StateStore`] over a sorted map. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl StateStore for MemoryStateStore {
    fn get_raw(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.ensure_open()?;
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn put_raw(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.ensure_open()?;
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.ensure_open()?;
        self.entries.write().remove(key);
        Ok(())
    }

    fn iterate(
        &self,
        prefix: &str,
        f: &mut dyn FnMut(&str, &[u8]) -> StoreResult<bool>,
    ) -> StoreResult<()> {
        self.ensure_open()?;
        // Snapshot so the callback may write to the store.
        let matching: Vec<(String, Vec<u8>)> = self
            .entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, value) in matching {
            if f(&key, &value)? {
                break;
            }
        }
        Ok(())
    }

    fn write_batch(&self, batch: StoreBatch) -> StoreResult<()> {
        self.ensure_open()?;
        let mut entries = self.entries.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateStoreExt;

    #[test]
    fn test_put_get_delete() {
        let store = MemoryStateStore::new();
        store.put("connected_chequebook", &"0xabc".to_string()).unwrap();
        assert_eq!(
            store.get::<String>("connected_chequebook").unwrap(),
            "0xabc"
        );

        store.delete("connected_chequebook").unwrap();
        assert_eq!(
            store.get::<String>("connected_chequebook"),
            Err(StoreError::NotFound)
        );
        // deleting twice is fine
        store.delete("connected_chequebook").unwrap();
    }

    #[test]
    fn test_iterate_prefix_in_order() {
        let store = MemoryStateStore::new();
        for key in ["q_2", "q_10", "q_1", "r_1", "p_9"] {
            store.put(key, &1u64).unwrap();
        }

        let mut seen = Vec::new();
        store
            .iterate("q_", &mut |key, _| {
                seen.push(key.to_string());
                Ok(false)
            })
            .unwrap();
        assert_eq!(seen, vec!["q_1", "q_10", "q_2"]);
    }

    #[test]
    fn test_iterate_stops_early() {
        let store = MemoryStateStore::new();
        for i in 0..5u64 {
            store.put(&format!("k_{i}"), &i).unwrap();
        }

        let mut count = 0;
        store
            .iterate("k_", &mut |_, _| {
                count += 1;
                Ok(count == 2)
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_batch_is_applied_in_order() {
        let store = MemoryStateStore::new();
        store.put("gone", &1u64).unwrap();

        let mut batch = StoreBatch::new();
        batch.put("a", &1u64).unwrap();
        batch.put("a", &2u64).unwrap();
        batch.delete("gone");
        store.write_batch(batch).unwrap();

        assert_eq!(store.get::<u64>("a").unwrap(), 2);
        assert_eq!(store.get_opt::<u64>("gone").unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let store = MemoryStateStore::new();
        store.close().unwrap();
        assert_eq!(store.put("a", &1u64), Err(StoreError::Closed));
        assert_eq!(store.get_raw("a"), Err(StoreError::Closed));
    }
}
