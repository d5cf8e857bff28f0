//! In-memory backend.

use crate::{Column, KeyValueStore, StorageError, WriteBatch, WriteOp};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Volatile store backed by ordered maps. A batch is applied under a single
/// write lock, which makes it atomic with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Column, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a column.
    pub fn len(&self, column: Column) -> usize {
        self.data.read().get(&column).map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().values().all(|c| c.is_empty())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .data
            .read()
            .get(&column)
            .and_then(|c| c.get(key))
            .cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut data = self.data.write();
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { column, key, value } => {
                    data.entry(column).or_default().insert(key, value);
                }
                WriteOp::Delete { column, key } => {
                    if let Some(c) = data.get_mut(&column) {
                        c.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn scan(&self, column: Column) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self
            .data
            .read()
            .get(&column)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_put_get_delete() {
        let store = MemoryStore::new();
        store.put(Column::Proposals, b"1", b"one").unwrap();
        assert_eq!(store.get(Column::Proposals, b"1").unwrap(), Some(b"one".to_vec()));
        assert_eq!(store.get(Column::Ballots, b"1").unwrap(), None);

        store.delete(Column::Proposals, b"1").unwrap();
        assert_eq!(store.get(Column::Proposals, b"1").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_scan_ordered() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(Column::Delegations, b"b".to_vec(), b"2".to_vec());
        batch.put(Column::Delegations, b"a".to_vec(), b"1".to_vec());
        store.write(batch).unwrap();

        let entries = store.scan(Column::Delegations).unwrap();
        assert_eq!(entries[0].0, b"a".to_vec());
        assert_eq!(entries[1].0, b"b".to_vec());
        assert_eq!(store.len(Column::Delegations), 2);
    }
}
