//! The external collaborator boundary: whatever persists bytes to disk
//! implements `KvStore`. Grounded on the original `KVStorage`/`KVStore`
//! traits, collapsed to a single synchronous trait — cache operations run
//! under the chain/finality locks and must never await.

use std::collections::BTreeMap;

/// A batch of pending writes/deletes, applied to a `KvStore` as one atomic unit.
#[derive(Debug, Default, Clone)]
pub struct KvBatch {
    puts: Vec<(Vec<u8>, Vec<u8>)>,
    deletes: Vec<Vec<u8>>,
}

impl KvBatch {
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.puts.push((key, value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.deletes.push(key);
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);
    fn delete(&mut self, key: &[u8]);
    fn new_batch(&self) -> KvBatch {
        KvBatch::default()
    }
    /// Applies `batch` atomically: either every put/delete in it lands, or none do.
    fn commit(&mut self, batch: KvBatch) {
        for (key, value) in batch.puts {
            self.put(key, value);
        }
        for key in batch.deletes {
            self.delete(&key);
        }
    }
}

/// An in-memory `KvStore`, used by tests and as the default store before a
/// persistent backend is wired in.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.data.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.data.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_applies_puts_then_deletes() {
        let mut store = MemoryStore::new();
        store.put(b"a".to_vec(), b"1".to_vec());
        let mut batch = store.new_batch();
        batch.put(b"b".to_vec(), b"2".to_vec());
        batch.delete(b"a".to_vec());
        store.commit(batch);
        assert_eq!(store.get(b"a"), None);
        assert_eq!(store.get(b"b"), Some(b"2".to_vec()));
    }
}
