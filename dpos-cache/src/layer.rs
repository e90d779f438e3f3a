//! The transactional cache layer: read-through over a parent, buffered
//! writes, an erased-keys set. A child layer owns its parent for the
//! duration of the transaction; `commit` folds writes back into it and
//! returns it, `discard` just returns it unchanged.

use crate::store::KvStore;
use std::collections::{BTreeMap, BTreeSet};

/// Anything a cache layer can read through to: either another layer, or the
/// root `KvStore`.
pub trait CacheRead {
    fn get_raw(&self, key: &[u8]) -> Option<Vec<u8>>;
}

/// Anything a cache layer can fold its writes into on commit.
pub trait CacheWrite: CacheRead {
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>);
    fn erase_raw(&mut self, key: &[u8]);
}

impl<K: KvStore> CacheRead for K {
    fn get_raw(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.get(key)
    }
}

/// Lets a reference to any readable layer serve as a parent in its own
/// right, so a live transaction can spawn a read-through child without
/// taking ownership of it.
impl<T: CacheRead> CacheRead for &T {
    fn get_raw(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get_raw(key)
    }
}

/// Lets a mutable borrow of any writable layer serve as a parent in its own
/// right, so a child transaction can commit its writes straight back through
/// the borrow without the caller giving up ownership.
impl<T: CacheRead> CacheRead for &mut T {
    fn get_raw(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get_raw(key)
    }
}

impl<T: CacheWrite> CacheWrite for &mut T {
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        (**self).put_raw(key, value)
    }

    fn erase_raw(&mut self, key: &[u8]) {
        (**self).erase_raw(key)
    }
}

impl<K: KvStore> CacheWrite for K {
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.put(key, value)
    }

    fn erase_raw(&mut self, key: &[u8]) {
        self.delete(key)
    }
}

/// A single transactional view. `P` is the parent layer (or the root store);
/// `Get` checks `erased`, then `writes`, then recurses into `parent`.
pub struct CacheLayer<P> {
    parent: P,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
    erased: BTreeSet<Vec<u8>>,
}

impl<P: CacheRead> CacheLayer<P> {
    pub fn new(parent: P) -> Self {
        CacheLayer { parent, writes: BTreeMap::new(), erased: BTreeSet::new() }
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if self.erased.contains(key) {
            return None;
        }
        if let Some(value) = self.writes.get(key) {
            return Some(value.clone());
        }
        self.parent.get_raw(key)
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.erased.remove(&key);
        self.writes.insert(key, value);
    }

    pub fn erase(&mut self, key: Vec<u8>) {
        self.writes.remove(&key);
        self.erased.insert(key);
    }

    /// Drops this layer's writes entirely and hands the untouched parent back.
    pub fn discard(self) -> P {
        self.parent
    }

    pub fn pending_len(&self) -> usize {
        self.writes.len() + self.erased.len()
    }
}

impl<P: CacheRead> CacheRead for CacheLayer<P> {
    fn get_raw(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.get(key)
    }
}

impl<P: CacheWrite> CacheLayer<P> {
    /// Folds this layer's writes/erasures into the parent, atomically from
    /// the point of view of any later reader of the parent, and returns it.
    pub fn commit(self) -> P {
        let mut parent = self.parent;
        for key in self.erased {
            parent.erase_raw(&key);
        }
        for (key, value) in self.writes {
            parent.put_raw(key, value);
        }
        parent
    }
}

impl<P: CacheWrite> CacheWrite for CacheLayer<P> {
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.put(key, value)
    }

    fn erase_raw(&mut self, key: &[u8]) {
        self.erase(key.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn reads_fall_through_to_parent() {
        let mut store = MemoryStore::new();
        store.put(b"k".to_vec(), b"parent-value".to_vec());
        let layer = CacheLayer::new(store);
        assert_eq!(layer.get(b"k"), Some(b"parent-value".to_vec()));
    }

    #[test]
    fn write_shadows_parent_without_mutating_it() {
        let mut store = MemoryStore::new();
        store.put(b"k".to_vec(), b"parent-value".to_vec());
        let mut layer = CacheLayer::new(store);
        layer.put(b"k".to_vec(), b"child-value".to_vec());
        assert_eq!(layer.get(b"k"), Some(b"child-value".to_vec()));
        let store = layer.discard();
        assert_eq!(store.get(b"k"), Some(b"parent-value".to_vec()));
    }

    #[test]
    fn erase_shadows_parent_value() {
        let mut store = MemoryStore::new();
        store.put(b"k".to_vec(), b"parent-value".to_vec());
        let mut layer = CacheLayer::new(store);
        layer.erase(b"k".to_vec());
        assert_eq!(layer.get(b"k"), None);
    }

    #[test]
    fn commit_folds_writes_into_parent() {
        let store = MemoryStore::new();
        let mut layer = CacheLayer::new(store);
        layer.put(b"a".to_vec(), b"1".to_vec());
        layer.put(b"b".to_vec(), b"2".to_vec());
        let store = layer.commit();
        assert_eq!(store.get(b"a"), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b"), Some(b"2".to_vec()));
    }

    #[test]
    fn nested_layers_read_through_two_levels() {
        let mut store = MemoryStore::new();
        store.put(b"k".to_vec(), b"root".to_vec());
        let mut block_layer = CacheLayer::new(store);
        block_layer.put(b"k2".to_vec(), b"block".to_vec());
        let tx_layer = CacheLayer::new(block_layer);
        assert_eq!(tx_layer.get(b"k"), Some(b"root".to_vec()));
        assert_eq!(tx_layer.get(b"k2"), Some(b"block".to_vec()));

        let block_layer = tx_layer.discard();
        let store = block_layer.commit();
        assert_eq!(store.get(b"k2"), Some(b"block".to_vec()));
    }
}
