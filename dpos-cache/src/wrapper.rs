//! `CacheWrapper`: the named, typed façade over a single `CacheLayer`, split
//! into the logical stores the node needs — accounts, assets, contracts,
//! delegates, governance, receipts, system parameters, CDP, DEX, price
//! feeds, and the block index.

use crate::layer::{CacheLayer, CacheRead, CacheWrite};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("deserialisation failed for key in domain {0}: {1}")]
    Decode(&'static str, serde_json::Error),
    #[error("serialisation failed for key in domain {0}: {1}")]
    Encode(&'static str, serde_json::Error),
}

/// One logical namespace within the shared key space. Variants double as the
/// one-byte key prefix, so two domains can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Domain {
    Account = 0,
    Asset = 1,
    Contract = 2,
    Delegate = 3,
    Governance = 4,
    Receipt = 5,
    SysParam = 6,
    Cdp = 7,
    Dex = 8,
    PriceFeed = 9,
    BlockIndex = 10,
}

fn namespaced_key(domain: Domain, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(domain as u8);
    out.extend_from_slice(key);
    out
}

/// Owns one `CacheLayer` over a parent `P`, exposing typed get/put/erase per
/// domain. Every transaction takes a fresh `CacheWrapper::child()` layer;
/// block execution holds one for the duration of the block.
pub struct CacheWrapper<P> {
    layer: CacheLayer<P>,
}

impl<P: CacheRead> CacheWrapper<P> {
    pub fn new(parent: P) -> Self {
        CacheWrapper { layer: CacheLayer::new(parent) }
    }

    pub fn get_raw(&self, domain: Domain, key: &[u8]) -> Option<Vec<u8>> {
        self.layer.get(&namespaced_key(domain, key))
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        domain: Domain,
        key: &[u8],
    ) -> Result<Option<T>, CacheError> {
        match self.get_raw(domain, key) {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CacheError::Decode(domain_name(domain), e)),
        }
    }

    pub fn put<T: Serialize>(
        &mut self,
        domain: Domain,
        key: &[u8],
        value: &T,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Encode(domain_name(domain), e))?;
        self.layer.put(namespaced_key(domain, key), bytes);
        Ok(())
    }

    pub fn erase(&mut self, domain: Domain, key: &[u8]) {
        self.layer.erase(namespaced_key(domain, key));
    }

    pub fn pending_len(&self) -> usize {
        self.layer.pending_len()
    }

    /// Opens a fresh child transaction against this wrapper, without
    /// consuming it — used for a single transaction's cache layer within a
    /// block that is still executing.
    pub fn child(&self) -> CacheWrapper<&CacheWrapper<P>> {
        CacheWrapper::new(self)
    }

    /// Opens a child transaction that can fold its writes straight back into
    /// `self` on commit, without `self` giving up ownership. Used where a
    /// single step (one proposal's execute, one block's VM pass) needs its
    /// own isolated layer while the caller still holds the outer one.
    /// Committing the returned wrapper requires `P: CacheWrite`, same as any
    /// other commit.
    pub fn child_mut(&mut self) -> CacheWrapper<&mut CacheWrapper<P>> {
        CacheWrapper::new(self)
    }

    pub fn discard(self) -> P {
        self.layer.discard()
    }
}

impl<P: CacheWrite> CacheWrapper<P> {
    pub fn commit(self) -> P {
        self.layer.commit()
    }
}

impl<P: CacheRead> CacheRead for CacheWrapper<P> {
    fn get_raw(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.layer.get(key)
    }
}

impl<P: CacheWrite> CacheWrite for CacheWrapper<P> {
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.layer.put(key, value)
    }

    fn erase_raw(&mut self, key: &[u8]) {
        self.layer.erase(key.to_vec())
    }
}

fn domain_name(domain: Domain) -> &'static str {
    match domain {
        Domain::Account => "account",
        Domain::Asset => "asset",
        Domain::Contract => "contract",
        Domain::Delegate => "delegate",
        Domain::Governance => "governance",
        Domain::Receipt => "receipt",
        Domain::SysParam => "sysparam",
        Domain::Cdp => "cdp",
        Domain::Dex => "dex",
        Domain::PriceFeed => "pricefeed",
        Domain::BlockIndex => "blockindex",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn domains_do_not_collide_on_the_same_raw_key() {
        let store = MemoryStore::new();
        let mut wrapper = CacheWrapper::new(store);
        wrapper.put(Domain::Account, b"1", &100u64).unwrap();
        wrapper.put(Domain::Asset, b"1", &200u64).unwrap();
        assert_eq!(wrapper.get::<u64>(Domain::Account, b"1").unwrap(), Some(100));
        assert_eq!(wrapper.get::<u64>(Domain::Asset, b"1").unwrap(), Some(200));
    }

    #[test]
    fn child_transaction_sees_parent_writes_but_not_vice_versa() {
        let store = MemoryStore::new();
        let mut wrapper = CacheWrapper::new(store);
        wrapper.put(Domain::Account, b"1", &100u64).unwrap();

        let mut child = wrapper.child();
        assert_eq!(child.get::<u64>(Domain::Account, b"1").unwrap(), Some(100));
        child.put(Domain::Account, b"1", &50u64).unwrap();
        assert_eq!(child.get::<u64>(Domain::Account, b"1").unwrap(), Some(50));

        // The parent is untouched until the child commits.
        assert_eq!(wrapper.get::<u64>(Domain::Account, b"1").unwrap(), Some(100));
    }

    #[test]
    fn commit_folds_child_writes_into_parent() {
        let store = MemoryStore::new();
        let mut wrapper = CacheWrapper::new(store);
        wrapper.put(Domain::Account, b"1", &100u64).unwrap();

        let mut child = CacheWrapper::new(wrapper);
        child.put(Domain::Account, b"1", &50u64).unwrap();
        let wrapper = child.commit();
        assert_eq!(wrapper.get::<u64>(Domain::Account, b"1").unwrap(), Some(50));
    }

    #[test]
    fn child_mut_commit_folds_into_borrowed_parent() {
        let store = MemoryStore::new();
        let mut wrapper = CacheWrapper::new(store);
        wrapper.put(Domain::Account, b"1", &100u64).unwrap();

        let mut child = wrapper.child_mut();
        child.put(Domain::Account, b"1", &50u64).unwrap();
        child.commit();
        assert_eq!(wrapper.get::<u64>(Domain::Account, b"1").unwrap(), Some(50));
    }

    #[test]
    fn child_mut_discard_leaves_parent_untouched() {
        let store = MemoryStore::new();
        let mut wrapper = CacheWrapper::new(store);
        wrapper.put(Domain::Account, b"1", &100u64).unwrap();

        let mut child = wrapper.child_mut();
        child.put(Domain::Account, b"1", &50u64).unwrap();
        child.discard();
        assert_eq!(wrapper.get::<u64>(Domain::Account, b"1").unwrap(), Some(100));
    }
}
