//! Shared test helpers: one-time logger init, deterministic keypair
//! generation, and small chain-building fixtures, matching the shape of the
//! teacher's `test-suite::setup_test`/`generate_standard_genesis` helpers.

use dpos_core::crypto::{generate_keypair, Hash256, PrivateKey, PublicKey};
use dpos_core::ids::RegId;
use dpos_core::time::get_timestamp;
use dpos_core::wire::BlockIndex;
use dpos_delegate::{ActiveDelegatesStore, DelegateSet};
use dpos_finality::ChainIndex;
use tempfile::TempDir;

/// One-time logger init, safe to call at the top of every test.
pub fn setup_test() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Deterministic keypairs for `n` block producers, seeded by index so tests
/// are reproducible without relying on a real RNG.
pub fn generate_bp_keys(n: u32) -> Vec<(RegId, PublicKey, PrivateKey)> {
    (0..n)
        .map(|i| {
            let regid = RegId::new(1, i as u16);
            let (public, private) = generate_keypair(format!("bp-{i}"));
            (regid, public, private)
        })
        .collect()
}

/// Builds a `DelegateSet` from the given keys, vote weight descending by
/// index so the set mirrors the "highest-voted first" convention.
pub fn delegate_set_from_keys(keys: &[(RegId, PublicKey, PrivateKey)]) -> DelegateSet {
    keys.iter()
        .enumerate()
        .map(|(i, (regid, _, _))| (*regid, (keys.len() - i) as u64))
        .collect()
}

/// A ready-to-use active delegate store for `n` block producers, rotated in
/// at height 0.
pub fn standard_delegates(n: u32) -> (ActiveDelegatesStore, Vec<(RegId, PublicKey, PrivateKey)>) {
    let keys = generate_bp_keys(n);
    let mut store = ActiveDelegatesStore::new();
    store.rotate(delegate_set_from_keys(&keys), 0).unwrap();
    (store, keys)
}

/// Builds a linear chain of `n` blocks on top of genesis, each one second
/// apart, ending `n` seconds before "now" so confirm-broadcast age gates
/// don't need special-casing in callers.
pub fn build_chain(n: u32) -> ChainIndex {
    let now = get_timestamp();
    let genesis = BlockIndex::genesis(Hash256::hash("genesis"), now - (n as i64 + 1) * 1000);
    let mut chain = ChainIndex::new(genesis.clone());
    let mut prev = genesis.hash;
    for h in 1..=n {
        let block = BlockIndex {
            height: h,
            hash: Hash256::hash(format!("block-{h}")),
            prev_hash: prev,
            block_time: now - (n as i64 - h as i64) * 1000,
        };
        prev = block.hash;
        chain.push_tip(block);
    }
    chain
}

/// A temp directory whose path outlives the `TempDir` handle, matching the
/// teacher's `create_temp_dir` (cleanup is the caller's or the OS's job, not
/// a `Drop` impl's, since nothing here keeps a live handle to it).
pub fn create_temp_dir() -> String {
    let dir = TempDir::new().unwrap();
    let path = dir.path().to_string_lossy().into_owned();
    std::mem::forget(dir);
    path
}
