//! Dedup, per-block set aggregation, and broadcast memo for PBFT messages.
//! Grounded on the per-round vote bookkeeping (`prevotes`/`precommits` kept
//! as `BTreeSet`s aggregated per proposal); generalised here to an arbitrary
//! PBFT message kind (`Confirm` or `Finality` both run one of these).

use dpos_core::crypto::Hash256;
use dpos_core::wire::PbftMessage;
use lru::LruCache;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;

/// Default bound on the dedup memo, matching `PBFT_MAX_KNOWN`.
pub const DEFAULT_MAX_KNOWN: usize = 10_000;

/// Tracks one PBFT round's in-flight messages: which content-hashes have been
/// seen, how they group per block, and which blocks this node has already
/// broadcast a message for.
pub struct PbftMessageManager {
    known_set: LruCache<Hash256, ()>,
    by_block: BTreeMap<Hash256, BTreeSet<PbftMessage>>,
    broadcasted: BTreeSet<Hash256>,
}

impl PbftMessageManager {
    pub fn new(max_known: usize) -> Self {
        let cap = NonZeroUsize::new(max_known.max(1)).unwrap();
        PbftMessageManager {
            known_set: LruCache::new(cap),
            by_block: BTreeMap::new(),
            broadcasted: BTreeSet::new(),
        }
    }

    pub fn is_known(&self, content_hash: &Hash256) -> bool {
        self.known_set.contains(content_hash)
    }

    pub fn add_known(&mut self, content_hash: Hash256) {
        self.known_set.put(content_hash, ());
    }

    /// Inserts `msg` into its block's aggregation set. The caller must have
    /// already called `add_known` for this message's content hash — this
    /// keeps `known_set ⊇ ⋃ by_block` an invariant the type never breaks on
    /// its own. Returns the new size of the set for `msg.block_hash`.
    pub fn save_message_by_block(&mut self, msg: PbftMessage) -> usize {
        debug_assert!(self.is_known(&msg.content_hash()), "message must be known before saving");
        let set = self.by_block.entry(msg.block_hash).or_default();
        set.insert(msg);
        set.len()
    }

    pub fn messages_for_block(&self, block_hash: &Hash256) -> Option<&BTreeSet<PbftMessage>> {
        self.by_block.get(block_hash)
    }

    pub fn is_broadcasted(&self, block_hash: &Hash256) -> bool {
        self.broadcasted.contains(block_hash)
    }

    pub fn mark_broadcasted(&mut self, block_hash: Hash256) {
        self.broadcasted.insert(block_hash);
    }

    /// Drops aggregation state for blocks the canonical chain can no longer
    /// reach (e.g. after finality has advanced past them), bounding memory.
    pub fn prune_block(&mut self, block_hash: &Hash256) {
        self.by_block.remove(block_hash);
    }
}

impl Default for PbftMessageManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_core::crypto::generate_keypair;
    use dpos_core::ids::RegId;
    use dpos_core::wire::{PbftMessage, PbftMsgType};

    fn message(height: u32, block_hash: Hash256) -> PbftMessage {
        let (_, key) = generate_keypair("signer");
        let mut msg = PbftMessage {
            msg_type: PbftMsgType::Confirm,
            height,
            block_hash,
            prev_block_hash: Hash256::hash("prev"),
            miner: RegId::new(1, 0),
            signature: dpos_core::crypto::Signature::sign(Hash256::zero(), &key).unwrap(),
        };
        let hash = msg.content_hash();
        msg.signature = dpos_core::crypto::Signature::sign(hash, &key).unwrap();
        msg
    }

    #[test]
    fn dedup_and_aggregate_by_block() {
        let mut mgr = PbftMessageManager::new(100);
        let block = Hash256::hash("block-1");
        let msg = message(10, block);

        assert!(!mgr.is_known(&msg.content_hash()));
        mgr.add_known(msg.content_hash());
        let size = mgr.save_message_by_block(msg.clone());
        assert_eq!(size, 1);

        // Re-saving the same content is a set-insert no-op.
        mgr.add_known(msg.content_hash());
        let size = mgr.save_message_by_block(msg);
        assert_eq!(size, 1);
    }

    #[test]
    fn broadcast_memo_is_idempotent() {
        let mut mgr = PbftMessageManager::new(100);
        let block = Hash256::hash("block-1");
        assert!(!mgr.is_broadcasted(&block));
        mgr.mark_broadcasted(block);
        assert!(mgr.is_broadcasted(&block));
    }

    #[test]
    fn bounded_known_set_evicts_oldest() {
        let mut mgr = PbftMessageManager::new(2);
        let h1 = Hash256::hash("a");
        let h2 = Hash256::hash("b");
        let h3 = Hash256::hash("c");
        mgr.add_known(h1);
        mgr.add_known(h2);
        mgr.add_known(h3);
        assert!(!mgr.is_known(&h1));
        assert!(mgr.is_known(&h2));
        assert!(mgr.is_known(&h3));
    }
}
