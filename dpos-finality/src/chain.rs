//! The in-memory canonical-chain view the finality manager consults. Owned
//! by the node under `cs_main`; the finality manager only ever borrows it,
//! never holds onto it across a lock boundary of its own.

use dpos_core::crypto::Hash256;
use dpos_core::ids::BlockHeight;
use dpos_core::wire::BlockIndex;
use std::collections::HashMap;

/// An append-only arena of `BlockIndex` nodes, addressed by hash, with a
/// height index for canonical-chain lookups and ancestor walks.
#[derive(Debug, Clone)]
pub struct ChainIndex {
    by_hash: HashMap<Hash256, BlockIndex>,
    by_height: HashMap<BlockHeight, Hash256>,
    tip: Hash256,
}

impl ChainIndex {
    pub fn new(genesis: BlockIndex) -> Self {
        let hash = genesis.hash;
        let mut by_hash = HashMap::new();
        let mut by_height = HashMap::new();
        by_height.insert(genesis.height, hash);
        by_hash.insert(hash, genesis);
        ChainIndex { by_hash, by_height, tip: hash }
    }

    pub fn genesis(&self) -> &BlockIndex {
        self.by_height
            .get(&0)
            .and_then(|h| self.by_hash.get(h))
            .expect("genesis always present")
    }

    pub fn tip(&self) -> &BlockIndex {
        self.by_hash.get(&self.tip).expect("tip always present")
    }

    pub fn get(&self, hash: &Hash256) -> Option<&BlockIndex> {
        self.by_hash.get(hash)
    }

    /// The block on the *current* canonical chain at `height`, if any.
    pub fn at_height(&self, height: BlockHeight) -> Option<&BlockIndex> {
        self.by_height.get(&height).and_then(|h| self.by_hash.get(h))
    }

    /// Appends a new tip. `block.prev_hash` must already be indexed.
    pub fn push_tip(&mut self, block: BlockIndex) {
        let hash = block.hash;
        self.by_height.insert(block.height, hash);
        self.by_hash.insert(hash, block);
        self.tip = hash;
    }

    /// Walks backwards from the tip, yielding up to `window` ancestors
    /// (including the tip itself), newest first.
    pub fn ancestors_from_tip(&self, window: u32) -> Vec<&BlockIndex> {
        let mut result = Vec::new();
        let mut current = Some(self.tip());
        while let Some(block) = current {
            result.push(block);
            if result.len() as u32 >= window || block.height == 0 {
                break;
            }
            current = self.get(&block.prev_hash);
        }
        result
    }
}
