//! The two-pointer state machine: `local_final` and `global_final`, one lock
//! (`cs_finblock`), three triggers (new tip, new message, timeout).

use crate::chain::ChainIndex;
use crate::quorum::quorum_met;
use dpos_core::ids::BlockHeight;
use dpos_core::time::{get_timestamp, Timestamp};
use dpos_core::wire::BlockIndex;
use dpos_delegate::ActiveDelegatesStore;
use dpos_pbft::PbftMessageManager;
use thiserror::Error;

pub const DEFAULT_LOCAL_WINDOW: u32 = 10;
pub const DEFAULT_GLOBAL_WINDOW: u32 = 50;

/// The four config knobs the ambient stack calls for: local/global finality
/// windows, the local-finality timeout, and the bound on each round's PBFT
/// message dedup memo. Loading these from a file/CLI/env is an external
/// collaborator's job (the node embedding this core); this struct only holds
/// the resolved values, built programmatically.
#[derive(Debug, Clone, Copy)]
pub struct FinalityConfig {
    pub local_window: u32,
    pub global_window: u32,
    pub local_fin_timeout_ms: i64,
    pub pbft_max_known: usize,
}

impl Default for FinalityConfig {
    fn default() -> Self {
        FinalityConfig {
            local_window: DEFAULT_LOCAL_WINDOW,
            global_window: DEFAULT_GLOBAL_WINDOW,
            local_fin_timeout_ms: 60_000,
            pbft_max_known: dpos_pbft::DEFAULT_MAX_KNOWN,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FinalityError {
    /// A fatal invariant violation: the chain no longer agrees with an
    /// already-finalised height. Requires operator intervention; this core
    /// never attempts to repair it automatically.
    #[error("global finality block changed at height {0}: chain has forked past finality")]
    GlobalFinalityReorg(BlockHeight),
}

struct FinalityState {
    local_final: BlockIndex,
    global_final: BlockIndex,
    local_fin_last_update: Timestamp,
}

/// Owns the two pointers and the two per-round message managers. All pointer
/// mutation happens under one internal lock; callers are responsible for
/// holding the chain lock (`cs_main`-equivalent) before calling any method
/// here that reads `ChainIndex` — this type never reaches back into a chain
/// lock of its own, preserving the chain-before-finality lock order.
pub struct FinalityManager {
    state: parking_lot::Mutex<FinalityState>,
    pub confirm_messages: parking_lot::Mutex<PbftMessageManager>,
    pub finality_messages: parking_lot::Mutex<PbftMessageManager>,
    local_window: u32,
    global_window: u32,
}

impl FinalityManager {
    pub fn new(genesis: BlockIndex, local_window: u32, global_window: u32) -> Self {
        FinalityManager {
            state: parking_lot::Mutex::new(FinalityState {
                local_final: genesis.clone(),
                global_final: genesis,
                local_fin_last_update: get_timestamp(),
            }),
            confirm_messages: parking_lot::Mutex::new(PbftMessageManager::default()),
            finality_messages: parking_lot::Mutex::new(PbftMessageManager::default()),
            local_window,
            global_window,
        }
    }

    /// Builds from a [`FinalityConfig`], also sizing both message managers'
    /// dedup memo to `pbft_max_known` rather than leaving it at the default.
    pub fn with_config(genesis: BlockIndex, config: &FinalityConfig) -> Self {
        FinalityManager {
            state: parking_lot::Mutex::new(FinalityState {
                local_final: genesis.clone(),
                global_final: genesis,
                local_fin_last_update: get_timestamp(),
            }),
            confirm_messages: parking_lot::Mutex::new(PbftMessageManager::new(config.pbft_max_known)),
            finality_messages: parking_lot::Mutex::new(PbftMessageManager::new(config.pbft_max_known)),
            local_window: config.local_window,
            global_window: config.global_window,
        }
    }

    pub fn local_final(&self) -> BlockIndex {
        self.state.lock().local_final.clone()
    }

    pub fn global_final(&self) -> BlockIndex {
        self.state.lock().global_final.clone()
    }

    pub fn local_fin_last_update(&self) -> Timestamp {
        self.state.lock().local_fin_last_update
    }

    /// Trigger 3: resets `local_final` to genesis, forcing a fresh observation.
    pub fn set_local_fin_timeout(&self, genesis: &BlockIndex) {
        log::warn!("local finality timed out; resetting local_final to genesis");
        let mut state = self.state.lock();
        state.local_final = genesis.clone();
    }

    /// Driver for trigger 3: if no local-finality advancement has happened
    /// within `timeout_ms`, resets the pointer and returns `true`.
    pub fn check_local_fin_timeout(&self, now: Timestamp, timeout_ms: i64, genesis: &BlockIndex) -> bool {
        let elapsed = now - self.local_fin_last_update();
        if elapsed > timeout_ms {
            self.set_local_fin_timeout(genesis);
            true
        } else {
            false
        }
    }

    /// Trigger 1 (local round): scans backwards from `tip` for the newest
    /// ancestor past the current pointer, within the local window, whose
    /// confirm-message set has quorum. Returns `true` if it advanced.
    pub fn update_local_fin_block_on_tip(
        &self,
        chain: &ChainIndex,
        delegates: &ActiveDelegatesStore,
    ) -> bool {
        let old_height = self.state.lock().local_final.height;
        if chain.tip().height == 0 {
            return false;
        }
        let messages = self.confirm_messages.lock();
        for block in chain.ancestors_from_tip(self.local_window) {
            if block.height <= old_height || block.height == 0 {
                break;
            }
            let Some(set) = messages.messages_for_block(&block.hash) else { continue };
            let bp_set = delegates.bp_set_at(block.height);
            if quorum_met(set, &bp_set) {
                let mut state = self.state.lock();
                if block.height > state.local_final.height {
                    state.local_final = block.clone();
                    state.local_fin_last_update = get_timestamp();
                    return true;
                }
            }
        }
        false
    }

    /// Trigger 2 (local round): a single newly-arrived confirm message may
    /// push a block over quorum without needing a fresh tip scan.
    pub fn update_local_fin_block_on_message(
        &self,
        chain: &ChainIndex,
        height: BlockHeight,
        block_hash: dpos_core::crypto::Hash256,
        delegates: &ActiveDelegatesStore,
    ) -> bool {
        if self.state.lock().local_final.height >= height {
            return false;
        }
        let Some(block) = chain.at_height(height) else { return false };
        if block.hash != block_hash {
            return false;
        }
        let messages = self.confirm_messages.lock();
        let Some(set) = messages.messages_for_block(&block_hash) else { return false };
        let bp_set = delegates.bp_set_at(height);
        if !quorum_met(set, &bp_set) {
            return false;
        }
        drop(messages);
        let mut state = self.state.lock();
        if height > state.local_final.height {
            state.local_final = block.clone();
            state.local_fin_last_update = get_timestamp();
            true
        } else {
            false
        }
    }

    /// Trigger 1 (global round). Mirrors the local variant with the wider
    /// window and the finality-message manager.
    pub fn update_global_fin_block_on_tip(
        &self,
        chain: &ChainIndex,
        delegates: &ActiveDelegatesStore,
    ) -> Result<bool, FinalityError> {
        let old_height = self.state.lock().global_final.height;
        let messages = self.finality_messages.lock();
        for block in chain.ancestors_from_tip(self.global_window) {
            if block.height <= old_height || block.height == 0 {
                break;
            }
            let Some(set) = messages.messages_for_block(&block.hash) else { continue };
            let bp_set = delegates.bp_set_at(block.height);
            if quorum_met(set, &bp_set) {
                return self.advance_global(chain, block.height);
            }
        }
        Ok(false)
    }

    /// Trigger 2 (global round).
    pub fn update_global_fin_block_on_message(
        &self,
        chain: &ChainIndex,
        height: BlockHeight,
        block_hash: dpos_core::crypto::Hash256,
        delegates: &ActiveDelegatesStore,
    ) -> Result<bool, FinalityError> {
        if self.state.lock().global_final.height >= height {
            return Ok(false);
        }
        let Some(block) = chain.at_height(height) else { return Ok(false) };
        if block.hash != block_hash {
            return Ok(false);
        }
        let messages = self.finality_messages.lock();
        let Some(set) = messages.messages_for_block(&block_hash) else { return Ok(false) };
        let bp_set = delegates.bp_set_at(height);
        if !quorum_met(set, &bp_set) {
            return Ok(false);
        }
        drop(messages);
        self.advance_global(chain, height)
    }

    /// The one place `global_final` actually moves: requires it to stay
    /// `<= local_final`, requires strict forward progress, and refuses (with
    /// a fatal-invariant error) if the chain no longer agrees with the old
    /// global-final block — a re-org past finality, which this core treats
    /// as an operator-intervention event rather than something to silently
    /// route around.
    fn advance_global(
        &self,
        chain: &ChainIndex,
        new_height: BlockHeight,
    ) -> Result<bool, FinalityError> {
        let mut state = self.state.lock();
        if new_height > state.local_final.height {
            return Ok(false);
        }
        if new_height <= state.global_final.height {
            return Ok(false);
        }
        if let Some(canonical) = chain.at_height(state.global_final.height) {
            if canonical.hash != state.global_final.hash {
                log::error!(
                    "refusing to advance global finality: chain disagrees with already-finalised height {}",
                    state.global_final.height
                );
                return Err(FinalityError::GlobalFinalityReorg(state.global_final.height));
            }
        }
        let Some(block) = chain.at_height(new_height) else { return Ok(false) };
        state.global_final = block.clone();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_core::crypto::{generate_keypair, Hash256, Signature};
    use dpos_core::ids::RegId;
    use dpos_core::wire::PbftMsgType;
    use dpos_delegate::DelegateSet;

    fn block(height: BlockHeight, seed: &str, prev_hash: Hash256) -> BlockIndex {
        BlockIndex { height, hash: Hash256::hash(seed), prev_hash, block_time: get_timestamp() }
    }

    fn confirm_msg(height: BlockHeight, block_hash: Hash256, prev_hash: Hash256, miner: RegId) -> dpos_core::wire::PbftMessage {
        let (_, key) = generate_keypair("k");
        let mut msg = dpos_core::wire::PbftMessage {
            msg_type: PbftMsgType::Confirm,
            height,
            block_hash,
            prev_block_hash: prev_hash,
            miner,
            signature: Signature::sign(Hash256::zero(), &key).unwrap(),
        };
        let hash = msg.content_hash();
        msg.signature = Signature::sign(hash, &key).unwrap();
        msg
    }

    fn make_chain_and_delegates(n_blocks: u32, n_bps: u32) -> (ChainIndex, ActiveDelegatesStore) {
        let genesis = BlockIndex::genesis(Hash256::hash("genesis"), 0);
        let mut chain = ChainIndex::new(genesis.clone());
        let mut prev = genesis.hash;
        for h in 1..=n_blocks {
            let b = block(h, &format!("b{h}"), prev);
            prev = b.hash;
            chain.push_tip(b);
        }
        let set: DelegateSet = (0..n_bps).map(|i| (RegId::new(1, i as u16), 1)).collect();
        let mut delegates = ActiveDelegatesStore::new();
        delegates.rotate(set, 0).unwrap();
        (chain, delegates)
    }

    #[test]
    fn local_pointer_advances_on_quorum() {
        let (chain, delegates) = make_chain_and_delegates(5, 3);
        let manager = FinalityManager::new(chain.genesis().clone(), DEFAULT_LOCAL_WINDOW, DEFAULT_GLOBAL_WINDOW);
        let target = chain.at_height(3).unwrap().clone();

        {
            let mut msgs = manager.confirm_messages.lock();
            for i in 0..2 {
                let m = confirm_msg(3, target.hash, target.prev_hash, RegId::new(1, i));
                msgs.add_known(m.content_hash());
                msgs.save_message_by_block(m);
            }
        }

        assert!(manager.update_local_fin_block_on_tip(&chain, &delegates));
        assert_eq!(manager.local_final().height, 3);
    }

    #[test]
    fn local_pointer_does_not_advance_without_quorum() {
        let (chain, delegates) = make_chain_and_delegates(5, 3);
        let manager = FinalityManager::new(chain.genesis().clone(), DEFAULT_LOCAL_WINDOW, DEFAULT_GLOBAL_WINDOW);
        let target = chain.at_height(3).unwrap().clone();
        {
            let mut msgs = manager.confirm_messages.lock();
            let m = confirm_msg(3, target.hash, target.prev_hash, RegId::new(1, 0));
            msgs.add_known(m.content_hash());
            msgs.save_message_by_block(m);
        }
        assert!(!manager.update_local_fin_block_on_tip(&chain, &delegates));
        assert_eq!(manager.local_final().height, 0);
    }

    #[test]
    fn global_cannot_pass_local() {
        let (chain, delegates) = make_chain_and_delegates(5, 3);
        let manager = FinalityManager::new(chain.genesis().clone(), DEFAULT_LOCAL_WINDOW, DEFAULT_GLOBAL_WINDOW);
        let target = chain.at_height(3).unwrap().clone();
        {
            let mut msgs = manager.finality_messages.lock();
            for i in 0..2 {
                let m = confirm_msg(3, target.hash, target.prev_hash, RegId::new(1, i));
                msgs.add_known(m.content_hash());
                msgs.save_message_by_block(m);
            }
        }
        // local_final is still at genesis, so global cannot jump to height 3.
        let advanced = manager.update_global_fin_block_on_tip(&chain, &delegates).unwrap();
        assert!(!advanced);
        assert_eq!(manager.global_final().height, 0);
    }

    #[test]
    fn timeout_resets_local_to_genesis() {
        let (chain, _delegates) = make_chain_and_delegates(1, 1);
        let manager = FinalityManager::new(chain.genesis().clone(), DEFAULT_LOCAL_WINDOW, DEFAULT_GLOBAL_WINDOW);
        manager.set_local_fin_timeout(chain.genesis());
        assert_eq!(manager.local_final().height, 0);
    }

    #[test]
    fn with_config_uses_the_configured_windows() {
        let genesis = BlockIndex::genesis(Hash256::hash("genesis"), 0);
        let config = FinalityConfig { local_window: 3, global_window: 7, ..FinalityConfig::default() };
        let manager = FinalityManager::with_config(genesis, &config);
        assert_eq!(manager.local_window, 3);
        assert_eq!(manager.global_window, 7);
    }

    #[test]
    fn timeout_driver_only_fires_past_the_threshold() {
        let (chain, _delegates) = make_chain_and_delegates(1, 1);
        let manager = FinalityManager::new(chain.genesis().clone(), DEFAULT_LOCAL_WINDOW, DEFAULT_GLOBAL_WINDOW);
        let last_update = manager.local_fin_last_update();
        assert!(!manager.check_local_fin_timeout(last_update + 100, 1_000, chain.genesis()));
        assert!(manager.check_local_fin_timeout(last_update + 2_000, 1_000, chain.genesis()));
    }
}
