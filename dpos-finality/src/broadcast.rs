//! Outbound message construction and gating: `BroadcastBlockConfirm` /
//! `BroadcastBlockFinality`. `Signer` and `PeerBus` are the external
//! collaborators a node wires in — this crate only decides *whether* and
//! *what* to broadcast, never how a key is held or how bytes reach the wire.

use crate::chain::ChainIndex;
use crate::pointers::FinalityManager;
use dpos_core::crypto::Signature;
use dpos_core::ids::RegId;
use dpos_core::time::get_timestamp;
use dpos_core::wire::{pbft_content_hash, BlockIndex, PbftMessage, PbftMsgType};

/// Produces a signature over a PBFT message's content hash for the given
/// miner identity, or `None` if this node doesn't hold that miner's key.
#[async_trait::async_trait]
pub trait Signer {
    async fn sign_pbft(&self, miner: RegId, content_hash: dpos_core::crypto::Hash256) -> Option<Signature>;
}

/// Fans a finished message out to the network.
#[async_trait::async_trait]
pub trait PeerBus {
    async fn broadcast_pbft(&self, msg: PbftMessage);
}

#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Mirrors the `-genblock` flag: a node without a miner key configured
    /// never attempts to broadcast PBFT messages at all.
    pub enabled: bool,
    /// Confirm messages are withheld until the block they reference is at
    /// least this old, so a burst of near-tip proposals doesn't also trigger
    /// a burst of confirm traffic before peers have had a chance to catch up.
    pub confirm_min_age_secs: i64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        BroadcastConfig { enabled: false, confirm_min_age_secs: 60 }
    }
}

/// `BroadcastBlockConfirm`. Returns the message actually sent, if any.
pub async fn broadcast_block_confirm(
    config: &BroadcastConfig,
    is_initial_block_download: bool,
    block: &BlockIndex,
    chain: &ChainIndex,
    manager: &FinalityManager,
    miner: RegId,
    signer: &impl Signer,
    peers: &impl PeerBus,
) -> Option<PbftMessage> {
    if !config.enabled || is_initial_block_download {
        return None;
    }
    if block.height > 0 && chain.get(&block.prev_hash).is_none() {
        return None;
    }
    if get_timestamp() - block.block_time < config.confirm_min_age_secs * 1000 {
        return None;
    }
    {
        let messages = manager.confirm_messages.lock();
        if messages.is_broadcasted(&block.hash) {
            return None;
        }
    }

    let content_hash = pbft_content_hash(PbftMsgType::Confirm, block.height, block.hash, block.prev_hash, miner);
    let signature = signer.sign_pbft(miner, content_hash).await?;
    let msg = PbftMessage {
        msg_type: PbftMsgType::Confirm,
        height: block.height,
        block_hash: block.hash,
        prev_block_hash: block.prev_hash,
        miner,
        signature,
    };

    manager.confirm_messages.lock().mark_broadcasted(block.hash);
    peers.broadcast_pbft(msg.clone()).await;
    Some(msg)
}

/// `BroadcastBlockFinality`. No age gate — once local finality advances past
/// a block, announcing it is never premature.
pub async fn broadcast_block_finality(
    config: &BroadcastConfig,
    is_initial_block_download: bool,
    block: &BlockIndex,
    chain: &ChainIndex,
    manager: &FinalityManager,
    miner: RegId,
    signer: &impl Signer,
    peers: &impl PeerBus,
) -> Option<PbftMessage> {
    if !config.enabled || is_initial_block_download {
        return None;
    }
    if block.height > 0 && chain.get(&block.prev_hash).is_none() {
        return None;
    }
    {
        let messages = manager.finality_messages.lock();
        if messages.is_broadcasted(&block.hash) {
            return None;
        }
    }

    let content_hash = pbft_content_hash(PbftMsgType::Finality, block.height, block.hash, block.prev_hash, miner);
    let signature = signer.sign_pbft(miner, content_hash).await?;
    let msg = PbftMessage {
        msg_type: PbftMsgType::Finality,
        height: block.height,
        block_hash: block.hash,
        prev_block_hash: block.prev_hash,
        miner,
        signature,
    };

    manager.finality_messages.lock().mark_broadcasted(block.hash);
    peers.broadcast_pbft(msg.clone()).await;
    Some(msg)
}
