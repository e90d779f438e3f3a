//! Inbound message orchestration: `AddBlockConfirmMessage` /
//! `AddBlockFinalityMessage`. Ties dedup, validation, pointer advancement,
//! relay, and follow-on broadcast into the single call path a peer handler
//! invokes for each incoming PBFT message.

use crate::broadcast::{broadcast_block_finality, BroadcastConfig, PeerBus, Signer};
use crate::chain::ChainIndex;
use crate::pointers::FinalityManager;
use crate::validate::{check_pbft_message, check_pbft_message_signer, MinerKeys, ValidationError};
use dpos_core::ids::{BlockHeight, RegId};
use dpos_core::wire::{PbftMessage, PbftMsgType};
use dpos_delegate::ActiveDelegatesStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Duplicate,
    Invalid(ValidationError),
}

impl Rejection {
    pub fn misbehavior_score(&self) -> u32 {
        match self {
            Rejection::Duplicate => 0,
            Rejection::Invalid(e) => e.misbehavior_score(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub should_relay: bool,
    pub local_advanced: bool,
}

/// `AddBlockConfirmMessage`: dedup, validate (structure + signer), record,
/// advance the local pointer, and — if this node can sign for one of the
/// active delegates and local finality just advanced onto this message's
/// block — kick off the global round by broadcasting a `Finality` message.
#[allow(clippy::too_many_arguments)]
pub async fn add_block_confirm_message(
    msg: PbftMessage,
    tip_height: BlockHeight,
    chain: &ChainIndex,
    finality: &FinalityManager,
    delegates: &ActiveDelegatesStore,
    keys: &impl MinerKeys,
    self_miner: Option<RegId>,
    broadcast_config: &BroadcastConfig,
    is_initial_block_download: bool,
    signer: &impl Signer,
    peers: &impl PeerBus,
) -> Result<Accepted, Rejection> {
    let content_hash = msg.content_hash();
    {
        let mgr = finality.confirm_messages.lock();
        if mgr.is_known(&content_hash) {
            return Err(Rejection::Duplicate);
        }
    }

    let local_final_height = finality.local_final().height;
    check_pbft_message(&msg, PbftMsgType::Confirm, tip_height, local_final_height, chain).map_err(|e| {
        log::debug!("rejecting confirm message at height {}: {:?}", msg.height, e);
        Rejection::Invalid(e)
    })?;
    check_pbft_message_signer(&msg, keys).map_err(|e| {
        log::warn!("confirm message at height {} failed signer check: {:?}", msg.height, e);
        Rejection::Invalid(e)
    })?;

    let height = msg.height;
    let block_hash = msg.block_hash;
    let miner = msg.miner;
    let prev_hash = msg.prev_block_hash;
    {
        let mut mgr = finality.confirm_messages.lock();
        mgr.add_known(content_hash);
        mgr.save_message_by_block(msg);
    }

    let local_advanced =
        finality.update_local_fin_block_on_message(chain, height, block_hash, delegates);

    if local_advanced {
        if let (Some(self_miner), Some(block)) = (self_miner, chain.at_height(height)) {
            broadcast_block_finality(
                broadcast_config,
                is_initial_block_download,
                block,
                chain,
                finality,
                self_miner,
                signer,
                peers,
            )
            .await;
        }
    }

    let should_relay = is_authorised_signer(chain, delegates, miner, prev_hash);
    Ok(Accepted { should_relay, local_advanced })
}

/// `CheckPBFTMessageSigner`'s BP-membership half: `msg.miner ∈
/// BpSetAt(msg.prev_block_hash's height)`. A message whose referenced
/// ancestor isn't known locally can't be checked against any BP set, so it
/// is treated as not authorised rather than guessed either way.
fn is_authorised_signer(
    chain: &ChainIndex,
    delegates: &ActiveDelegatesStore,
    miner: RegId,
    prev_hash: dpos_core::crypto::Hash256,
) -> bool {
    match chain.get(&prev_hash) {
        Some(prev_block) => delegates.bp_set_at(prev_block.height).contains(&miner),
        None => false,
    }
}

/// `AddBlockFinalityMessage`: mirrors the confirm path against the global
/// round's message manager and pointer, with no further broadcast trigger —
/// once a block is globally final there is nothing further to kick off.
pub fn add_block_finality_message(
    msg: PbftMessage,
    tip_height: BlockHeight,
    chain: &ChainIndex,
    finality: &FinalityManager,
    delegates: &ActiveDelegatesStore,
    keys: &impl MinerKeys,
) -> Result<Accepted, Rejection> {
    let content_hash = msg.content_hash();
    {
        let mgr = finality.finality_messages.lock();
        if mgr.is_known(&content_hash) {
            return Err(Rejection::Duplicate);
        }
    }

    let global_final_height = finality.global_final().height;
    check_pbft_message(&msg, PbftMsgType::Finality, tip_height, global_final_height, chain).map_err(|e| {
        log::debug!("rejecting finality message at height {}: {:?}", msg.height, e);
        Rejection::Invalid(e)
    })?;
    check_pbft_message_signer(&msg, keys).map_err(|e| {
        log::warn!("finality message at height {} failed signer check: {:?}", msg.height, e);
        Rejection::Invalid(e)
    })?;

    let height = msg.height;
    let block_hash = msg.block_hash;
    let miner = msg.miner;
    let prev_hash = msg.prev_block_hash;
    {
        let mut mgr = finality.finality_messages.lock();
        mgr.add_known(content_hash);
        mgr.save_message_by_block(msg);
    }

    let local_advanced =
        finality.update_global_fin_block_on_message(chain, height, block_hash, delegates);
    let should_relay = is_authorised_signer(chain, delegates, miner, prev_hash);
    match local_advanced {
        Ok(advanced) => Ok(Accepted { should_relay, local_advanced: advanced }),
        Err(_) => Ok(Accepted { should_relay, local_advanced: false }),
    }
}
