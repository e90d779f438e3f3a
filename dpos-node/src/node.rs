//! The concrete `Node<S>` aggregate: owns the cache, the chain index, the
//! active delegate registry, the finality manager, and the governance
//! engine, and exposes the entry points an embedding process drives a node
//! through.

use crate::ContractVm;
use dpos_cache::{CacheWrapper, KvStore};
use dpos_core::crypto::{Hash256, PublicKey};
use dpos_core::ids::{BlockHeight, RegId, UserId};
use dpos_core::time::Timestamp;
use dpos_core::wire::{BlockIndex, PbftMessage};
use dpos_delegate::{ActiveDelegatesStore, DelegateError, DelegateSet};
use dpos_finality::{
    add_block_confirm_message, add_block_finality_message, Accepted, BroadcastConfig, ChainIndex,
    FinalityConfig, FinalityManager, MinerKeys, PeerBus, Rejection, Signer,
};
use dpos_governance::{get_account_by_uid, GovernanceEngine, ProposalPayload, Receipt};
use eyre::{eyre, Result};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("finality invariant violated: {0}")]
    Finality(#[from] dpos_finality::FinalityError),
    #[error("governance error: {0}")]
    Governance(#[from] dpos_governance::GovernanceError),
    #[error("cache error: {0}")]
    Cache(#[from] dpos_cache::CacheError),
}

/// Wires the cache, delegate registry, finality manager, and governance
/// engine into one owner. Generic over the backing `KvStore` so tests and an
/// embedding process can share the same assembly code with `MemoryStore` or
/// a persistent implementation.
pub struct Node<S: KvStore> {
    cache: Option<CacheWrapper<S>>,
    chain: ChainIndex,
    delegates: ActiveDelegatesStore,
    finality: FinalityManager,
    governance: GovernanceEngine,
    self_miner: Option<RegId>,
    broadcast_config: BroadcastConfig,
    is_initial_block_download: bool,
}

impl<S: KvStore> Node<S> {
    pub fn new(genesis: BlockIndex, store: S, config: FinalityConfig) -> Self {
        Node {
            cache: Some(CacheWrapper::new(store)),
            chain: ChainIndex::new(genesis.clone()),
            delegates: ActiveDelegatesStore::new(),
            finality: FinalityManager::with_config(genesis, &config),
            governance: GovernanceEngine::new(),
            self_miner: None,
            broadcast_config: BroadcastConfig::default(),
            is_initial_block_download: true,
        }
    }

    pub fn set_self_miner(&mut self, miner: Option<RegId>) {
        self.self_miner = miner;
    }

    pub fn set_broadcast_config(&mut self, config: BroadcastConfig) {
        self.broadcast_config = config;
    }

    /// Flips off once a node has caught up with its peers; broadcasting is
    /// withheld entirely while this is `true` (see `BroadcastConfig`).
    pub fn set_initial_block_download(&mut self, ibd: bool) {
        self.is_initial_block_download = ibd;
    }

    pub fn rotate_delegates(
        &mut self,
        new_active: DelegateSet,
        update_height: BlockHeight,
    ) -> std::result::Result<(), DelegateError> {
        self.delegates.rotate(new_active, update_height)
    }

    pub fn cache(&self) -> &CacheWrapper<S> {
        self.cache.as_ref().expect("cache always present between calls")
    }

    /// Runs `f` against a dedicated child cache layer and commits its
    /// writes back, the same transactional shape `execute_block` uses.
    /// Meant for assembling genesis state (accounts, the initial governor
    /// set) before any block has been proposed.
    pub fn with_cache_mut<R>(&mut self, f: impl FnOnce(&mut CacheWrapper<S>) -> R) -> R {
        let committed = self.cache.take().expect("cache always present between calls");
        let mut txn = CacheWrapper::new(committed);
        let result = f(&mut txn);
        self.cache = Some(txn.commit());
        result
    }

    pub fn chain(&self) -> &ChainIndex {
        &self.chain
    }

    pub fn finality(&self) -> &FinalityManager {
        &self.finality
    }

    pub fn governance(&self) -> &GovernanceEngine {
        &self.governance
    }

    /// Trigger 1 for both finality rounds: a new tip may itself carry a
    /// block whose confirm/finality sets already have quorum.
    pub fn on_new_tip(&mut self, block: BlockIndex) -> Result<()> {
        self.chain.push_tip(block);
        self.finality.update_local_fin_block_on_tip(&self.chain, &self.delegates);
        self.finality
            .update_global_fin_block_on_tip(&self.chain, &self.delegates)
            .map_err(NodeError::from)?;
        Ok(())
    }

    /// `AddBlockConfirmMessage`, wired to this node's chain/finality/delegate
    /// state and its own account lookup for signer verification.
    pub async fn on_confirm_message(
        &self,
        msg: PbftMessage,
        signer: &impl Signer,
        peers: &impl PeerBus,
    ) -> Result<Accepted> {
        let tip_height = self.chain.tip().height;
        add_block_confirm_message(
            msg,
            tip_height,
            &self.chain,
            &self.finality,
            &self.delegates,
            self,
            self.self_miner,
            &self.broadcast_config,
            self.is_initial_block_download,
            signer,
            peers,
        )
        .await
        .map_err(rejection_report)
    }

    /// `AddBlockFinalityMessage`, the global-round counterpart.
    pub fn on_finality_message(&self, msg: PbftMessage) -> Result<Accepted> {
        let tip_height = self.chain.tip().height;
        add_block_finality_message(msg, tip_height, &self.chain, &self.finality, &self.delegates, self)
            .map_err(rejection_report)
    }

    /// Drives the governance proposal executor and the contract VM over one
    /// block's worth of work. Governance results land directly in the block
    /// layer (each proposal already isolated in its own child layer by
    /// `execute_approved`); the VM runs in a further child layer of its own,
    /// committed on success and discarded on a VM-reported error so a failed
    /// contract call leaves no partial state mutation behind.
    pub async fn execute_block(
        &mut self,
        vm: &impl ContractVm,
        height: BlockHeight,
        deadline: Timestamp,
    ) -> Result<Vec<Receipt>> {
        let committed = self.cache.take().expect("cache always present between calls");
        let mut txn = CacheWrapper::new(committed);

        let mut receipts = Vec::new();
        for (id, outcome) in self.governance.execute_approved(&mut txn, height) {
            match outcome {
                Ok(rs) => receipts.extend(rs),
                Err(e) => log::warn!("approved proposal {id} failed at execution: {e}"),
            }
        }

        let mut vm_txn = txn.child_mut();
        let (vm_receipts, vm_error) = vm.execute(&mut vm_txn, deadline).await;
        if let Some(err) = &vm_error {
            log::warn!("contract vm reported an error for block {height}: {err}");
            vm_txn.discard();
        } else {
            receipts.extend(vm_receipts);
            vm_txn.commit();
        }

        self.cache = Some(txn.commit());
        Ok(receipts)
    }

    pub fn submit_proposal(
        &mut self,
        payload: ProposalPayload,
        proposer: RegId,
        height: BlockHeight,
    ) -> Result<Hash256> {
        let cache = self.cache.as_ref().expect("cache always present between calls");
        self.governance.submit(cache, payload, proposer, height).map_err(|e| eyre!(e))
    }

    pub fn approve_proposal(&mut self, id: Hash256, governor: RegId) -> Result<bool> {
        let cache = self.cache.as_ref().expect("cache always present between calls");
        self.governance.approve(cache, id, governor).map_err(|e| eyre!(e))
    }
}

fn rejection_report(r: Rejection) -> eyre::Report {
    eyre!("message rejected (misbehavior score {}): {:?}", r.misbehavior_score(), r)
}

impl<S: KvStore> MinerKeys for Node<S> {
    fn owner_pubkey(&self, miner: &RegId) -> Option<PublicKey> {
        let cache = self.cache.as_ref()?;
        let account = get_account_by_uid(cache, &UserId::RegId(*miner)).ok()??;
        Some(account.owner_pubkey)
    }

    fn miner_pubkey(&self, miner: &RegId) -> Option<PublicKey> {
        let cache = self.cache.as_ref()?;
        let account = get_account_by_uid(cache, &UserId::RegId(*miner)).ok()??;
        Some(account.miner_pubkey)
    }
}
