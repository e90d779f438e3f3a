//! `GovernanceEngine`: proposal submission, governor approval, and execution.
//! The governor vector itself lives in the cache (mutated by `BpMcList`
//! proposals, see [`crate::proposal::governors`]); this engine only tracks
//! the in-flight proposal table and their vote counts, mirroring how
//! [`dpos_pbft::PbftMessageManager`] tracks in-flight PBFT rounds rather than
//! persisting them to the committed chain state.

use crate::proposal::{governors, CheckError, ExecError, ProposalPayload};
use crate::receipt::Receipt;
use dpos_cache::{CacheRead, CacheWrapper, CacheWrite};
use dpos_core::crypto::{Hash256, ToHash256};
use dpos_core::ids::{BlockHeight, RegId};
use dpos_delegate::min_confirm_quorum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("check failed: {0}")]
    Check(#[from] CheckError),
    #[error("execution failed: {0}")]
    Exec(#[from] ExecError),
    #[error("cache error: {0}")]
    Cache(#[from] dpos_cache::CacheError),
    #[error("unknown proposal {0}")]
    UnknownProposal(Hash256),
    #[error("{0} is not a governor")]
    NotAGovernor(RegId),
    #[error("proposal {0} is not awaiting approval")]
    NotSubmitted(Hash256),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Submitted,
    Approved,
    Executed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Hash256,
    pub payload: ProposalPayload,
    pub proposer: RegId,
    pub submitted_height: BlockHeight,
    pub approvals: BTreeSet<RegId>,
    pub status: ProposalStatus,
}

fn proposal_id(payload: &ProposalPayload, proposer: RegId, submitted_height: BlockHeight) -> Hash256 {
    #[derive(Serialize)]
    struct Seed<'a> {
        payload: &'a ProposalPayload,
        proposer: RegId,
        submitted_height: BlockHeight,
    }
    Hash256::hash(serde_json::to_vec(&Seed { payload, proposer, submitted_height }).unwrap())
}

impl ToHash256 for ProposalPayload {
    fn to_hash256(&self) -> Hash256 {
        Hash256::hash(serde_json::to_vec(self).unwrap())
    }
}

/// The in-flight proposal table. Does not persist across restarts by design:
/// a proposal that hasn't reached quorum when a node restarts must be
/// resubmitted, same as an un-quorate PBFT round.
#[derive(Debug, Default)]
pub struct GovernanceEngine {
    proposals: BTreeMap<Hash256, Proposal>,
}

impl GovernanceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &Hash256) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    pub fn pending_ids(&self) -> Vec<Hash256> {
        self.proposals
            .iter()
            .filter(|(_, p)| p.status == ProposalStatus::Submitted)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn approved_ids(&self) -> Vec<Hash256> {
        self.proposals
            .iter()
            .filter(|(_, p)| p.status == ProposalStatus::Approved)
            .map(|(id, _)| *id)
            .collect()
    }

    /// `Check`s the payload against the current cache state and opens a new
    /// proposal in `Submitted` status. Rejects silently re-submitted
    /// duplicates by returning the existing id instead of inserting twice.
    pub fn submit<P: CacheRead>(
        &mut self,
        ctx: &CacheWrapper<P>,
        payload: ProposalPayload,
        proposer: RegId,
        height: BlockHeight,
    ) -> Result<Hash256, GovernanceError> {
        payload.check(ctx, height)?;
        let id = proposal_id(&payload, proposer, height);
        self.proposals.entry(id).or_insert_with(|| Proposal {
            id,
            payload,
            proposer,
            submitted_height: height,
            approvals: BTreeSet::new(),
            status: ProposalStatus::Submitted,
        });
        Ok(id)
    }

    /// The quorum a proposal needs among the current governor set, reusing
    /// the committee's own `n - n/3` arithmetic (§6's quorum rule is not
    /// re-specified per subsystem, so this engine does not invent a second
    /// formula for the same concept).
    pub fn min_quorum<P: CacheRead>(&self, ctx: &CacheWrapper<P>) -> Result<usize, GovernanceError> {
        let n = governors(ctx)?.len() as u32;
        Ok(min_confirm_quorum(n.max(1)) as usize)
    }

    /// Records `governor`'s approval of `id`. Returns `true` exactly once,
    /// on the call that first crosses quorum and flips the proposal to
    /// `Approved`.
    pub fn approve<P: CacheRead>(
        &mut self,
        ctx: &CacheWrapper<P>,
        id: Hash256,
        governor: RegId,
    ) -> Result<bool, GovernanceError> {
        let current_governors = governors(ctx)?;
        if !current_governors.contains(&governor) {
            return Err(GovernanceError::NotAGovernor(governor));
        }
        let quorum = self.min_quorum(ctx)?;
        let proposal = self.proposals.get_mut(&id).ok_or(GovernanceError::UnknownProposal(id))?;
        if proposal.status != ProposalStatus::Submitted {
            return Err(GovernanceError::NotSubmitted(id));
        }
        proposal.approvals.insert(governor);
        if proposal.approvals.len() >= quorum {
            proposal.status = ProposalStatus::Approved;
            return Ok(true);
        }
        Ok(false)
    }

    /// Executes every `Approved` proposal against `ctx`, advancing each to
    /// `Executed` on success or `Rejected` if its `Check` no longer holds
    /// (the cache state can have moved since approval). Each proposal's
    /// `execute` runs in its own child cache layer: a proposal that writes
    /// several keys and then errors partway leaves none of those writes
    /// behind, since the layer is discarded rather than committed.
    pub fn execute_approved<P: CacheWrite>(
        &mut self,
        ctx: &mut CacheWrapper<P>,
        height: BlockHeight,
    ) -> Vec<(Hash256, Result<Vec<Receipt>, GovernanceError>)> {
        let ids = self.approved_ids();
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let payload = self.proposals[&id].payload.clone();
            let mut txn = ctx.child_mut();
            let outcome = payload.execute(&mut txn, height).map_err(GovernanceError::from);
            if outcome.is_ok() {
                txn.commit();
            } else {
                txn.discard();
            }
            let proposal = self.proposals.get_mut(&id).expect("id came from approved_ids");
            proposal.status = if outcome.is_ok() { ProposalStatus::Executed } else { ProposalStatus::Rejected };
            results.push((id, outcome));
        }
        results
    }
}
