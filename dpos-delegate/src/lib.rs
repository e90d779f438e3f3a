//! The active delegate (block producer) registry: snapshot lookup by height
//! and the quorum arithmetic both PBFT rounds share.

use dpos_core::ids::{BlockHeight, RegId};
use std::collections::HashSet;
use thiserror::Error;

/// Committee size is capped the way `total_bps_size` caps it upstream.
pub const MAX_DELEGATE_SET_SIZE: usize = 255;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DelegateError {
    #[error("delegate set exceeds {MAX_DELEGATE_SET_SIZE} members")]
    TooManyDelegates,
}

/// An ordered vector of `(regid, received_votes)`, highest-voted first by
/// convention (callers populate it that way; this type does not resort it).
pub type DelegateSet = Vec<(RegId, u64)>;

fn validated(set: DelegateSet) -> Result<DelegateSet, DelegateError> {
    if set.len() > MAX_DELEGATE_SET_SIZE {
        Err(DelegateError::TooManyDelegates)
    } else {
        Ok(set)
    }
}

/// Holds the currently-active committee and the one it superseded, so that a
/// height just before an epoch boundary can still resolve correctly.
#[derive(Debug, Clone, Default)]
pub struct ActiveDelegatesStore {
    active: DelegateSet,
    last: DelegateSet,
    update_height: BlockHeight,
}

impl ActiveDelegatesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new active committee at `update_height`, retiring the
    /// previous active set to `last`.
    pub fn rotate(
        &mut self,
        new_active: DelegateSet,
        update_height: BlockHeight,
    ) -> Result<(), DelegateError> {
        let new_active = validated(new_active)?;
        self.last = std::mem::replace(&mut self.active, new_active);
        self.update_height = update_height;
        Ok(())
    }

    /// `active` if `h > update_height`, else `last` (falling back to `active`
    /// if `last` is empty — the bootstrap case where no rotation ever happened).
    pub fn bp_list_at(&self, h: BlockHeight) -> &DelegateSet {
        if h > self.update_height || self.last.is_empty() {
            &self.active
        } else {
            &self.last
        }
    }

    pub fn bp_set_at(&self, h: BlockHeight) -> HashSet<RegId> {
        self.bp_list_at(h).iter().map(|(regid, _)| *regid).collect()
    }

    pub fn actived_delegate_num(&self) -> u32 {
        self.active.len() as u32
    }
}

/// `n - n/3`: the quorum threshold for both the Confirm and Finality rounds.
/// Preserved verbatim from the source formula rather than "corrected" to
/// `ceil(2n/3)` — they agree except when `n` is a multiple of 3, where this
/// one is one vote looser (e.g. n=21 yields 14, matching the reference node).
pub fn min_confirm_quorum(n: u32) -> u32 {
    n - n / 3
}
