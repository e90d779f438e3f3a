//! Quorum arithmetic shared by both PBFT rounds: a candidate block at height
//! `h` is confirmed/finalised once enough of the live BP set for `h` has
//! signed a message referencing it.

use dpos_core::ids::RegId;
use dpos_core::wire::PbftMessage;
use dpos_delegate::min_confirm_quorum;
use std::collections::{BTreeSet, HashSet};

/// `valid_count := |{ m in messages : m.miner in bp_set }|`; true once that
/// count reaches `MinConfirmQuorum(|bp_set|)`. Messages from non-BPs or
/// stale BPs are simply not counted — a re-election cannot cause a spurious
/// quorum since `bp_set` is always the live committee at `h`.
pub fn quorum_met(messages: &BTreeSet<PbftMessage>, bp_set: &HashSet<RegId>) -> bool {
    if bp_set.is_empty() {
        return false;
    }
    let quorum = min_confirm_quorum(bp_set.len() as u32);
    let valid_count = messages.iter().filter(|m| bp_set.contains(&m.miner)).count() as u32;
    valid_count >= quorum
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_core::crypto::{generate_keypair, Hash256, Signature};
    use dpos_core::wire::PbftMsgType;

    fn message(miner: RegId) -> PbftMessage {
        let (_, key) = generate_keypair("x");
        PbftMessage {
            msg_type: PbftMsgType::Confirm,
            height: 1,
            block_hash: Hash256::hash("b"),
            prev_block_hash: Hash256::hash("a"),
            miner,
            signature: Signature::sign(Hash256::zero(), &key).unwrap(),
        }
    }

    #[test]
    fn quorum_counts_only_live_bps() {
        let bp_set: HashSet<RegId> = (0..3).map(|i| RegId::new(1, i)).collect();
        let mut messages = BTreeSet::new();
        messages.insert(message(RegId::new(1, 0)));
        messages.insert(message(RegId::new(1, 1)));
        // A signer outside the live set contributes nothing toward quorum.
        messages.insert(message(RegId::new(99, 0)));
        assert!(quorum_met(&messages, &bp_set));
    }

    #[test]
    fn below_quorum_fails() {
        let bp_set: HashSet<RegId> = (0..21).map(|i| RegId::new(1, i)).collect();
        let messages: BTreeSet<PbftMessage> =
            (0..13).map(|i| message(RegId::new(1, i))).collect();
        assert!(!quorum_met(&messages, &bp_set));
        let messages: BTreeSet<PbftMessage> =
            (0..14).map(|i| message(RegId::new(1, i))).collect();
        assert!(quorum_met(&messages, &bp_set));
    }
}
