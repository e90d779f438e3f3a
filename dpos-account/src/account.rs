//! The account entity and its single balance mutator, `operate_balance`.
//! Grounded on the original `CAccount`/`CAccountToken` layout: `OperateBalance`
//! is the only legal path to change a pool, keeping pool-conservation an
//! invariant of the type rather than something every caller must remember.

use crate::perms::{PermsSum, ALL_PERMS};
use dpos_core::crypto::PublicKey;
use dpos_core::ids::{KeyId, NickId, RegId, TokenSymbol};
use dpos_core::varint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Chain-wide cap on any single pool counter.
pub const MAX_MONEY: u64 = 210_000_000_00_000_000; // 21e9 coins at 1e8 precision

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("balance underflow in pool {0}")]
    Underflow(&'static str),
    #[error("balance would exceed MAX_MONEY")]
    Overflow,
    #[error("unknown token symbol {0}")]
    UnknownToken(String),
    #[error("account does not hold permission(s) {0:#x}")]
    PermissionDenied(PermsSum),
    #[error("varint decode error: {0}")]
    Varint(#[from] varint::VarintError),
    #[error("id error: {0}")]
    Id(#[from] dpos_core::ids::IdError),
}

/// The ten legal balance transitions, per the balance-pool table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceOpType {
    AddFree,
    SubFree,
    Stake,
    Unstake,
    Freeze,
    Unfreeze,
    Vote,
    Unvote,
    Pledge,
    Unpledge,
}

/// Five non-negative pools for a single token held by an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenBucket {
    pub free: u64,
    pub frozen: u64,
    pub staked: u64,
    pub voted: u64,
    pub pledged: u64,
}

impl TokenBucket {
    pub fn sum(&self) -> u128 {
        self.free as u128 + self.frozen as u128 + self.staked as u128 + self.voted as u128
            + self.pledged as u128
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        varint::encode_u64(self.free, out);
        varint::encode_u64(self.frozen, out);
        varint::encode_u64(self.staked, out);
        varint::encode_u64(self.voted, out);
        varint::encode_u64(self.pledged, out);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), AccountError> {
        let mut offset = 0;
        let (free, n) = varint::decode_u64(&buf[offset..])?;
        offset += n;
        let (frozen, n) = varint::decode_u64(&buf[offset..])?;
        offset += n;
        let (staked, n) = varint::decode_u64(&buf[offset..])?;
        offset += n;
        let (voted, n) = varint::decode_u64(&buf[offset..])?;
        offset += n;
        let (pledged, n) = varint::decode_u64(&buf[offset..])?;
        offset += n;
        Ok((TokenBucket { free, frozen, staked, voted, pledged }, offset))
    }

    /// Applies one of the ten legal ops, failing atomically (no partial
    /// mutation) on underflow or on a resulting pool exceeding `MAX_MONEY`.
    fn operate(&mut self, op: BalanceOpType, value: u64) -> Result<(), AccountError> {
        let (src, src_name): (&mut u64, &'static str) = match op {
            BalanceOpType::AddFree => {
                let next = self.free.checked_add(value).ok_or(AccountError::Overflow)?;
                if next > MAX_MONEY {
                    return Err(AccountError::Overflow);
                }
                self.free = next;
                return Ok(());
            }
            BalanceOpType::SubFree => (&mut self.free, "free"),
            BalanceOpType::Stake => (&mut self.free, "free"),
            BalanceOpType::Unstake => (&mut self.staked, "staked"),
            BalanceOpType::Freeze => (&mut self.free, "free"),
            BalanceOpType::Unfreeze => (&mut self.frozen, "frozen"),
            BalanceOpType::Vote => (&mut self.free, "free"),
            BalanceOpType::Unvote => (&mut self.voted, "voted"),
            BalanceOpType::Pledge => (&mut self.free, "free"),
            BalanceOpType::Unpledge => (&mut self.pledged, "pledged"),
        };
        let new_src = src.checked_sub(value).ok_or(AccountError::Underflow(src_name))?;

        let sink: Option<&mut u64> = match op {
            BalanceOpType::SubFree => None,
            BalanceOpType::Stake => Some(&mut self.staked),
            BalanceOpType::Unstake => Some(&mut self.free),
            BalanceOpType::Freeze => Some(&mut self.frozen),
            BalanceOpType::Unfreeze => Some(&mut self.free),
            BalanceOpType::Vote => Some(&mut self.voted),
            BalanceOpType::Unvote => Some(&mut self.free),
            BalanceOpType::Pledge => Some(&mut self.pledged),
            BalanceOpType::Unpledge => Some(&mut self.free),
            BalanceOpType::AddFree => unreachable!(),
        };

        if let Some(sink) = sink {
            let new_sink = sink.checked_add(value).ok_or(AccountError::Overflow)?;
            if new_sink > MAX_MONEY {
                return Err(AccountError::Overflow);
            }
            *sink = new_sink;
        }

        match op {
            BalanceOpType::SubFree => self.free = new_src,
            BalanceOpType::Stake => self.free = new_src,
            BalanceOpType::Unstake => self.staked = new_src,
            BalanceOpType::Freeze => self.free = new_src,
            BalanceOpType::Unfreeze => self.frozen = new_src,
            BalanceOpType::Vote => self.free = new_src,
            BalanceOpType::Unvote => self.voted = new_src,
            BalanceOpType::Pledge => self.free = new_src,
            BalanceOpType::Unpledge => self.pledged = new_src,
            BalanceOpType::AddFree => unreachable!(),
        }
        Ok(())
    }
}

pub type TokenMap = BTreeMap<TokenSymbol, TokenBucket>;

/// A registered chain account: identifiers, keys, per-token balances, vote
/// bookkeeping, and its permission bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub keyid: KeyId,
    pub regid: Option<RegId>,
    pub nickid: Option<NickId>,
    pub owner_pubkey: PublicKey,
    pub miner_pubkey: PublicKey,
    pub tokens: TokenMap,
    pub received_votes: u64,
    pub last_vote_height: u64,
    pub last_vote_epoch: u64,
    pub perms_sum: PermsSum,
}

impl Account {
    pub fn new(keyid: KeyId) -> Self {
        Account {
            keyid,
            regid: None,
            nickid: None,
            owner_pubkey: PublicKey::zero(),
            miner_pubkey: PublicKey::zero(),
            tokens: TokenMap::new(),
            received_votes: 0,
            last_vote_height: 0,
            last_vote_epoch: 0,
            perms_sum: ALL_PERMS,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.owner_pubkey.is_set()
    }

    pub fn get_token(&self, symbol: &TokenSymbol) -> TokenBucket {
        self.tokens.get(symbol).copied().unwrap_or_default()
    }

    pub fn check_perms(&self, required: PermsSum) -> Result<(), AccountError> {
        if crate::perms::check_perms(self.perms_sum, required) {
            Ok(())
        } else {
            Err(AccountError::PermissionDenied(required))
        }
    }

    /// The sole legal mutator for any balance pool. Validates the transition
    /// and leaves the bucket untouched on any error.
    pub fn operate_balance(
        &mut self,
        symbol: &TokenSymbol,
        op: BalanceOpType,
        value: u64,
    ) -> Result<(), AccountError> {
        let mut bucket = self.get_token(symbol);
        bucket.operate(op, value)?;
        self.tokens.insert(symbol.clone(), bucket);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wicc() -> TokenSymbol {
        TokenSymbol::new("WICC").unwrap()
    }

    #[test]
    fn stake_vote_unstake_sequence() {
        let mut account = Account::new(KeyId::zero());
        account.operate_balance(&wicc(), BalanceOpType::AddFree, 100).unwrap();
        account.operate_balance(&wicc(), BalanceOpType::Stake, 30).unwrap();
        account.operate_balance(&wicc(), BalanceOpType::Vote, 40).unwrap();
        account.operate_balance(&wicc(), BalanceOpType::Unstake, 30).unwrap();

        let bucket = account.get_token(&wicc());
        assert_eq!(bucket.free, 90);
        assert_eq!(bucket.staked, 0);
        assert_eq!(bucket.voted, 40);

        let err = account.operate_balance(&wicc(), BalanceOpType::Unvote, 50).unwrap_err();
        assert_eq!(err, AccountError::Underflow("voted"));
        // State must be unchanged after the failed op.
        let bucket = account.get_token(&wicc());
        assert_eq!(bucket.free, 90);
        assert_eq!(bucket.voted, 40);
    }

    #[test]
    fn sub_free_has_no_sink() {
        let mut account = Account::new(KeyId::zero());
        account.operate_balance(&wicc(), BalanceOpType::AddFree, 50).unwrap();
        account.operate_balance(&wicc(), BalanceOpType::SubFree, 20).unwrap();
        assert_eq!(account.get_token(&wicc()).free, 30);
        assert_eq!(account.get_token(&wicc()).sum(), 30);
    }

    #[test]
    fn conservation_across_internal_ops() {
        let mut account = Account::new(KeyId::zero());
        account.operate_balance(&wicc(), BalanceOpType::AddFree, 1000).unwrap();
        let before = account.get_token(&wicc()).sum();
        account.operate_balance(&wicc(), BalanceOpType::Freeze, 200).unwrap();
        account.operate_balance(&wicc(), BalanceOpType::Pledge, 300).unwrap();
        account.operate_balance(&wicc(), BalanceOpType::Unfreeze, 100).unwrap();
        let after = account.get_token(&wicc()).sum();
        assert_eq!(before, after);
    }

    #[test]
    fn permission_check_matches_bitmap() {
        let mut account = Account::new(KeyId::zero());
        account.perms_sum = crate::perms::PERM_SEND_COIN;
        assert!(account.check_perms(crate::perms::PERM_SEND_COIN).is_ok());
        assert!(account.check_perms(crate::perms::PERM_PROPOSE).is_err());
    }
}
