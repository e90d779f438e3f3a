//! Receipts: a signed record of a balance transfer, indexed by the
//! transaction or proposal id that caused it. Grounded on the original's
//! `CReceipt` emitted by `CGovCoinTransferProposal::ExecuteImpl`.

use dpos_core::crypto::Hash256;
use dpos_core::ids::{TokenSymbol, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptCode {
    /// Emitted by a `CoinTransfer` governance proposal (§8 scenario S6).
    TransferProposal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub from: UserId,
    pub to: UserId,
    pub token: TokenSymbol,
    pub amount: u64,
    pub code: ReceiptCode,
}

impl Receipt {
    pub fn transfer_proposal(from: UserId, to: UserId, token: TokenSymbol, amount: u64) -> Self {
        Receipt { from, to, token, amount, code: ReceiptCode::TransferProposal }
    }
}

/// Storage key for a proposal's receipts, indexed by the id that caused them.
pub fn receipt_storage_key(proposal_id: Hash256) -> Vec<u8> {
    proposal_id.as_ref().to_vec()
}
