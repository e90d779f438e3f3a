//! On-chain governance: the closed set of proposal variants (§4.H), their
//! `Check`/`Execute` contracts against the cache wrapper, and the
//! submit/approve/execute lifecycle that drives them through governor
//! quorum, plus the account/asset storage glue and effective-height
//! scheduling the proposal executors share.

pub mod engine;
pub mod proposal;
pub mod receipt;
pub mod scheduled;
pub mod store;

pub use engine::{GovernanceEngine, GovernanceError, Proposal, ProposalStatus};
pub use proposal::{
    governors, seed_governors, AccountPermProposal, AddRemove, AssetPermProposal, AxcInProposal,
    AxcOutProposal, BpMcListProposal, BpSizeProposal, CdpCoinPairProposal, CdpCurvePoint, CdpParamProposal,
    CdpPairStatus, CheckError, CoinTransferProposal, DexOpProposal, DexQuoteProposal, EnableDisable,
    ExecError, FeedCoinPairProposal, GovernorOp, MinerFeeProposal, ProposalKind, ProposalPayload,
    SysParamProposal,
};
pub use receipt::{Receipt, ReceiptCode};
pub use scheduled::ScheduledValue;
pub use store::{get_account, get_account_by_uid, get_asset, put_account, put_asset, resolve_user_id};
