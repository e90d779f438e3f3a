//! The closed set of proposal variants (§4.H), each with its own `Check`/
//! `Execute` contract against the cache wrapper. Modelled as a tagged union
//! per the Design Note in spec.md §9 ("dynamic dispatch over proposal
//! variants... model as a tagged union with a dispatch table"): the
//! `ProposalPayload::check`/`execute` match arms below *are* that table —
//! one arm per kind, no inheritance, no `dyn` trait object.
//!
//! `check` takes `&CacheWrapper<P>`; `execute` takes `&mut CacheWrapper<P>`.
//! The borrow checker enforces testable property 8 ("Check is pure") rather
//! than a runtime assertion: a `check` implementation simply has no path to
//! a mutating call.

use crate::receipt::Receipt;
use crate::scheduled::ScheduledValue;
use crate::store::{get_account_by_uid, get_asset, put_account, put_asset};
use dpos_account::asset::ASSET_PERM_CDP_BCOIN;
use dpos_account::{Account, AccountError, BalanceOpType, PermsSum, ALL_PERMS};
use dpos_cache::{CacheError, CacheRead, CacheWrapper, Domain};
use dpos_core::ids::{BlockHeight, RegId, TokenSymbol, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Minimum lead time (in blocks) a scheduled change must be given, per §6's
/// effective-height contract — grounded on `BpSize`'s own
/// `GOVERN_EFFECTIVE_AFTER_BLOCK_COUNT` constant in the original.
pub const GOVERN_EFFECTIVE_AFTER_BLOCK_COUNT: BlockHeight = 100;

/// Minimum non-dust transfer amount for a treasury `CoinTransfer`. The
/// original reads this from a runtime-tunable dust threshold; fixed here at
/// the smallest denomination since this core does not own the sysparam that
/// would otherwise supply it (see DESIGN.md Open Question).
pub const DUST_AMOUNT: u64 = 1;

/// Maximum number of CDP tunables one proposal may set in a single call.
pub const MAX_CDP_PARAMS: usize = 50;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("parameter set is empty")]
    EmptyParams,
    #[error("unknown parameter {0}")]
    UnknownParam(String),
    #[error("parameter {0} value {1} is out of its declared range")]
    ParamOutOfRange(String, i64),
    #[error("account {0} does not exist")]
    UnknownAccount(String),
    #[error("{0} is not currently a governor")]
    NotAGovernor(String),
    #[error("committee size {0} is out of range [1,255]")]
    BpSizeOutOfRange(u32),
    #[error("effective height {0} is sooner than the minimum {1}")]
    EffectiveHeightTooSoon(BlockHeight, BlockHeight),
    #[error("fee symbol {0} is not in the allowed set")]
    FeeSymbolNotAllowed(String),
    #[error("tx type {0} does not exist or is not fee-updatable")]
    TxTypeNotFeeUpdatable(String),
    #[error("fee amount must be positive")]
    NonPositiveFee,
    #[error("transfer amount is below the dust threshold")]
    BelowDust,
    #[error("new permission bitmap must be non-zero")]
    PermsOutOfRange,
    #[error("unknown asset {0}")]
    UnknownAsset(String),
    #[error("asset {0} is not CDP-bcoin eligible")]
    NotCdpEligible(String),
    #[error("dex operator 0 may not be disabled")]
    DexOperatorZeroProtected,
    #[error("dex operator {0} is already in the requested state")]
    DexOperatorAlreadyInState(u32),
    #[error("quote symbol {0} is already registered")]
    QuoteAlreadyExists(String),
    #[error("quote symbol {0} is not registered")]
    QuoteNotFound(String),
    #[error("feed pair ({0}, {1}) is already registered")]
    FeedPairAlreadyExists(String, String),
    #[error("feed pair ({0}, {1}) is not registered")]
    FeedPairNotFound(String, String),
    #[error("at most 50 CDP parameters may be set per proposal")]
    TooManyCdpParams,
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("account error: {0}")]
    Account(#[from] AccountError),
    #[error("check failed at execution time: {0}")]
    CheckFailed(#[from] CheckError),
}

/// One entry of a known system parameter's `(name, min, max)` range.
const KNOWN_SYSPARAMS: &[(&str, i64, i64)] = &[
    ("fuel_rate", 1, 1_000_000),
    ("max_transaction_duration_ms", 1, 60_000),
    ("pbft_window_local", 1, 1_000),
    ("pbft_window_global", 1, 1_000),
    ("dust_amount", 0, 1_000_000),
];

/// Known transaction types and whether their miner fee is governor-updatable.
const KNOWN_TX_TYPES: &[(&str, bool)] = &[
    ("common_tx", true),
    ("contract_deploy_tx", true),
    ("contract_invoke_tx", true),
    ("cdp_stake_tx", true),
    ("dex_order_tx", true),
    ("coinbase_tx", false),
];

const ALLOWED_FEE_SYMBOLS: &[&str] = &["WICC", "WUSD", "WGRT"];

fn sysparam_key(name: &str) -> Vec<u8> {
    let mut key = vec![0u8];
    key.extend_from_slice(name.as_bytes());
    key
}

fn fee_key(tx_type: &str, fee_symbol: &TokenSymbol) -> Vec<u8> {
    let mut key = vec![1u8];
    key.extend_from_slice(tx_type.as_bytes());
    key.push(b':');
    key.extend_from_slice(fee_symbol.as_str().as_bytes());
    key
}

pub(crate) const GOVERNORS_KEY: &[u8] = b"governors";
const BP_SIZE_CURRENT_KEY: &[u8] = b"bp_size_current";
const BP_SIZE_PENDING_KEY: &[u8] = b"bp_size_pending";
const DEX_OPERATORS_KEY: &[u8] = b"dex_operators";
const DEX_QUOTES_KEY: &[u8] = b"dex_quotes";
const FEED_PAIRS_KEY: &[u8] = b"feed_pairs";
const CDP_CURVE_CURRENT_KEY: &[u8] = b"cdp_curve_current";
const CDP_CURVE_PENDING_KEY: &[u8] = b"cdp_curve_pending";

fn cdp_pair_key(bcoin: &TokenSymbol, scoin: &TokenSymbol) -> Vec<u8> {
    let mut key = vec![2u8];
    key.extend_from_slice(bcoin.as_str().as_bytes());
    key.push(b':');
    key.extend_from_slice(scoin.as_str().as_bytes());
    key
}

/// Reads the governor vector, defaulting to empty before the first
/// `BpMcList` proposal has ever run.
pub fn governors<P: CacheRead>(ctx: &CacheWrapper<P>) -> Result<Vec<RegId>, CacheError> {
    Ok(ctx.get(Domain::Governance, GOVERNORS_KEY)?.unwrap_or_default())
}

/// Installs the initial governor set directly, bypassing the proposal
/// lifecycle. There is no bootstrap proposal: the first governors have to
/// come from somewhere before any proposal could reach quorum among them, so
/// genesis setup writes them here instead.
pub fn seed_governors<P: CacheRead>(ctx: &mut CacheWrapper<P>, regids: &[RegId]) -> Result<(), CacheError> {
    ctx.put(Domain::Governance, GOVERNORS_KEY, &regids.to_vec())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysParamProposal {
    pub params: Vec<(String, i64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernorOp {
    Enable,
    Disable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpMcListProposal {
    pub op: GovernorOp,
    pub regid: RegId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BpSizeProposal {
    pub new_size: u32,
    pub effective_height: BlockHeight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerFeeProposal {
    pub tx_type: String,
    pub fee_symbol: TokenSymbol,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinTransferProposal {
    pub from: UserId,
    pub to: UserId,
    pub token: TokenSymbol,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPermProposal {
    pub target: UserId,
    pub new_perms: PermsSum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetPermProposal {
    pub symbol: TokenSymbol,
    pub new_perms: PermsSum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CdpPairStatus {
    Disabled,
    StakeOnly,
    Enabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpCoinPairProposal {
    pub bcoin: TokenSymbol,
    pub scoin: TokenSymbol,
    pub status: CdpPairStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CdpCurvePoint {
    pub a: i64,
    pub b: i64,
    pub effective_height: BlockHeight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpParamProposal {
    pub params: Vec<(String, i64)>,
    pub curve: Option<CdpCurvePoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnableDisable {
    Enable,
    Disable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DexOpProposal {
    pub dex_id: u32,
    pub op: EnableDisable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddRemove {
    Add,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexQuoteProposal {
    pub symbol: TokenSymbol,
    pub op: AddRemove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCoinPairProposal {
    pub feed_symbol: TokenSymbol,
    pub quote_symbol: TokenSymbol,
    pub op: AddRemove,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxcInProposal;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxcOutProposal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalKind {
    SysParam,
    BpMcList,
    BpSize,
    MinerFee,
    CoinTransfer,
    AccountPerm,
    AssetPerm,
    CdpCoinPair,
    CdpParam,
    DexOp,
    DexQuote,
    FeedCoinPair,
    AxcIn,
    AxcOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProposalPayload {
    SysParam(SysParamProposal),
    BpMcList(BpMcListProposal),
    BpSize(BpSizeProposal),
    MinerFee(MinerFeeProposal),
    CoinTransfer(CoinTransferProposal),
    AccountPerm(AccountPermProposal),
    AssetPerm(AssetPermProposal),
    CdpCoinPair(CdpCoinPairProposal),
    CdpParam(CdpParamProposal),
    DexOp(DexOpProposal),
    DexQuote(DexQuoteProposal),
    FeedCoinPair(FeedCoinPairProposal),
    AxcIn(AxcInProposal),
    AxcOut(AxcOutProposal),
}

impl ProposalPayload {
    pub fn kind(&self) -> ProposalKind {
        match self {
            ProposalPayload::SysParam(_) => ProposalKind::SysParam,
            ProposalPayload::BpMcList(_) => ProposalKind::BpMcList,
            ProposalPayload::BpSize(_) => ProposalKind::BpSize,
            ProposalPayload::MinerFee(_) => ProposalKind::MinerFee,
            ProposalPayload::CoinTransfer(_) => ProposalKind::CoinTransfer,
            ProposalPayload::AccountPerm(_) => ProposalKind::AccountPerm,
            ProposalPayload::AssetPerm(_) => ProposalKind::AssetPerm,
            ProposalPayload::CdpCoinPair(_) => ProposalKind::CdpCoinPair,
            ProposalPayload::CdpParam(_) => ProposalKind::CdpParam,
            ProposalPayload::DexOp(_) => ProposalKind::DexOp,
            ProposalPayload::DexQuote(_) => ProposalKind::DexQuote,
            ProposalPayload::FeedCoinPair(_) => ProposalKind::FeedCoinPair,
            ProposalPayload::AxcIn(_) => ProposalKind::AxcIn,
            ProposalPayload::AxcOut(_) => ProposalKind::AxcOut,
        }
    }

    /// Must never write. Enforced structurally: `ctx` is a shared reference.
    pub fn check<P: CacheRead>(&self, ctx: &CacheWrapper<P>, height: BlockHeight) -> Result<(), CheckError> {
        match self {
            ProposalPayload::SysParam(p) => check_sysparam(p),
            ProposalPayload::BpMcList(p) => check_bp_mc_list(ctx, p),
            ProposalPayload::BpSize(p) => check_bp_size(p, height),
            ProposalPayload::MinerFee(p) => check_miner_fee(p),
            ProposalPayload::CoinTransfer(p) => check_coin_transfer(ctx, p),
            ProposalPayload::AccountPerm(p) => check_account_perm(ctx, p),
            ProposalPayload::AssetPerm(p) => check_asset_perm(p),
            ProposalPayload::CdpCoinPair(p) => check_cdp_coin_pair(ctx, p),
            ProposalPayload::CdpParam(p) => check_cdp_param(p),
            ProposalPayload::DexOp(p) => check_dex_op(ctx, p),
            ProposalPayload::DexQuote(p) => check_dex_quote(ctx, p),
            ProposalPayload::FeedCoinPair(p) => check_feed_coin_pair(ctx, p),
            ProposalPayload::AxcIn(_) => Ok(()),
            ProposalPayload::AxcOut(_) => Ok(()),
        }
    }

    /// Re-runs `check` before mutating, per §4.H ("must pass Check at
    /// submission *and* re-pass Check at execution").
    pub fn execute<P: CacheRead>(
        &self,
        ctx: &mut CacheWrapper<P>,
        height: BlockHeight,
    ) -> Result<Vec<Receipt>, ExecError> {
        self.check(ctx, height)?;
        match self {
            ProposalPayload::SysParam(p) => exec_sysparam(ctx, p),
            ProposalPayload::BpMcList(p) => exec_bp_mc_list(ctx, p),
            ProposalPayload::BpSize(p) => exec_bp_size(ctx, p, height),
            ProposalPayload::MinerFee(p) => exec_miner_fee(ctx, p),
            ProposalPayload::CoinTransfer(p) => exec_coin_transfer(ctx, p),
            ProposalPayload::AccountPerm(p) => exec_account_perm(ctx, p),
            ProposalPayload::AssetPerm(p) => exec_asset_perm(ctx, p),
            ProposalPayload::CdpCoinPair(p) => exec_cdp_coin_pair(ctx, p),
            ProposalPayload::CdpParam(p) => exec_cdp_param(ctx, p, height),
            ProposalPayload::DexOp(p) => exec_dex_op(ctx, p),
            ProposalPayload::DexQuote(p) => exec_dex_quote(ctx, p),
            ProposalPayload::FeedCoinPair(p) => exec_feed_coin_pair(ctx, p),
            ProposalPayload::AxcIn(_) => Ok(vec![]),
            ProposalPayload::AxcOut(_) => Ok(vec![]),
        }
    }
}

fn check_sysparam(p: &SysParamProposal) -> Result<(), CheckError> {
    if p.params.is_empty() {
        return Err(CheckError::EmptyParams);
    }
    for (name, value) in &p.params {
        let (_, min, max) = KNOWN_SYSPARAMS
            .iter()
            .find(|(n, _, _)| n == name)
            .ok_or_else(|| CheckError::UnknownParam(name.clone()))?;
        if value < min || value > max {
            return Err(CheckError::ParamOutOfRange(name.clone(), *value));
        }
    }
    Ok(())
}

fn exec_sysparam<P: CacheRead>(ctx: &mut CacheWrapper<P>, p: &SysParamProposal) -> Result<Vec<Receipt>, ExecError> {
    for (name, value) in &p.params {
        ctx.put(Domain::SysParam, &sysparam_key(name), value)?;
    }
    Ok(vec![])
}

fn check_bp_mc_list<P: CacheRead>(ctx: &CacheWrapper<P>, p: &BpMcListProposal) -> Result<(), CheckError> {
    if get_account_by_uid(ctx, &UserId::RegId(p.regid))?.is_none() {
        return Err(CheckError::UnknownAccount(p.regid.to_string()));
    }
    if p.op == GovernorOp::Disable {
        let current = governors(ctx)?;
        if !current.contains(&p.regid) {
            return Err(CheckError::NotAGovernor(p.regid.to_string()));
        }
    }
    Ok(())
}

fn exec_bp_mc_list<P: CacheRead>(ctx: &mut CacheWrapper<P>, p: &BpMcListProposal) -> Result<Vec<Receipt>, ExecError> {
    let mut current = governors(ctx)?;
    match p.op {
        GovernorOp::Enable => {
            if !current.contains(&p.regid) {
                current.push(p.regid);
            }
        }
        GovernorOp::Disable => {
            current.retain(|r| *r != p.regid);
        }
    }
    ctx.put(Domain::Governance, GOVERNORS_KEY, &current)?;
    Ok(vec![])
}

fn check_bp_size(p: &BpSizeProposal, height: BlockHeight) -> Result<(), CheckError> {
    if p.new_size < 1 || p.new_size > 255 {
        return Err(CheckError::BpSizeOutOfRange(p.new_size));
    }
    let min_effective = height + GOVERN_EFFECTIVE_AFTER_BLOCK_COUNT;
    if p.effective_height < min_effective {
        return Err(CheckError::EffectiveHeightTooSoon(p.effective_height, min_effective));
    }
    Ok(())
}

fn exec_bp_size<P: CacheRead>(
    ctx: &mut CacheWrapper<P>,
    p: &BpSizeProposal,
    height: BlockHeight,
) -> Result<Vec<Receipt>, ExecError> {
    let mut pending: Vec<ScheduledValue<u32>> =
        ctx.get(Domain::Governance, BP_SIZE_PENDING_KEY)?.unwrap_or_default();
    let current: u32 = ctx.get(Domain::Governance, BP_SIZE_CURRENT_KEY)?.unwrap_or(21);
    // Snapshot the size that was in force at execution time, resolved from
    // whatever pending entries have already taken effect.
    let resolved_now = ScheduledValue::resolve(height, &current, &pending);
    ctx.put(Domain::Governance, BP_SIZE_CURRENT_KEY, &resolved_now)?;
    pending.push(ScheduledValue::new(p.new_size, p.effective_height));
    ctx.put(Domain::Governance, BP_SIZE_PENDING_KEY, &pending)?;
    Ok(vec![])
}

fn check_miner_fee(p: &MinerFeeProposal) -> Result<(), CheckError> {
    if !ALLOWED_FEE_SYMBOLS.contains(&p.fee_symbol.as_str()) {
        return Err(CheckError::FeeSymbolNotAllowed(p.fee_symbol.to_string()));
    }
    let updatable = KNOWN_TX_TYPES
        .iter()
        .find(|(t, _)| *t == p.tx_type)
        .map(|(_, updatable)| *updatable)
        .unwrap_or(false);
    if !updatable {
        return Err(CheckError::TxTypeNotFeeUpdatable(p.tx_type.clone()));
    }
    if p.amount == 0 {
        return Err(CheckError::NonPositiveFee);
    }
    Ok(())
}

fn exec_miner_fee<P: CacheRead>(ctx: &mut CacheWrapper<P>, p: &MinerFeeProposal) -> Result<Vec<Receipt>, ExecError> {
    ctx.put(Domain::SysParam, &fee_key(&p.tx_type, &p.fee_symbol), &p.amount)?;
    Ok(vec![])
}

fn check_coin_transfer<P: CacheRead>(ctx: &CacheWrapper<P>, p: &CoinTransferProposal) -> Result<(), CheckError> {
    if p.amount < DUST_AMOUNT {
        return Err(CheckError::BelowDust);
    }
    if get_account_by_uid(ctx, &p.from)?.is_none() {
        return Err(CheckError::UnknownAccount(p.from.to_string()));
    }
    Ok(())
}

fn exec_coin_transfer<P: CacheRead>(
    ctx: &mut CacheWrapper<P>,
    p: &CoinTransferProposal,
) -> Result<Vec<Receipt>, ExecError> {
    let mut from_account =
        get_account_by_uid(ctx, &p.from)?.ok_or_else(|| CheckError::UnknownAccount(p.from.to_string()))?;
    from_account.operate_balance(&p.token, BalanceOpType::SubFree, p.amount)?;

    let mut to_account = match get_account_by_uid(ctx, &p.to)? {
        Some(account) => account,
        None => match &p.to {
            UserId::KeyId(keyid) => Account::new(*keyid),
            other => return Err(ExecError::CheckFailed(CheckError::UnknownAccount(other.to_string()))),
        },
    };
    to_account.operate_balance(&p.token, BalanceOpType::AddFree, p.amount)?;

    put_account(ctx, &from_account)?;
    put_account(ctx, &to_account)?;

    Ok(vec![Receipt::transfer_proposal(p.from.clone(), p.to.clone(), p.token.clone(), p.amount)])
}

fn check_account_perm<P: CacheRead>(ctx: &CacheWrapper<P>, p: &AccountPermProposal) -> Result<(), CheckError> {
    if p.new_perms == 0 || p.new_perms > ALL_PERMS {
        return Err(CheckError::PermsOutOfRange);
    }
    if get_account_by_uid(ctx, &p.target)?.is_none() {
        return Err(CheckError::UnknownAccount(p.target.to_string()));
    }
    Ok(())
}

fn exec_account_perm<P: CacheRead>(
    ctx: &mut CacheWrapper<P>,
    p: &AccountPermProposal,
) -> Result<Vec<Receipt>, ExecError> {
    let mut account =
        get_account_by_uid(ctx, &p.target)?.ok_or_else(|| CheckError::UnknownAccount(p.target.to_string()))?;
    account.perms_sum = p.new_perms;
    put_account(ctx, &account)?;
    Ok(vec![])
}

fn check_asset_perm(p: &AssetPermProposal) -> Result<(), CheckError> {
    if p.new_perms == 0 || p.new_perms > ALL_PERMS {
        return Err(CheckError::PermsOutOfRange);
    }
    Ok(())
}

fn exec_asset_perm<P: CacheRead>(ctx: &mut CacheWrapper<P>, p: &AssetPermProposal) -> Result<Vec<Receipt>, ExecError> {
    let mut asset =
        get_asset(ctx, &p.symbol)?.ok_or_else(|| CheckError::UnknownAsset(p.symbol.to_string()))?;
    asset.perms_sum = p.new_perms;
    put_asset(ctx, &asset)?;
    Ok(vec![])
}

fn check_cdp_coin_pair<P: CacheRead>(ctx: &CacheWrapper<P>, p: &CdpCoinPairProposal) -> Result<(), CheckError> {
    let bcoin_asset =
        get_asset(ctx, &p.bcoin)?.ok_or_else(|| CheckError::UnknownAsset(p.bcoin.to_string()))?;
    if !bcoin_asset.check_perms(ASSET_PERM_CDP_BCOIN) {
        return Err(CheckError::NotCdpEligible(p.bcoin.to_string()));
    }
    get_asset(ctx, &p.scoin)?.ok_or_else(|| CheckError::UnknownAsset(p.scoin.to_string()))?;
    Ok(())
}

fn exec_cdp_coin_pair<P: CacheRead>(
    ctx: &mut CacheWrapper<P>,
    p: &CdpCoinPairProposal,
) -> Result<Vec<Receipt>, ExecError> {
    ctx.put(Domain::Cdp, &cdp_pair_key(&p.bcoin, &p.scoin), &p.status)?;
    Ok(vec![])
}

fn check_cdp_param(p: &CdpParamProposal) -> Result<(), CheckError> {
    if p.params.len() > MAX_CDP_PARAMS {
        return Err(CheckError::TooManyCdpParams);
    }
    Ok(())
}

fn exec_cdp_param<P: CacheRead>(
    ctx: &mut CacheWrapper<P>,
    p: &CdpParamProposal,
    height: BlockHeight,
) -> Result<Vec<Receipt>, ExecError> {
    for (name, value) in &p.params {
        ctx.put(Domain::Cdp, name.as_bytes(), value)?;
    }
    if let Some(curve) = p.curve {
        let mut pending: Vec<ScheduledValue<CdpCurvePoint>> =
            ctx.get(Domain::Cdp, CDP_CURVE_PENDING_KEY)?.unwrap_or_default();
        let current: CdpCurvePoint = ctx
            .get(Domain::Cdp, CDP_CURVE_CURRENT_KEY)?
            .unwrap_or(CdpCurvePoint { a: 0, b: 0, effective_height: 0 });
        let resolved_now = ScheduledValue::resolve(height, &current, &pending);
        ctx.put(Domain::Cdp, CDP_CURVE_CURRENT_KEY, &resolved_now)?;
        pending.push(ScheduledValue::new(curve, curve.effective_height));
        ctx.put(Domain::Cdp, CDP_CURVE_PENDING_KEY, &pending)?;
    }
    Ok(vec![])
}

fn check_dex_op<P: CacheRead>(ctx: &CacheWrapper<P>, p: &DexOpProposal) -> Result<(), CheckError> {
    let operators: BTreeSet<u32> = ctx.get(Domain::Dex, DEX_OPERATORS_KEY)?.unwrap_or_default();
    match p.op {
        EnableDisable::Enable => {
            if operators.contains(&p.dex_id) {
                return Err(CheckError::DexOperatorAlreadyInState(p.dex_id));
            }
        }
        EnableDisable::Disable => {
            if p.dex_id == 0 {
                return Err(CheckError::DexOperatorZeroProtected);
            }
            if !operators.contains(&p.dex_id) {
                return Err(CheckError::DexOperatorAlreadyInState(p.dex_id));
            }
        }
    }
    Ok(())
}

fn exec_dex_op<P: CacheRead>(ctx: &mut CacheWrapper<P>, p: &DexOpProposal) -> Result<Vec<Receipt>, ExecError> {
    let mut operators: BTreeSet<u32> = ctx.get(Domain::Dex, DEX_OPERATORS_KEY)?.unwrap_or_default();
    match p.op {
        EnableDisable::Enable => {
            operators.insert(p.dex_id);
        }
        EnableDisable::Disable => {
            operators.remove(&p.dex_id);
        }
    }
    ctx.put(Domain::Dex, DEX_OPERATORS_KEY, &operators)?;
    Ok(vec![])
}

fn check_dex_quote<P: CacheRead>(ctx: &CacheWrapper<P>, p: &DexQuoteProposal) -> Result<(), CheckError> {
    let quotes: BTreeSet<TokenSymbol> = ctx.get(Domain::Dex, DEX_QUOTES_KEY)?.unwrap_or_default();
    match p.op {
        AddRemove::Add if quotes.contains(&p.symbol) => Err(CheckError::QuoteAlreadyExists(p.symbol.to_string())),
        AddRemove::Remove if !quotes.contains(&p.symbol) => Err(CheckError::QuoteNotFound(p.symbol.to_string())),
        _ => Ok(()),
    }
}

fn exec_dex_quote<P: CacheRead>(ctx: &mut CacheWrapper<P>, p: &DexQuoteProposal) -> Result<Vec<Receipt>, ExecError> {
    let mut quotes: BTreeSet<TokenSymbol> = ctx.get(Domain::Dex, DEX_QUOTES_KEY)?.unwrap_or_default();
    match p.op {
        AddRemove::Add => {
            quotes.insert(p.symbol.clone());
        }
        AddRemove::Remove => {
            quotes.remove(&p.symbol);
        }
    }
    ctx.put(Domain::Dex, DEX_QUOTES_KEY, &quotes)?;
    Ok(vec![])
}

fn check_feed_coin_pair<P: CacheRead>(ctx: &CacheWrapper<P>, p: &FeedCoinPairProposal) -> Result<(), CheckError> {
    let pairs: BTreeSet<(TokenSymbol, TokenSymbol)> =
        ctx.get(Domain::PriceFeed, FEED_PAIRS_KEY)?.unwrap_or_default();
    let key = (p.feed_symbol.clone(), p.quote_symbol.clone());
    match p.op {
        AddRemove::Add if pairs.contains(&key) => {
            Err(CheckError::FeedPairAlreadyExists(p.feed_symbol.to_string(), p.quote_symbol.to_string()))
        }
        AddRemove::Remove if !pairs.contains(&key) => {
            Err(CheckError::FeedPairNotFound(p.feed_symbol.to_string(), p.quote_symbol.to_string()))
        }
        _ => Ok(()),
    }
}

fn exec_feed_coin_pair<P: CacheRead>(
    ctx: &mut CacheWrapper<P>,
    p: &FeedCoinPairProposal,
) -> Result<Vec<Receipt>, ExecError> {
    let mut pairs: BTreeSet<(TokenSymbol, TokenSymbol)> =
        ctx.get(Domain::PriceFeed, FEED_PAIRS_KEY)?.unwrap_or_default();
    let key = (p.feed_symbol.clone(), p.quote_symbol.clone());
    match p.op {
        AddRemove::Add => {
            pairs.insert(key);
        }
        AddRemove::Remove => {
            pairs.remove(&key);
        }
    }
    ctx.put(Domain::PriceFeed, FEED_PAIRS_KEY, &pairs)?;
    Ok(vec![])
}
