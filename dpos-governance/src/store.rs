//! Account and asset lookups through the cache wrapper, generalising the
//! `UserId` tagged union (§3) into a single canonical storage key per
//! account: accounts are keyed by `KeyId`, with `RegId`/`NickId` resolved
//! through secondary indices recorded at registration time. Grounded on the
//! original's `CAccountDBCache::GetAccount` overload set, which accepts the
//! same four address forms.

use dpos_account::{Account, Asset};
use dpos_cache::{CacheError, CacheRead, CacheWrapper, Domain};
use dpos_core::ids::{KeyId, NickId, RegId, TokenSymbol, UserId};

const KEYID_KEY: u8 = 0;
const REGID_INDEX_KEY: u8 = 1;
const NICKID_INDEX_KEY: u8 = 2;

fn keyid_storage_key(keyid: &KeyId) -> Vec<u8> {
    let mut key = vec![KEYID_KEY];
    key.extend_from_slice(&keyid.data);
    key
}

fn regid_index_key(regid: &RegId) -> Vec<u8> {
    let mut key = vec![REGID_INDEX_KEY];
    regid.encode(&mut key);
    key
}

fn nickid_index_key(nickid: &NickId) -> Vec<u8> {
    let mut key = vec![NICKID_INDEX_KEY];
    key.extend_from_slice(nickid.as_str().as_bytes());
    key
}

/// Resolves any `UserId` form to the `KeyId` an account is actually stored
/// under. `PubKey` resolves structurally (it deterministically hashes to a
/// `KeyId`); `RegId`/`NickId` resolve through the secondary index written by
/// [`put_account`].
pub fn resolve_user_id<P: CacheRead>(
    ctx: &CacheWrapper<P>,
    uid: &UserId,
) -> Result<Option<KeyId>, CacheError> {
    match uid {
        UserId::KeyId(k) => Ok(Some(*k)),
        UserId::PubKey(p) => Ok(Some(KeyId::from_pubkey(p))),
        UserId::RegId(r) => ctx.get::<KeyId>(Domain::Account, &regid_index_key(r)),
        UserId::NickId(n) => ctx.get::<KeyId>(Domain::Account, &nickid_index_key(n)),
    }
}

pub fn get_account<P: CacheRead>(
    ctx: &CacheWrapper<P>,
    keyid: &KeyId,
) -> Result<Option<Account>, CacheError> {
    ctx.get(Domain::Account, &keyid_storage_key(keyid))
}

pub fn get_account_by_uid<P: CacheRead>(
    ctx: &CacheWrapper<P>,
    uid: &UserId,
) -> Result<Option<Account>, CacheError> {
    match resolve_user_id(ctx, uid)? {
        Some(keyid) => get_account(ctx, &keyid),
        None => Ok(None),
    }
}

/// Writes `account` back under its own `keyid`, refreshing the `regid`/
/// `nickid` secondary indices if either is set. Every legal mutation path
/// (including first registration) goes through here so the indices never
/// drift from the account they describe.
pub fn put_account<P: CacheRead>(
    ctx: &mut CacheWrapper<P>,
    account: &Account,
) -> Result<(), CacheError> {
    ctx.put(Domain::Account, &keyid_storage_key(&account.keyid), account)?;
    if let Some(regid) = &account.regid {
        ctx.put(Domain::Account, &regid_index_key(regid), &account.keyid)?;
    }
    if let Some(nickid) = &account.nickid {
        ctx.put(Domain::Account, &nickid_index_key(nickid), &account.keyid)?;
    }
    Ok(())
}

fn asset_storage_key(symbol: &TokenSymbol) -> Vec<u8> {
    symbol.as_str().as_bytes().to_vec()
}

pub fn get_asset<P: CacheRead>(
    ctx: &CacheWrapper<P>,
    symbol: &TokenSymbol,
) -> Result<Option<Asset>, CacheError> {
    ctx.get(Domain::Asset, &asset_storage_key(symbol))
}

pub fn put_asset<P: CacheRead>(ctx: &mut CacheWrapper<P>, asset: &Asset) -> Result<(), CacheError> {
    ctx.put(Domain::Asset, &asset_storage_key(&asset.symbol), asset)
}
