pub mod account;
pub mod asset;
pub mod perms;

pub use account::{Account, AccountError, BalanceOpType, TokenBucket, TokenMap, MAX_MONEY};
pub use asset::{Asset, AssetKind};
pub use perms::{check_perms, PermsSum, ALL_PERMS, NULL_PERM};
