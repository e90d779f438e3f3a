//! Account-identifying types from §3 "Identifiers": `RegId`, `KeyId`, `NickId`,
//! `UserId`, and `TokenSymbol`.

use crate::crypto::{Hash256, PublicKey, ToHash256};
use crate::varint;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type BlockHeight = u32;

/// Allocated at first inclusion of an account in a block; stable thereafter.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct RegId {
    pub height: BlockHeight,
    pub index: u16,
}

impl RegId {
    pub fn new(height: BlockHeight, index: u16) -> Self {
        RegId { height, index }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        varint::encode_u32(self.height, out);
        varint::encode_u16(self.index, out);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), IdError> {
        let (height, n1) = varint::decode_u32(buf).map_err(IdError::Varint)?;
        let (index, n2) = varint::decode_u16(&buf[n1..]).map_err(IdError::Varint)?;
        Ok((RegId { height, index }, n1 + n2))
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.height, self.index)
    }
}

/// A 20-byte hash of a public key.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct KeyId {
    pub data: [u8; 20],
}

impl KeyId {
    pub fn from_pubkey(pubkey: &PublicKey) -> Self {
        let hash = Hash256::hash(pubkey.as_ref());
        let mut data = [0u8; 20];
        data.copy_from_slice(&hash.as_ref()[0..20]);
        KeyId { data }
    }

    pub fn zero() -> Self {
        KeyId { data: [0; 20] }
    }

    pub fn is_empty(&self) -> bool {
        self.data == [0u8; 20]
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.data))
    }
}

pub const MAX_NICKID_LEN: usize = 32;

/// A UTF-8 nickname, ≤ 32 bytes, unique across accounts.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
pub struct NickId(String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("nickid exceeds {MAX_NICKID_LEN} bytes")]
    NickIdTooLong,
    #[error("token symbol must be 1-{MAX_TOKEN_SYMBOL_LEN} ASCII bytes")]
    TokenSymbolInvalid,
    #[error("varint decode error: {0}")]
    Varint(#[from] varint::VarintError),
}

impl NickId {
    pub fn new(name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        if name.len() > MAX_NICKID_LEN {
            return Err(IdError::NickIdTooLong);
        }
        Ok(NickId(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tagged union over the four ways an account can be addressed.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub enum UserId {
    RegId(RegId),
    KeyId(KeyId),
    NickId(NickId),
    PubKey(PublicKey),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::RegId(r) => write!(f, "{r}"),
            UserId::KeyId(k) => write!(f, "{k}"),
            UserId::NickId(n) => write!(f, "{n}"),
            UserId::PubKey(p) => write!(f, "{p}"),
        }
    }
}

impl ToHash256 for UserId {
    fn to_hash256(&self) -> Hash256 {
        Hash256::hash(serde_json::to_vec(self).unwrap())
    }
}

pub const MAX_TOKEN_SYMBOL_LEN: usize = 12;

/// A validated, capped-length token/asset symbol (e.g. "WICC", "WUSD").
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
pub struct TokenSymbol(String);

impl TokenSymbol {
    pub fn new(symbol: impl Into<String>) -> Result<Self, IdError> {
        let symbol = symbol.into();
        if symbol.is_empty() || symbol.len() > MAX_TOKEN_SYMBOL_LEN || !symbol.is_ascii() {
            return Err(IdError::TokenSymbolInvalid);
        }
        Ok(TokenSymbol(symbol.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
