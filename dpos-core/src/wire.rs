//! The PBFT message wire format from §6, and the in-memory `BlockIndex` node
//! from §3. Block index nodes are addressed by hash rather than pointer (per
//! the arena-and-stable-identifier design note in spec.md §9).

use crate::crypto::{Hash256, Signature, ToHash256};
use crate::ids::{BlockHeight, RegId};
use crate::time::Timestamp;
use crate::varint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[repr(u8)]
pub enum PbftMsgType {
    Confirm = 1,
    Finality = 2,
}

impl PbftMsgType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(PbftMsgType::Confirm),
            2 => Some(PbftMsgType::Finality),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of buffer")]
    Truncated,
    #[error("unknown msg_type byte: {0}")]
    UnknownMsgType(u8),
    #[error("signature exceeds max length")]
    SignatureTooLong,
    #[error("varint error: {0}")]
    Varint(#[from] varint::VarintError),
    #[error("signature decode error: {0}")]
    Signature(String),
}

/// A signed `Confirm` or `Finality` message, per §3 "PBFT message" and the
/// wire layout in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PbftMessage {
    pub msg_type: PbftMsgType,
    pub height: BlockHeight,
    pub block_hash: Hash256,
    pub prev_block_hash: Hash256,
    pub miner: RegId,
    pub signature: Signature,
}

/// The content hash of a PBFT message's signed fields, computable before a
/// signature exists — lets a broadcaster hash-then-sign without needing a
/// placeholder `Signature` value to construct a `PbftMessage` first.
pub fn pbft_content_hash(
    msg_type: PbftMsgType,
    height: BlockHeight,
    block_hash: Hash256,
    prev_block_hash: Hash256,
    miner: RegId,
) -> Hash256 {
    let mut buf = Vec::new();
    buf.push(msg_type as u8);
    varint::encode_u32(height, &mut buf);
    buf.extend_from_slice(block_hash.as_ref());
    buf.extend_from_slice(prev_block_hash.as_ref());
    miner.encode(&mut buf);
    Hash256::hash(buf)
}

impl PbftMessage {
    /// Encodes the message minus the signature — this is what gets signed.
    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.push(self.msg_type as u8);
        varint::encode_u32(self.height, out);
        out.extend_from_slice(self.block_hash.as_ref());
        out.extend_from_slice(self.prev_block_hash.as_ref());
        self.miner.encode(out);
    }

    /// The hash over the signed payload — also used as the content-addressed
    /// dedup key in §3 ("Two messages with the same content-hash are duplicates").
    pub fn content_hash(&self) -> Hash256 {
        let mut buf = Vec::new();
        self.encode_payload(&mut buf);
        Hash256::hash(buf)
    }

    /// Full wire encoding, including the signature.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_payload(&mut buf);
        let sig = self.signature.as_bytes();
        varint::encode_u64(sig.len() as u64, &mut buf);
        buf.extend_from_slice(sig);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.is_empty() {
            return Err(WireError::Truncated);
        }
        let msg_type = PbftMsgType::from_u8(buf[0]).ok_or(WireError::UnknownMsgType(buf[0]))?;
        let mut offset = 1;
        let (height, n) = varint::decode_u32(&buf[offset..])?;
        offset += n;
        if buf.len() < offset + 64 {
            return Err(WireError::Truncated);
        }
        let mut hash_bytes = [0u8; 32];
        hash_bytes.copy_from_slice(&buf[offset..offset + 32]);
        let block_hash = Hash256::from_array(hash_bytes);
        offset += 32;
        hash_bytes.copy_from_slice(&buf[offset..offset + 32]);
        let prev_block_hash = Hash256::from_array(hash_bytes);
        offset += 32;
        let (miner, n) = RegId::decode(&buf[offset..])?;
        offset += n;
        let (sig_len, n) = varint::decode_u64(&buf[offset..])?;
        offset += n;
        if sig_len as usize > crate::crypto::MAX_SIGNATURE_LEN {
            return Err(WireError::SignatureTooLong);
        }
        if buf.len() < offset + sig_len as usize {
            return Err(WireError::Truncated);
        }
        let sig_bytes = buf[offset..offset + sig_len as usize].to_vec();
        let signature = Signature::from_der_bytes(sig_bytes)
            .map_err(|e| WireError::Signature(e.to_string()))?;
        Ok(PbftMessage { msg_type, height, block_hash, prev_block_hash, miner, signature })
    }
}

impl ToHash256 for PbftMessage {
    fn to_hash256(&self) -> Hash256 {
        self.content_hash()
    }
}

// Messages are ordered/deduped by content hash: two validator signatures over
// the same (type, height, block_hash, prev_block_hash, miner) tuple collide,
// which is exactly the definition of "duplicate" in §3.
impl PartialEq for PbftMessage {
    fn eq(&self, other: &Self) -> bool {
        self.content_hash() == other.content_hash()
    }
}
impl Eq for PbftMessage {}
impl PartialOrd for PbftMessage {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PbftMessage {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.content_hash().cmp(&other.content_hash())
    }
}

/// An in-memory DAG node. The canonical chain is a sequence of these; rather
/// than an owned pointer to the previous node (which the teacher's
/// cyclic-pointer design note flags), `prev_hash` is a stable, hash-based
/// back-reference resolved through a `ChainIndex` arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndex {
    pub height: BlockHeight,
    pub hash: Hash256,
    pub prev_hash: Hash256,
    pub block_time: Timestamp,
}

impl BlockIndex {
    pub fn genesis(hash: Hash256, block_time: Timestamp) -> Self {
        BlockIndex { height: 0, hash, prev_hash: Hash256::zero(), block_time }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_keypair, PrivateKey};

    fn signed_message(
        msg_type: PbftMsgType,
        height: BlockHeight,
        block_hash: Hash256,
        prev_block_hash: Hash256,
        miner: RegId,
        key: &PrivateKey,
    ) -> PbftMessage {
        let mut unsigned = PbftMessage {
            msg_type,
            height,
            block_hash,
            prev_block_hash,
            miner,
            signature: Signature::sign(Hash256::zero(), key).unwrap(),
        };
        let payload_hash = unsigned.content_hash();
        unsigned.signature = Signature::sign(payload_hash, key).unwrap();
        unsigned
    }

    #[test]
    fn encode_decode_round_trip() {
        let (_, key) = generate_keypair("miner-1");
        let msg = signed_message(
            PbftMsgType::Confirm,
            100,
            Hash256::hash("block-100"),
            Hash256::hash("block-99"),
            RegId::new(1, 0),
            &key,
        );
        let encoded = msg.encode();
        let decoded = PbftMessage::decode(&encoded).unwrap();
        assert_eq!(decoded.height, msg.height);
        assert_eq!(decoded.block_hash, msg.block_hash);
        assert_eq!(decoded.content_hash(), msg.content_hash());
    }

    #[test]
    fn content_hash_ignores_signature() {
        let (_, key1) = generate_keypair("miner-1");
        let (_, key2) = generate_keypair("miner-2");
        let a = signed_message(
            PbftMsgType::Confirm,
            10,
            Hash256::hash("b"),
            Hash256::hash("a"),
            RegId::new(1, 0),
            &key1,
        );
        let b = signed_message(
            PbftMsgType::Confirm,
            10,
            Hash256::hash("b"),
            Hash256::hash("a"),
            RegId::new(1, 0),
            &key2,
        );
        // Different signers, same logical content -> same content hash -> duplicate.
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_heights_are_distinct_messages() {
        let (_, key) = generate_keypair("miner-1");
        let a = signed_message(
            PbftMsgType::Confirm,
            10,
            Hash256::hash("b"),
            Hash256::hash("a"),
            RegId::new(1, 0),
            &key,
        );
        let b = signed_message(
            PbftMsgType::Confirm,
            11,
            Hash256::hash("b"),
            Hash256::hash("a"),
            RegId::new(1, 0),
            &key,
        );
        assert_ne!(a, b);
    }
}
