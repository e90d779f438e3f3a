//! Cryptographic primitives shared across the finality core: hashes, keys, and
//! DER-encoded ECDSA signatures over secp256k1.
use secp256k1::{Message, Secp256k1, SecretKey};
use serde::{ser::SerializeTuple, Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use thiserror::Error;

/// The maximum length of a DER-encoded ECDSA signature, per the wire format in §6.
pub const MAX_SIGNATURE_LEN: usize = 72;

#[derive(Error, Debug, Clone)]
pub enum CryptoError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("verification failed")]
    VerificationFailed,
}

type Error = CryptoError;

pub trait ToHash256 {
    fn to_hash256(&self) -> Hash256;
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct HexSerializedBytes<const N: usize> {
    pub data: [u8; N],
}

impl<const N: usize> HexSerializedBytes<N> {
    const fn zero() -> Self {
        Self { data: [0; N] }
    }
}

impl<const N: usize> Serialize for HexSerializedBytes<N> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(hex::encode(self.data).as_str())
        } else {
            let mut seq = serializer.serialize_tuple(N)?;
            for e in self.data {
                seq.serialize_element(&e)?;
            }
            seq.end()
        }
    }
}

impl<const N: usize> fmt::Debug for HexSerializedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.data).as_str())
    }
}

impl<const N: usize> fmt::Display for HexSerializedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.data).as_str())
    }
}

impl<'de, const N: usize> Deserialize<'de> for HexSerializedBytes<N> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s: String = Deserialize::deserialize(deserializer)?;
            let bytes = hex::decode(s).map_err(|e| serde::de::Error::custom(e.to_string()))?;
            if bytes.len() != N {
                return Err(serde::de::Error::custom("invalid length"));
            }
            let mut data = [0; N];
            data.copy_from_slice(&bytes);
            Ok(HexSerializedBytes { data })
        } else {
            struct V<const M: usize>;
            impl<'de, const M: usize> serde::de::Visitor<'de> for V<M> {
                type Value = [u8; M];

                fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                    formatter.write_str("byte")
                }

                fn visit_seq<S: serde::de::SeqAccess<'de>>(
                    self,
                    mut seq: S,
                ) -> Result<Self::Value, S::Error> {
                    let mut data = [0; M];
                    for (i, x) in data.iter_mut().enumerate() {
                        *x = seq
                            .next_element()?
                            .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                    }
                    Ok(data)
                }
            }
            let data = deserializer.deserialize_tuple(N, V::<N>)?;
            Ok(HexSerializedBytes { data })
        }
    }
}

/// A variable-length hex-serialised byte string, used for DER signatures.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Default)]
pub struct HexSerializedVec {
    pub data: Vec<u8>,
}

impl From<Vec<u8>> for HexSerializedVec {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl Serialize for HexSerializedVec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(hex::encode(&self.data).as_str())
    }
}

impl fmt::Debug for HexSerializedVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.data).as_str())
    }
}

impl fmt::Display for HexSerializedVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.data).as_str())
    }
}

impl<'de> Deserialize<'de> for HexSerializedVec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let data = hex::decode(s).map_err(|e| serde::de::Error::custom(e.to_string()))?;
        Ok(HexSerializedVec { data })
    }
}

/// A cryptographic hash. Keccak256, matching the chain's existing block/account hashing.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash256 {
    pub hash: HexSerializedBytes<32>,
}

impl Hash256 {
    pub const fn zero() -> Self {
        Hash256 {
            hash: HexSerializedBytes::zero(),
        }
    }

    /// Hashes the given data.
    pub fn hash(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(data);
        let result = hasher.finalize();
        Hash256 {
            hash: HexSerializedBytes {
                data: result.as_slice().try_into().unwrap(),
            },
        }
    }

    pub fn from_array(data: [u8; 32]) -> Self {
        Hash256 { hash: HexSerializedBytes { data } }
    }

    /// Combines two hashes, used to derive the PBFT message content-hash in §3.
    pub fn aggregate(&self, other: &Self) -> Self {
        Self::hash([self.hash.data, other.hash.data].concat())
    }
}

impl std::convert::AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.hash.data
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// A DER-encoded ECDSA signature, bounded to `MAX_SIGNATURE_LEN` bytes per §6.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature {
    signature: HexSerializedVec,
}

impl Signature {
    /// Creates a new signature from the given data and key.
    pub fn sign(data: Hash256, private_key: &PrivateKey) -> Result<Self, Error> {
        let private_key = secp256k1::SecretKey::from_slice(&private_key.key.data)
            .map_err(|_| Error::InvalidFormat("private key: [omitted]".to_owned()))?;
        let message = Message::from_slice(data.as_ref()).unwrap();
        let sig = Secp256k1::signing_only().sign_ecdsa(&message, &private_key);
        let der = sig.serialize_der().to_vec();
        if der.len() > MAX_SIGNATURE_LEN {
            return Err(Error::InvalidFormat("signature exceeds max DER length".to_owned()));
        }
        Ok(Signature { signature: der.into() })
    }

    /// Verifies the signature against the given data and public key.
    pub fn verify(&self, data: Hash256, public_key: &PublicKey) -> Result<(), Error> {
        let signature = secp256k1::ecdsa::Signature::from_der(&self.signature.data)
            .map_err(|_| Error::InvalidFormat(format!("signature: {self}")))?;
        let public_key = secp256k1::PublicKey::from_slice(&public_key.key.data)
            .map_err(|_| Error::InvalidFormat(format!("public_key: {public_key}")))?;
        let message = Message::from_slice(data.as_ref()).unwrap();
        Secp256k1::verification_only()
            .verify_ecdsa(&message, &signature, &public_key)
            .map_err(|_| Error::VerificationFailed)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.signature.data
    }

    /// Constructs a signature from raw DER bytes, but does not verify its validity.
    pub fn from_der_bytes(bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() > MAX_SIGNATURE_LEN {
            return Err(Error::InvalidFormat("signature exceeds max DER length".to_owned()));
        }
        // Validate it actually parses as DER ECDSA before accepting it.
        secp256k1::ecdsa::Signature::from_der(&bytes)
            .map_err(|_| Error::InvalidFormat("not a valid DER signature".to_owned()))?;
        Ok(Signature { signature: bytes.into() })
    }
}

impl std::convert::AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.signature.data
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature)
    }
}

/// A signature that is explicitly marked with the type of the signed data.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
pub struct TypedSignature<T> {
    signature: Signature,
    signer: PublicKey,
    #[serde(skip)]
    _mark: std::marker::PhantomData<T>,
}

impl<T: ToHash256> TypedSignature<T> {
    pub fn sign(data: &T, private_key: &PrivateKey) -> Result<Self, Error> {
        let data = data.to_hash256();
        Signature::sign(data, private_key).map(|signature| TypedSignature {
            signature,
            signer: private_key.public_key(),
            _mark: std::marker::PhantomData,
        })
    }

    pub fn new(signature: Signature, signer: PublicKey) -> Self {
        TypedSignature { signature, signer, _mark: std::marker::PhantomData }
    }

    pub fn signer(&self) -> &PublicKey {
        &self.signer
    }

    pub fn verify(&self, data: &T) -> Result<(), Error> {
        let data = data.to_hash256();
        self.signature.verify(data, &self.signer)
    }

    pub fn get_raw_signature(&self) -> Signature {
        self.signature.clone()
    }
}

/// A public key, stored uncompressed (65 bytes) the way account records carry it.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey {
    key: HexSerializedBytes<65>,
}

impl std::convert::AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.key.data
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl PublicKey {
    pub fn zero() -> Self {
        Self { key: HexSerializedBytes::zero() }
    }

    /// True if this key is the fully-valid (uncompressed, verified) form rather
    /// than a placeholder. Mirrors the account model's owner/miner pubkey slots,
    /// either of which may be unset for an account that never registered one.
    pub fn is_set(&self) -> bool {
        self.key.data != [0u8; 65]
    }

    pub fn from_array_uncompressed(array: [u8; 65]) -> Result<Self, Error> {
        let key = secp256k1::PublicKey::from_slice(array.as_ref())
            .map_err(|_| Error::InvalidFormat(format!("given bytes: {}", hex::encode(array))))?
            .serialize_uncompressed();
        Ok(PublicKey { key: HexSerializedBytes { data: key } })
    }

    /// Accepts either a compressed (33-byte) or uncompressed (65-byte) encoding,
    /// normalising to the uncompressed internal representation.
    pub fn from_compressed(array: [u8; 33]) -> Result<Self, Error> {
        let key = secp256k1::PublicKey::from_slice(array.as_ref())
            .map_err(|_| Error::InvalidFormat(format!("given bytes: {}", hex::encode(array))))?
            .serialize_uncompressed();
        Ok(PublicKey { key: HexSerializedBytes { data: key } })
    }
}

/// A private key.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey {
    pub key: HexSerializedBytes<32>,
}

impl std::convert::AsRef<[u8]> for PrivateKey {
    fn as_ref(&self) -> &[u8] {
        &self.key.data
    }
}

impl PrivateKey {
    pub fn zero() -> Self {
        Self { key: HexSerializedBytes::zero() }
    }

    pub fn from_array(array: [u8; 32]) -> Result<Self, Error> {
        let key = secp256k1::SecretKey::from_slice(&array)
            .map_err(|_| Error::InvalidFormat(format!("given bytes: {}", hex::encode(array))))?
            .secret_bytes();
        Ok(PrivateKey { key: HexSerializedBytes { data: key } })
    }

    pub fn public_key(&self) -> PublicKey {
        let private_key = SecretKey::from_slice(&self.key.data).expect("invalid private key");
        let secp = Secp256k1::new();
        let public_key = private_key.public_key(&secp);
        PublicKey::from_array_uncompressed(public_key.serialize_uncompressed())
            .expect("invalid public key")
    }
}

/// Checks whether the given public and private keys match.
pub fn check_keypair_match(public_key: &PublicKey, private_key: &PrivateKey) -> Result<(), Error> {
    let msg = "dpos-core keypair check".as_bytes();
    let signature = Signature::sign(Hash256::hash(msg), private_key)?;
    signature.verify(Hash256::hash(msg), public_key)
}

/// Generates a new keypair using the seed (deterministic, for tests and genesis fixtures).
pub fn generate_keypair(seed: impl AsRef<[u8]>) -> (PublicKey, PrivateKey) {
    let mut seed_: [u8; 32] = [0; 32];
    for (i, x) in Hash256::hash(seed).as_ref()[0..32].iter().enumerate() {
        seed_[i] = *x;
    }
    use secp256k1::rand::SeedableRng;
    let mut rng = secp256k1::rand::rngs::StdRng::from_seed(seed_);
    let secp = Secp256k1::new();
    let (private_key, public_key) = secp.generate_keypair(&mut rng);
    (
        PublicKey::from_array_uncompressed(public_key.serialize_uncompressed())
            .expect("invalid public key"),
        PrivateKey::from_array(private_key.secret_bytes()).expect("invalid private key"),
    )
}

/// Generates a new keypair randomly.
pub fn generate_keypair_random() -> (PublicKey, PrivateKey) {
    use secp256k1::rand::SeedableRng;
    let mut rng = secp256k1::rand::rngs::StdRng::from_entropy();
    let secp = Secp256k1::new();
    let (private_key, public_key) = secp.generate_keypair(&mut rng);
    (
        PublicKey::from_array_uncompressed(public_key.serialize_uncompressed())
            .expect("invalid public key"),
        PrivateKey::from_array(private_key.secret_bytes()).expect("invalid private key"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_encode_decode() {
        let hash = Hash256::hash("hello world");
        let encoded = serde_json::to_string(&hash).unwrap();
        let decoded: Hash256 = serde_json::from_str(&encoded).unwrap();
        assert_eq!(hash, decoded);
    }

    #[test]
    fn hash_encode_decode_zero() {
        let hash = Hash256::zero();
        let encoded = serde_json::to_string(&hash).unwrap();
        let decoded: Hash256 = serde_json::from_str(&encoded).unwrap();
        assert_eq!(hash, decoded);
    }

    #[test]
    fn key_round_trip() {
        let (public_key, private_key) = generate_keypair("hello world");
        let encoded = serde_json::to_string(&public_key).unwrap();
        let decoded: PublicKey = serde_json::from_str(&encoded).unwrap();
        assert_eq!(public_key, decoded);
        let encoded = serde_json::to_string(&private_key).unwrap();
        let decoded: PrivateKey = serde_json::from_str(&encoded).unwrap();
        assert_eq!(private_key, decoded);
    }

    #[test]
    fn signature_sign_verify() {
        let (public_key, private_key) = generate_keypair("hello world");
        let signature = Signature::sign(Hash256::hash("hello world"), &private_key).unwrap();
        assert!(signature.as_bytes().len() <= MAX_SIGNATURE_LEN);
        signature.verify(Hash256::hash("hello world"), &public_key).unwrap();
    }

    #[test]
    fn signature_verify_invalid() {
        let (public_key, private_key) = generate_keypair("hello world");
        let signature = Signature::sign(Hash256::hash("hello world2"), &private_key).unwrap();
        signature.verify(Hash256::hash("hello world"), &public_key).unwrap_err();
    }

    #[test]
    fn signature_encode_decode() {
        let (_, private_key) = generate_keypair("hello world");
        let signature = Signature::sign(Hash256::hash("hello world"), &private_key).unwrap();
        let encoded = serde_json::to_string(&signature).unwrap();
        let decoded: Signature = serde_json::from_str(&encoded).unwrap();
        assert_eq!(signature, decoded);
    }

    #[test]
    fn keypair_match() {
        let (public_key, private_key) = generate_keypair("a seed");
        check_keypair_match(&public_key, &private_key).unwrap();
    }
}
