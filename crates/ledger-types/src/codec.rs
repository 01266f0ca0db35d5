//! # Canonical Encoding & Hashing
//!
//! Every value that is hashed or signed goes through [`encode`]. The format is
//! `bincode` over the Serde data model: fields in declaration order, fixed
//! little-endian integers, length-prefixed sequences. Maps in hashed types are
//! always `BTreeMap`, so iteration order (and therefore bytes) is fixed.
//!
//! Re-encoding a decoded value reproduces the identical bytes; transaction
//! identity and contract addressing both rely on that.

use crate::entities::Hash;
use crate::errors::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha3::{Digest, Keccak256};

/// Canonical bytes of `value`.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Inverse of [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Keccak-256 of raw bytes.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Keccak-256 of the canonical encoding of `value`.
pub fn hash_of<T: Serialize + ?Sized>(value: &T) -> Result<Hash, CodecError> {
    Ok(keccak256(&encode(value)?))
}

/// Domain-separated message bytes for a signature.
///
/// The tag keeps a signature over one kind of object from being replayed as
/// a signature over another with coincidentally equal fields.
pub fn signing_payload<T: Serialize + ?Sized>(tag: &str, value: &T) -> Result<Vec<u8>, CodecError> {
    encode(&(tag, value))
}

/// `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse hex with or without a `0x` prefix.
pub fn from_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(trimmed).map_err(|e| CodecError::Hex(format!("{s}: {e}")))
}

/// Address string for the last 20 bytes of a digest.
pub fn address_from_digest(digest: &Hash) -> String {
    to_hex(&digest[12..])
}

/// Whether `s` is a well-formed address (`0x` + 40 hex chars).
pub fn is_valid_address(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(body) => body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Content-derived address of a contract submitted by `submitter` at `nonce`.
/// Under POA the submitter is the attorney, not the principal.
pub fn contract_address(chain_id: u32, submitter: &str, nonce: u64) -> Result<String, CodecError> {
    let digest = hash_of(&("contract", chain_id, submitter.to_ascii_lowercase(), nonce))?;
    Ok(address_from_digest(&digest))
}
