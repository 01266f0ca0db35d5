//! # ECDSA Verification (secp256k1)
//!
//! Pure domain logic for detached ECDSA signatures over Keccak-256 digests.
//!
//! ## Security Notes
//!
//! - **Malleability Prevention (EIP-2)**: high-S signatures are rejected, so a
//!   signature has exactly one accepted encoding
//! - **Scalar Range Validation**: R and S must be in [1, n-1]; `k256` enforces
//!   this when parsing
//! - Keys are checked to be valid curve points before use

use super::errors::SignatureError;
use crate::ports::SignatureVerifier;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use ledger_types::codec;
use tracing::trace;

// =============================================================================
// SECP256K1 VERIFIER
// =============================================================================

/// Stateless secp256k1 implementation of [`SignatureVerifier`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl Secp256k1Verifier {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, message: &[u8], public_key: &str, signature: &str) -> bool {
        match verify_signature(message, public_key, signature) {
            Ok(()) => true,
            Err(e) => {
                trace!(error = %e, "signature rejected");
                false
            }
        }
    }

    fn address_of(&self, public_key: &str) -> Option<String> {
        address_from_public_key(public_key).ok()
    }
}

// =============================================================================
// CORE FUNCTIONS
// =============================================================================

/// Parse a hex SEC1 public key (with or without `0x`).
pub fn parse_public_key(public_key: &str) -> Result<VerifyingKey, SignatureError> {
    let bytes = codec::from_hex(public_key)
        .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;
    VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|_| SignatureError::InvalidPublicKey(public_key.to_string()))
}

fn parse_signature(signature: &str) -> Result<Signature, SignatureError> {
    let bytes = codec::from_hex(signature).map_err(|_| SignatureError::InvalidFormat)?;
    if bytes.len() != 64 {
        return Err(SignatureError::InvalidFormat);
    }
    let sig = Signature::from_slice(&bytes).map_err(|_| SignatureError::InvalidFormat)?;
    // `normalize_s` returns a value only when S was in the upper half.
    if sig.normalize_s().is_some() {
        return Err(SignatureError::MalleableSignature);
    }
    Ok(sig)
}

/// Verify `signature` by `public_key` over `keccak256(message)`.
pub fn verify_signature(
    message: &[u8],
    public_key: &str,
    signature: &str,
) -> Result<(), SignatureError> {
    let key = parse_public_key(public_key)?;
    let sig = parse_signature(signature)?;
    let digest = codec::keccak256(message);
    key.verify_prehash(&digest, &sig)
        .map_err(|_| SignatureError::VerificationFailed)
}

/// Derive the `0x`-prefixed address of a public key.
pub fn address_from_public_key(public_key: &str) -> Result<String, SignatureError> {
    let key = parse_public_key(public_key)?;
    Ok(address_from_verifying_key(&key))
}

pub(crate) fn address_from_verifying_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag.
    let digest = codec::keccak256(&point.as_bytes()[1..]);
    codec::address_from_digest(&digest)
}

/// Case-insensitive check that `address` is the derivation of `public_key`.
pub fn address_matches_key(address: &str, public_key: &str) -> bool {
    match address_from_public_key(public_key) {
        Ok(derived) => derived.eq_ignore_ascii_case(address),
        Err(_) => false,
    }
}

/// Sign `keccak256(message)`, returning hex `r ‖ s` with low S.
///
/// Used by creation tooling and tests; the engine itself never signs.
pub fn sign_message(message: &[u8], key: &SigningKey) -> Result<String, SignatureError> {
    let digest = codec::keccak256(message);
    let sig: Signature = key
        .sign_prehash(&digest)
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    let sig = sig.normalize_s().unwrap_or(sig);
    Ok(hex::encode(sig.to_bytes()))
}
