//! # Signature Verifier Port
//!
//! The only view of cryptography the ledger engine has. Implementations must
//! be deterministic: the same inputs always yield the same answer.

/// Detached-signature verification plus key-to-address derivation.
pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` is a valid signature by `public_key` over `message`.
    ///
    /// Malformed keys or signatures are simply invalid.
    fn verify(&self, message: &[u8], public_key: &str, signature: &str) -> bool;

    /// Canonical address of `public_key`, or `None` if the key is malformed.
    fn address_of(&self, public_key: &str) -> Option<String>;
}
