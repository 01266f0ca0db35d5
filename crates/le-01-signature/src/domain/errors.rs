//! # Signature Errors

use thiserror::Error;

/// Errors that can occur while parsing keys or checking signatures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// Public key is not valid hex or not a point on the curve
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature is not 64 bytes of hex or has an out-of-range scalar
    #[error("Invalid signature format")]
    InvalidFormat,

    /// Signature has a high S value
    #[error("Malleable signature (high S value)")]
    MalleableSignature,

    /// Signature does not match the message and key
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Signing with a private key failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}
