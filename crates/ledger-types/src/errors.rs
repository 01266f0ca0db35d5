//! # Error Types
//!
//! Ordinary rejections and codec failures shared across subsystems.
//!
//! A `Rejection` is a reproducible, user-facing answer ("no, because ...").
//! It is never a crash: the state it was evaluated against is untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of an ordinary rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionKind {
    /// Malformed payload, unknown type, missing field, wrong chain.
    Structural,
    /// Nonce, timestamp, permission, lock, balance or allowance failure.
    Precondition,
    /// A required signature or key/address pairing does not verify.
    Signature,
    /// Commit or cancel against a contract that cannot accept it.
    ContractState,
}

impl RejectionKind {
    /// Label used for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionKind::Structural => "structural",
            RejectionKind::Precondition => "precondition",
            RejectionKind::Signature => "signature",
            RejectionKind::ContractState => "contract_state",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transaction (or contract transition) was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {reason}")]
pub struct Rejection {
    /// Taxonomy bucket.
    pub kind: RejectionKind,
    /// Human-readable reason, stable for a given input.
    pub reason: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn structural(reason: impl Into<String>) -> Self {
        Self::new(RejectionKind::Structural, reason)
    }

    #[must_use]
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::new(RejectionKind::Precondition, reason)
    }

    #[must_use]
    pub fn signature(reason: impl Into<String>) -> Self {
        Self::new(RejectionKind::Signature, reason)
    }

    #[must_use]
    pub fn contract_state(reason: impl Into<String>) -> Self {
        Self::new(RejectionKind::ContractState, reason)
    }
}

/// Failure to produce or parse canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Canonical encoding failed: {0}")]
    Encode(String),

    #[error("Canonical decoding failed: {0}")]
    Decode(String),

    #[error("Invalid hex: {0}")]
    Hex(String),
}

impl From<CodecError> for Rejection {
    fn from(err: CodecError) -> Self {
        Rejection::structural(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_display_includes_kind() {
        let r = Rejection::precondition("Insufficient balance");
        assert_eq!(r.to_string(), "precondition: Insufficient balance");
        assert_eq!(r.kind, RejectionKind::Precondition);
    }

    #[test]
    fn test_codec_error_maps_to_structural() {
        let r: Rejection = CodecError::Hex("zz".into()).into();
        assert_eq!(r.kind, RejectionKind::Structural);
    }
}
