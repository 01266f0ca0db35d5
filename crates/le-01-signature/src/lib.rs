//! # Signature Verification Subsystem (LE-01)
//!
//! Verifies detached secp256k1 signatures for the ledger engine.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): key parsing, verification, address derivation
//! - **Ports Layer** (`ports`): the `SignatureVerifier` trait the engine consumes
//!
//! ## Wire Conventions
//!
//! | Item | Encoding |
//! |------|----------|
//! | Public key | hex SEC1, compressed (33 bytes) or uncompressed (65 bytes) |
//! | Signature | hex 64 bytes `r ‖ s`, low-S only |
//! | Digest | Keccak-256 of the message bytes |
//! | Address | `0x` + last 20 bytes of Keccak-256(uncompressed key without `0x04`) |

pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use domain::errors::SignatureError;
pub use domain::secp256k1::{
    address_from_public_key, address_matches_key, parse_public_key, sign_message,
    verify_signature, Secp256k1Verifier,
};
pub use ports::SignatureVerifier;
