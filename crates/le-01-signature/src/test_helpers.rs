//! # Test Helpers
//!
//! Key generation and signing for test suites. Enabled in downstream crates
//! through the `test-helpers` feature.

use crate::domain::secp256k1::{address_from_verifying_key, sign_message};
use k256::ecdsa::{SigningKey, VerifyingKey};

/// Generate a random keypair.
pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::random(&mut rand::thread_rng());
    let verifying_key = *signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// A keypair with its hex public key and derived address.
#[derive(Clone)]
pub struct TestAccount {
    pub signing_key: SigningKey,
    /// Compressed SEC1, hex.
    pub public_key: String,
    pub address: String,
}

impl TestAccount {
    /// A fresh random account.
    pub fn new() -> Self {
        let (signing_key, _) = generate_keypair();
        Self::from_signing_key(signing_key)
    }

    /// A reproducible account; `seed` must be non-zero.
    pub fn from_seed(seed: u8) -> Self {
        let signing_key = SigningKey::from_slice(&[seed; 32]).expect("non-zero seed is a valid scalar");
        Self::from_signing_key(signing_key)
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = *signing_key.verifying_key();
        let public_key = hex::encode(verifying_key.to_encoded_point(true).as_bytes());
        let address = address_from_verifying_key(&verifying_key);
        Self {
            signing_key,
            public_key,
            address,
        }
    }

    /// Sign `message`, returning hex `r ‖ s`.
    pub fn sign(&self, message: &[u8]) -> String {
        sign_message(message, &self.signing_key).expect("signing failed")
    }
}

impl Default for TestAccount {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TestAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestAccount")
            .field("address", &self.address)
            .finish()
    }
}
