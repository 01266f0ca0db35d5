//! Signature payloads.
//!
//! The exact bytes each signer signs. Creation tooling and the settlement
//! engine both build messages here so they cannot drift apart.

use crate::codec::{self, signing_payload};
use crate::entities::{AssetId, Balance};
use crate::errors::CodecError;

/// Party-level approval of a DVP contract.
pub fn party_message(contract: &str) -> Result<Vec<u8>, CodecError> {
    signing_payload("dvp-party", &contract.to_ascii_lowercase())
}

/// Approval of one pay item.
pub fn payment_message(
    contract: &str,
    party_id: &str,
    index: u32,
    asset: &AssetId,
    amount: &str,
) -> Result<Vec<u8>, CodecError> {
    signing_payload(
        "dvp-payment",
        &(contract.to_ascii_lowercase(), party_id, index, asset, amount),
    )
}

/// Parameter values are deliberately not bound to a contract address.
pub fn parameter_message(name: &str, value: Balance) -> Result<Vec<u8>, CodecError> {
    signing_payload("dvp-parameter", &(name, value))
}

pub fn authorisation_message(contract: &str, id: &str, refused: bool) -> Result<Vec<u8>, CodecError> {
    signing_payload(
        "dvp-authorisation",
        &(contract.to_ascii_lowercase(), id, refused),
    )
}

pub fn add_encumbrance_message(
    contract: &str,
    index: u32,
    reference: &str,
) -> Result<Vec<u8>, CodecError> {
    signing_payload(
        "dvp-add-encumbrance",
        &(contract.to_ascii_lowercase(), index, reference),
    )
}

pub fn cancel_message(contract: &str) -> Result<Vec<u8>, CodecError> {
    signing_payload("contract-cancel", &contract.to_ascii_lowercase())
}

/// Third-party output commitment of an Exchange contract.
pub fn exchange_output_message(
    contract: &str,
    asset: &AssetId,
    block_size: Balance,
) -> Result<Vec<u8>, CodecError> {
    signing_payload(
        "exchange-output",
        &(contract.to_ascii_lowercase(), asset, block_size),
    )
}

/// Third-party delegation of a Nominate input to the committing address.
pub fn nominate_input_message(
    contract: &str,
    author: &str,
    nonce: u64,
) -> Result<Vec<u8>, CodecError> {
    signing_payload(
        "nominate-input",
        &(contract.to_ascii_lowercase(), author.to_ascii_lowercase(), nonce),
    )
}

/// Hex digest of a message, for logs.
pub fn message_digest_hex(message: &[u8]) -> String {
    codec::to_hex(&codec::keccak256(message))
}
