//! # Nominate
//!
//! Converts units of one class into another class of the same namespace at a
//! fixed block ratio. Input goes back to the issuer; output is minted when the
//! issuer owns the namespace and paid from its balance otherwise.

use crate::domain::context::{
    atomically, check_signature, open_contract, require_address, require_asset, settle_move,
    ContractContext,
};
use le_02_ledger_state::{ContractEntry, RuleError, RuleResult, StateSnapshot};
use ledger_types::{signing, Balance, ContractData, NominateCommit, NominateContract};
use tracing::info;

fn as_nominate(entry: &ContractEntry) -> RuleResult<NominateContract> {
    match &entry.data {
        ContractData::Nominate(n) => Ok(n.clone()),
        other => Err(RuleError::structural(format!(
            "Contract {} is a {} contract, not nominate",
            entry.address,
            other.family()
        ))),
    }
}

/// Validate a new Nominate contract and build its entry.
pub fn create(
    snapshot: &StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    n: NominateContract,
    address: &str,
) -> RuleResult<ContractEntry> {
    if n.input_block <= 0 || n.output_block <= 0 {
        return Err(RuleError::structural("Nominate block sizes must be positive"));
    }
    if n.input_class == n.output_class {
        return Err(RuleError::structural("Nominate input and output classes are the same"));
    }
    if n.metadata.len() > snapshot.config().max_metadata_length {
        return Err(RuleError::structural("Contract metadata too long"));
    }
    if n.expiry < ctx.now {
        return Err(RuleError::precondition("Contract expiry is in the past"));
    }
    let output = n.output_asset();
    require_asset(snapshot, &n.input_asset())?;
    require_asset(snapshot, &output)?;
    if !snapshot.is_issuer(ctx.author, &output) && snapshot.balance_of(ctx.author, &output) <= 0 {
        return Err(RuleError::precondition(format!(
            "{} can neither issue nor supply {output}",
            ctx.author
        )));
    }

    let expiry = n.expiry;
    let mut entry = ContractEntry::new(address, ctx.author, ContractData::Nominate(n), ctx.now);
    entry.next_time_event = Some(expiry.saturating_add(1));
    Ok(entry)
}

/// Convert every input of one commit. Returns the output units delivered.
pub fn commit(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    commit: &NominateCommit,
) -> RuleResult<Balance> {
    let entry = open_contract(snapshot, &commit.contract)?;
    let n = as_nominate(&entry)?;
    if ctx.now > n.expiry {
        return Err(RuleError::contract_state(format!(
            "Nominate {} expired at {}",
            entry.address, n.expiry
        )));
    }
    if commit.inputs.is_empty() {
        return Err(RuleError::structural("Nominate commit has no inputs"));
    }

    let mut clients = Vec::with_capacity(commit.inputs.len());
    for input in &commit.inputs {
        let client = match &input.address {
            Some(address) if !address.eq_ignore_ascii_case(ctx.author) => {
                require_address(address, "nominate input")?;
                let (Some(key), Some(signature)) = (&input.public_key, &input.signature) else {
                    return Err(RuleError::signature(format!(
                        "Input from {address} is not signed"
                    )));
                };
                let message =
                    signing::nominate_input_message(&entry.address, ctx.submitter, ctx.nonce)?;
                check_signature(ctx.verifier, &message, key, signature, &[address], "nominate input")?;
                address.to_ascii_lowercase()
            }
            _ => ctx.author.to_ascii_lowercase(),
        };
        let blocks = input.amount / n.input_block;
        if input.amount <= 0 || blocks < 1 {
            return Err(RuleError::precondition(format!(
                "Input of {} is less than one block of {}",
                input.amount, n.input_block
            )));
        }
        clients.push((client, blocks));
    }

    let input_asset = n.input_asset();
    let output_asset = n.output_asset();
    let delivered = atomically(snapshot, |snapshot| {
        let mut delivered: Balance = 0;
        for (client, blocks) in &clients {
            let taken = blocks * n.input_block;
            let given = blocks.checked_mul(n.output_block).ok_or_else(|| {
                RuleError::precondition("Nominate output overflows")
            })?;
            settle_move(snapshot, &entry.address, client, &entry.issuer, &input_asset, taken)?;
            settle_move(snapshot, &entry.address, &entry.issuer, client, &output_asset, given)?;
            delivered = delivered.saturating_add(given);
        }
        Ok(delivered)
    })?;

    info!(contract = %entry.address, inputs = clients.len(), delivered, "nominate committed");
    Ok(delivered)
}
