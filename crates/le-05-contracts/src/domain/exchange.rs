//! # Exchange
//!
//! A standing offer by the issuer: commit `n` blocks of every input asset and
//! receive `n` blocks of every output asset. Each commit settles at once; the
//! contract stays open until it expires.

use crate::domain::context::{
    atomically, check_signature, open_contract, require_address, require_asset, settle_move,
    ContractContext,
};
use le_02_ledger_state::{ContractEntry, RuleError, RuleResult, StateSnapshot};
use ledger_types::{signing, AssetId, Balance, ContractData, ExchangeCommit, ExchangeContract};
use std::collections::BTreeSet;
use tracing::info;

fn as_exchange(entry: &ContractEntry) -> RuleResult<ExchangeContract> {
    match &entry.data {
        ContractData::Exchange(x) => Ok(x.clone()),
        other => Err(RuleError::structural(format!(
            "Contract {} is a {} contract, not exchange",
            entry.address,
            other.family()
        ))),
    }
}

fn validate(
    snapshot: &StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    x: &ExchangeContract,
) -> RuleResult<()> {
    if x.inputs.is_empty() || x.outputs.is_empty() {
        return Err(RuleError::structural("Exchange needs inputs and outputs"));
    }
    if x.metadata.len() > snapshot.config().max_metadata_length {
        return Err(RuleError::structural("Contract metadata too long"));
    }
    let mut seen = BTreeSet::new();
    for input in &x.inputs {
        if input.block_size <= 0 {
            return Err(RuleError::structural(format!(
                "Input block size for {} must be positive",
                input.asset
            )));
        }
        if !seen.insert(&input.asset) {
            return Err(RuleError::structural(format!(
                "Input asset {} listed twice",
                input.asset
            )));
        }
        if let Some(address) = &input.address {
            require_address(address, "input")?;
        }
    }
    let mut seen = BTreeSet::new();
    for output in &x.outputs {
        if output.block_size <= 0 {
            return Err(RuleError::structural(format!(
                "Output block size for {} must be positive",
                output.asset
            )));
        }
        let payer = output
            .address
            .as_deref()
            .unwrap_or(ctx.author)
            .to_ascii_lowercase();
        if !seen.insert((payer, &output.asset)) {
            return Err(RuleError::structural(format!(
                "Output asset {} listed twice for one payer",
                output.asset
            )));
        }
        if let Some(address) = &output.address {
            require_address(address, "output")?;
        }
    }
    if x.min_blocks < 0 || x.max_blocks < 0 {
        return Err(RuleError::structural("Block limits must not be negative"));
    }
    if x.max_blocks > 0 && x.max_blocks < x.min_blocks {
        return Err(RuleError::structural("Maximum blocks below minimum"));
    }
    if x.start > x.expiry {
        return Err(RuleError::structural("Exchange start is after its expiry"));
    }
    if x.expiry < ctx.now {
        return Err(RuleError::precondition("Contract expiry is in the past"));
    }
    for asset in ContractData::Exchange(x.clone()).referenced_assets() {
        require_asset(snapshot, &asset)?;
    }
    Ok(())
}

/// Validate a new Exchange contract and build its entry.
pub fn create(
    snapshot: &StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    x: ExchangeContract,
    address: &str,
) -> RuleResult<ContractEntry> {
    validate(snapshot, ctx, &x)?;

    for output in &x.outputs {
        let Some(payer) = output.address.as_deref() else {
            continue;
        };
        if payer.eq_ignore_ascii_case(ctx.author) {
            continue;
        }
        let (Some(key), Some(signature)) = (&output.public_key, &output.signature) else {
            return Err(RuleError::signature(format!(
                "Output of {} by {payer} is not signed",
                output.asset
            )));
        };
        let message = signing::exchange_output_message(address, &output.asset, output.block_size)?;
        check_signature(ctx.verifier, &message, key, signature, &[payer], "exchange output")?;
    }

    let expiry = x.expiry;
    let mut entry = ContractEntry::new(address, ctx.author, ContractData::Exchange(x), ctx.now);
    entry.next_time_event = Some(expiry.saturating_add(1));
    Ok(entry)
}

/// Number of blocks the commit buys, checking every input against its
/// block size.
fn committed_blocks(x: &ExchangeContract, commit: &ExchangeCommit) -> RuleResult<Balance> {
    if commit.inputs.len() != x.inputs.len() {
        return Err(RuleError::precondition(format!(
            "Exchange needs {} inputs, commit supplied {}",
            x.inputs.len(),
            commit.inputs.len()
        )));
    }
    let mut blocks: Option<Balance> = None;
    let mut supplied: BTreeSet<&AssetId> = BTreeSet::new();
    for given in &commit.inputs {
        let input = x
            .inputs
            .iter()
            .find(|i| i.asset == given.asset)
            .ok_or_else(|| {
                RuleError::precondition(format!("{} is not an input of this exchange", given.asset))
            })?;
        if !supplied.insert(&given.asset) {
            return Err(RuleError::precondition(format!(
                "Input {} supplied twice",
                given.asset
            )));
        }
        if given.amount <= 0 || given.amount % input.block_size != 0 {
            return Err(RuleError::precondition(format!(
                "Input of {} must be a positive multiple of {}",
                given.asset, input.block_size
            )));
        }
        let n = given.amount / input.block_size;
        match blocks {
            Some(b) if b != n => {
                return Err(RuleError::precondition(
                    "Inputs do not commit the same number of blocks",
                ))
            }
            _ => blocks = Some(n),
        }
    }
    let blocks = blocks.unwrap_or(0);
    if blocks < x.min_blocks || (x.max_blocks > 0 && blocks > x.max_blocks) {
        return Err(RuleError::precondition(format!(
            "{blocks} blocks is outside [{}, {}]",
            x.min_blocks, x.max_blocks
        )));
    }
    Ok(blocks)
}

/// Settle one commit against an open Exchange contract.
pub fn commit(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    commit: &ExchangeCommit,
) -> RuleResult<Balance> {
    let entry = open_contract(snapshot, &commit.contract)?;
    let x = as_exchange(&entry)?;
    if ctx.now < x.start || ctx.now > x.expiry {
        return Err(RuleError::contract_state(format!(
            "Exchange {} is not open at {}",
            entry.address, ctx.now
        )));
    }
    let committer = ctx.author.to_ascii_lowercase();
    if let Some(input) = x
        .inputs
        .iter()
        .find(|i| i.address.as_deref().is_some_and(|a| !a.eq_ignore_ascii_case(&committer)))
    {
        return Err(RuleError::precondition(format!(
            "Input {} is reserved for another address",
            input.asset
        )));
    }
    let blocks = committed_blocks(&x, commit)?;
    let destination = match &commit.destination {
        Some(d) => {
            require_address(d, "destination")?;
            d.to_ascii_lowercase()
        }
        None => committer.clone(),
    };

    atomically(snapshot, |snapshot| {
        for given in &commit.inputs {
            settle_move(snapshot, &entry.address, &committer, &entry.issuer, &given.asset, given.amount)?;
        }
        for output in &x.outputs {
            let amount = output.block_size.checked_mul(blocks).ok_or_else(|| {
                RuleError::precondition(format!("Output of {} overflows", output.asset))
            })?;
            let payer = output
                .address
                .as_deref()
                .unwrap_or(&entry.issuer)
                .to_ascii_lowercase();
            settle_move(snapshot, &entry.address, &payer, &destination, &output.asset, amount)?;
        }
        Ok(())
    })?;

    info!(contract = %entry.address, %committer, blocks, "exchange committed");
    Ok(blocks)
}
