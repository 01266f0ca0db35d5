//! Admission checks run before any type rule.
//!
//! | Step | Check | Failure |
//! |------|-------|---------|
//! | 0 | chain id, payload shape | structural |
//! | 1 | timestamp window | precondition |
//! | 2 | public key derives the sender address | signature |
//! | 3 | sender exists, nonce matches | precondition |
//! | 4 | permission bits (when enabled), POA allowance | precondition |
//! | 5 | namespace / class not locked | precondition |
//!
//! None of these write to the snapshot.

use le_01_signature::SignatureVerifier;
use le_02_ledger_state::{AddressEntry, RuleError, RuleResult, StateConfig, StateSnapshot};
use le_04_power_of_attorney::{authorise, PoaDemand};
use ledger_types::{permissions, AssetId, Transaction, TxPayload, TxType};
use std::collections::BTreeSet;
use tracing::debug;

/// Step 0. Returns the transaction type.
pub(crate) fn structure(tx: &Transaction, config: &StateConfig) -> RuleResult<TxType> {
    if tx.chain_id != config.chain_id {
        return Err(RuleError::structural(format!(
            "Transaction is for chain {}, this ledger is chain {}",
            tx.chain_id, config.chain_id
        )));
    }
    Ok(tx.validate_structure()?)
}

/// Step 1. Non-positive timestamps are not checked.
pub(crate) fn timestamp(tx: &Transaction, block_time: i64, config: &StateConfig) -> RuleResult<()> {
    if tx.timestamp <= 0 {
        return Ok(());
    }
    let age = block_time.saturating_sub(tx.timestamp);
    if age > config.max_tx_age_secs {
        return Err(RuleError::precondition(format!(
            "Transaction timestamp {} is {age}s older than block time {block_time}",
            tx.timestamp
        )));
    }
    if -age > config.max_future_skew_secs {
        return Err(RuleError::precondition(format!(
            "Transaction timestamp {} is {}s ahead of block time {block_time}",
            tx.timestamp, -age
        )));
    }
    Ok(())
}

/// Step 2. An empty public key leaves nothing to compare.
pub(crate) fn key_matches_sender(verifier: &dyn SignatureVerifier, tx: &Transaction) -> RuleResult<()> {
    if tx.from_public_key.is_empty() {
        return Ok(());
    }
    let derived = verifier
        .address_of(&tx.from_public_key)
        .ok_or_else(|| RuleError::signature("Invalid sender public key"))?;
    if !derived.eq_ignore_ascii_case(&tx.from_address) {
        return Err(RuleError::signature(format!(
            "Public key belongs to {derived}, not {}",
            tx.from_address
        )));
    }
    Ok(())
}

/// Step 3.
pub(crate) fn nonce(snapshot: &StateSnapshot<'_>, tx: &Transaction, tx_type: TxType) -> RuleResult<()> {
    let sender = snapshot.address(&tx.from_address);
    if tx_type == TxType::RegisterAddress {
        if sender.is_some() {
            return Err(RuleError::precondition(format!(
                "Address {} is already registered",
                tx.from_address
            )));
        }
        if tx.nonce != 0 {
            return Err(RuleError::precondition(format!(
                "Registration must use nonce 0, got {}",
                tx.nonce
            )));
        }
        return Ok(());
    }
    let sender = sender.ok_or_else(|| {
        RuleError::precondition(format!("Unknown sender {}", tx.from_address))
    })?;
    if tx.nonce != sender.nonce {
        return Err(RuleError::precondition(format!(
            "Nonce {} does not match expected {} for {}",
            tx.nonce, sender.nonce, tx.from_address
        )));
    }
    Ok(())
}

fn require_may_submit(entry: Option<&AddressEntry>, address: &str, tx_type: TxType) -> RuleResult<()> {
    match entry {
        Some(entry) if entry.may_submit(tx_type) => Ok(()),
        _ => Err(RuleError::precondition(format!(
            "{address} lacks permission for {tx_type}"
        ))),
    }
}

/// Step 4, permission half. Registration is open to anyone.
pub(crate) fn permission(snapshot: &StateSnapshot<'_>, tx: &Transaction, tx_type: TxType) -> RuleResult<()> {
    if tx_type == TxType::RegisterAddress {
        return Ok(());
    }
    let sender = snapshot.address(&tx.from_address);
    if !tx_type.is_poa() {
        return require_may_submit(sender, &tx.from_address, tx_type);
    }

    let attorney_ok = sender
        .map(|e| e.has_permission(permissions::POA_EXERCISE) || e.allowed_tx_types.contains(&tx_type))
        .unwrap_or(false);
    if !attorney_ok {
        return Err(RuleError::precondition(format!(
            "{} may not act under a power of attorney",
            tx.from_address
        )));
    }
    let principal = tx.principal();
    require_may_submit(snapshot.address(principal), principal, tx_type.effective())
}

/// Step 4, allowance half: the grant must cover the transaction before the
/// rule runs. The allowance itself is drawn in the rule's nested snapshot.
pub(crate) fn allowance(
    snapshot: &StateSnapshot<'_>,
    tx: &Transaction,
    demand: &PoaDemand,
    block_time: i64,
) -> RuleResult<()> {
    let Some(poa) = &tx.poa else {
        return Ok(());
    };
    authorise(
        snapshot,
        &poa.principal,
        &poa.reference,
        &tx.from_address,
        demand,
        block_time,
    )
}

/// Assets whose lock state gates the transaction, including those of any
/// stored contract it commits to or cancels.
fn gated_assets(snapshot: &StateSnapshot<'_>, payload: &TxPayload) -> BTreeSet<AssetId> {
    let mut assets: BTreeSet<AssetId> = payload.touched_assets().into_iter().collect();
    let contracts = match payload {
        TxPayload::CommitToContract(data) => data.contracts(),
        TxPayload::CancelContract(p) => vec![p.contract.clone()],
        _ => Vec::new(),
    };
    for address in contracts {
        if let Some(entry) = snapshot.contract(&address) {
            assets.extend(entry.data.referenced_assets());
        }
    }
    assets
}

/// Step 5. Lock toggles and registrations manage locks, so they are exempt.
pub(crate) fn unlocked(snapshot: &StateSnapshot<'_>, tx: &Transaction, tx_type: TxType) -> RuleResult<()> {
    let exempt = matches!(
        tx_type.effective(),
        TxType::RegisterAddress
            | TxType::SetAddressPermissions
            | TxType::RegisterNamespace
            | TxType::RegisterAssetClass
            | TxType::LockAsset
            | TxType::UnlockAsset
            | TxType::LockHolding
            | TxType::UnlockHolding
    );
    if exempt {
        return Ok(());
    }
    for asset in gated_assets(snapshot, &tx.payload) {
        let locked = snapshot
            .namespace(&asset.namespace)
            .map(|ns| ns.is_locked(&asset.class))
            .unwrap_or(false);
        if locked {
            return Err(RuleError::precondition(format!("Asset {asset} is locked")));
        }
    }
    debug!(tx_type = %tx_type, "lock check passed");
    Ok(())
}
