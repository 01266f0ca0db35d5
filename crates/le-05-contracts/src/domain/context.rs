//! Per-transaction context and helpers shared by the contract families.

use le_01_signature::SignatureVerifier;
use le_02_ledger_state::{
    ContractEntry, EffectiveTx, RuleError, RuleResult, StateError, StateSnapshot,
};
use ledger_types::{AssetId, Balance};

/// What a contract operation knows about the transaction driving it.
#[derive(Clone, Copy)]
pub struct ContractContext<'a> {
    pub verifier: &'a dyn SignatureVerifier,
    pub chain_id: u32,
    /// The address the transaction acts for (the principal under POA).
    pub author: &'a str,
    /// The envelope sender (the attorney under POA).
    pub submitter: &'a str,
    pub nonce: u64,
    pub now: i64,
}

impl<'a> ContractContext<'a> {
    pub fn is_poa(&self) -> bool {
        !self.author.eq_ignore_ascii_case(self.submitter)
    }
}

impl std::fmt::Debug for ContractContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractContext")
            .field("chain_id", &self.chain_id)
            .field("author", &self.author)
            .field("submitter", &self.submitter)
            .field("nonce", &self.nonce)
            .field("now", &self.now)
            .finish()
    }
}

/// Verify `signature` by a key belonging to one of `expected`.
pub(crate) fn check_signature(
    verifier: &dyn SignatureVerifier,
    message: &[u8],
    public_key: &str,
    signature: &str,
    expected: &[&str],
    what: &str,
) -> RuleResult<()> {
    let derived = verifier
        .address_of(public_key)
        .ok_or_else(|| RuleError::signature(format!("Invalid public key for {what}")))?;
    if !expected.iter().any(|e| e.eq_ignore_ascii_case(&derived)) {
        return Err(RuleError::signature(format!(
            "Public key for {what} does not belong to {}",
            expected.first().copied().unwrap_or("the expected signer")
        )));
    }
    if !verifier.verify(message, public_key, signature) {
        return Err(RuleError::signature(format!("Bad signature for {what}")));
    }
    Ok(())
}

/// Run `f` against a child snapshot, merging only on success.
pub(crate) fn atomically<T>(
    snapshot: &mut StateSnapshot<'_>,
    f: impl FnOnce(&mut StateSnapshot<'_>) -> RuleResult<T>,
) -> RuleResult<T> {
    let mut child = snapshot.create_snapshot();
    let value = f(&mut child)?;
    let changes = child.into_changes();
    snapshot.merge(changes)?;
    Ok(value)
}

/// Reject unless the asset's namespace and class are registered.
pub(crate) fn require_asset(snapshot: &StateSnapshot<'_>, asset: &AssetId) -> RuleResult<()> {
    let known = snapshot
        .namespace(&asset.namespace)
        .map(|ns| ns.has_class(&asset.class))
        .unwrap_or(false);
    if !known {
        return Err(RuleError::precondition(format!("Unknown asset {asset}")));
    }
    Ok(())
}

pub(crate) fn require_address(address: &str, what: &str) -> RuleResult<()> {
    if !ledger_types::codec::is_valid_address(address) {
        return Err(RuleError::structural(format!(
            "Invalid {what} address `{address}`"
        )));
    }
    Ok(())
}

/// A stored contract that can still accept commits.
pub(crate) fn open_contract(snapshot: &StateSnapshot<'_>, address: &str) -> RuleResult<ContractEntry> {
    let entry = snapshot.contract(address).ok_or_else(|| {
        RuleError::contract_state(format!("Contract {address} does not exist"))
    })?;
    if entry.status.is_final() {
        return Err(RuleError::contract_state(format!(
            "Contract {address} is already {:?}",
            entry.status
        )));
    }
    Ok(entry.clone())
}

/// Write back a contract previously read with [`open_contract`].
pub(crate) fn store_contract(
    snapshot: &mut StateSnapshot<'_>,
    entry: ContractEntry,
) -> Result<(), StateError> {
    let address = entry.address.clone();
    let slot = snapshot
        .find_and_mark_updated::<ContractEntry>(&address)
        .ok_or(StateError::MissingEntry {
            set: "contracts",
            key: address,
        })?;
    *slot = entry;
    Ok(())
}

/// Move `amount` out of free balance on behalf of a contract and record it.
pub(crate) fn settle_move(
    snapshot: &mut StateSnapshot<'_>,
    contract: &str,
    from: &str,
    to: &str,
    asset: &AssetId,
    amount: Balance,
) -> RuleResult<()> {
    snapshot.require_spendable(from, asset, amount)?;
    snapshot.move_asset(from, to, asset, amount)?;
    snapshot.record(EffectiveTx::Settlement {
        contract: contract.to_string(),
        from: from.to_ascii_lowercase(),
        to: to.to_ascii_lowercase(),
        asset: asset.clone(),
        amount,
    });
    Ok(())
}
