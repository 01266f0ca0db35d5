//! Encumber, release, exercise and holding locks.

use le_02_ledger_state::{EncumbranceDetail, RuleError, RuleResult, StateError, StateSnapshot};
use ledger_types::{is_reserved_reference, AssetId, Balance, EncumbranceParty, ISSUER_LOCK};
use tracing::{debug, info};

/// Parameters of [`encumber`].
#[derive(Debug, Clone)]
pub struct EncumberRequest<'a> {
    /// The address whose balance is reserved.
    pub address: &'a str,
    pub asset: &'a AssetId,
    pub reference: &'a str,
    pub amount: Balance,
    pub administrators: &'a [EncumbranceParty],
    pub beneficiaries: &'a [EncumbranceParty],
    pub cumulative: bool,
    pub now: i64,
}

/// Parameters of [`unencumber`].
#[derive(Debug, Clone)]
pub struct UnencumberRequest<'a> {
    pub address: &'a str,
    pub asset: &'a AssetId,
    pub reference: &'a str,
    pub amount: Balance,
    /// The address asking for the release.
    pub acting: &'a str,
    pub now: i64,
}

/// Parameters of [`exercise`].
#[derive(Debug, Clone)]
pub struct ExerciseRequest<'a> {
    pub address: &'a str,
    pub asset: &'a AssetId,
    pub reference: &'a str,
    pub amount: Balance,
    /// Must be a valid beneficiary at `now`.
    pub acting: &'a str,
    pub destination: &'a str,
    pub now: i64,
}

pub(crate) fn require_positive(amount: Balance, what: &str) -> RuleResult<()> {
    if amount <= 0 {
        return Err(RuleError::structural(format!(
            "{what} must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn require_reference(snapshot: &StateSnapshot<'_>, reference: &str) -> RuleResult<()> {
    let limit = snapshot.config().max_reference_length;
    if reference.is_empty() || reference.len() > limit {
        return Err(RuleError::structural(format!(
            "Encumbrance reference must be 1..={limit} characters"
        )));
    }
    Ok(())
}

fn overflow(address: &str, asset: &AssetId) -> StateError {
    StateError::BalanceOverflow {
        address: address.to_string(),
        asset: asset.full_id(),
    }
}

/// Whether `address` can pay `amount` out of a reference of the given kind.
///
/// A non-cumulative reference is already reserved out of the balance, so the
/// balance alone must cover it. A cumulative one reserved nothing and pays
/// out of spendable balance. Issuers are never short.
pub(crate) fn reference_funds(
    snapshot: &StateSnapshot<'_>,
    address: &str,
    asset: &AssetId,
    amount: Balance,
    cumulative: bool,
) -> bool {
    if snapshot.is_issuer(address, asset) {
        return true;
    }
    if cumulative {
        snapshot.spendable(address, asset) >= amount
    } else {
        snapshot.balance_of(address, asset) >= amount
    }
}

/// Create a reference sub-ledger, or add to an existing cumulative one.
pub fn encumber(snapshot: &mut StateSnapshot<'_>, req: EncumberRequest<'_>) -> RuleResult<()> {
    require_positive(req.amount, "Encumbrance amount")?;
    require_reference(snapshot, req.reference)?;
    if is_reserved_reference(req.reference) {
        return Err(RuleError::structural(format!(
            "Encumbrance reference {} is reserved",
            req.reference
        )));
    }
    if snapshot.address(req.address).is_none() {
        return Err(RuleError::precondition(format!(
            "Unknown address {}",
            req.address
        )));
    }

    let existing = snapshot
        .encumbrances(req.address)
        .and_then(|e| e.find(req.asset, req.reference));
    if let Some(existing) = existing {
        if !(req.cumulative && existing.cumulative) {
            return Err(RuleError::precondition(format!(
                "Encumbrance reference {} already in use on {} for {}",
                req.reference, req.address, req.asset
            )));
        }
        if !existing.same_parties(req.administrators, req.beneficiaries) {
            return Err(RuleError::precondition(format!(
                "Encumbrance {} exists with different administrators or beneficiaries",
                req.reference
            )));
        }
    }

    if !req.cumulative {
        let balance = snapshot.balance_of(req.address, req.asset);
        let reserved = snapshot.reserved_of(req.address, req.asset);
        let needed = reserved
            .checked_add(req.amount)
            .ok_or_else(|| overflow(req.address, req.asset))?;
        if needed > balance {
            return Err(RuleError::precondition(format!(
                "Insufficient balance to encumber {} of {}: balance {balance}, already reserved {reserved}",
                req.amount, req.asset
            )));
        }
    }

    let entry = snapshot.encumbrances_mut(req.address)?;
    match entry.find_mut(req.asset, req.reference) {
        Some(detail) => {
            detail.amount = detail
                .amount
                .checked_add(req.amount)
                .ok_or_else(|| overflow(req.address, req.asset))?;
        }
        None => entry.push(
            req.asset,
            EncumbranceDetail {
                reference: req.reference.to_string(),
                amount: req.amount,
                cumulative: req.cumulative,
                created_at: req.now,
                administrators: req.administrators.to_vec(),
                beneficiaries: req.beneficiaries.to_vec(),
            },
            false,
        ),
    }

    info!(
        address = %req.address,
        asset = %req.asset,
        reference = %req.reference,
        amount = %req.amount,
        cumulative = req.cumulative,
        "encumbrance added"
    );
    Ok(())
}

/// Reduce or remove a reference on behalf of an entitled party.
pub fn unencumber(snapshot: &mut StateSnapshot<'_>, req: UnencumberRequest<'_>) -> RuleResult<()> {
    require_positive(req.amount, "Release amount")?;
    if is_reserved_reference(req.reference) {
        return Err(RuleError::precondition(format!(
            "{} can only be released by an unlock",
            req.reference
        )));
    }
    let detail = snapshot
        .encumbrances(req.address)
        .and_then(|e| e.find(req.asset, req.reference))
        .ok_or_else(|| {
            RuleError::precondition(format!(
                "No encumbrance {} on {} for {}",
                req.reference, req.address, req.asset
            ))
        })?;

    let owner_release = req.acting.eq_ignore_ascii_case(req.address)
        && detail.administrators.is_empty()
        && snapshot.config().allow_owner_release;
    let may_release = detail.is_administrator(req.acting, req.now)
        || detail.is_beneficiary(req.acting, req.now)
        || detail.has_expired(req.now)
        || owner_release;
    if !may_release {
        return Err(RuleError::precondition(format!(
            "{} may not release encumbrance {}",
            req.acting, req.reference
        )));
    }
    if req.amount > detail.amount {
        return Err(RuleError::precondition(format!(
            "Release of {} exceeds encumbered {}",
            req.amount, detail.amount
        )));
    }

    snapshot
        .encumbrances_mut(req.address)?
        .reduce(req.asset, req.reference, req.amount)?;
    snapshot.tidy_encumbrances(req.address)?;

    info!(
        address = %req.address,
        reference = %req.reference,
        amount = %req.amount,
        by = %req.acting,
        "encumbrance released"
    );
    Ok(())
}

/// Pay out of a reference to `destination` on a beneficiary's instruction.
pub fn exercise(snapshot: &mut StateSnapshot<'_>, req: ExerciseRequest<'_>) -> RuleResult<()> {
    require_positive(req.amount, "Exercise amount")?;
    let detail = snapshot
        .encumbrances(req.address)
        .and_then(|e| e.find(req.asset, req.reference))
        .ok_or_else(|| {
            RuleError::precondition(format!(
                "No encumbrance {} on {} for {}",
                req.reference, req.address, req.asset
            ))
        })?;

    if !detail.is_beneficiary(req.acting, req.now) {
        return Err(RuleError::precondition(format!(
            "{} is not a current beneficiary of {}",
            req.acting, req.reference
        )));
    }
    if detail.amount < req.amount {
        return Err(RuleError::precondition(format!(
            "Encumbrance {} holds {}, exercise requires {}",
            req.reference, detail.amount, req.amount
        )));
    }
    let cumulative = detail.cumulative;
    if !reference_funds(snapshot, req.address, req.asset, req.amount, cumulative) {
        return Err(RuleError::precondition(format!(
            "Insufficient balance at {} to exercise {}",
            req.address, req.reference
        )));
    }

    snapshot.move_asset(req.address, req.destination, req.asset, req.amount)?;
    snapshot
        .encumbrances_mut(req.address)?
        .reduce(req.asset, req.reference, req.amount)?;
    snapshot.tidy_encumbrances(req.address)?;

    info!(
        address = %req.address,
        reference = %req.reference,
        amount = %req.amount,
        destination = %req.destination,
        "encumbrance exercised"
    );
    Ok(())
}

/// Freeze part of a holder's balance. Only the namespace owner may lock.
///
/// Locks share the reserved `ISSUER_LOCK` reference and sit ahead of every
/// other encumbrance. They are cumulative, so they may exceed the balance
/// and never count toward the reserved total, but they freeze spendable
/// balance.
pub fn lock_holding(
    snapshot: &mut StateSnapshot<'_>,
    owner: &str,
    holder: &str,
    asset: &AssetId,
    amount: Balance,
    now: i64,
) -> RuleResult<()> {
    require_positive(amount, "Lock amount")?;
    if !snapshot.is_issuer(owner, asset) {
        return Err(RuleError::precondition(format!(
            "Only the owner of {} may lock holdings",
            asset.namespace
        )));
    }
    if snapshot.address(holder).is_none() {
        return Err(RuleError::precondition(format!("Unknown address {holder}")));
    }

    let entry = snapshot.encumbrances_mut(holder)?;
    match entry.find_mut(asset, ISSUER_LOCK) {
        Some(lock) => {
            lock.amount = lock
                .amount
                .checked_add(amount)
                .ok_or_else(|| overflow(holder, asset))?;
        }
        None => entry.push(
            asset,
            EncumbranceDetail {
                reference: ISSUER_LOCK.to_string(),
                amount,
                cumulative: true,
                created_at: now,
                administrators: vec![EncumbranceParty::open(owner)],
                beneficiaries: Vec::new(),
            },
            true,
        ),
    }
    debug!(%holder, %asset, %amount, "holding locked");
    Ok(())
}

/// Reduce or lift a holding lock.
pub fn unlock_holding(
    snapshot: &mut StateSnapshot<'_>,
    owner: &str,
    holder: &str,
    asset: &AssetId,
    amount: Balance,
) -> RuleResult<()> {
    require_positive(amount, "Unlock amount")?;
    if !snapshot.is_issuer(owner, asset) {
        return Err(RuleError::precondition(format!(
            "Only the owner of {} may unlock holdings",
            asset.namespace
        )));
    }
    let locked = snapshot
        .encumbrances(holder)
        .and_then(|e| e.find(asset, ISSUER_LOCK))
        .map(|d| d.amount)
        .ok_or_else(|| RuleError::precondition(format!("No holding lock on {holder} for {asset}")))?;
    if amount > locked {
        return Err(RuleError::precondition(format!(
            "Unlock of {amount} exceeds locked {locked}"
        )));
    }

    snapshot
        .encumbrances_mut(holder)?
        .reduce(asset, ISSUER_LOCK, amount)?;
    snapshot.tidy_encumbrances(holder)?;
    debug!(%holder, %asset, %amount, "holding unlocked");
    Ok(())
}
