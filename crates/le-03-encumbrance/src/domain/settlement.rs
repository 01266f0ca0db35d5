//! Encumbrance hooks used by contract settlement.
//!
//! A contract payment may name an encumbrance on the payer instead of
//! carrying the payer's signature. The reference funds the payment when it
//! holds enough and the contract (or its issuer) is one of its parties.

use crate::domain::engine::{reference_funds, require_positive};
use le_02_ledger_state::{EncumbranceDetail, RuleError, RuleResult, StateError, StateSnapshot};
use ledger_types::{AssetId, Balance};
use tracing::debug;

/// The reference on `payer` that can back a payment of `amount`, if any.
///
/// `authorities` are the addresses the reference must name as a current
/// administrator or beneficiary, typically the contract and its issuer.
pub fn covering_reference<'s>(
    snapshot: &'s StateSnapshot<'_>,
    payer: &str,
    asset: &AssetId,
    reference: &str,
    amount: Balance,
    authorities: &[&str],
    now: i64,
) -> Option<&'s EncumbranceDetail> {
    let detail = snapshot.encumbrances(payer)?.find(asset, reference)?;
    let authorised = authorities
        .iter()
        .any(|a| detail.is_beneficiary(a, now) || detail.is_administrator(a, now));
    (authorised && detail.amount >= amount).then_some(detail)
}

/// Whether the payer's balance can honour a payment out of the reference.
pub fn reference_can_pay(
    snapshot: &StateSnapshot<'_>,
    payer: &str,
    asset: &AssetId,
    reference: &str,
    amount: Balance,
) -> bool {
    snapshot
        .encumbrances(payer)
        .and_then(|e| e.find(asset, reference))
        .map(|d| d.amount >= amount && reference_funds(snapshot, payer, asset, amount, d.cumulative))
        .unwrap_or(false)
}

/// Consume `amount` of a reference after the caller moved the balance.
pub fn draw_down(
    snapshot: &mut StateSnapshot<'_>,
    payer: &str,
    asset: &AssetId,
    reference: &str,
    amount: Balance,
) -> RuleResult<()> {
    require_positive(amount, "Drawn amount")?;
    let held = snapshot
        .encumbrances(payer)
        .and_then(|e| e.find(asset, reference))
        .map(|d| d.amount)
        .unwrap_or(0);
    if held < amount {
        return Err(RuleError::precondition(format!(
            "Encumbrance {reference} on {payer} holds {held}, payment needs {amount}"
        )));
    }
    snapshot
        .encumbrances_mut(payer)?
        .reduce(asset, reference, amount)?;
    snapshot.tidy_encumbrances(payer)?;
    debug!(%payer, %asset, %reference, %amount, "encumbrance drawn");
    Ok(())
}

/// Remove a reference outright. Returns whether anything was removed.
pub fn release_reference(
    snapshot: &mut StateSnapshot<'_>,
    address: &str,
    asset: &AssetId,
    reference: &str,
) -> Result<bool, StateError> {
    let held = snapshot
        .encumbrances(address)
        .and_then(|e| e.find(asset, reference))
        .map(|d| d.amount);
    let Some(held) = held else {
        return Ok(false);
    };
    snapshot
        .encumbrances_mut(address)?
        .reduce(asset, reference, held)?;
    snapshot.tidy_encumbrances(address)?;
    debug!(%address, %asset, %reference, "encumbrance removed");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::{encumber, EncumberRequest};
    use le_02_ledger_state::{AddressEntry, LedgerState, StateConfig};
    use ledger_types::EncumbranceParty;

    const ALICE: &str = "0x2000000000000000000000000000000000000002";
    const CONTRACT: &str = "0x9000000000000000000000000000000000000009";
    const ISSUER: &str = "0x1000000000000000000000000000000000000001";

    fn asset() -> AssetId {
        AssetId::new("NS", "C")
    }

    fn state_with_encumbrance(beneficiary: &str) -> LedgerState {
        let mut state = LedgerState::new(StateConfig::default());
        state
            .genesis()
            .insert(AddressEntry::new(ALICE).with_balance(&asset(), 500))
            .unwrap();
        let mut snap = state.snapshot();
        let a = asset();
        let bens = [EncumbranceParty::open(beneficiary)];
        encumber(
            &mut snap,
            EncumberRequest {
                address: ALICE,
                asset: &a,
                reference: "dvp-1",
                amount: 300,
                administrators: &[],
                beneficiaries: &bens,
                cumulative: false,
                now: 0,
            },
        )
        .unwrap();
        let changes = snap.into_changes();
        state.commit(changes).unwrap();
        state
    }

    // ===== COVER TESTS =====

    #[test]
    fn test_cover_requires_authority_and_amount() {
        let state = state_with_encumbrance(CONTRACT);
        let snap = state.snapshot();
        let a = asset();
        assert!(covering_reference(&snap, ALICE, &a, "dvp-1", 300, &[CONTRACT], 10).is_some());
        assert!(covering_reference(&snap, ALICE, &a, "dvp-1", 301, &[CONTRACT], 10).is_none());
        assert!(covering_reference(&snap, ALICE, &a, "dvp-1", 1, &[ISSUER], 10).is_none());
        assert!(covering_reference(&snap, ALICE, &a, "other", 1, &[CONTRACT], 10).is_none());
    }

    #[test]
    fn test_issuer_authority_is_accepted() {
        let state = state_with_encumbrance(ISSUER);
        let snap = state.snapshot();
        assert!(covering_reference(&snap, ALICE, &asset(), "dvp-1", 10, &[CONTRACT, ISSUER], 10).is_some());
        assert!(reference_can_pay(&snap, ALICE, &asset(), "dvp-1", 300));
        assert!(!reference_can_pay(&snap, ALICE, &asset(), "dvp-1", 301));
    }

    // ===== DRAW TESTS =====

    #[test]
    fn test_draw_down_and_release() {
        let state = state_with_encumbrance(CONTRACT);
        let mut snap = state.snapshot();
        let a = asset();
        draw_down(&mut snap, ALICE, &a, "dvp-1", 100).unwrap();
        assert_eq!(snap.reserved_of(ALICE, &a), 200);
        assert!(draw_down(&mut snap, ALICE, &a, "dvp-1", 201).is_err());

        assert!(release_reference(&mut snap, ALICE, &a, "dvp-1").unwrap());
        assert!(!release_reference(&mut snap, ALICE, &a, "dvp-1").unwrap());
        assert!(snap.encumbrances(ALICE).is_none());
        // The committed root still holds the original reservation.
        assert_eq!(state.view().reserved_of(ALICE, &a), 300);
    }
}
