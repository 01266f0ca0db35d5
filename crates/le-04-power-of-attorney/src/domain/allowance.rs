//! Matching a demand against a grant and consuming its ceiling.

use crate::domain::demand::PoaDemand;
use le_02_ledger_state::{
    PoaEntry, PoaGrant, PoaZeroCeiling, RuleError, RuleResult, StateError, StateSnapshot,
};
use ledger_types::{wildcard_match, PoaItem};
use tracing::debug;

fn whitelists(item: &PoaItem, assets: &[String]) -> bool {
    assets
        .iter()
        .all(|asset| item.assets.iter().any(|pattern| wildcard_match(pattern, asset)))
}

/// Index of the first item able to serve `demand`.
fn matching_item(grant: &PoaGrant, demand: &PoaDemand, policy: PoaZeroCeiling) -> Option<usize> {
    grant.items.iter().position(|item| {
        item.tx_type.effective() == demand.tx_type
            && whitelists(item, &demand.assets)
            && match (item.ceiling, policy) {
                (0, PoaZeroCeiling::AllowList) => true,
                (0, PoaZeroCeiling::Exhausted) => false,
                (ceiling, _) => ceiling >= demand.amount,
            }
    })
}

fn live_grant<'s>(
    snapshot: &'s StateSnapshot<'_>,
    principal: &str,
    reference: &str,
    attorney: &str,
    now: i64,
) -> RuleResult<&'s PoaGrant> {
    let grant = snapshot
        .poa(principal)
        .and_then(|e| e.grants.get(reference))
        .ok_or_else(|| {
            RuleError::precondition(format!(
                "No power of attorney {reference} granted by {principal}"
            ))
        })?;
    if !grant.attorney.eq_ignore_ascii_case(attorney) {
        return Err(RuleError::precondition(format!(
            "Power of attorney {reference} is not granted to {attorney}"
        )));
    }
    if !grant.is_live(now) {
        return Err(RuleError::precondition(format!(
            "Power of attorney {reference} is not valid at {now}"
        )));
    }
    Ok(grant)
}

/// Check that the grant covers `demand` without consuming anything.
pub fn authorise(
    snapshot: &StateSnapshot<'_>,
    principal: &str,
    reference: &str,
    attorney: &str,
    demand: &PoaDemand,
    now: i64,
) -> RuleResult<()> {
    let grant = live_grant(snapshot, principal, reference, attorney, now)?;
    matching_item(grant, demand, snapshot.config().poa_zero_ceiling)
        .map(|_| ())
        .ok_or_else(|| {
            RuleError::precondition(format!(
                "Power of attorney {reference} does not allow {} of {} over {:?}",
                demand.tx_type, demand.amount, demand.assets
            ))
        })
}

/// Check the grant and draw `demand.amount` from the matching item.
///
/// Zero-ceiling allow-list items are never drawn on.
pub fn consume(
    snapshot: &mut StateSnapshot<'_>,
    principal: &str,
    reference: &str,
    attorney: &str,
    demand: &PoaDemand,
    now: i64,
) -> RuleResult<()> {
    authorise(snapshot, principal, reference, attorney, demand, now)?;
    let policy = snapshot.config().poa_zero_ceiling;
    let missing = || StateError::MissingEntry {
        set: "poas",
        key: principal.to_string(),
    };

    let index = snapshot
        .poa(principal)
        .and_then(|e| e.grants.get(reference))
        .and_then(|g| matching_item(g, demand, policy))
        .ok_or_else(missing)?;
    if snapshot
        .poa(principal)
        .and_then(|e| e.grants.get(reference))
        .map(|g| g.items[index].ceiling == 0)
        .unwrap_or(false)
    {
        debug!(%principal, %reference, "allow-list item matched");
        return Ok(());
    }

    let entry = snapshot
        .find_and_mark_updated::<PoaEntry>(principal)
        .ok_or_else(missing)?;
    let grant = entry.grants.get_mut(reference).ok_or_else(missing)?;
    let item = &mut grant.items[index];
    item.ceiling -= demand.amount;
    let remaining = item.ceiling;
    if remaining == 0 {
        grant.items.remove(index);
    }
    if grant.items.is_empty() {
        entry.grants.remove(reference);
    }
    let entry_empty = entry.grants.is_empty();
    if entry_empty {
        snapshot.remove::<PoaEntry>(principal)?;
    }

    debug!(
        %principal,
        %reference,
        consumed = %demand.amount,
        %remaining,
        "power of attorney consumed"
    );
    Ok(())
}
