//! Grant and revoke.

use le_02_ledger_state::{PoaEntry, PoaGrant, RuleError, RuleResult, StateError, StateSnapshot};
use ledger_types::PoaItem;
use tracing::{debug, info};

/// Parameters of [`grant`].
#[derive(Debug, Clone)]
pub struct GrantRequest<'a> {
    pub principal: &'a str,
    pub reference: &'a str,
    pub attorney: &'a str,
    pub start: i64,
    pub expiry: i64,
    pub items: &'a [PoaItem],
    pub now: i64,
}

/// Create or supersede the grant stored under (principal, reference).
pub fn grant(snapshot: &mut StateSnapshot<'_>, req: GrantRequest<'_>) -> RuleResult<()> {
    let limit = snapshot.config().max_reference_length;
    if req.reference.is_empty() || req.reference.len() > limit {
        return Err(RuleError::structural(format!(
            "POA reference must be 1..={limit} characters"
        )));
    }
    if req.start > req.expiry {
        return Err(RuleError::structural("POA start is after its expiry"));
    }
    if req.expiry < req.now {
        return Err(RuleError::precondition(format!(
            "POA expiry {} is in the past",
            req.expiry
        )));
    }
    if req.attorney.eq_ignore_ascii_case(req.principal) {
        return Err(RuleError::precondition("An address cannot be its own attorney"));
    }
    if req.items.iter().any(|i| i.tx_type.poa_variant().is_none()) {
        return Err(RuleError::structural(
            "POA item names a transaction type that cannot be delegated",
        ));
    }

    prune_expired(snapshot, req.principal, req.now)?;
    let entry = snapshot.find_or_create::<PoaEntry>(req.principal, || PoaEntry::new(req.principal))?;
    let superseded = entry
        .grants
        .insert(
            req.reference.to_string(),
            PoaGrant {
                attorney: req.attorney.to_ascii_lowercase(),
                start: req.start,
                expiry: req.expiry,
                items: req.items.to_vec(),
            },
        )
        .is_some();

    info!(
        principal = %req.principal,
        reference = %req.reference,
        attorney = %req.attorney,
        items = req.items.len(),
        superseded,
        "power of attorney granted"
    );
    Ok(())
}

/// Delete the grant stored under (principal, reference).
pub fn revoke(snapshot: &mut StateSnapshot<'_>, principal: &str, reference: &str) -> RuleResult<()> {
    let held = snapshot
        .poa(principal)
        .map(|e| e.grants.contains_key(reference))
        .unwrap_or(false);
    if !held {
        return Err(RuleError::precondition(format!(
            "No power of attorney {reference} granted by {principal}"
        )));
    }
    let entry = snapshot
        .find_and_mark_updated::<PoaEntry>(principal)
        .ok_or_else(|| StateError::MissingEntry {
            set: "poas",
            key: principal.to_string(),
        })?;
    entry.grants.remove(reference);
    let empty = entry.grants.is_empty();
    if empty {
        snapshot.remove::<PoaEntry>(principal)?;
    }
    info!(%principal, %reference, "power of attorney revoked");
    Ok(())
}

/// Drop grants whose expiry has passed. Returns how many were dropped.
pub fn prune_expired(
    snapshot: &mut StateSnapshot<'_>,
    principal: &str,
    now: i64,
) -> Result<usize, StateError> {
    let stale = snapshot
        .poa(principal)
        .map(|e| e.grants.values().filter(|g| g.expiry < now).count())
        .unwrap_or(0);
    if stale == 0 {
        return Ok(0);
    }
    let Some(entry) = snapshot.find_and_mark_updated::<PoaEntry>(principal) else {
        return Ok(0);
    };
    entry.grants.retain(|_, g| g.expiry >= now);
    if entry.grants.is_empty() {
        snapshot.remove::<PoaEntry>(principal)?;
    }
    debug!(%principal, stale, "expired grants pruned");
    Ok(stale)
}
