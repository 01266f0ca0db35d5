//! # Delivery versus Payment
//!
//! A DVP contract lists parties, what each pays and what each receives. It
//! settles all-or-nothing once every required signature, parameter and
//! authorisation is present and every payment is funded.
//!
//! A pay item is funded by one of:
//!
//! | Source | Requirement |
//! |--------|-------------|
//! | issuance | the payer owns the asset's namespace |
//! | encumbrance | a reference on the payer naming the contract or its issuer, large enough |
//! | free balance | the payer signed the item and has spendable balance |
//!
//! A signed item whose encumbrance is short falls back to free balance.

use crate::domain::context::{
    atomically, check_signature, open_contract, require_address, require_asset, store_contract,
    ContractContext,
};
use crate::domain::expression::{amount_value, Expression, ExpressionError};
use crate::domain::lifecycle::Resolution;
use le_02_ledger_state::{
    ContractEntry, ContractEvent, ContractStatus, EffectiveTx, RuleError, RuleResult, StateError,
    StateSnapshot,
};
use le_03_encumbrance::{
    covering_reference, draw_down, encumber, reference_can_pay, release_reference, EncumberRequest,
};
use ledger_types::{
    is_reserved_reference, signing, Amount, AssetId, Balance, ContractData, DvpCommit, DvpContract,
    DvpParty, DvpPayItem, DvpReceiveItem,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

fn payer<'c>(party: &'c DvpParty, item: &'c DvpPayItem) -> &'c str {
    item.address.as_deref().unwrap_or(&party.address)
}

fn receiver<'c>(party: &'c DvpParty, item: &'c DvpReceiveItem) -> &'c str {
    item.address.as_deref().unwrap_or(&party.address)
}

fn amount_error(err: ExpressionError) -> RuleError {
    RuleError::precondition(format!("Amount expression: {err}"))
}

fn as_dvp(entry: &ContractEntry) -> RuleResult<DvpContract> {
    match &entry.data {
        ContractData::Dvp(dvp) => Ok(dvp.clone()),
        other => Err(RuleError::structural(format!(
            "Contract {} is a {} contract, not DVP",
            entry.address,
            other.family()
        ))),
    }
}

/// Next time the sweep should look at a contract that is not settling now.
pub(crate) fn next_wakeup(dvp: &DvpContract, now: i64) -> i64 {
    if dvp.start > now {
        dvp.start
    } else {
        dvp.expiry.saturating_add(1)
    }
}

// =============================================================================
// CREATION
// =============================================================================

fn check_amount_shape(
    amount: &Amount,
    parameters: &BTreeMap<String, ledger_types::DvpParameter>,
    what: &str,
) -> RuleResult<()> {
    match amount {
        Amount::Fixed(v) if *v < 0 => Err(RuleError::structural(format!(
            "{what} amount is negative"
        ))),
        Amount::Fixed(_) => Ok(()),
        Amount::Expr(source) => {
            let expr = Expression::parse(source)
                .map_err(|e| RuleError::structural(format!("{what} amount: {e}")))?;
            match expr.variables().into_iter().find(|v| !parameters.contains_key(v)) {
                Some(missing) => Err(RuleError::structural(format!(
                    "{what} amount uses undefined parameter `{missing}`"
                ))),
                None => Ok(()),
            }
        }
    }
}

fn add_to(totals: &mut BTreeMap<AssetId, Balance>, asset: &AssetId, amount: Balance) -> RuleResult<()> {
    let total = totals.entry(asset.clone()).or_insert(0);
    *total = total
        .checked_add(amount)
        .ok_or_else(|| RuleError::structural(format!("Amount overflow on {asset}")))?;
    Ok(())
}

/// Per-asset pay and receive totals, when all amounts are fixed.
fn fixed_totals(
    dvp: &DvpContract,
) -> RuleResult<Option<(BTreeMap<AssetId, Balance>, BTreeMap<AssetId, Balance>)>> {
    let mut pay = BTreeMap::new();
    let mut receive = BTreeMap::new();
    for party in &dvp.parties {
        for item in &party.pay {
            let Some(amount) = item.amount.fixed() else {
                return Ok(None);
            };
            add_to(&mut pay, &item.asset, amount)?;
        }
        for item in &party.receive {
            let Some(amount) = item.amount.fixed() else {
                return Ok(None);
            };
            add_to(&mut receive, &item.asset, amount)?;
        }
    }
    Ok(Some((pay, receive)))
}

fn validate(snapshot: &StateSnapshot<'_>, ctx: &ContractContext<'_>, dvp: &mut DvpContract) -> RuleResult<()> {
    let config = snapshot.config();
    if dvp.parties.is_empty() {
        return Err(RuleError::structural("DVP contract has no parties"));
    }
    for (index, party) in dvp.parties.iter_mut().enumerate() {
        if party.id.is_empty() {
            party.id = (index + 1).to_string();
        }
    }
    let mut ids = BTreeSet::new();
    for party in &dvp.parties {
        if !ids.insert(party.id.as_str()) {
            return Err(RuleError::structural(format!(
                "Duplicate party id `{}`",
                party.id
            )));
        }
    }
    if dvp.metadata.len() > config.max_metadata_length {
        return Err(RuleError::structural("Contract metadata too long"));
    }

    for (name, param) in &dvp.parameters {
        if param.calculation_only {
            if param.value.is_none() {
                return Err(RuleError::structural(format!(
                    "Calculated parameter `{name}` has no value"
                )));
            }
        } else {
            require_address(&param.address, "parameter signer")?;
        }
    }

    for party in &dvp.parties {
        require_address(&party.address, "party")?;
        for item in &party.pay {
            require_address(payer(party, item), "payer")?;
            check_amount_shape(&item.amount, &dvp.parameters, "Pay")?;
            if item.metadata.len() > config.max_metadata_length {
                return Err(RuleError::structural("Payment metadata too long"));
            }
        }
        for item in &party.receive {
            require_address(receiver(party, item), "receiver")?;
            check_amount_shape(&item.amount, &dvp.parameters, "Receive")?;
        }
    }

    for reference in dvp.encumbrance.iter().chain(
        dvp.parties
            .iter()
            .flat_map(|p| p.pay.iter().filter_map(|i| i.encumbrance.as_ref())),
    ) {
        if reference.is_empty() || reference.len() > config.max_reference_length {
            return Err(RuleError::structural("Invalid encumbrance name"));
        }
    }

    for add in &dvp.add_encumbrances {
        require_address(&add.address, "encumbrance")?;
        if is_reserved_reference(&add.reference) {
            return Err(RuleError::structural(format!(
                "Encumbrance reference {} is reserved",
                add.reference
            )));
        }
        if add.reference.is_empty() || add.reference.len() > config.max_reference_length {
            return Err(RuleError::structural("Invalid encumbrance reference"));
        }
        check_amount_shape(&add.amount, &dvp.parameters, "Encumbrance")?;
    }
    for auth in &dvp.authorisations {
        require_address(&auth.address, "authoriser")?;
    }

    if dvp.parameters.is_empty() {
        if let Some((pay, receive)) = fixed_totals(dvp)? {
            if pay != receive {
                return Err(RuleError::structural(
                    "Unbalanced contract: payments do not equal receipts",
                ));
            }
        }
    }

    let now = ctx.now;
    if dvp.expiry < now {
        return Err(RuleError::precondition("Contract expiry is in the past"));
    }
    if dvp.start.saturating_sub(now) > config.max_dvp_start_delay_secs {
        return Err(RuleError::precondition("Contract start is too far in the future"));
    }
    if dvp.expiry.saturating_sub(now.max(dvp.start)) > config.max_contract_duration_secs {
        return Err(RuleError::precondition("Contract duration is too long"));
    }

    for asset in ContractData::Dvp(dvp.clone()).referenced_assets() {
        require_asset(snapshot, &asset)?;
    }
    for party in &dvp.parties {
        for item in party.pay.iter().filter(|i| i.issuance) {
            if !snapshot.is_issuer(payer(party, item), &item.asset) {
                return Err(RuleError::precondition(format!(
                    "{} cannot issue {}",
                    payer(party, item),
                    item.asset
                )));
            }
        }
    }
    Ok(())
}

/// Verify every signature already present in a creation payload.
fn verify_supplied(ctx: &ContractContext<'_>, contract: &str, dvp: &DvpContract) -> RuleResult<()> {
    let verifier = ctx.verifier;
    for party in &dvp.parties {
        let Some(signature) = &party.signature else {
            continue;
        };
        let key = party
            .public_key
            .as_deref()
            .ok_or_else(|| RuleError::structural("Party signature without public key"))?;
        let message = signing::party_message(contract)?;
        check_signature(verifier, &message, key, signature, &[&party.address], "party")?;
    }

    for party in &dvp.parties {
        for (index, item) in party.pay.iter().enumerate() {
            let Some(signature) = &item.signature else {
                continue;
            };
            let key = item
                .public_key
                .as_deref()
                .or(party.public_key.as_deref())
                .ok_or_else(|| RuleError::structural("Payment signature without public key"))?;
            let message = signing::payment_message(
                contract,
                &party.id,
                index as u32,
                &item.asset,
                &item.amount.to_string(),
            )?;
            check_signature(verifier, &message, key, signature, &[payer(party, item)], "payment")?;
        }
    }

    for (name, param) in &dvp.parameters {
        let (Some(signature), Some(value)) = (&param.signature, param.value) else {
            continue;
        };
        let key = param
            .public_key
            .as_deref()
            .ok_or_else(|| RuleError::structural("Parameter signature without public key"))?;
        let message = signing::parameter_message(name, value)?;
        check_signature(verifier, &message, key, signature, &[&param.address], "parameter")?;
    }

    for auth in &dvp.authorisations {
        let Some(signature) = &auth.signature else {
            continue;
        };
        let key = auth
            .public_key
            .as_deref()
            .ok_or_else(|| RuleError::structural("Authorisation signature without public key"))?;
        let message = signing::authorisation_message(contract, &auth.id, auth.refused)?;
        check_signature(verifier, &message, key, signature, &[&auth.address], "authorisation")?;
    }

    for (index, add) in dvp.add_encumbrances.iter().enumerate() {
        let Some(signature) = &add.signature else {
            continue;
        };
        let key = add
            .public_key
            .as_deref()
            .ok_or_else(|| RuleError::structural("Encumbrance signature without public key"))?;
        let message = signing::add_encumbrance_message(contract, index as u32, &add.reference)?;
        check_signature(verifier, &message, key, signature, &[&add.address], "encumbrance")?;
    }
    Ok(())
}

/// Validate a new DVP contract and build its entry.
pub fn create(
    snapshot: &StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    mut dvp: DvpContract,
    address: &str,
) -> RuleResult<ContractEntry> {
    validate(snapshot, ctx, &mut dvp)?;
    verify_supplied(ctx, address, &dvp)?;

    let mut entry = ContractEntry::new(address, ctx.author, ContractData::Dvp(dvp.clone()), ctx.now);
    entry.next_time_event = Some(next_wakeup(&dvp, ctx.now));
    match unsatisfied_reason(snapshot, &entry, &dvp, ctx.now) {
        None => entry.status = ContractStatus::AwaitingEvent,
        Some(reason) => entry.status_note = reason,
    }
    Ok(entry)
}

// =============================================================================
// SATISFACTION
// =============================================================================

type Evaluated = (Vec<Vec<Balance>>, Vec<Vec<Balance>>);

fn evaluate_amounts(dvp: &DvpContract) -> Result<Evaluated, ExpressionError> {
    let mut pays = Vec::with_capacity(dvp.parties.len());
    let mut receives = Vec::with_capacity(dvp.parties.len());
    for party in &dvp.parties {
        pays.push(
            party
                .pay
                .iter()
                .map(|i| amount_value(&i.amount, &dvp.parameters))
                .collect::<Result<Vec<_>, _>>()?,
        );
        receives.push(
            party
                .receive
                .iter()
                .map(|i| amount_value(&i.amount, &dvp.parameters))
                .collect::<Result<Vec<_>, _>>()?,
        );
    }
    Ok((pays, receives))
}

/// Why the contract cannot settle yet, or `None` when it can.
pub fn unsatisfied_reason(
    snapshot: &StateSnapshot<'_>,
    entry: &ContractEntry,
    dvp: &DvpContract,
    now: i64,
) -> Option<String> {
    if entry.status.is_final() {
        return Some(format!("Contract is {:?}", entry.status));
    }
    if now < dvp.start {
        return Some("Contract has not started".into());
    }
    if now > dvp.expiry {
        return Some("Contract has expired".into());
    }
    if let Some(party) = dvp.parties.iter().find(|p| p.must_sign && p.signature.is_none()) {
        return Some(format!("Party {} has not signed", party.id));
    }
    for (name, param) in &dvp.parameters {
        if param.value.is_none() || (!param.calculation_only && param.signature.is_none()) {
            return Some(format!("Parameter {name} is not set"));
        }
    }
    if let Some(auth) = dvp
        .authorisations
        .iter()
        .find(|a| a.signature.is_none() || a.refused)
    {
        return Some(format!("Authorisation {} is outstanding or refused", auth.id));
    }
    if let Some(index) = dvp.add_encumbrances.iter().position(|a| a.signature.is_none()) {
        return Some(format!("Encumbrance {index} is not signed"));
    }

    let (pays, receives) = match evaluate_amounts(dvp) {
        Ok(v) => v,
        Err(e) => return Some(format!("Amount expression: {e}")),
    };
    let mut totals: BTreeMap<&AssetId, Balance> = BTreeMap::new();
    let authorities = [entry.address.as_str(), entry.issuer.as_str()];
    for (p, party) in dvp.parties.iter().enumerate() {
        for (i, item) in party.pay.iter().enumerate() {
            let amount = pays[p][i];
            if amount < 0 {
                return Some(format!("Negative payment by party {}", party.id));
            }
            let total = totals.entry(&item.asset).or_insert(0);
            match total.checked_add(amount) {
                Some(sum) => *total = sum,
                None => return Some(format!("Amount overflow on {}", item.asset)),
            }
            if amount == 0 || item.signature.is_some() || item.issuance {
                continue;
            }
            let covered = item
                .encumbrance
                .as_deref()
                .or(dvp.encumbrance.as_deref())
                .and_then(|reference| {
                    covering_reference(
                        snapshot,
                        payer(party, item),
                        &item.asset,
                        reference,
                        amount,
                        &authorities,
                        now,
                    )
                })
                .is_some();
            if !covered {
                return Some(format!("Payment {i} of party {} is not signed", party.id));
            }
        }
        for (i, item) in party.receive.iter().enumerate() {
            let amount = receives[p][i];
            if amount < 0 {
                return Some(format!("Negative receipt by party {}", party.id));
            }
            let total = totals.entry(&item.asset).or_insert(0);
            match total.checked_sub(amount) {
                Some(rest) => *total = rest,
                None => return Some(format!("Amount overflow on {}", item.asset)),
            }
        }
    }
    if let Some((asset, _)) = totals.iter().find(|(_, v)| **v != 0) {
        return Some(format!("Unbalanced asset {asset}"));
    }
    None
}

// =============================================================================
// COMMIT
// =============================================================================

fn party_mut<'d>(dvp: &'d mut DvpContract, id: &str) -> RuleResult<&'d mut DvpParty> {
    dvp.parties
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| RuleError::precondition(format!("No party `{id}`")))
}

/// Verify and record the signatures a commit carries for one contract.
fn apply_commit(
    ctx: &ContractContext<'_>,
    contract: &str,
    dvp: &mut DvpContract,
    commit: &DvpCommit,
) -> RuleResult<()> {
    let verifier = ctx.verifier;

    if let Some(sig) = &commit.party {
        let party = party_mut(dvp, &sig.party_id)?;
        let message = signing::party_message(contract)?;
        check_signature(verifier, &message, &sig.public_key, &sig.signature, &[&party.address], "party")?;
        party.public_key = Some(sig.public_key.clone());
        party.signature = Some(sig.signature.clone());
    }

    for sig in &commit.payments {
        let party = party_mut(dvp, &sig.party_id)?;
        let party_id = party.id.clone();
        let party_address = party.address.clone();
        let item = party.pay.get_mut(sig.index as usize).ok_or_else(|| {
            RuleError::precondition(format!("Party {party_id} has no payment {}", sig.index))
        })?;
        let payer = item.address.clone().unwrap_or(party_address);
        let message = signing::payment_message(
            contract,
            &party_id,
            sig.index,
            &item.asset,
            &item.amount.to_string(),
        )?;
        check_signature(verifier, &message, &sig.public_key, &sig.signature, &[&payer], "payment")?;
        item.public_key = Some(sig.public_key.clone());
        item.signature = Some(sig.signature.clone());
    }

    for value in &commit.parameters {
        let param = dvp
            .parameters
            .get_mut(&value.name)
            .ok_or_else(|| RuleError::precondition(format!("No parameter `{}`", value.name)))?;
        if param.calculation_only {
            return Err(RuleError::precondition(format!(
                "Parameter `{}` is calculated",
                value.name
            )));
        }
        let message = signing::parameter_message(&value.name, value.value)?;
        check_signature(
            verifier,
            &message,
            &value.public_key,
            &value.signature,
            &[&param.address],
            "parameter",
        )?;
        param.value = Some(value.value);
        param.public_key = Some(value.public_key.clone());
        param.signature = Some(value.signature.clone());
    }

    for sig in &commit.authorisations {
        let auth = dvp
            .authorisations
            .iter_mut()
            .find(|a| a.id == sig.id)
            .ok_or_else(|| RuleError::precondition(format!("No authorisation `{}`", sig.id)))?;
        let message = signing::authorisation_message(contract, &sig.id, sig.refused)?;
        check_signature(
            verifier,
            &message,
            &sig.public_key,
            &sig.signature,
            &[&auth.address],
            "authorisation",
        )?;
        auth.public_key = Some(sig.public_key.clone());
        auth.signature = Some(sig.signature.clone());
        auth.refused = sig.refused;
    }

    for sig in &commit.encumbrances {
        let add = dvp
            .add_encumbrances
            .get_mut(sig.index as usize)
            .ok_or_else(|| RuleError::precondition(format!("No encumbrance {}", sig.index)))?;
        let message = signing::add_encumbrance_message(contract, sig.index, &add.reference)?;
        check_signature(
            verifier,
            &message,
            &sig.public_key,
            &sig.signature,
            &[&add.address],
            "encumbrance",
        )?;
        add.public_key = Some(sig.public_key.clone());
        add.signature = Some(sig.signature.clone());
    }
    Ok(())
}

/// Merge commit data into one or more DVP contracts.
pub fn commit(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    commit: &DvpCommit,
) -> RuleResult<()> {
    if commit.contracts.is_empty() {
        return Err(RuleError::structural("Commit names no contract"));
    }
    if commit.contracts.len() > 1 && !commit.is_parameter_only() {
        return Err(RuleError::structural(
            "Only parameter commits may target several contracts",
        ));
    }
    let distinct: BTreeSet<String> = commit
        .contracts
        .iter()
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if distinct.len() != commit.contracts.len() {
        return Err(RuleError::structural("Commit names a contract twice"));
    }

    atomically(snapshot, |snapshot| {
        for address in &commit.contracts {
            let mut entry = open_contract(snapshot, address)?;
            let mut dvp = as_dvp(&entry)?;
            apply_commit(ctx, &entry.address, &mut dvp, commit)?;

            let reason = unsatisfied_reason(snapshot, &entry, &dvp, ctx.now);
            entry.data = ContractData::Dvp(dvp);
            match (entry.status, reason) {
                (ContractStatus::Pending, None) => {
                    entry.status = ContractStatus::AwaitingEvent;
                    entry.status_note = "Satisfied".into();
                    snapshot.push_event(ContractEvent::commit(&entry.address));
                    info!(contract = %entry.address, "contract satisfied, settlement queued");
                }
                (ContractStatus::AwaitingEvent, Some(reason)) => {
                    entry.status = ContractStatus::Pending;
                    entry.status_note = reason;
                }
                (_, Some(reason)) => entry.status_note = reason,
                (_, None) => {}
            }
            debug!(contract = %entry.address, status = ?entry.status, "commit applied");
            store_contract(snapshot, entry)?;
        }
        Ok(())
    })
}

// =============================================================================
// SETTLEMENT
// =============================================================================

enum Source<'r> {
    Issuance,
    Encumbrance(&'r str),
    Free,
}

struct Slot {
    receiver: String,
    asset: AssetId,
    remaining: Balance,
}

/// Move every payment and apply add-encumbrances. Returns the move count.
fn transfer_all(
    snapshot: &mut StateSnapshot<'_>,
    entry: &ContractEntry,
    dvp: &DvpContract,
    now: i64,
) -> RuleResult<usize> {
    let (pays, receives) = evaluate_amounts(dvp).map_err(amount_error)?;
    let contract = entry.address.as_str();
    let authorities = [contract, entry.issuer.as_str()];

    let mut slots: Vec<Slot> = dvp
        .parties
        .iter()
        .enumerate()
        .flat_map(|(p, party)| {
            party.receive.iter().enumerate().map(move |(i, item)| (p, i, party, item))
        })
        .map(|(p, i, party, item)| Slot {
            receiver: receiver(party, item).to_ascii_lowercase(),
            asset: item.asset.clone(),
            remaining: receives[p][i],
        })
        .collect();

    let mut moves = 0;
    for (p, party) in dvp.parties.iter().enumerate() {
        for (i, item) in party.pay.iter().enumerate() {
            let amount = pays[p][i];
            if amount == 0 {
                continue;
            }
            let from = payer(party, item).to_ascii_lowercase();
            let reference = item.encumbrance.as_deref().or(dvp.encumbrance.as_deref());

            let source = if item.issuance {
                Source::Issuance
            } else if let Some(r) = reference.filter(|r| {
                covering_reference(snapshot, &from, &item.asset, r, amount, &authorities, now)
                    .is_some()
                    && reference_can_pay(snapshot, &from, &item.asset, r, amount)
            }) {
                Source::Encumbrance(r)
            } else if item.signature.is_some() {
                Source::Free
            } else {
                return Err(RuleError::precondition(format!(
                    "Payment {i} of party {} is not funded",
                    party.id
                )));
            };

            let mut remaining = amount;
            for slot in slots
                .iter_mut()
                .filter(|s| s.asset == item.asset && s.remaining > 0)
            {
                let chunk = remaining.min(slot.remaining);
                if let Source::Free = source {
                    snapshot.require_spendable(&from, &item.asset, chunk)?;
                }
                snapshot.move_asset(&from, &slot.receiver, &item.asset, chunk)?;
                if let Source::Encumbrance(r) = source {
                    draw_down(snapshot, &from, &item.asset, r, chunk)?;
                }
                snapshot.record(EffectiveTx::Settlement {
                    contract: contract.to_string(),
                    from: from.clone(),
                    to: slot.receiver.clone(),
                    asset: item.asset.clone(),
                    amount: chunk,
                });
                slot.remaining -= chunk;
                remaining -= chunk;
                moves += 1;
                if remaining == 0 {
                    break;
                }
            }
            if remaining > 0 {
                return Err(RuleError::precondition(format!(
                    "Payment of {} by party {} exceeds receipts",
                    item.asset, party.id
                )));
            }
        }
    }

    for add in &dvp.add_encumbrances {
        let amount = amount_value(&add.amount, &dvp.parameters).map_err(amount_error)?;
        if amount == 0 {
            continue;
        }
        encumber(
            snapshot,
            EncumberRequest {
                address: &add.address,
                asset: &add.asset,
                reference: &add.reference,
                amount,
                administrators: &add.administrators,
                beneficiaries: &add.beneficiaries,
                cumulative: false,
                now,
            },
        )?;
    }
    Ok(moves)
}

/// Settle a DVP contract if it is satisfied and funded.
pub(crate) fn try_settle(
    snapshot: &mut StateSnapshot<'_>,
    mut entry: ContractEntry,
    now: i64,
) -> RuleResult<Resolution> {
    let dvp = as_dvp(&entry)?;
    if let Some(reason) = unsatisfied_reason(snapshot, &entry, &dvp, now) {
        entry.status = ContractStatus::Pending;
        entry.status_note = reason.clone();
        entry.next_time_event = Some(next_wakeup(&dvp, now));
        store_contract(snapshot, entry)?;
        return Ok(Resolution::Deferred(reason));
    }

    match atomically(snapshot, |child| transfer_all(child, &entry, &dvp, now)) {
        Ok(moves) => {
            snapshot.delete::<ContractEntry>(&entry.address)?;
            info!(contract = %entry.address, moves, "DVP contract settled");
            Ok(Resolution::Settled { moves })
        }
        Err(RuleError::Rejected(rejection)) => {
            warn!(
                contract = %entry.address,
                reason = %rejection.reason,
                "DVP settlement deferred"
            );
            entry.status = ContractStatus::AwaitingEvent;
            entry.status_note = rejection.reason.clone();
            entry.next_time_event = Some(now.saturating_add(1).min(dvp.expiry.saturating_add(1)));
            store_contract(snapshot, entry)?;
            Ok(Resolution::Deferred(rejection.reason))
        }
        Err(fatal) => Err(fatal),
    }
}

/// Remove an expired DVP contract and the encumbrances named after it.
pub(crate) fn expire(snapshot: &mut StateSnapshot<'_>, entry: &ContractEntry) -> Result<(), StateError> {
    if let ContractData::Dvp(dvp) = &entry.data {
        if dvp
            .encumbrance
            .as_deref()
            .is_some_and(|name| name.eq_ignore_ascii_case(&entry.address))
        {
            let name = entry.address.as_str();
            for party in &dvp.parties {
                for item in &party.pay {
                    release_reference(snapshot, payer(party, item), &item.asset, name)?;
                }
            }
        }
    }
    snapshot.delete::<ContractEntry>(&entry.address)?;
    info!(contract = %entry.address, "DVP contract expired");
    Ok(())
}
