//! Per-type rules (step 6).
//!
//! Each rule validates its preconditions and then writes. Rules run inside a
//! nested snapshot owned by the dispatcher, so a rejection half way through a
//! multi-write rule still leaves the caller's snapshot untouched.

use le_01_signature::SignatureVerifier;
use le_02_ledger_state::{
    AddressEntry, AssetClass, EncumbranceEntry, NamespaceEntry, PoaEntry, RuleError, RuleResult,
    StateError, StateSnapshot,
};
use le_03_encumbrance::{
    encumber, exercise, lock_holding, unencumber, unlock_holding, EncumberRequest,
    ExerciseRequest, UnencumberRequest,
};
use le_04_power_of_attorney::{grant, revoke, GrantRequest};
use le_05_contracts::{cancel_contract, commit_contract, create_contract, ContractContext};
use ledger_types::{
    AssetClassDelete, AssetId, AssetIssue, AssetLock, AssetTransfer, Balance, EncumbranceParty,
    IssueAndEncumber, IssuerTransfer, NamespaceDelete, NamespaceTransfer, RegisterAssetClass,
    RegisterNamespace, SetAddressPermissions, Transaction, TransferFromMany, TransferToMany,
    TxPayload,
};
use std::collections::BTreeMap;
use tracing::debug;

/// What a rule knows about the transaction besides its payload.
pub(crate) struct RuleContext<'a> {
    pub verifier: &'a dyn SignatureVerifier,
    pub tx: &'a Transaction,
    pub hash: &'a str,
    /// The principal under POA, else the sender.
    pub principal: &'a str,
    pub now: i64,
}

impl<'a> RuleContext<'a> {
    fn contract_context(&self) -> ContractContext<'a> {
        ContractContext {
            verifier: self.verifier,
            chain_id: self.tx.chain_id,
            author: self.principal,
            submitter: &self.tx.from_address,
            nonce: self.tx.nonce,
            now: self.now,
        }
    }
}

/// Apply the payload. Returns a short status line for the caller.
pub(crate) fn apply(snapshot: &mut StateSnapshot<'_>, ctx: &RuleContext<'_>) -> RuleResult<String> {
    match &ctx.tx.payload {
        TxPayload::RegisterAddress(p) => register_address(snapshot, ctx, &p.metadata),
        TxPayload::SetAddressPermissions(p) => set_permissions(snapshot, p),
        TxPayload::DeleteAddress => delete_address(snapshot, ctx),
        TxPayload::RegisterNamespace(p) => register_namespace(snapshot, ctx, p),
        TxPayload::RegisterAssetClass(p) => register_class(snapshot, ctx, p),
        TxPayload::LockAsset(p) => set_asset_lock(snapshot, ctx, p, true),
        TxPayload::UnlockAsset(p) => set_asset_lock(snapshot, ctx, p, false),
        TxPayload::IssueAsset(p) => issue(snapshot, ctx, p),
        TxPayload::TransferAsset(p) => transfer(snapshot, ctx, p),
        TxPayload::TransferToMany(p) => transfer_to_many(snapshot, ctx, p),
        TxPayload::TransferAsIssuer(p) => transfer_as_issuer(snapshot, ctx, p),
        TxPayload::TransferFromMany(p) => transfer_from_many(snapshot, ctx, p),
        TxPayload::IssueAndEncumber(p) => issue_and_encumber(snapshot, ctx, p),
        TxPayload::TransferNamespace(p) => transfer_namespace(snapshot, ctx, p),
        TxPayload::DeleteNamespace(p) => delete_namespace(snapshot, ctx, p),
        TxPayload::DeleteAssetClass(p) => delete_class(snapshot, ctx, p),
        TxPayload::Encumber(p) => {
            let reference = p.reference.as_deref().unwrap_or(ctx.hash);
            encumber(
                snapshot,
                EncumberRequest {
                    address: ctx.principal,
                    asset: &p.asset,
                    reference,
                    amount: p.amount,
                    administrators: &p.administrators,
                    beneficiaries: &p.beneficiaries,
                    cumulative: p.cumulative,
                    now: ctx.now,
                },
            )?;
            Ok(format!("encumbered {} of {} as {reference}", p.amount, p.asset))
        }
        TxPayload::Unencumber(p) => {
            unencumber(
                snapshot,
                UnencumberRequest {
                    address: &p.subject,
                    asset: &p.asset,
                    reference: &p.reference,
                    amount: p.amount,
                    acting: ctx.principal,
                    now: ctx.now,
                },
            )?;
            Ok(format!("released {} of {}", p.amount, p.reference))
        }
        TxPayload::ExerciseEncumbrance(p) => {
            exercise(
                snapshot,
                ExerciseRequest {
                    address: &p.subject,
                    asset: &p.asset,
                    reference: &p.reference,
                    amount: p.amount,
                    acting: ctx.principal,
                    destination: &p.destination,
                    now: ctx.now,
                },
            )?;
            Ok(format!("exercised {} of {} to {}", p.amount, p.reference, p.destination))
        }
        TxPayload::LockHolding(p) => {
            lock_holding(snapshot, ctx.principal, &p.holder, &p.asset, p.amount, ctx.now)?;
            Ok(format!("locked {} of {} at {}", p.amount, p.asset, p.holder))
        }
        TxPayload::UnlockHolding(p) => {
            unlock_holding(snapshot, ctx.principal, &p.holder, &p.asset, p.amount)?;
            Ok(format!("unlocked {} of {} at {}", p.amount, p.asset, p.holder))
        }
        TxPayload::GrantPoa(p) => {
            grant(
                snapshot,
                GrantRequest {
                    principal: ctx.principal,
                    reference: &p.reference,
                    attorney: &p.attorney,
                    start: p.start,
                    expiry: p.expiry,
                    items: &p.items,
                    now: ctx.now,
                },
            )?;
            Ok(format!("granted {} to {}", p.reference, p.attorney))
        }
        TxPayload::RevokePoa(p) => {
            revoke(snapshot, ctx.principal, &p.reference)?;
            Ok(format!("revoked {}", p.reference))
        }
        TxPayload::NewContract(data) => {
            let address = create_contract(snapshot, &ctx.contract_context(), data)?;
            Ok(format!("created {} contract {address}", data.family()))
        }
        TxPayload::CommitToContract(data) => {
            commit_contract(snapshot, &ctx.contract_context(), data)?;
            Ok(format!("committed to {}", data.contracts().join(", ")))
        }
        TxPayload::CancelContract(p) => {
            cancel_contract(snapshot, &ctx.contract_context(), p)?;
            Ok(format!("cancelled {}", p.contract))
        }
    }
}

fn require_metadata(snapshot: &StateSnapshot<'_>, metadata: &str) -> RuleResult<()> {
    let limit = snapshot.config().max_metadata_length;
    if metadata.len() > limit {
        return Err(RuleError::structural(format!(
            "Metadata of {} bytes exceeds {limit}",
            metadata.len()
        )));
    }
    Ok(())
}

/// Namespace owned by `principal`, for rules reserved to the owner.
fn owned_namespace<'s>(
    snapshot: &'s StateSnapshot<'_>,
    namespace: &str,
    principal: &str,
) -> RuleResult<&'s NamespaceEntry> {
    let entry = snapshot
        .namespace(namespace)
        .ok_or_else(|| RuleError::precondition(format!("Unknown namespace {namespace}")))?;
    if !entry.is_owner(principal) {
        return Err(RuleError::precondition(format!(
            "{principal} does not own namespace {namespace}"
        )));
    }
    Ok(entry)
}

fn require_class(snapshot: &StateSnapshot<'_>, asset: &AssetId) -> RuleResult<()> {
    let known = snapshot
        .namespace(&asset.namespace)
        .map(|ns| ns.has_class(&asset.class))
        .unwrap_or(false);
    if !known {
        return Err(RuleError::precondition(format!("Unknown asset {asset}")));
    }
    Ok(())
}

fn namespace_mut<'s>(
    snapshot: &'s mut StateSnapshot<'_>,
    namespace: &str,
) -> Result<&'s mut NamespaceEntry, StateError> {
    snapshot
        .find_and_mark_updated::<NamespaceEntry>(namespace)
        .ok_or_else(|| StateError::MissingEntry {
            set: "namespaces",
            key: namespace.to_string(),
        })
}

// =============================================================================
// ADDRESSES
// =============================================================================

fn register_address(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    metadata: &str,
) -> RuleResult<String> {
    require_metadata(snapshot, metadata)?;
    let address = &ctx.tx.from_address;
    if snapshot.exists::<AddressEntry>(address) {
        return Err(RuleError::precondition(format!("Address {address} is already registered")));
    }
    let mut entry = AddressEntry::new(address);
    if !ctx.tx.from_public_key.is_empty() {
        entry.public_key = Some(ctx.tx.from_public_key.clone());
    }
    entry.metadata = metadata.to_string();
    snapshot.insert(entry)?;
    Ok(format!("registered {address}"))
}

fn set_permissions(snapshot: &mut StateSnapshot<'_>, p: &SetAddressPermissions) -> RuleResult<String> {
    let entry = snapshot.find_or_create::<AddressEntry>(&p.address, || AddressEntry::new(&p.address))?;
    entry.permissions = p.permissions;
    entry.allowed_tx_types = p.allowed_tx_types.iter().copied().collect();
    Ok(format!("permissions of {} set to {:#x}", p.address, p.permissions))
}

/// An empty, idle address removes itself with its encumbrance and POA
/// entries. The idle period outlasts the transaction age window, so nothing
/// signed before the deletion can replay once the address re-registers.
fn delete_address(snapshot: &mut StateSnapshot<'_>, ctx: &RuleContext<'_>) -> RuleResult<String> {
    let address = ctx.principal;
    let entry = snapshot
        .address(address)
        .ok_or_else(|| RuleError::precondition(format!("Unknown address {address}")))?;
    if !entry.balances.is_empty() {
        return Err(RuleError::precondition(format!(
            "Address {address} still holds {} asset balances",
            entry.balances.len()
        )));
    }
    let min_age = snapshot.config().min_address_age_to_delete_secs;
    let idle = ctx.now.saturating_sub(entry.last_active);
    if idle < min_age {
        return Err(RuleError::precondition(format!(
            "Address {address} was active {idle}s ago, deletion needs {min_age}s"
        )));
    }
    if let Some(ns) = snapshot
        .entries::<NamespaceEntry>()
        .into_iter()
        .find(|ns| ns.is_owner(address))
    {
        return Err(RuleError::precondition(format!(
            "Address {address} still owns namespace {}",
            ns.namespace
        )));
    }

    if snapshot.exists::<EncumbranceEntry>(address) {
        snapshot.delete::<EncumbranceEntry>(address)?;
    }
    if snapshot.exists::<PoaEntry>(address) {
        snapshot.delete::<PoaEntry>(address)?;
    }
    snapshot.delete::<AddressEntry>(address)?;
    Ok(format!("deleted address {address}"))
}

// =============================================================================
// NAMESPACES & CLASSES
// =============================================================================

fn register_namespace(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &RegisterNamespace,
) -> RuleResult<String> {
    require_metadata(snapshot, &p.metadata)?;
    if snapshot.namespace(&p.namespace).is_some() {
        return Err(RuleError::precondition(format!("Namespace {} already exists", p.namespace)));
    }
    let mut entry = NamespaceEntry::new(&p.namespace, ctx.principal);
    entry.metadata = p.metadata.clone();
    snapshot.insert(entry)?;
    Ok(format!("registered namespace {}", p.namespace))
}

fn register_class(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &RegisterAssetClass,
) -> RuleResult<String> {
    require_metadata(snapshot, &p.metadata)?;
    if owned_namespace(snapshot, &p.namespace, ctx.principal)?.has_class(&p.class) {
        return Err(RuleError::precondition(format!(
            "Class {}|{} already exists",
            p.namespace, p.class
        )));
    }
    namespace_mut(snapshot, &p.namespace)?.classes.insert(
        p.class.clone(),
        AssetClass {
            metadata: p.metadata.clone(),
            locked: false,
        },
    );
    Ok(format!("registered class {}|{}", p.namespace, p.class))
}

fn set_asset_lock(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &AssetLock,
    lock: bool,
) -> RuleResult<String> {
    let ns = owned_namespace(snapshot, &p.namespace, ctx.principal)?;
    let (current, target) = match &p.class {
        Some(class) => {
            let current = ns.classes.get(class).map(|c| c.locked).ok_or_else(|| {
                RuleError::precondition(format!("Unknown asset {}|{class}", p.namespace))
            })?;
            (current, format!("{}|{class}", p.namespace))
        }
        None => (ns.locked, p.namespace.clone()),
    };
    if current == lock {
        let state = if lock { "locked" } else { "unlocked" };
        return Err(RuleError::precondition(format!("{target} is already {state}")));
    }

    let ns = namespace_mut(snapshot, &p.namespace)?;
    match &p.class {
        Some(class) => {
            if let Some(c) = ns.classes.get_mut(class) {
                c.locked = lock;
            }
        }
        None => ns.locked = lock,
    }
    debug!(%target, lock, "asset lock toggled");
    Ok(format!("{} {target}", if lock { "locked" } else { "unlocked" }))
}

// =============================================================================
// ISSUE & TRANSFER
// =============================================================================

/// Issuance debits the issuer, whose balance may go negative.
fn issue(snapshot: &mut StateSnapshot<'_>, ctx: &RuleContext<'_>, p: &AssetIssue) -> RuleResult<String> {
    require_metadata(snapshot, &p.metadata)?;
    owned_namespace(snapshot, &p.asset.namespace, ctx.principal)?;
    require_class(snapshot, &p.asset)?;
    snapshot.move_asset(ctx.principal, &p.to, &p.asset, p.amount)?;
    Ok(format!("issued {} of {} to {}", p.amount, p.asset, p.to))
}

fn transfer(snapshot: &mut StateSnapshot<'_>, ctx: &RuleContext<'_>, p: &AssetTransfer) -> RuleResult<String> {
    require_metadata(snapshot, &p.metadata)?;
    require_class(snapshot, &p.asset)?;
    snapshot.require_spendable(ctx.principal, &p.asset, p.amount)?;
    snapshot.move_asset(ctx.principal, &p.to, &p.asset, p.amount)?;
    Ok(format!("transferred {} of {} to {}", p.amount, p.asset, p.to))
}

fn transfer_to_many(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &TransferToMany,
) -> RuleResult<String> {
    require_metadata(snapshot, &p.metadata)?;
    require_class(snapshot, &p.asset)?;
    let total: Balance = p
        .total()
        .ok_or_else(|| RuleError::structural("Transfer total overflows"))?;
    snapshot.require_spendable(ctx.principal, &p.asset, total)?;
    for (to, _) in &p.outputs {
        snapshot.require_creditable(to)?;
    }
    for (to, amount) in &p.outputs {
        snapshot.move_asset(ctx.principal, to, &p.asset, *amount)?;
    }
    Ok(format!("transferred {total} of {} to {} outputs", p.asset, p.outputs.len()))
}

// =============================================================================
// OWNER POWERS
// =============================================================================

/// Reject unless `address` holds `amount` outside its encumbrances. Holding
/// locks do not bind the issuer.
fn require_unreserved(
    snapshot: &StateSnapshot<'_>,
    address: &str,
    asset: &AssetId,
    amount: Balance,
) -> RuleResult<()> {
    if !snapshot.exists::<AddressEntry>(address) {
        return Err(RuleError::precondition(format!("Unknown address {address}")));
    }
    let free = snapshot
        .balance_of(address, asset)
        .saturating_sub(snapshot.reserved_of(address, asset));
    if free < amount {
        return Err(RuleError::precondition(format!(
            "Insufficient balance of {asset} at {address}: unreserved {free}, required {amount}"
        )));
    }
    Ok(())
}

/// The issuer moves a holder's balance without the holder's signature.
fn transfer_as_issuer(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &IssuerTransfer,
) -> RuleResult<String> {
    require_metadata(snapshot, &p.metadata)?;
    owned_namespace(snapshot, &p.asset.namespace, ctx.principal)?;
    require_class(snapshot, &p.asset)?;
    if p.from.eq_ignore_ascii_case(ctx.principal) {
        return Err(RuleError::precondition("Issuer transfers move other holders' balances"));
    }
    require_unreserved(snapshot, &p.from, &p.asset, p.amount)?;
    snapshot.move_asset(&p.from, &p.to, &p.asset, p.amount)?;
    Ok(format!("moved {} of {} from {} to {}", p.amount, p.asset, p.from, p.to))
}

fn transfer_from_many(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &TransferFromMany,
) -> RuleResult<String> {
    require_metadata(snapshot, &p.metadata)?;
    owned_namespace(snapshot, &p.asset.namespace, ctx.principal)?;
    require_class(snapshot, &p.asset)?;

    let mut per_source: BTreeMap<String, Balance> = BTreeMap::new();
    for (from, amount) in &p.sources {
        if from.eq_ignore_ascii_case(ctx.principal) {
            return Err(RuleError::precondition("The issuer cannot collect from itself"));
        }
        let total = per_source.entry(from.to_ascii_lowercase()).or_insert(0);
        *total = total
            .checked_add(*amount)
            .ok_or_else(|| RuleError::structural(format!("Amount overflow on {from}")))?;
    }
    for (from, total) in &per_source {
        require_unreserved(snapshot, from, &p.asset, *total)?;
    }
    for (from, amount) in &p.sources {
        snapshot.move_asset(from, ctx.principal, &p.asset, *amount)?;
    }
    Ok(format!("collected {} of {} from {} sources", p.amount, p.asset, per_source.len()))
}

/// Issue to `to` and encumber the new holding in one step.
fn issue_and_encumber(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &IssueAndEncumber,
) -> RuleResult<String> {
    require_metadata(snapshot, &p.metadata)?;
    owned_namespace(snapshot, &p.asset.namespace, ctx.principal)?;
    require_class(snapshot, &p.asset)?;
    if p.to.eq_ignore_ascii_case(ctx.principal) {
        return Err(RuleError::precondition("The issuer cannot encumber its own issuance"));
    }
    snapshot.move_asset(ctx.principal, &p.to, &p.asset, p.amount)?;

    let issuer = vec![EncumbranceParty::open(ctx.principal)];
    let administrators = if p.administrators.is_empty() { &issuer } else { &p.administrators };
    let beneficiaries = if p.beneficiaries.is_empty() { &issuer } else { &p.beneficiaries };
    let reference = p.reference.as_deref().unwrap_or(ctx.hash);
    encumber(
        snapshot,
        EncumberRequest {
            address: &p.to,
            asset: &p.asset,
            reference,
            amount: p.amount,
            administrators,
            beneficiaries,
            cumulative: false,
            now: ctx.now,
        },
    )?;
    Ok(format!("issued {} of {} to {} encumbered as {reference}", p.amount, p.asset, p.to))
}

/// Hand a namespace to a new owner. The old owner's outstanding issuance
/// (its negative balances) moves with it.
fn transfer_namespace(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &NamespaceTransfer,
) -> RuleResult<String> {
    require_metadata(snapshot, &p.metadata)?;
    let ns = owned_namespace(snapshot, &p.namespace, ctx.principal)?;
    if ns.locked {
        return Err(RuleError::precondition(format!("Namespace {} is locked", p.namespace)));
    }
    if ns.is_owner(&p.to) {
        return Err(RuleError::precondition(format!(
            "{} already owns namespace {}",
            p.to, p.namespace
        )));
    }
    let issuance: Vec<(AssetId, Balance)> = ns
        .classes
        .keys()
        .map(|class| AssetId::new(&p.namespace, class))
        .map(|asset| {
            let held = snapshot.balance_of(ctx.principal, &asset);
            (asset, held)
        })
        .filter(|(_, held)| *held < 0)
        .collect();
    snapshot.require_creditable(&p.to)?;

    let ns = namespace_mut(snapshot, &p.namespace)?;
    ns.owner = p.to.to_ascii_lowercase();
    ns.metadata = p.metadata.clone();
    for (asset, held) in &issuance {
        snapshot.move_asset(ctx.principal, &p.to, asset, *held)?;
    }
    debug!(namespace = %p.namespace, to = %p.to, classes = issuance.len(), "namespace transferred");
    Ok(format!("transferred namespace {} to {}", p.namespace, p.to))
}

fn delete_namespace(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &NamespaceDelete,
) -> RuleResult<String> {
    let ns = owned_namespace(snapshot, &p.namespace, ctx.principal)?;
    if ns.locked {
        return Err(RuleError::precondition(format!("Namespace {} is locked", p.namespace)));
    }
    if !ns.classes.is_empty() {
        return Err(RuleError::precondition(format!(
            "Namespace {} still has {} asset classes",
            p.namespace,
            ns.classes.len()
        )));
    }
    snapshot.delete::<NamespaceEntry>(&p.namespace)?;
    Ok(format!("deleted namespace {}", p.namespace))
}

/// A class can go once nothing of it is outstanding, which holds exactly when
/// the issuer's own balance is back to zero.
fn delete_class(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &RuleContext<'_>,
    p: &AssetClassDelete,
) -> RuleResult<String> {
    let ns = owned_namespace(snapshot, &p.namespace, ctx.principal)?;
    if !ns.has_class(&p.class) {
        return Err(RuleError::precondition(format!(
            "Unknown asset {}|{}",
            p.namespace, p.class
        )));
    }
    if ns.is_locked(&p.class) {
        return Err(RuleError::precondition(format!(
            "Asset {}|{} is locked",
            p.namespace, p.class
        )));
    }
    let asset = AssetId::new(&p.namespace, &p.class);
    let outstanding = snapshot.balance_of(ctx.principal, &asset);
    if outstanding != 0 {
        return Err(RuleError::precondition(format!(
            "Asset {asset} has outstanding issuance {outstanding}"
        )));
    }
    namespace_mut(snapshot, &p.namespace)?.classes.remove(&p.class);
    Ok(format!("deleted class {asset}"))
}
