//! # Transaction Envelope
//!
//! A `Transaction` is the signed envelope (chain, nonce, timestamp, sender
//! credentials, optional POA context) around one typed payload. The payload
//! variant plus the presence of a POA context determine the `TxType`.
//!
//! `TxPayload` variants are append-only: their position is part of the
//! canonical encoding.

use crate::codec;
use crate::contracts::{CommitData, ContractData};
use crate::entities::{AssetId, Balance, EncumbranceParty, PoaItem};
use crate::errors::{CodecError, Rejection};
use crate::tx_type::TxType;
use serde::{Deserialize, Serialize};

/// Attorney-acting-for-principal context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoaContext {
    pub principal: String,
    pub reference: String,
}

/// A ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub chain_id: u32,
    pub nonce: u64,
    pub priority: i32,
    /// Seconds since the epoch; zero or negative means "unset".
    pub timestamp: i64,
    pub from_address: String,
    pub from_public_key: String,
    pub poa: Option<PoaContext>,
    pub payload: TxPayload,
    /// Envelope signature; not part of the hash preimage.
    pub signature: String,
}

/// Fields covered by the transaction hash.
#[derive(Serialize)]
struct HashPreimage<'a> {
    chain_id: u32,
    tx_type: u16,
    nonce: u64,
    priority: i32,
    timestamp: i64,
    from_address: &'a str,
    from_public_key: &'a str,
    poa: &'a Option<PoaContext>,
    payload: &'a TxPayload,
}

impl Transaction {
    /// Build an unsigned transaction with default priority.
    pub fn new(
        chain_id: u32,
        nonce: u64,
        timestamp: i64,
        from_address: impl Into<String>,
        from_public_key: impl Into<String>,
        payload: TxPayload,
    ) -> Self {
        Self {
            chain_id,
            nonce,
            priority: 0,
            timestamp,
            from_address: from_address.into(),
            from_public_key: from_public_key.into(),
            poa: None,
            payload,
            signature: String::new(),
        }
    }

    /// Mark this transaction as executed by an attorney for `principal`.
    #[must_use]
    pub fn with_poa(mut self, principal: impl Into<String>, reference: impl Into<String>) -> Self {
        self.poa = Some(PoaContext {
            principal: principal.into(),
            reference: reference.into(),
        });
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The type id, POA variant when a POA context is present.
    ///
    /// Returns `None` for a POA context on a non-delegable type.
    pub fn tx_type(&self) -> Option<TxType> {
        let base = self.payload.base_type();
        if self.poa.is_some() {
            base.poa_variant()
        } else {
            Some(base)
        }
    }

    /// The address whose state the transaction acts on.
    pub fn principal(&self) -> &str {
        self.poa
            .as_ref()
            .map(|p| p.principal.as_str())
            .unwrap_or(self.from_address.as_str())
    }

    pub fn is_poa(&self) -> bool {
        self.poa.is_some()
    }

    /// Bytes the envelope signature covers.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let tx_type = self.payload.base_type().id()
            + if self.is_poa() { TxType::POA_OFFSET } else { 0 };
        codec::encode(&HashPreimage {
            chain_id: self.chain_id,
            tx_type,
            nonce: self.nonce,
            priority: self.priority,
            timestamp: self.timestamp,
            from_address: &self.from_address,
            from_public_key: &self.from_public_key,
            poa: &self.poa,
            payload: &self.payload,
        })
    }

    /// `0x`-hex Keccak-256 of the signing bytes.
    pub fn hash(&self) -> Result<String, CodecError> {
        Ok(codec::to_hex(&codec::keccak256(&self.signing_bytes()?)))
    }

    /// Canonical bytes of the full envelope, signature included.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }

    /// Static validation that needs no state.
    pub fn validate_structure(&self) -> Result<TxType, Rejection> {
        let tx_type = self.tx_type().ok_or_else(|| {
            Rejection::structural(format!(
                "Transaction type `{}` cannot be executed under a power of attorney",
                self.payload.base_type()
            ))
        })?;
        if self.from_address.is_empty() {
            return Err(Rejection::structural("Missing `from` address"));
        }
        if let Some(poa) = &self.poa {
            if !codec::is_valid_address(&poa.principal) {
                return Err(Rejection::structural(format!(
                    "Invalid POA address {}",
                    poa.principal
                )));
            }
            if poa.reference.is_empty() {
                return Err(Rejection::structural("Missing POA reference"));
            }
        }
        self.payload.validate_structure()?;
        Ok(tx_type)
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Typed transaction body. Append new variants at the end only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPayload {
    RegisterAddress(RegisterAddress),
    SetAddressPermissions(SetAddressPermissions),
    RegisterNamespace(RegisterNamespace),
    RegisterAssetClass(RegisterAssetClass),
    LockAsset(AssetLock),
    UnlockAsset(AssetLock),
    IssueAsset(AssetIssue),
    TransferAsset(AssetTransfer),
    TransferToMany(TransferToMany),
    Encumber(Encumber),
    Unencumber(Unencumber),
    ExerciseEncumbrance(ExerciseEncumbrance),
    LockHolding(HoldingLock),
    UnlockHolding(HoldingLock),
    GrantPoa(GrantPoa),
    RevokePoa(RevokePoa),
    NewContract(ContractData),
    CommitToContract(CommitData),
    CancelContract(CancelContract),
    TransferAsIssuer(IssuerTransfer),
    TransferFromMany(TransferFromMany),
    IssueAndEncumber(IssueAndEncumber),
    TransferNamespace(NamespaceTransfer),
    DeleteNamespace(NamespaceDelete),
    DeleteAssetClass(AssetClassDelete),
    /// Remove the principal's own address entry.
    DeleteAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegisterAddress {
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAddressPermissions {
    pub address: String,
    pub permissions: u64,
    pub allowed_tx_types: Vec<TxType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNamespace {
    pub namespace: String,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAssetClass {
    pub namespace: String,
    pub class: String,
    pub metadata: String,
}

/// Namespace-wide lock when `class` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLock {
    pub namespace: String,
    pub class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIssue {
    pub asset: AssetId,
    pub to: String,
    pub amount: Balance,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTransfer {
    pub asset: AssetId,
    pub to: String,
    pub amount: Balance,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferToMany {
    pub asset: AssetId,
    pub outputs: Vec<(String, Balance)>,
    pub metadata: String,
}

impl TransferToMany {
    pub fn total(&self) -> Option<Balance> {
        self.outputs
            .iter()
            .try_fold(0 as Balance, |acc, (_, a)| acc.checked_add(*a))
    }
}

/// The namespace owner moves a holding between two other addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerTransfer {
    pub asset: AssetId,
    pub from: String,
    pub to: String,
    pub amount: Balance,
    pub metadata: String,
}

/// The namespace owner collects from several holders into its own balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFromMany {
    pub asset: AssetId,
    pub sources: Vec<(String, Balance)>,
    /// Declared total; must equal the sum of `sources`.
    pub amount: Balance,
    pub metadata: String,
}

impl TransferFromMany {
    pub fn total(&self) -> Option<Balance> {
        self.sources
            .iter()
            .try_fold(0 as Balance, |acc, (_, a)| acc.checked_add(*a))
    }
}

/// Issue to `to` and reserve the new holding under one encumbrance.
///
/// Empty administrator or beneficiary lists default to the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueAndEncumber {
    pub asset: AssetId,
    pub to: String,
    pub amount: Balance,
    /// Defaults to the transaction hash.
    pub reference: Option<String>,
    pub administrators: Vec<EncumbranceParty>,
    pub beneficiaries: Vec<EncumbranceParty>,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceTransfer {
    pub namespace: String,
    pub to: String,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDelete {
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetClassDelete {
    pub namespace: String,
    pub class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encumber {
    pub asset: AssetId,
    /// Defaults to the transaction hash.
    pub reference: Option<String>,
    pub amount: Balance,
    pub administrators: Vec<EncumbranceParty>,
    pub beneficiaries: Vec<EncumbranceParty>,
    pub cumulative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unencumber {
    pub subject: String,
    pub asset: AssetId,
    pub reference: String,
    pub amount: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseEncumbrance {
    pub subject: String,
    pub asset: AssetId,
    pub reference: String,
    pub amount: Balance,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingLock {
    pub holder: String,
    pub asset: AssetId,
    pub amount: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantPoa {
    pub reference: String,
    pub attorney: String,
    pub start: i64,
    pub expiry: i64,
    pub items: Vec<PoaItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokePoa {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelContract {
    pub contract: String,
    pub public_key: String,
    pub signature: String,
}

fn require_positive(amount: Balance, what: &str) -> Result<(), Rejection> {
    if amount <= 0 {
        return Err(Rejection::structural(format!("{what} must be positive, got {amount}")));
    }
    Ok(())
}

fn require_address(address: &str, what: &str) -> Result<(), Rejection> {
    if !codec::is_valid_address(address) {
        return Err(Rejection::structural(format!("Invalid {what} address `{address}`")));
    }
    Ok(())
}

fn require_name(name: &str, what: &str) -> Result<(), Rejection> {
    if name.is_empty() || name.contains(crate::entities::ASSET_SEPARATOR) {
        return Err(Rejection::structural(format!("Invalid {what} name `{name}`")));
    }
    Ok(())
}

impl TxPayload {
    /// The non-POA transaction type for this payload.
    pub fn base_type(&self) -> TxType {
        match self {
            TxPayload::RegisterAddress(_) => TxType::RegisterAddress,
            TxPayload::SetAddressPermissions(_) => TxType::SetAddressPermissions,
            TxPayload::RegisterNamespace(_) => TxType::RegisterNamespace,
            TxPayload::RegisterAssetClass(_) => TxType::RegisterAssetClass,
            TxPayload::LockAsset(_) => TxType::LockAsset,
            TxPayload::UnlockAsset(_) => TxType::UnlockAsset,
            TxPayload::IssueAsset(_) => TxType::IssueAsset,
            TxPayload::TransferAsset(_) => TxType::TransferAsset,
            TxPayload::TransferToMany(_) => TxType::TransferToMany,
            TxPayload::Encumber(_) => TxType::Encumber,
            TxPayload::Unencumber(_) => TxType::Unencumber,
            TxPayload::ExerciseEncumbrance(_) => TxType::ExerciseEncumbrance,
            TxPayload::LockHolding(_) => TxType::LockHolding,
            TxPayload::UnlockHolding(_) => TxType::UnlockHolding,
            TxPayload::GrantPoa(_) => TxType::GrantPoa,
            TxPayload::RevokePoa(_) => TxType::RevokePoa,
            TxPayload::NewContract(_) => TxType::NewContract,
            TxPayload::CommitToContract(_) => TxType::CommitToContract,
            TxPayload::CancelContract(_) => TxType::CancelContract,
            TxPayload::TransferAsIssuer(_) => TxType::TransferAsIssuer,
            TxPayload::TransferFromMany(_) => TxType::TransferFromMany,
            TxPayload::IssueAndEncumber(_) => TxType::IssueAndEncumber,
            TxPayload::TransferNamespace(_) => TxType::TransferNamespace,
            TxPayload::DeleteNamespace(_) => TxType::DeleteNamespace,
            TxPayload::DeleteAssetClass(_) => TxType::DeleteAssetClass,
            TxPayload::DeleteAddress => TxType::DeleteAddress,
        }
    }

    /// Assets whose namespace/class lock state gates this payload.
    ///
    /// Contract commits resolve their assets from state, so they return
    /// nothing here.
    pub fn touched_assets(&self) -> Vec<AssetId> {
        match self {
            TxPayload::IssueAsset(p) => vec![p.asset.clone()],
            TxPayload::TransferAsset(p) => vec![p.asset.clone()],
            TxPayload::TransferToMany(p) => vec![p.asset.clone()],
            TxPayload::Encumber(p) => vec![p.asset.clone()],
            TxPayload::Unencumber(p) => vec![p.asset.clone()],
            TxPayload::ExerciseEncumbrance(p) => vec![p.asset.clone()],
            TxPayload::NewContract(data) => data.referenced_assets(),
            TxPayload::TransferAsIssuer(p) => vec![p.asset.clone()],
            TxPayload::TransferFromMany(p) => vec![p.asset.clone()],
            TxPayload::IssueAndEncumber(p) => vec![p.asset.clone()],
            _ => Vec::new(),
        }
    }

    /// Checks that need neither state nor signatures.
    pub fn validate_structure(&self) -> Result<(), Rejection> {
        match self {
            TxPayload::RegisterAddress(_) => Ok(()),
            TxPayload::SetAddressPermissions(p) => require_address(&p.address, "target"),
            TxPayload::RegisterNamespace(p) => require_name(&p.namespace, "namespace"),
            TxPayload::RegisterAssetClass(p) => {
                require_name(&p.namespace, "namespace")?;
                require_name(&p.class, "class")
            }
            TxPayload::LockAsset(p) | TxPayload::UnlockAsset(p) => {
                require_name(&p.namespace, "namespace")?;
                match &p.class {
                    Some(class) => require_name(class, "class"),
                    None => Ok(()),
                }
            }
            TxPayload::IssueAsset(p) => {
                require_positive(p.amount, "Issue amount")?;
                require_address(&p.to, "destination")
            }
            TxPayload::TransferAsset(p) => {
                require_positive(p.amount, "Transfer amount")?;
                require_address(&p.to, "destination")
            }
            TxPayload::TransferToMany(p) => {
                if p.outputs.is_empty() {
                    return Err(Rejection::structural("Transfer has no outputs"));
                }
                for (to, amount) in &p.outputs {
                    require_positive(*amount, "Transfer amount")?;
                    require_address(to, "destination")?;
                }
                if p.total().is_none() {
                    return Err(Rejection::structural("Transfer total overflows"));
                }
                Ok(())
            }
            TxPayload::Encumber(p) => {
                require_positive(p.amount, "Encumbrance amount")?;
                if let Some(reference) = &p.reference {
                    if reference.is_empty() {
                        return Err(Rejection::structural("Empty encumbrance reference"));
                    }
                }
                for party in p.administrators.iter().chain(p.beneficiaries.iter()) {
                    require_address(&party.address, "encumbrance party")?;
                }
                Ok(())
            }
            TxPayload::Unencumber(p) => {
                require_positive(p.amount, "Release amount")?;
                require_address(&p.subject, "subject")
            }
            TxPayload::ExerciseEncumbrance(p) => {
                require_positive(p.amount, "Exercise amount")?;
                require_address(&p.subject, "subject")?;
                require_address(&p.destination, "destination")
            }
            TxPayload::LockHolding(p) | TxPayload::UnlockHolding(p) => {
                require_positive(p.amount, "Lock amount")?;
                require_address(&p.holder, "holder")
            }
            TxPayload::GrantPoa(p) => {
                if p.reference.is_empty() {
                    return Err(Rejection::structural("Missing POA reference"));
                }
                require_address(&p.attorney, "attorney")?;
                if p.items.is_empty() {
                    return Err(Rejection::structural("POA grant has no items"));
                }
                for item in &p.items {
                    if item.ceiling < 0 {
                        return Err(Rejection::structural("POA item ceiling is negative"));
                    }
                    if item.assets.is_empty() {
                        return Err(Rejection::structural("POA item has no assets"));
                    }
                    if item.tx_type.is_poa() {
                        return Err(Rejection::structural(
                            "POA items name base transaction types",
                        ));
                    }
                }
                Ok(())
            }
            TxPayload::RevokePoa(p) => {
                if p.reference.is_empty() {
                    return Err(Rejection::structural("Missing POA reference"));
                }
                Ok(())
            }
            TxPayload::NewContract(_) => Ok(()),
            TxPayload::CommitToContract(data) => {
                if data.contracts().is_empty() {
                    return Err(Rejection::structural("Commit names no contract"));
                }
                Ok(())
            }
            TxPayload::CancelContract(p) => require_address(&p.contract, "contract"),
            TxPayload::TransferAsIssuer(p) => {
                require_positive(p.amount, "Transfer amount")?;
                require_address(&p.from, "source")?;
                require_address(&p.to, "destination")?;
                if p.from.eq_ignore_ascii_case(&p.to) {
                    return Err(Rejection::structural("Source and destination are the same address"));
                }
                Ok(())
            }
            TxPayload::TransferFromMany(p) => {
                if p.sources.is_empty() {
                    return Err(Rejection::structural("Transfer has no sources"));
                }
                for (from, amount) in &p.sources {
                    require_positive(*amount, "Transfer amount")?;
                    require_address(from, "source")?;
                }
                match p.total() {
                    None => Err(Rejection::structural("Transfer total overflows")),
                    Some(total) if total != p.amount => Err(Rejection::structural(format!(
                        "Sources total {total}, declared {}",
                        p.amount
                    ))),
                    Some(_) => Ok(()),
                }
            }
            TxPayload::IssueAndEncumber(p) => {
                require_positive(p.amount, "Issue amount")?;
                require_address(&p.to, "destination")?;
                if let Some(reference) = &p.reference {
                    if reference.is_empty() {
                        return Err(Rejection::structural("Empty encumbrance reference"));
                    }
                }
                for party in p.administrators.iter().chain(p.beneficiaries.iter()) {
                    require_address(&party.address, "encumbrance party")?;
                }
                Ok(())
            }
            TxPayload::TransferNamespace(p) => {
                require_name(&p.namespace, "namespace")?;
                require_address(&p.to, "new owner")
            }
            TxPayload::DeleteNamespace(p) => require_name(&p.namespace, "namespace"),
            TxPayload::DeleteAssetClass(p) => {
                require_name(&p.namespace, "namespace")?;
                require_name(&p.class, "class")
            }
            TxPayload::DeleteAddress => Ok(()),
        }
    }
}
