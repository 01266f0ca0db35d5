//! # Contract Data
//!
//! Creation payloads and commit payloads for the three contract families.
//! These are the data carried by `NewContract` / `CommitToContract`
//! transactions; the stored form in state wraps them with status fields.
//!
//! ## Families
//!
//! | Family | Created by | Settles |
//! |--------|------------|---------|
//! | DVP | any party or arranger | on event sweep, once satisfied |
//! | Exchange | the issuing address | on each commit |
//! | Nominate | the issuing address | on each commit |

use crate::entities::{AssetId, Balance, EncumbranceParty};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Contract family discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractFamily {
    Dvp,
    Exchange,
    Nominate,
}

impl ContractFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractFamily::Dvp => "dvp",
            ContractFamily::Exchange => "exchange",
            ContractFamily::Nominate => "nominate",
        }
    }
}

impl fmt::Display for ContractFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quantity that is either fixed or computed from contract parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Amount {
    Fixed(Balance),
    /// Arithmetic over parameter names, e.g. `"Price*2"`.
    Expr(String),
}

impl Amount {
    pub fn fixed(&self) -> Option<Balance> {
        match self {
            Amount::Fixed(v) => Some(*v),
            Amount::Expr(_) => None,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Fixed(v) => write!(f, "{v}"),
            Amount::Expr(e) => f.write_str(e),
        }
    }
}

impl From<Balance> for Amount {
    fn from(value: Balance) -> Self {
        Amount::Fixed(value)
    }
}

/// Creation payload of a `NewContract` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractData {
    Dvp(DvpContract),
    Exchange(ExchangeContract),
    Nominate(NominateContract),
}

impl ContractData {
    pub fn family(&self) -> ContractFamily {
        match self {
            ContractData::Dvp(_) => ContractFamily::Dvp,
            ContractData::Exchange(_) => ContractFamily::Exchange,
            ContractData::Nominate(_) => ContractFamily::Nominate,
        }
    }

    /// Every asset the contract can move, deduplicated and sorted.
    pub fn referenced_assets(&self) -> Vec<AssetId> {
        let mut assets: Vec<AssetId> = match self {
            ContractData::Dvp(d) => d
                .parties
                .iter()
                .flat_map(|p| {
                    p.pay
                        .iter()
                        .map(|i| i.asset.clone())
                        .chain(p.receive.iter().map(|i| i.asset.clone()))
                })
                .chain(d.add_encumbrances.iter().map(|e| e.asset.clone()))
                .collect(),
            ContractData::Exchange(x) => x
                .inputs
                .iter()
                .map(|i| i.asset.clone())
                .chain(x.outputs.iter().map(|o| o.asset.clone()))
                .collect(),
            ContractData::Nominate(n) => vec![n.input_asset(), n.output_asset()],
        };
        assets.sort();
        assets.dedup();
        assets
    }

    pub fn expiry(&self) -> i64 {
        match self {
            ContractData::Dvp(d) => d.expiry,
            ContractData::Exchange(x) => x.expiry,
            ContractData::Nominate(n) => n.expiry,
        }
    }
}

// =============================================================================
// DVP
// =============================================================================

/// Delivery-versus-payment contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DvpContract {
    pub parties: Vec<DvpParty>,
    pub parameters: BTreeMap<String, DvpParameter>,
    pub add_encumbrances: Vec<DvpAddEncumbrance>,
    pub authorisations: Vec<DvpAuthorisation>,
    /// Contract-wide encumbrance reference that unsigned payments draw on.
    pub encumbrance: Option<String>,
    pub start: i64,
    pub expiry: i64,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DvpParty {
    /// Unique within the contract; assigned `1..n` when left empty.
    pub id: String,
    pub address: String,
    pub public_key: Option<String>,
    /// Signature over the contract address.
    pub signature: Option<String>,
    pub must_sign: bool,
    pub pay: Vec<DvpPayItem>,
    pub receive: Vec<DvpReceiveItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvpPayItem {
    /// Paying address; the party address when absent.
    pub address: Option<String>,
    pub asset: AssetId,
    pub amount: Amount,
    pub public_key: Option<String>,
    pub signature: Option<String>,
    /// Pay by issuing new units from the namespace owner.
    pub issuance: bool,
    /// Encumbrance reference on the payer the payment draws against.
    pub encumbrance: Option<String>,
    pub metadata: String,
}

impl DvpPayItem {
    pub fn new(asset: AssetId, amount: impl Into<Amount>) -> Self {
        Self {
            address: None,
            asset,
            amount: amount.into(),
            public_key: None,
            signature: None,
            issuance: false,
            encumbrance: None,
            metadata: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvpReceiveItem {
    /// Receiving address; the party address when absent.
    pub address: Option<String>,
    pub asset: AssetId,
    pub amount: Amount,
}

impl DvpReceiveItem {
    pub fn new(asset: AssetId, amount: impl Into<Amount>) -> Self {
        Self {
            address: None,
            asset,
            amount: amount.into(),
        }
    }
}

/// A named numeric input usable in amount expressions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DvpParameter {
    /// The address entitled to set (sign) the value.
    pub address: String,
    pub value: Option<Balance>,
    pub public_key: Option<String>,
    pub signature: Option<String>,
    /// Derived values need no signer but must carry a value.
    pub calculation_only: bool,
}

/// An encumbrance created on settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvpAddEncumbrance {
    pub address: String,
    pub asset: AssetId,
    pub reference: String,
    pub amount: Amount,
    pub administrators: Vec<EncumbranceParty>,
    pub beneficiaries: Vec<EncumbranceParty>,
    pub public_key: Option<String>,
    pub signature: Option<String>,
}

/// A third-party approval the contract waits on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DvpAuthorisation {
    pub id: String,
    pub address: String,
    pub public_key: Option<String>,
    pub signature: Option<String>,
    pub refused: bool,
}

// =============================================================================
// EXCHANGE
// =============================================================================

/// Fixed-ratio block exchange offered by the issuing address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExchangeContract {
    pub inputs: Vec<ExchangeInput>,
    pub outputs: Vec<ExchangeOutput>,
    pub min_blocks: Balance,
    /// Zero means unbounded.
    pub max_blocks: Balance,
    pub start: i64,
    pub expiry: i64,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExchangeInput {
    pub asset: AssetId,
    pub block_size: Balance,
    /// The only address allowed to commit this input, if set.
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExchangeOutput {
    pub asset: AssetId,
    pub block_size: Balance,
    /// Paying address when not the issuer; must sign at creation.
    pub address: Option<String>,
    pub public_key: Option<String>,
    pub signature: Option<String>,
}

// =============================================================================
// NOMINATE
// =============================================================================

/// Conversion of one class into another within a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NominateContract {
    pub namespace: String,
    pub input_class: String,
    pub output_class: String,
    pub input_block: Balance,
    pub output_block: Balance,
    pub expiry: i64,
    pub metadata: String,
}

impl NominateContract {
    pub fn input_asset(&self) -> AssetId {
        AssetId::new(self.namespace.clone(), self.input_class.clone())
    }

    pub fn output_asset(&self) -> AssetId {
        AssetId::new(self.namespace.clone(), self.output_class.clone())
    }
}

// =============================================================================
// COMMITS
// =============================================================================

/// Payload of a `CommitToContract` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitData {
    Dvp(DvpCommit),
    Exchange(ExchangeCommit),
    Nominate(NominateCommit),
}

impl CommitData {
    pub fn family(&self) -> ContractFamily {
        match self {
            CommitData::Dvp(_) => ContractFamily::Dvp,
            CommitData::Exchange(_) => ContractFamily::Exchange,
            CommitData::Nominate(_) => ContractFamily::Nominate,
        }
    }

    /// Contract addresses this commit targets.
    pub fn contracts(&self) -> Vec<String> {
        match self {
            CommitData::Dvp(d) => d.contracts.clone(),
            CommitData::Exchange(x) => vec![x.contract.clone()],
            CommitData::Nominate(n) => vec![n.contract.clone()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DvpCommit {
    /// More than one entry only for parameter-only commits.
    pub contracts: Vec<String>,
    pub party: Option<PartySignature>,
    pub payments: Vec<PaymentSignature>,
    pub parameters: Vec<ParameterValue>,
    pub authorisations: Vec<AuthorisationSignature>,
    pub encumbrances: Vec<AddEncumbranceSignature>,
}

impl DvpCommit {
    /// True when the commit carries no contract-bound signature.
    pub fn is_parameter_only(&self) -> bool {
        self.party.is_none()
            && self.payments.is_empty()
            && self.authorisations.is_empty()
            && self.encumbrances.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySignature {
    pub party_id: String,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSignature {
    pub party_id: String,
    pub index: u32,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: Balance,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorisationSignature {
    pub id: String,
    pub refused: bool,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEncumbranceSignature {
    pub index: u32,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeCommit {
    pub contract: String,
    pub inputs: Vec<ExchangeCommitInput>,
    /// Receiver of the outputs; the committer when absent.
    pub destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeCommitInput {
    pub asset: AssetId,
    pub amount: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NominateCommit {
    pub contract: String,
    pub inputs: Vec<NominateInput>,
}

impl NominateCommit {
    /// Sum of the nominated inputs; `None` when one is negative or the sum overflows.
    pub fn total(&self) -> Option<Balance> {
        self.inputs.iter().try_fold(0 as Balance, |acc, input| {
            if input.amount < 0 {
                return None;
            }
            acc.checked_add(input.amount)
        })
    }
}

/// One nominated amount, optionally from a third party who signed for it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NominateInput {
    pub amount: Balance,
    pub address: Option<String>,
    pub public_key: Option<String>,
    pub signature: Option<String>,
}
