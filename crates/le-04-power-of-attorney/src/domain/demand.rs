//! What a POA transaction asks of its grant.

use ledger_types::{
    Balance, CommitData, NamespaceDelete, NamespaceTransfer, Transaction, TxPayload, TxType,
};

/// The type, assets and amount a delegated transaction draws on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoaDemand {
    /// Base (non-POA) type the grant item must name.
    pub tx_type: TxType,
    /// Asset ids, namespaces or contract addresses the whitelist must cover.
    pub assets: Vec<String>,
    pub amount: Balance,
}

impl PoaDemand {
    pub fn new(tx_type: TxType, assets: Vec<String>, amount: Balance) -> Self {
        Self {
            tx_type,
            assets,
            amount,
        }
    }

    /// Demand of a POA transaction; `None` for direct submissions.
    pub fn for_transaction(tx: &Transaction) -> Option<Self> {
        if !tx.is_poa() {
            return None;
        }
        let tx_type = tx.payload.base_type();
        let (assets, amount) = match &tx.payload {
            TxPayload::RegisterNamespace(p) => (vec![p.namespace.clone()], 1),
            TxPayload::RegisterAssetClass(p) => {
                (vec![format!("{}|{}", p.namespace, p.class)], 1)
            }
            TxPayload::LockAsset(p) | TxPayload::UnlockAsset(p) => {
                let target = match &p.class {
                    Some(class) => format!("{}|{}", p.namespace, class),
                    None => p.namespace.clone(),
                };
                (vec![target], 1)
            }
            TxPayload::IssueAsset(p) => (vec![p.asset.full_id()], p.amount),
            TxPayload::TransferAsset(p) => (vec![p.asset.full_id()], p.amount),
            TxPayload::TransferToMany(p) => (
                vec![p.asset.full_id()],
                p.total().unwrap_or(Balance::MAX),
            ),
            TxPayload::Encumber(p) => (vec![p.asset.full_id()], p.amount),
            TxPayload::Unencumber(p) => (vec![p.asset.full_id()], p.amount),
            TxPayload::ExerciseEncumbrance(p) => (vec![p.asset.full_id()], p.amount),
            TxPayload::LockHolding(p) | TxPayload::UnlockHolding(p) => {
                (vec![p.asset.full_id()], p.amount)
            }
            TxPayload::NewContract(data) => (
                data.referenced_assets().iter().map(|a| a.full_id()).collect(),
                1,
            ),
            TxPayload::CommitToContract(CommitData::Nominate(n)) => (
                vec![n.contract.to_ascii_lowercase()],
                n.total().unwrap_or(Balance::MAX),
            ),
            TxPayload::CommitToContract(commit) => (
                commit
                    .contracts()
                    .iter()
                    .map(|c| c.to_ascii_lowercase())
                    .collect(),
                1,
            ),
            TxPayload::CancelContract(p) => (vec![p.contract.to_ascii_lowercase()], 1),
            TxPayload::TransferAsIssuer(p) => (vec![p.asset.full_id()], p.amount),
            TxPayload::TransferFromMany(p) => (
                vec![p.asset.full_id()],
                p.total().unwrap_or(Balance::MAX),
            ),
            TxPayload::IssueAndEncumber(p) => (vec![p.asset.full_id()], p.amount),
            TxPayload::TransferNamespace(NamespaceTransfer { namespace, .. })
            | TxPayload::DeleteNamespace(NamespaceDelete { namespace }) => {
                (vec![namespace.clone()], 1)
            }
            TxPayload::DeleteAssetClass(p) => (vec![format!("{}|{}", p.namespace, p.class)], 1),
            TxPayload::DeleteAddress => (vec![tx.principal().to_ascii_lowercase()], 1),
            TxPayload::RegisterAddress(_)
            | TxPayload::SetAddressPermissions(_)
            | TxPayload::GrantPoa(_)
            | TxPayload::RevokePoa(_) => return None,
        };
        Some(Self::new(tx_type, assets, amount))
    }
}
