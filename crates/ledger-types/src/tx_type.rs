//! # Transaction Type Enumeration
//!
//! A closed, versioned list of transaction types. The numeric discriminant is
//! part of every transaction hash, so existing ids must never be renumbered;
//! new types take fresh ids.
//!
//! POA-flavoured variants are the base id plus [`TxType::POA_OFFSET`].

use crate::entities::permissions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum TxType {
    RegisterAddress = 1,
    SetAddressPermissions = 2,
    DeleteAddress = 3,

    RegisterNamespace = 10,
    RegisterAssetClass = 11,
    LockAsset = 12,
    UnlockAsset = 13,
    TransferNamespace = 14,
    DeleteNamespace = 15,
    DeleteAssetClass = 16,

    IssueAsset = 20,
    TransferAsset = 21,
    TransferToMany = 22,
    TransferAsIssuer = 23,
    TransferFromMany = 24,
    IssueAndEncumber = 25,

    Encumber = 30,
    Unencumber = 31,
    ExerciseEncumbrance = 32,
    LockHolding = 33,
    UnlockHolding = 34,

    GrantPoa = 40,
    RevokePoa = 41,

    NewContract = 50,
    CommitToContract = 51,
    CancelContract = 52,

    PoaDeleteAddress = 1003,
    PoaRegisterNamespace = 1010,
    PoaRegisterAssetClass = 1011,
    PoaLockAsset = 1012,
    PoaUnlockAsset = 1013,
    PoaTransferNamespace = 1014,
    PoaDeleteNamespace = 1015,
    PoaDeleteAssetClass = 1016,
    PoaIssueAsset = 1020,
    PoaTransferAsset = 1021,
    PoaTransferToMany = 1022,
    PoaTransferAsIssuer = 1023,
    PoaTransferFromMany = 1024,
    PoaIssueAndEncumber = 1025,
    PoaEncumber = 1030,
    PoaUnencumber = 1031,
    PoaExerciseEncumbrance = 1032,
    PoaLockHolding = 1033,
    PoaUnlockHolding = 1034,
    PoaNewContract = 1050,
    PoaCommitToContract = 1051,
    PoaCancelContract = 1052,
}

impl TxType {
    /// Distance between a base type and its POA variant.
    pub const POA_OFFSET: u16 = 1000;

    /// Every defined type, in id order.
    pub const ALL: [TxType; 48] = [
        TxType::RegisterAddress,
        TxType::SetAddressPermissions,
        TxType::DeleteAddress,
        TxType::RegisterNamespace,
        TxType::RegisterAssetClass,
        TxType::LockAsset,
        TxType::UnlockAsset,
        TxType::TransferNamespace,
        TxType::DeleteNamespace,
        TxType::DeleteAssetClass,
        TxType::IssueAsset,
        TxType::TransferAsset,
        TxType::TransferToMany,
        TxType::TransferAsIssuer,
        TxType::TransferFromMany,
        TxType::IssueAndEncumber,
        TxType::Encumber,
        TxType::Unencumber,
        TxType::ExerciseEncumbrance,
        TxType::LockHolding,
        TxType::UnlockHolding,
        TxType::GrantPoa,
        TxType::RevokePoa,
        TxType::NewContract,
        TxType::CommitToContract,
        TxType::CancelContract,
        TxType::PoaDeleteAddress,
        TxType::PoaRegisterNamespace,
        TxType::PoaRegisterAssetClass,
        TxType::PoaLockAsset,
        TxType::PoaUnlockAsset,
        TxType::PoaTransferNamespace,
        TxType::PoaDeleteNamespace,
        TxType::PoaDeleteAssetClass,
        TxType::PoaIssueAsset,
        TxType::PoaTransferAsset,
        TxType::PoaTransferToMany,
        TxType::PoaTransferAsIssuer,
        TxType::PoaTransferFromMany,
        TxType::PoaIssueAndEncumber,
        TxType::PoaEncumber,
        TxType::PoaUnencumber,
        TxType::PoaExerciseEncumbrance,
        TxType::PoaLockHolding,
        TxType::PoaUnlockHolding,
        TxType::PoaNewContract,
        TxType::PoaCommitToContract,
        TxType::PoaCancelContract,
    ];

    /// Stable numeric id.
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.id() == id)
    }

    /// Whether this is an attorney-acting-for-principal variant.
    pub fn is_poa(self) -> bool {
        self.id() > Self::POA_OFFSET
    }

    /// The base type a POA variant stands for; identity for base types.
    pub fn effective(self) -> TxType {
        if self.is_poa() {
            // Every POA id is a defined base id plus the offset.
            Self::from_id(self.id() - Self::POA_OFFSET).unwrap_or(self)
        } else {
            self
        }
    }

    /// The POA variant of a base type, if the type may be delegated.
    pub fn poa_variant(self) -> Option<TxType> {
        if self.is_poa() {
            return Some(self);
        }
        Self::from_id(self.id() + Self::POA_OFFSET)
    }

    /// The single permission bit required to submit this type.
    ///
    /// POA variants require the bit of their effective type from the
    /// principal; the attorney separately needs `POA_EXERCISE`.
    pub fn required_permission(self) -> u64 {
        match self.effective() {
            TxType::RegisterAddress | TxType::SetAddressPermissions | TxType::DeleteAddress => {
                permissions::ADMIN
            }
            TxType::RegisterNamespace | TxType::TransferNamespace | TxType::DeleteNamespace => {
                permissions::NAMESPACES
            }
            TxType::RegisterAssetClass | TxType::DeleteAssetClass => permissions::ASSET_CLASSES,
            TxType::LockAsset
            | TxType::UnlockAsset
            | TxType::LockHolding
            | TxType::UnlockHolding => permissions::LOCKS,
            TxType::IssueAsset
            | TxType::TransferAsIssuer
            | TxType::TransferFromMany
            | TxType::IssueAndEncumber => permissions::ISSUE,
            TxType::TransferAsset | TxType::TransferToMany => permissions::TRANSFER,
            TxType::Encumber | TxType::Unencumber | TxType::ExerciseEncumbrance => {
                permissions::ENCUMBRANCES
            }
            TxType::GrantPoa | TxType::RevokePoa => permissions::POAS,
            TxType::NewContract => permissions::CONTRACTS,
            TxType::CommitToContract | TxType::CancelContract => permissions::COMMIT,
            _ => permissions::ADMIN,
        }
    }

    /// Snake-case label for logs and metrics.
    pub fn name(self) -> &'static str {
        match self {
            TxType::RegisterAddress => "register_address",
            TxType::SetAddressPermissions => "set_address_permissions",
            TxType::DeleteAddress => "delete_address",
            TxType::RegisterNamespace => "register_namespace",
            TxType::RegisterAssetClass => "register_asset_class",
            TxType::LockAsset => "lock_asset",
            TxType::UnlockAsset => "unlock_asset",
            TxType::TransferNamespace => "transfer_namespace",
            TxType::DeleteNamespace => "delete_namespace",
            TxType::DeleteAssetClass => "delete_asset_class",
            TxType::IssueAsset => "issue_asset",
            TxType::TransferAsset => "transfer_asset",
            TxType::TransferToMany => "transfer_to_many",
            TxType::TransferAsIssuer => "transfer_as_issuer",
            TxType::TransferFromMany => "transfer_from_many",
            TxType::IssueAndEncumber => "issue_and_encumber",
            TxType::Encumber => "encumber",
            TxType::Unencumber => "unencumber",
            TxType::ExerciseEncumbrance => "exercise_encumbrance",
            TxType::LockHolding => "lock_holding",
            TxType::UnlockHolding => "unlock_holding",
            TxType::GrantPoa => "grant_poa",
            TxType::RevokePoa => "revoke_poa",
            TxType::NewContract => "new_contract",
            TxType::CommitToContract => "commit_to_contract",
            TxType::CancelContract => "cancel_contract",
            TxType::PoaDeleteAddress => "poa_delete_address",
            TxType::PoaRegisterNamespace => "poa_register_namespace",
            TxType::PoaRegisterAssetClass => "poa_register_asset_class",
            TxType::PoaLockAsset => "poa_lock_asset",
            TxType::PoaUnlockAsset => "poa_unlock_asset",
            TxType::PoaTransferNamespace => "poa_transfer_namespace",
            TxType::PoaDeleteNamespace => "poa_delete_namespace",
            TxType::PoaDeleteAssetClass => "poa_delete_asset_class",
            TxType::PoaIssueAsset => "poa_issue_asset",
            TxType::PoaTransferAsset => "poa_transfer_asset",
            TxType::PoaTransferToMany => "poa_transfer_to_many",
            TxType::PoaTransferAsIssuer => "poa_transfer_as_issuer",
            TxType::PoaTransferFromMany => "poa_transfer_from_many",
            TxType::PoaIssueAndEncumber => "poa_issue_and_encumber",
            TxType::PoaEncumber => "poa_encumber",
            TxType::PoaUnencumber => "poa_unencumber",
            TxType::PoaExerciseEncumbrance => "poa_exercise_encumbrance",
            TxType::PoaLockHolding => "poa_lock_holding",
            TxType::PoaUnlockHolding => "poa_unlock_holding",
            TxType::PoaNewContract => "poa_new_contract",
            TxType::PoaCommitToContract => "poa_commit_to_contract",
            TxType::PoaCancelContract => "poa_cancel_contract",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<TxType> for u16 {
    fn from(value: TxType) -> Self {
        value.id()
    }
}

impl TryFrom<u16> for TxType {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        TxType::from_id(value).ok_or_else(|| format!("Unknown transaction type id {value}"))
    }
}
