//! # Ledger Types Crate
//!
//! Domain entities, the transaction envelope and the rejection taxonomy
//! shared by every ledger subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every cross-subsystem type lives here.
//! - **Stable Identity**: `TxType` discriminants never change; they are part of
//!   the transaction hash preimage.
//! - **Canonical Bytes**: the `codec` module is the only way a value becomes
//!   bytes for hashing or signing.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | `entities` | `AssetId`, `Balance`, permission bits, encumbrance parties, POA items |
//! | `tx_type` | Closed, versioned `TxType` enumeration |
//! | `transaction` | `Transaction` envelope and per-type payloads |
//! | `contracts` | DVP / Exchange / Nominate contract and commit data |
//! | `signing` | Signature payloads for contract sub-objects |
//! | `codec` | Canonical encoding, Keccak-256, address formatting |
//! | `errors` | `Rejection`, `RejectionKind`, `CodecError` |

pub mod codec;
pub mod contracts;
pub mod entities;
pub mod errors;
pub mod signing;
pub mod transaction;
pub mod tx_type;

pub use contracts::*;
pub use entities::*;
pub use errors::*;
pub use transaction::*;
pub use tx_type::TxType;
