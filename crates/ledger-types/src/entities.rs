//! # Core Domain Entities
//!
//! Value types that appear both inside transaction payloads and inside
//! ledger state entries.
//!
//! ## Type Decisions
//!
//! - `Balance = i128`: issuers hold transiently negative balances, so the
//!   type is signed; 127 bits of magnitude is far beyond any asset supply.
//! - Addresses are `0x`-prefixed lowercase hex strings. All cross-entity
//!   links (contract ↔ event ↔ address) are string keys, never references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Signed asset quantity.
pub type Balance = i128;

/// A 32-byte Keccak-256 digest.
pub type Hash = [u8; 32];

/// Separator between namespace and class in a full asset id.
pub const ASSET_SEPARATOR: char = '|';

/// Reserved encumbrance reference for issuer holding locks.
pub const ISSUER_LOCK: &str = "ISSUER_LOCK";

/// Reserved encumbrance reference for holder locks.
pub const HOLDER_LOCK: &str = "HOLDER_LOCK";

/// Returns true for reference names only the engine may create.
pub fn is_reserved_reference(reference: &str) -> bool {
    reference.eq_ignore_ascii_case(ISSUER_LOCK) || reference.eq_ignore_ascii_case(HOLDER_LOCK)
}

// =============================================================================
// ASSET IDENTITY
// =============================================================================

/// Full asset id, `namespace|class`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId {
    pub namespace: String,
    pub class: String,
}

impl AssetId {
    pub fn new(namespace: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            class: class.into(),
        }
    }

    /// The `namespace|class` key used in balance maps.
    pub fn full_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, ASSET_SEPARATOR, self.class)
    }
}

/// Error parsing an `AssetId`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid asset id `{0}`: expected namespace|class")]
pub struct AssetIdParseError(pub String);

impl FromStr for AssetId {
    type Err = AssetIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(ASSET_SEPARATOR) {
            Some((ns, class))
                if !ns.is_empty() && !class.is_empty() && !class.contains(ASSET_SEPARATOR) =>
            {
                Ok(AssetId::new(ns, class))
            }
            _ => Err(AssetIdParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for AssetId {
    type Error = AssetIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.to_string()
    }
}

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Address permission bits, one per transaction family.
pub mod permissions {
    pub const ADMIN: u64 = 1;
    pub const NAMESPACES: u64 = 1 << 1;
    pub const ASSET_CLASSES: u64 = 1 << 2;
    pub const ISSUE: u64 = 1 << 3;
    pub const TRANSFER: u64 = 1 << 4;
    pub const ENCUMBRANCES: u64 = 1 << 5;
    pub const LOCKS: u64 = 1 << 6;
    pub const POAS: u64 = 1 << 7;
    pub const POA_EXERCISE: u64 = 1 << 8;
    pub const CONTRACTS: u64 = 1 << 9;
    pub const COMMIT: u64 = 1 << 10;

    /// Every bit, for genesis / administrator accounts.
    pub const ALL: u64 = (1 << 11) - 1;
}

// =============================================================================
// ENCUMBRANCE & POA BUILDING BLOCKS
// =============================================================================

/// An administrator or beneficiary of an encumbrance, valid over a window.
///
/// `end == 0` means open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncumbranceParty {
    pub address: String,
    pub start: i64,
    pub end: i64,
}

impl EncumbranceParty {
    /// An open-ended party valid from the epoch.
    pub fn open(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            start: 0,
            end: 0,
        }
    }

    /// Whether this party may act at time `now`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.start <= now && (self.end == 0 || self.end >= now)
    }

    /// Case-insensitive address match combined with the validity window.
    pub fn matches(&self, address: &str, now: i64) -> bool {
        self.address.eq_ignore_ascii_case(address) && self.is_valid_at(now)
    }
}

/// One line of a power-of-attorney grant.
///
/// `ceiling` is the remaining amount the attorney may still move; `assets`
/// is the whitelist of asset patterns (`*` wildcards allowed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoaItem {
    pub tx_type: crate::TxType,
    pub ceiling: Balance,
    pub assets: Vec<String>,
}

impl PoaItem {
    pub fn new(tx_type: crate::TxType, ceiling: Balance, assets: Vec<String>) -> Self {
        Self {
            tx_type,
            ceiling,
            assets,
        }
    }
}

/// Glob match where `*` matches any (possibly empty) run of characters.
///
/// Matching is case-sensitive, like asset ids themselves.
pub fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let c: Vec<char> = candidate.chars().collect();
    let (mut pi, mut ci) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ci < c.len() {
        if pi < p.len() && p[pi] != '*' && p[pi] == c[ci] {
            pi += 1;
            ci += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ci;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ci = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== ASSET ID TESTS =====

    #[test]
    fn test_asset_id_parse_and_display() {
        let id: AssetId = "NS|Class1".parse().unwrap();
        assert_eq!(id.namespace, "NS");
        assert_eq!(id.class, "Class1");
        assert_eq!(id.to_string(), "NS|Class1");
    }

    #[test]
    fn test_asset_id_rejects_malformed() {
        assert!("NS".parse::<AssetId>().is_err());
        assert!("|C".parse::<AssetId>().is_err());
        assert!("NS|".parse::<AssetId>().is_err());
        assert!("A|B|C".parse::<AssetId>().is_err());
    }

    #[test]
    fn test_asset_id_serializes_as_string() {
        let id = AssetId::new("NS", "C");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"NS|C\"");
        let back: AssetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    // ===== PARTY WINDOW TESTS =====

    #[test]
    fn test_party_window() {
        let p = EncumbranceParty {
            address: "0xAbC".into(),
            start: 100,
            end: 200,
        };
        assert!(!p.is_valid_at(99));
        assert!(p.is_valid_at(100));
        assert!(p.is_valid_at(200));
        assert!(!p.is_valid_at(201));
        assert!(p.matches("0xabc", 150));
        assert!(EncumbranceParty::open("x").is_valid_at(i64::MAX));
    }

    // ===== WILDCARD TESTS =====

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", "NS|C"));
        assert!(wildcard_match("NS|*", "NS|C"));
        assert!(wildcard_match("NS|C", "NS|C"));
        assert!(wildcard_match("N*|C*", "NS1|Class"));
        assert!(!wildcard_match("NS|*", "OTHER|C"));
        assert!(!wildcard_match("NS|C", "NS|C2"));
        assert!(wildcard_match("", ""));
        assert!(!wildcard_match("", "x"));
    }

    #[test]
    fn test_reserved_references() {
        assert!(is_reserved_reference("issuer_lock"));
        assert!(is_reserved_reference("HOLDER_LOCK"));
        assert!(!is_reserved_reference("escrow-1"));
    }
}
