//! Policy configuration attached to a ledger session.
//!
//! Carried as `Arc<StateConfig>` by the root state and inherited by every
//! snapshot, so two sessions with different policy can run side by side.

use serde::Deserialize;
use std::env;
use tracing::warn;

const DAY_SECS: i64 = 86_400;

/// Meaning of a power-of-attorney item whose ceiling is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoaZeroCeiling {
    /// A zero ceiling is a pure asset allow-list: any amount, never consumed.
    #[default]
    AllowList,
    /// A zero ceiling means the item is spent.
    Exhausted,
}

impl PoaZeroCeiling {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "allowlist" | "allow_list" => Some(PoaZeroCeiling::AllowList),
            "exhausted" => Some(PoaZeroCeiling::Exhausted),
            _ => None,
        }
    }
}

/// Ledger policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Transactions for another chain are structurally rejected
    pub chain_id: u32,

    /// Enforce per-address permission bits
    pub authorise_by_address: bool,

    /// Maximum age of a transaction relative to the block time
    pub max_tx_age_secs: i64,

    /// Maximum distance a transaction may be ahead of the block time
    pub max_future_skew_secs: i64,

    pub poa_zero_ceiling: PoaZeroCeiling,

    /// Reject credits to addresses that have no entry
    pub must_register_addresses: bool,

    /// Let an address release its own encumbrance when it has no administrators
    pub allow_owner_release: bool,

    pub max_reference_length: usize,
    pub max_metadata_length: usize,

    /// Furthest a DVP start date may lie in the future
    pub max_dvp_start_delay_secs: i64,

    /// Longest allowed span from max(now, start) to expiry
    pub max_contract_duration_secs: i64,

    /// Keep expired Exchange/Nominate entries as `Completed`
    pub retain_completed_contracts: bool,

    /// Idle time an address needs before it may delete itself. Must exceed
    /// `max_tx_age_secs` so a re-registered address cannot replay old nonces.
    pub min_address_age_to_delete_secs: i64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            chain_id: 20,
            authorise_by_address: false,
            max_tx_age_secs: DAY_SECS,
            max_future_skew_secs: 300,
            poa_zero_ceiling: PoaZeroCeiling::AllowList,
            must_register_addresses: false,
            allow_owner_release: false,
            max_reference_length: 256,
            max_metadata_length: 1024,
            max_dvp_start_delay_secs: 7 * DAY_SECS,
            max_contract_duration_secs: 366 * DAY_SECS,
            retain_completed_contracts: true,
            min_address_age_to_delete_secs: 2 * DAY_SECS,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(var = name, value = %raw, "unparseable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                warn!(var = name, value = %raw, "unparseable flag, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl StateConfig {
    /// Build configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LEDGER_CHAIN_ID` (default: 20)
    /// - `LEDGER_AUTHORISE_BY_ADDRESS` (default: false)
    /// - `LEDGER_MAX_TX_AGE_SECS` (default: 86400)
    /// - `LEDGER_MAX_FUTURE_SKEW_SECS` (default: 300)
    /// - `LEDGER_POA_ZERO_CEILING`: `allowlist` or `exhausted` (default: allowlist)
    /// - `LEDGER_MUST_REGISTER` (default: false)
    /// - `LEDGER_MIN_ADDRESS_AGE_TO_DELETE_SECS` (default: 172800)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let poa_zero_ceiling = match env::var("LEDGER_POA_ZERO_CEILING") {
            Ok(raw) => PoaZeroCeiling::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown POA zero-ceiling policy, using default");
                defaults.poa_zero_ceiling
            }),
            Err(_) => defaults.poa_zero_ceiling,
        };

        Self {
            chain_id: env_parsed("LEDGER_CHAIN_ID", defaults.chain_id),
            authorise_by_address: env_flag(
                "LEDGER_AUTHORISE_BY_ADDRESS",
                defaults.authorise_by_address,
            ),
            max_tx_age_secs: env_parsed("LEDGER_MAX_TX_AGE_SECS", defaults.max_tx_age_secs),
            max_future_skew_secs: env_parsed(
                "LEDGER_MAX_FUTURE_SKEW_SECS",
                defaults.max_future_skew_secs,
            ),
            poa_zero_ceiling,
            must_register_addresses: env_flag(
                "LEDGER_MUST_REGISTER",
                defaults.must_register_addresses,
            ),
            min_address_age_to_delete_secs: env_parsed(
                "LEDGER_MIN_ADDRESS_AGE_TO_DELETE_SECS",
                defaults.min_address_age_to_delete_secs,
            ),
            ..defaults
        }
    }

    /// Builder method for tests that enable permission checks.
    #[must_use]
    pub fn with_authorisation(mut self, enabled: bool) -> Self {
        self.authorise_by_address = enabled;
        self
    }
}
