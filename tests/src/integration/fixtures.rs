//! Shared fixtures: a seeded ledger and transaction builders.

use le_01_signature::test_helpers::TestAccount;
use le_01_signature::Secp256k1Verifier;
use le_02_ledger_state::{AddressEntry, EffectiveTx, LedgerState, NamespaceEntry, StateConfig};
use le_06_tx_dispatch::{BatchReport, TxProcessor};
use ledger_types::{
    codec, signing, AssetId, Balance, CommitData, ContractData, DvpCommit, DvpContract, DvpParty,
    DvpPayItem, DvpReceiveItem, PartySignature, PaymentSignature, Transaction, TxPayload,
};
use std::sync::Arc;

pub const CHAIN: u32 = 20;
pub const NOW: i64 = 1_700_000_000;

pub fn coin() -> AssetId {
    AssetId::new("NS", "COIN")
}

pub fn bond() -> AssetId {
    AssetId::new("NS", "BOND")
}

/// A ledger with namespace `NS` (classes COIN and BOND) owned by `issuer`,
/// 1000 COIN on alice and 1000 BOND on bob.
pub struct Ledger {
    pub state: LedgerState,
    pub processor: TxProcessor,
    pub issuer: TestAccount,
    pub alice: TestAccount,
    pub bob: TestAccount,
    pub carol: TestAccount,
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_config(StateConfig::default())
    }

    pub fn with_config(config: StateConfig) -> Self {
        let issuer = TestAccount::from_seed(9);
        let alice = TestAccount::from_seed(1);
        let bob = TestAccount::from_seed(2);
        let carol = TestAccount::from_seed(3);

        let mut state = LedgerState::new(config);
        let genesis = state.genesis();
        genesis
            .insert(NamespaceEntry::new("NS", &issuer.address).with_class("COIN").with_class("BOND"))
            .expect("genesis namespace");
        genesis
            .insert(AddressEntry::new(&issuer.address).with_public_key(&issuer.public_key))
            .expect("genesis issuer");
        genesis
            .insert(AddressEntry::new(&alice.address).with_balance(&coin(), 1000))
            .expect("genesis alice");
        genesis
            .insert(AddressEntry::new(&bob.address).with_balance(&bond(), 1000))
            .expect("genesis bob");
        genesis.insert(AddressEntry::new(&carol.address)).expect("genesis carol");

        Self {
            state,
            processor: TxProcessor::new(Arc::new(Secp256k1Verifier::new())),
            issuer,
            alice,
            bob,
            carol,
        }
    }

    pub fn nonce_of(&self, account: &TestAccount) -> u64 {
        self.state
            .view()
            .address(&account.address)
            .map(|e| e.nonce)
            .unwrap_or(0)
    }

    pub fn balance(&self, account: &TestAccount, asset: &AssetId) -> Balance {
        self.state.view().balance_of(&account.address, asset)
    }

    /// A transaction from `from` at its next committed nonce.
    pub fn tx(&self, from: &TestAccount, payload: TxPayload) -> Transaction {
        tx_at(from, self.nonce_of(from), payload)
    }

    /// Apply one block at `NOW`.
    pub fn block(&mut self, txs: &[Transaction]) -> BatchReport {
        self.processor
            .apply_batch(&mut self.state, txs, NOW)
            .expect("block applies without a fatal fault")
    }
}

pub fn tx_at(from: &TestAccount, nonce: u64, payload: TxPayload) -> Transaction {
    Transaction::new(
        CHAIN,
        nonce,
        NOW,
        from.address.clone(),
        from.public_key.clone(),
        payload,
    )
}

pub fn settlements(effective: &[EffectiveTx]) -> usize {
    effective
        .iter()
        .filter(|e| matches!(e, EffectiveTx::Settlement { .. }))
        .count()
}

// =============================================================================
// DVP HELPERS
// =============================================================================

/// Alice pays 432 COIN for 431 of bob's BOND. Both parties must sign.
pub fn swap_dvp(alice: &TestAccount, bob: &TestAccount) -> ContractData {
    ContractData::Dvp(DvpContract {
        parties: vec![
            DvpParty {
                address: alice.address.clone(),
                must_sign: true,
                pay: vec![DvpPayItem::new(coin(), 432)],
                receive: vec![DvpReceiveItem::new(bond(), 431)],
                ..Default::default()
            },
            DvpParty {
                address: bob.address.clone(),
                must_sign: true,
                pay: vec![DvpPayItem::new(bond(), 431)],
                receive: vec![DvpReceiveItem::new(coin(), 432)],
                ..Default::default()
            },
        ],
        start: NOW,
        expiry: NOW + 3_600,
        ..Default::default()
    })
}

/// Address of the contract `submitter` creates at `nonce`.
pub fn contract_at(submitter: &TestAccount, nonce: u64) -> String {
    codec::contract_address(CHAIN, &submitter.address, nonce).expect("contract address")
}

/// Party and first-payment signatures of `party_id` on `contract`.
pub fn dvp_commit(
    contract: &str,
    party_id: &str,
    signer: &TestAccount,
    asset: &AssetId,
    amount: Balance,
) -> TxPayload {
    let party_message = signing::party_message(contract).expect("party message");
    let payment_message =
        signing::payment_message(contract, party_id, 0, asset, &amount.to_string())
            .expect("payment message");
    TxPayload::CommitToContract(CommitData::Dvp(DvpCommit {
        contracts: vec![contract.to_string()],
        party: Some(PartySignature {
            party_id: party_id.to_string(),
            public_key: signer.public_key.clone(),
            signature: signer.sign(&party_message),
        }),
        payments: vec![PaymentSignature {
            party_id: party_id.to_string(),
            index: 0,
            public_key: signer.public_key.clone(),
            signature: signer.sign(&payment_message),
        }],
        ..Default::default()
    }))
}

/// Create the swap and have both parties sign it, settling in the commit
/// block. Returns the contract address.
pub fn settle_swap(ledger: &mut Ledger) -> String {
    let create = ledger.tx(&ledger.alice, TxPayload::NewContract(swap_dvp(&ledger.alice, &ledger.bob)));
    let contract = contract_at(&ledger.alice, create.nonce);
    ledger.block(&[create]);

    let alice_commit = ledger.tx(&ledger.alice, dvp_commit(&contract, "1", &ledger.alice, &coin(), 432));
    let bob_commit = ledger.tx(&ledger.bob, dvp_commit(&contract, "2", &ledger.bob, &bond(), 431));
    ledger.block(&[alice_commit, bob_commit]);
    contract
}
