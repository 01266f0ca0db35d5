//! # Ledger Invariants
//!
//! Properties that must hold however operations are combined:
//!
//! - a committed nonce can never be replayed;
//! - encumbrance operations conserve supply and never over-reserve;
//! - a POA ceiling only ever decreases, and a spent item stays spent;
//! - resolving a settled contract's event again changes nothing;
//! - the transaction hash is a pure function of the signed fields;
//! - a rejected transaction leaves the snapshot exactly as it was.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use le_02_ledger_state::{ContractEvent, RuleError, RuleResult, StateSnapshot};
    use le_03_encumbrance::{
        encumber, exercise, unencumber, EncumberRequest, ExerciseRequest, UnencumberRequest,
    };
    use le_05_contracts::{resolve_event, Resolution};
    use le_06_tx_dispatch::Outcome;
    use ledger_types::{
        AssetTransfer, EncumbranceParty, GrantPoa, PoaItem, RejectionKind, Transaction,
        TxPayload, TxType,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn transfer(to: &str, amount: i128) -> TxPayload {
        TxPayload::TransferAsset(AssetTransfer {
            asset: coin(),
            to: to.to_string(),
            amount,
            metadata: String::new(),
        })
    }

    // ===== NONCE TESTS =====

    #[test]
    fn test_committed_nonce_cannot_be_replayed() {
        let mut ledger = Ledger::new();
        let tx = ledger.tx(&ledger.alice, transfer(&ledger.bob.address, 100));
        let hash = tx.hash().expect("hash");
        assert_eq!(ledger.block(&[tx.clone()]).accepted(), 1);

        let replay = ledger.block(&[tx]);
        let rejection = replay
            .outcome_of(&hash)
            .and_then(Outcome::rejection)
            .expect("replay is rejected");
        assert_eq!(rejection.kind, RejectionKind::Precondition);
        assert_eq!(ledger.balance(&ledger.alice, &coin()), 900);
        assert_eq!(ledger.balance(&ledger.bob, &coin()), 100);
        assert_eq!(ledger.nonce_of(&ledger.alice), 1);
    }

    #[test]
    fn test_duplicate_nonce_in_one_block_applies_once() {
        let mut ledger = Ledger::new();
        let first = tx_at(&ledger.alice, 0, transfer(&ledger.bob.address, 100));
        let second = tx_at(&ledger.alice, 0, transfer(&ledger.carol.address, 100));

        let report = ledger.block(&[first, second]);
        assert_eq!(report.accepted(), 1);
        assert_eq!(report.rejected(), 1);
        assert_eq!(ledger.balance(&ledger.alice, &coin()), 900);
    }

    // ===== ENCUMBRANCE TESTS =====

    fn apply(snapshot: &mut StateSnapshot<'_>, op: impl FnOnce(&mut StateSnapshot<'_>) -> RuleResult<()>) {
        let mut child = snapshot.create_snapshot();
        match op(&mut child) {
            Ok(()) => {
                let changes = child.into_changes();
                snapshot.merge(changes).expect("merge");
            }
            Err(RuleError::Rejected(_)) => {}
            Err(RuleError::Fatal(fault)) => panic!("fatal fault: {fault}"),
        }
    }

    #[test]
    fn test_encumbrance_operations_conserve_supply() {
        let ledger = Ledger::new();
        let alice = ledger.alice.address.clone();
        let bob = ledger.bob.address.clone();
        let carol = ledger.carol.address.clone();
        let asset = coin();
        let administrators = [EncumbranceParty::open(bob.as_str())];
        let beneficiaries = [EncumbranceParty::open(carol.as_str())];

        let mut snapshot = ledger.state.snapshot();
        let mut rng = StdRng::seed_from_u64(0x1ed9e5);
        for step in 0..300 {
            let reference = format!("ref-{}", rng.gen_range(0..6));
            let amount: i128 = rng.gen_range(1..250);
            match rng.gen_range(0..3) {
                0 => apply(&mut snapshot, |s| {
                    encumber(
                        s,
                        EncumberRequest {
                            address: &alice,
                            asset: &asset,
                            reference: &reference,
                            amount,
                            administrators: &administrators,
                            beneficiaries: &beneficiaries,
                            cumulative: false,
                            now: NOW,
                        },
                    )
                }),
                1 => apply(&mut snapshot, |s| {
                    unencumber(
                        s,
                        UnencumberRequest {
                            address: &alice,
                            asset: &asset,
                            reference: &reference,
                            amount,
                            acting: &bob,
                            now: NOW,
                        },
                    )
                }),
                _ => apply(&mut snapshot, |s| {
                    exercise(
                        s,
                        ExerciseRequest {
                            address: &alice,
                            asset: &asset,
                            reference: &reference,
                            amount,
                            acting: &carol,
                            destination: &carol,
                            now: NOW,
                        },
                    )
                }),
            }

            let supply: i128 = [&alice, &bob, &carol]
                .iter()
                .map(|a| snapshot.balance_of(a, &asset))
                .sum();
            assert_eq!(supply, 1000, "supply changed at step {step}");
            let balance = snapshot.balance_of(&alice, &asset);
            let reserved = snapshot.reserved_of(&alice, &asset);
            assert!((0..=balance).contains(&reserved), "over-reserved at step {step}");
            assert!(snapshot.spendable(&alice, &asset) >= 0);
        }
    }

    // ===== POA TESTS =====

    fn ceiling(ledger: &Ledger) -> Option<i128> {
        ledger
            .state
            .view()
            .poa(&ledger.alice.address)
            .and_then(|e| e.grants.get("desk"))
            .and_then(|g| g.items.first())
            .map(|i| i.ceiling)
    }

    fn delegated_transfer(ledger: &Ledger, amount: i128) -> Transaction {
        ledger
            .tx(&ledger.carol, transfer(&ledger.bob.address, amount))
            .with_poa(ledger.alice.address.clone(), "desk")
    }

    #[test]
    fn test_poa_ceiling_only_decreases() {
        let mut ledger = Ledger::new();
        let grant = ledger.tx(
            &ledger.alice,
            TxPayload::GrantPoa(GrantPoa {
                reference: "desk".into(),
                attorney: ledger.carol.address.clone(),
                start: NOW - 60,
                expiry: NOW + 86_400,
                items: vec![PoaItem::new(TxType::TransferAsset, 300, vec!["NS|*".into()])],
            }),
        );
        assert_eq!(ledger.block(&[grant]).accepted(), 1);
        assert_eq!(ceiling(&ledger), Some(300));

        let mut last = 300;
        for (amount, accepted) in [(100, true), (150, true), (100, false), (50, true)] {
            let tx = delegated_transfer(&ledger, amount);
            let report = ledger.block(&[tx]);
            assert_eq!(report.accepted() == 1, accepted, "transfer of {amount}");
            let now = ceiling(&ledger).unwrap_or(0);
            assert!(now <= last, "ceiling grew from {last} to {now}");
            last = now;
        }
        assert_eq!(ledger.balance(&ledger.bob, &coin()), 300);
        assert_eq!(ledger.balance(&ledger.alice, &coin()), 700);

        // The spent item is gone and does not come back.
        assert!(ledger.state.view().poa(&ledger.alice.address).is_none());
        let after = delegated_transfer(&ledger, 1);
        assert_eq!(ledger.block(&[after]).rejected(), 1);
        assert_eq!(ledger.balance(&ledger.bob, &coin()), 300);
    }

    // ===== EVENT TESTS =====

    #[test]
    fn test_settled_contract_events_are_idempotent() {
        let mut ledger = Ledger::new();
        let contract = settle_swap(&mut ledger);
        assert!(ledger.state.view().contract(&contract).is_none());

        let mut snapshot = ledger.state.snapshot();
        let before = snapshot.digest().expect("digest");
        for _ in 0..2 {
            let resolution = resolve_event(&mut snapshot, &ContractEvent::commit(&contract), NOW)
                .expect("resolution");
            assert!(matches!(resolution, Resolution::Ignored(_)));
            let time = resolve_event(&mut snapshot, &ContractEvent::time(&contract, NOW), NOW)
                .expect("resolution");
            assert!(matches!(time, Resolution::Ignored(_)));
        }
        assert_eq!(snapshot.digest().expect("digest"), before);
        assert_eq!(snapshot.balance_of(&ledger.alice.address, &coin()), 568);
        assert_eq!(snapshot.balance_of(&ledger.bob.address, &coin()), 432);
    }

    // ===== HASH TESTS =====

    #[test]
    fn test_hash_depends_only_on_signed_fields() {
        let ledger = Ledger::new();
        let tx = ledger.tx(&ledger.alice, transfer(&ledger.bob.address, 100));

        let bytes = tx.encode().expect("encode");
        let decoded = Transaction::decode(&bytes).expect("decode");
        assert_eq!(decoded, tx);
        assert_eq!(decoded.encode().expect("encode"), bytes);
        assert_eq!(decoded.hash().expect("hash"), tx.hash().expect("hash"));

        let mut signed = tx.clone();
        signed.signature = "00".repeat(64);
        assert_eq!(signed.hash().expect("hash"), tx.hash().expect("hash"));

        let other = ledger.tx(&ledger.alice, transfer(&ledger.bob.address, 101));
        assert_ne!(other.hash().expect("hash"), tx.hash().expect("hash"));
        let later = tx.clone().with_priority(1);
        assert_ne!(later.hash().expect("hash"), tx.hash().expect("hash"));
    }

    // ===== ATOMICITY TESTS =====

    #[test]
    fn test_rejected_transaction_leaves_snapshot_untouched() {
        let ledger = Ledger::new();
        let dispatcher = ledger.processor.dispatcher();
        let mut snapshot = ledger.state.snapshot();
        let before = snapshot.digest().expect("digest");

        let overdraw = ledger.tx(&ledger.alice, transfer(&ledger.bob.address, 5_000));
        let outcome = dispatcher
            .dispatch(&overdraw, &mut snapshot, NOW, 0, false)
            .expect("no fault");
        assert!(matches!(outcome, Outcome::Rejected(_)));
        assert_eq!(snapshot.digest().expect("digest"), before);

        let valid = ledger.tx(&ledger.alice, transfer(&ledger.bob.address, 5));
        let outcome = dispatcher
            .dispatch(&valid, &mut snapshot, NOW, 0, false)
            .expect("no fault");
        assert!(outcome.is_accepted());
        assert_ne!(snapshot.digest().expect("digest"), before);
        assert_eq!(snapshot.effective_transactions().len(), 1);
    }
}
