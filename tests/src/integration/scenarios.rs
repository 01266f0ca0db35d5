//! # End-to-End Scenarios
//!
//! Whole flows driven through `TxProcessor::apply_batch`, one call per block:
//!
//! 1. **Transfer**: a plain asset transfer between registered addresses,
//!    counted in the dispatch metrics.
//! 2. **DVP**: an unsigned swap, two party commits, settlement in the sweep.
//! 3. **Exchange**: block-multiple limits on a standing offer.
//! 4. **POA whitelist**: a delegated contract creation blocked by its grant,
//!    then allowed once the grant is superseded.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use le_02_ledger_state::ContractStatus;
    use le_04_power_of_attorney::PoaDemand;
    use le_06_tx_dispatch::Outcome;
    use ledger_telemetry::{gather_metrics, TRANSACTIONS};
    use ledger_types::{
        AssetTransfer, ContractData, ExchangeCommit, ExchangeCommitInput, ExchangeContract,
        ExchangeInput, ExchangeOutput, GrantPoa, PoaItem, RejectionKind, TxPayload, TxType,
        CommitData,
    };

    // =============================================================================
    // TRANSFER
    // =============================================================================

    #[test]
    fn test_simple_transfer() {
        let mut ledger = Ledger::new();
        let tx = ledger.tx(
            &ledger.alice,
            TxPayload::TransferAsset(AssetTransfer {
                asset: coin(),
                to: ledger.bob.address.clone(),
                amount: 400,
                metadata: String::new(),
            }),
        );

        let report = ledger.block(&[tx]);
        assert_eq!(report.accepted(), 1);
        assert_eq!(ledger.balance(&ledger.alice, &coin()), 600);
        assert_eq!(ledger.balance(&ledger.bob, &coin()), 400);
        assert_eq!(ledger.balance(&ledger.alice, &bond()), 0);
        assert_eq!(ledger.balance(&ledger.bob, &bond()), 1000);
        assert_eq!(ledger.nonce_of(&ledger.alice), 1);
    }

    #[test]
    fn test_accepted_block_is_counted() {
        let mut ledger = Ledger::new();
        let accepted = || TRANSACTIONS.with_label_values(&["transfer_asset", "accepted"]).get();
        let before = accepted();
        let tx = ledger.tx(
            &ledger.alice,
            TxPayload::TransferAsset(AssetTransfer {
                asset: coin(),
                to: ledger.bob.address.clone(),
                amount: 1,
                metadata: String::new(),
            }),
        );

        assert_eq!(ledger.block(&[tx]).accepted(), 1);
        assert!(accepted() > before);
        let exposition = gather_metrics().expect("metrics encode");
        assert!(exposition.contains("le_dispatch_transactions_total"));
    }

    // =============================================================================
    // DVP
    // =============================================================================

    #[test]
    fn test_dvp_settles_after_both_parties_commit() {
        let mut ledger = Ledger::new();
        let create = ledger.tx(
            &ledger.alice,
            TxPayload::NewContract(swap_dvp(&ledger.alice, &ledger.bob)),
        );
        let contract = contract_at(&ledger.alice, create.nonce);

        let created = ledger.block(&[create]);
        assert_eq!(created.accepted(), 1);
        assert_eq!(created.sweep.events(), 0);
        assert_eq!(
            ledger.state.view().contract(&contract).map(|c| c.status),
            Some(ContractStatus::Pending)
        );

        // One signature is not enough.
        let alice_commit = ledger.tx(
            &ledger.alice,
            dvp_commit(&contract, "1", &ledger.alice, &coin(), 432),
        );
        let first = ledger.block(&[alice_commit]);
        assert_eq!(first.accepted(), 1);
        assert_eq!(first.sweep.settled, 0);
        assert_eq!(ledger.balance(&ledger.alice, &coin()), 1000);

        let bob_commit = ledger.tx(
            &ledger.bob,
            dvp_commit(&contract, "2", &ledger.bob, &bond(), 431),
        );
        let second = ledger.block(&[bob_commit]);
        assert_eq!(second.accepted(), 1);
        assert_eq!(second.sweep.settled, 1);
        assert_eq!(settlements(&second.effective), 2);

        assert_eq!(ledger.balance(&ledger.alice, &coin()), 568);
        assert_eq!(ledger.balance(&ledger.alice, &bond()), 431);
        assert_eq!(ledger.balance(&ledger.bob, &coin()), 432);
        assert_eq!(ledger.balance(&ledger.bob, &bond()), 569);
        assert!(ledger.state.view().contract(&contract).is_none());
    }

    #[test]
    fn test_dvp_commit_with_wrong_signer_is_rejected() {
        let mut ledger = Ledger::new();
        let create = ledger.tx(
            &ledger.alice,
            TxPayload::NewContract(swap_dvp(&ledger.alice, &ledger.bob)),
        );
        let contract = contract_at(&ledger.alice, create.nonce);
        ledger.block(&[create]);

        // Carol signs for party 2, which is bob's slot.
        let forged = ledger.tx(
            &ledger.carol,
            dvp_commit(&contract, "2", &ledger.carol, &bond(), 431),
        );
        let hash = forged.hash().expect("hash");
        let report = ledger.block(&[forged]);
        let rejection = report
            .outcome_of(&hash)
            .and_then(Outcome::rejection)
            .expect("forged commit is rejected");
        assert_eq!(rejection.kind, RejectionKind::Signature);
        assert_eq!(
            ledger.state.view().contract(&contract).map(|c| c.status),
            Some(ContractStatus::Pending)
        );
    }

    // =============================================================================
    // EXCHANGE
    // =============================================================================

    fn exchange_commit(contract: &str, amount: i128) -> TxPayload {
        TxPayload::CommitToContract(CommitData::Exchange(ExchangeCommit {
            contract: contract.to_string(),
            inputs: vec![ExchangeCommitInput {
                asset: coin(),
                amount,
            }],
            destination: None,
        }))
    }

    #[test]
    fn test_exchange_enforces_block_limits() {
        let mut ledger = Ledger::new();
        let create = ledger.tx(
            &ledger.issuer,
            TxPayload::NewContract(ContractData::Exchange(ExchangeContract {
                inputs: vec![ExchangeInput {
                    asset: coin(),
                    block_size: 10,
                    ..Default::default()
                }],
                outputs: vec![ExchangeOutput {
                    asset: bond(),
                    block_size: 1,
                    ..Default::default()
                }],
                min_blocks: 2,
                max_blocks: 3,
                start: NOW,
                expiry: NOW + 3_600,
                ..Default::default()
            })),
        );
        let contract = contract_at(&ledger.issuer, create.nonce);
        assert_eq!(ledger.block(&[create]).accepted(), 1);

        let too_many = ledger.tx(&ledger.alice, exchange_commit(&contract, 40));
        let report = ledger.block(&[too_many]);
        assert_eq!(report.rejected(), 1);
        assert_eq!(ledger.balance(&ledger.alice, &coin()), 1000);
        assert_eq!(ledger.balance(&ledger.alice, &bond()), 0);
        assert_eq!(ledger.nonce_of(&ledger.alice), 0);

        let two_blocks = ledger.tx(&ledger.alice, exchange_commit(&contract, 20));
        let report = ledger.block(&[two_blocks]);
        assert_eq!(report.accepted(), 1);
        assert_eq!(settlements(&report.effective), 2);
        assert_eq!(ledger.balance(&ledger.alice, &coin()), 980);
        assert_eq!(ledger.balance(&ledger.alice, &bond()), 2);
        assert_eq!(ledger.balance(&ledger.issuer, &coin()), 20);
        assert_eq!(
            ledger.state.view().contract(&contract).map(|c| c.status),
            Some(ContractStatus::Pending)
        );
    }

    // =============================================================================
    // POA WHITELIST
    // =============================================================================

    fn grant(ledger: &Ledger, assets: &[&str]) -> ledger_types::Transaction {
        ledger.tx(
            &ledger.alice,
            TxPayload::GrantPoa(GrantPoa {
                reference: "desk".into(),
                attorney: ledger.carol.address.clone(),
                start: NOW - 60,
                expiry: NOW + 86_400,
                items: vec![PoaItem::new(
                    TxType::NewContract,
                    5,
                    assets.iter().map(|a| a.to_string()).collect(),
                )],
            }),
        )
    }

    #[test]
    fn test_poa_whitelist_blocks_until_grant_superseded() {
        let mut ledger = Ledger::new();
        let partial = grant(&ledger, &["NS|COIN"]);
        assert_eq!(ledger.block(&[partial]).accepted(), 1);

        let delegated = ledger
            .tx(
                &ledger.carol,
                TxPayload::NewContract(ContractData::Exchange(ExchangeContract {
                    inputs: vec![ExchangeInput {
                        asset: coin(),
                        block_size: 5,
                        ..Default::default()
                    }],
                    outputs: vec![ExchangeOutput {
                        asset: bond(),
                        block_size: 1,
                        ..Default::default()
                    }],
                    start: NOW,
                    expiry: NOW + 3_600,
                    ..Default::default()
                })),
            )
            .with_poa(ledger.alice.address.clone(), "desk");
        let contract = contract_at(&ledger.carol, delegated.nonce);
        let demand = PoaDemand::for_transaction(&delegated).expect("delegated demand");
        assert_eq!(demand.tx_type, TxType::NewContract);
        assert_eq!(demand.amount, 1);
        assert!(demand.assets.iter().any(|a| a == "NS|BOND"));

        let blocked = ledger.block(&[delegated.clone()]);
        assert_eq!(blocked.rejected(), 1);
        assert!(ledger.state.view().contract(&contract).is_none());
        assert_eq!(ledger.nonce_of(&ledger.carol), 0);

        let widened = grant(&ledger, &["NS|COIN", "NS|BOND"]);
        assert_eq!(ledger.block(&[widened]).accepted(), 1);

        let allowed = ledger.block(&[delegated]);
        assert_eq!(allowed.accepted(), 1);
        let entry = ledger
            .state
            .view()
            .contract(&contract)
            .expect("contract created under the superseding grant");
        assert!(entry.issuer.eq_ignore_ascii_case(&ledger.alice.address));
        assert_eq!(ledger.nonce_of(&ledger.carol), 1);
        assert_eq!(ledger.nonce_of(&ledger.alice), 2);

        let ceiling = ledger
            .state
            .view()
            .poa(&ledger.alice.address)
            .and_then(|e| e.grants.get("desk"))
            .map(|g| g.items[0].ceiling);
        assert_eq!(ceiling, Some(4));
    }
}
