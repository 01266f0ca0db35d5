//! Contract lifecycle: creation, commits, cancellation and event resolution.

use crate::domain::context::{check_signature, open_contract, store_contract, ContractContext};
use crate::domain::{dvp, exchange, nominate};
use le_02_ledger_state::{
    ContractEntry, ContractEvent, ContractStatus, EventKind, RuleError, RuleResult, StateError,
    StateSnapshot,
};
use ledger_types::{codec, signing, CancelContract, CommitData, ContractData, ContractFamily};
use tracing::{debug, info};

/// What resolving one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Assets moved; the contract is gone.
    Settled { moves: usize },
    /// The contract passed its expiry and was closed.
    Expired,
    /// Not settled yet; the contract was rescheduled.
    Deferred(String),
    /// Nothing to do.
    Ignored(String),
}

/// Create a contract at the address derived from the submitter and nonce.
pub fn create_contract(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    data: &ContractData,
) -> RuleResult<String> {
    let address = codec::contract_address(ctx.chain_id, ctx.submitter, ctx.nonce)?;
    if snapshot.exists::<ContractEntry>(&address) {
        return Err(RuleError::precondition(format!(
            "Contract {address} already exists"
        )));
    }

    let entry = match data {
        ContractData::Dvp(d) => dvp::create(snapshot, ctx, d.clone(), &address)?,
        ContractData::Exchange(x) => exchange::create(snapshot, ctx, x.clone(), &address)?,
        ContractData::Nominate(n) => nominate::create(snapshot, ctx, n.clone(), &address)?,
    };
    let status = entry.status;
    let family = entry.family;
    snapshot.insert(entry)?;
    if status == ContractStatus::AwaitingEvent {
        snapshot.push_event(ContractEvent::commit(&address));
    }

    info!(contract = %address, %family, author = %ctx.author, ?status, "contract created");
    Ok(address)
}

/// Apply a commit to the contract(s) it names.
pub fn commit_contract(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    data: &CommitData,
) -> RuleResult<()> {
    for address in data.contracts() {
        let stored = snapshot
            .contract(&address)
            .map(|c| c.family)
            .ok_or_else(|| RuleError::contract_state(format!("Contract {address} does not exist")))?;
        if stored != data.family() {
            return Err(RuleError::structural(format!(
                "{} commit sent to {stored} contract {address}",
                data.family()
            )));
        }
    }
    match data {
        CommitData::Dvp(c) => dvp::commit(snapshot, ctx, c),
        CommitData::Exchange(c) => exchange::commit(snapshot, ctx, c).map(|_| ()),
        CommitData::Nominate(c) => nominate::commit(snapshot, ctx, c).map(|_| ()),
    }
}

/// Cancel an open contract.
///
/// The issuer may cancel any contract; any DVP party may cancel a DVP.
pub fn cancel_contract(
    snapshot: &mut StateSnapshot<'_>,
    ctx: &ContractContext<'_>,
    cancel: &CancelContract,
) -> RuleResult<()> {
    let mut entry = open_contract(snapshot, &cancel.contract)?;
    let mut authorities = vec![entry.issuer.clone()];
    if let ContractData::Dvp(d) = &entry.data {
        authorities.extend(d.parties.iter().map(|p| p.address.to_ascii_lowercase()));
    }
    if !authorities.iter().any(|a| a.eq_ignore_ascii_case(ctx.author)) {
        return Err(RuleError::precondition(format!(
            "{} may not cancel contract {}",
            ctx.author, entry.address
        )));
    }

    let mut signers = vec![ctx.author];
    if ctx.is_poa() {
        signers.push(ctx.submitter);
    }
    let message = signing::cancel_message(&entry.address)?;
    check_signature(
        ctx.verifier,
        &message,
        &cancel.public_key,
        &cancel.signature,
        &signers,
        "cancellation",
    )?;

    entry.status = ContractStatus::Cancelled;
    entry.cancelled_at = Some(ctx.now);
    entry.next_time_event = None;
    entry.status_note = format!("Cancelled by {}", ctx.author.to_ascii_lowercase());
    let address = entry.address.clone();
    store_contract(snapshot, entry)?;
    info!(contract = %address, by = %ctx.author, "contract cancelled");
    Ok(())
}

/// Close an Exchange or Nominate contract, keeping it as `Completed` when
/// policy asks for it.
pub(crate) fn complete(
    snapshot: &mut StateSnapshot<'_>,
    mut entry: ContractEntry,
    now: i64,
) -> Result<(), StateError> {
    if snapshot.config().retain_completed_contracts {
        entry.status = ContractStatus::Completed;
        entry.completed_at = Some(now);
        entry.next_time_event = None;
        entry.status_note = "Expired".into();
        store_contract(snapshot, entry)
    } else {
        snapshot.delete::<ContractEntry>(&entry.address)
    }
}

/// Time events that are due at `now`, in contract address order.
pub fn due_time_events(snapshot: &StateSnapshot<'_>, now: i64) -> Vec<ContractEvent> {
    snapshot
        .entries::<ContractEntry>()
        .into_iter()
        .filter(|c| !c.status.is_final())
        .filter_map(|c| {
            c.next_time_event
                .filter(|at| *at <= now)
                .map(|at| ContractEvent::time(&c.address, at))
        })
        .collect()
}

/// Resolve one event at block time `now`.
///
/// Missing and closed contracts resolve to [`Resolution::Ignored`], so
/// replaying an event is harmless.
pub fn resolve_event(
    snapshot: &mut StateSnapshot<'_>,
    event: &ContractEvent,
    now: i64,
) -> RuleResult<Resolution> {
    let Some(entry) = snapshot.contract(&event.contract).cloned() else {
        debug!(contract = %event.contract, "event for missing contract");
        return Ok(Resolution::Ignored("Contract does not exist".into()));
    };
    if entry.status.is_final() {
        return Ok(Resolution::Ignored(format!("Contract is {:?}", entry.status)));
    }

    match event.kind {
        EventKind::Time(_) => {
            let expiry = entry.data.expiry();
            let family = entry.family;
            match family {
                ContractFamily::Dvp if now > expiry => {
                    dvp::expire(snapshot, &entry)?;
                    Ok(Resolution::Expired)
                }
                ContractFamily::Dvp => dvp::try_settle(snapshot, entry, now),
                _ if now > expiry => {
                    info!(contract = %entry.address, %family, "contract expired");
                    complete(snapshot, entry, now)?;
                    Ok(Resolution::Expired)
                }
                _ => {
                    let mut entry = entry;
                    entry.next_time_event = Some(expiry.saturating_add(1));
                    store_contract(snapshot, entry)?;
                    Ok(Resolution::Ignored("Contract still open".into()))
                }
            }
        }
        EventKind::Commit => {
            if entry.status != ContractStatus::AwaitingEvent {
                return Ok(Resolution::Ignored(format!(
                    "Contract is {:?}",
                    entry.status
                )));
            }
            if entry.family != ContractFamily::Dvp {
                return Ok(Resolution::Ignored("Settles on commit".into()));
            }
            dvp::try_settle(snapshot, entry, now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use le_01_signature::test_helpers::TestAccount;
    use le_01_signature::Secp256k1Verifier;
    use le_02_ledger_state::{
        AddressEntry, EffectiveTx, EncumbranceDetail, LedgerState, NamespaceEntry, StateConfig,
    };
    use ledger_types::{
        AssetId, Balance, DvpCommit, DvpContract, DvpParameter, DvpParty, DvpPayItem,
        DvpReceiveItem, EncumbranceParty, ExchangeCommit, ExchangeCommitInput, ExchangeContract,
        ExchangeInput, ExchangeOutput, NominateCommit, NominateContract, NominateInput,
        ParameterValue, PartySignature, PaymentSignature, RejectionKind,
    };

    const NOW: i64 = 1_000;

    struct World {
        state: LedgerState,
        verifier: Secp256k1Verifier,
        issuer: TestAccount,
        alice: TestAccount,
        bob: TestAccount,
    }

    fn coin() -> AssetId {
        AssetId::new("NS", "COIN")
    }

    fn bond() -> AssetId {
        AssetId::new("NS", "BOND")
    }

    fn world() -> World {
        let issuer = TestAccount::from_seed(1);
        let alice = TestAccount::from_seed(2);
        let bob = TestAccount::from_seed(3);
        let mut state = LedgerState::new(StateConfig::default());
        let root = state.genesis();
        root.insert(
            NamespaceEntry::new("NS", &issuer.address)
                .with_class("COIN")
                .with_class("BOND"),
        )
        .unwrap();
        root.insert(AddressEntry::new(&issuer.address)).unwrap();
        root.insert(AddressEntry::new(&alice.address).with_balance(&coin(), 1_000))
            .unwrap();
        root.insert(AddressEntry::new(&bob.address).with_balance(&bond(), 1_000))
            .unwrap();
        World {
            state,
            verifier: Secp256k1Verifier::new(),
            issuer,
            alice,
            bob,
        }
    }

    fn ctx<'a>(w: &'a World, author: &'a TestAccount, nonce: u64) -> ContractContext<'a> {
        ContractContext {
            verifier: &w.verifier,
            chain_id: 20,
            author: &author.address,
            submitter: &author.address,
            nonce,
            now: NOW,
        }
    }

    fn balance(snap: &StateSnapshot<'_>, who: &TestAccount, asset: &AssetId) -> Balance {
        snap.balance_of(&who.address, asset)
    }

    fn party(account: &TestAccount, pay: DvpPayItem, receive: DvpReceiveItem) -> DvpParty {
        DvpParty {
            address: account.address.clone(),
            must_sign: true,
            pay: vec![pay],
            receive: vec![receive],
            ..Default::default()
        }
    }

    /// Alice pays 432 coin for Bob's 431 bond.
    fn swap(w: &World) -> DvpContract {
        DvpContract {
            parties: vec![
                party(
                    &w.alice,
                    DvpPayItem::new(coin(), 432),
                    DvpReceiveItem::new(bond(), 431),
                ),
                party(
                    &w.bob,
                    DvpPayItem::new(bond(), 431),
                    DvpReceiveItem::new(coin(), 432),
                ),
            ],
            start: NOW,
            expiry: NOW + 3_600,
            ..Default::default()
        }
    }

    fn sign_party(contract: &str, id: &str, account: &TestAccount, asset: &AssetId, amount: &str) -> DvpCommit {
        let party_sig = account.sign(&signing::party_message(contract).unwrap());
        let pay_sig =
            account.sign(&signing::payment_message(contract, id, 0, asset, amount).unwrap());
        DvpCommit {
            contracts: vec![contract.to_string()],
            party: Some(PartySignature {
                party_id: id.into(),
                public_key: account.public_key.clone(),
                signature: party_sig,
            }),
            payments: vec![PaymentSignature {
                party_id: id.into(),
                index: 0,
                public_key: account.public_key.clone(),
                signature: pay_sig,
            }],
            ..Default::default()
        }
    }

    // ===== DVP TESTS =====

    #[test]
    fn test_dvp_settles_after_both_parties_sign() {
        let w = world();
        let mut snap = w.state.snapshot();
        let address = create_contract(&mut snap, &ctx(&w, &w.alice, 0), &ContractData::Dvp(swap(&w))).unwrap();
        assert_eq!(snap.contract(&address).unwrap().status, ContractStatus::Pending);

        commit_contract(
            &mut snap,
            &ctx(&w, &w.alice, 1),
            &CommitData::Dvp(sign_party(&address, "1", &w.alice, &coin(), "432")),
        )
        .unwrap();
        assert_eq!(snap.contract(&address).unwrap().status, ContractStatus::Pending);
        assert!(snap.take_events().is_empty());

        commit_contract(
            &mut snap,
            &ctx(&w, &w.bob, 0),
            &CommitData::Dvp(sign_party(&address, "2", &w.bob, &bond(), "431")),
        )
        .unwrap();
        assert_eq!(
            snap.contract(&address).unwrap().status,
            ContractStatus::AwaitingEvent
        );
        let events = snap.take_events();
        assert_eq!(events, vec![ContractEvent::commit(&address)]);

        let resolution = resolve_event(&mut snap, &events[0], NOW).unwrap();
        assert_eq!(resolution, Resolution::Settled { moves: 2 });
        assert!(snap.contract(&address).is_none());
        assert_eq!(balance(&snap, &w.alice, &coin()), 568);
        assert_eq!(balance(&snap, &w.alice, &bond()), 431);
        assert_eq!(balance(&snap, &w.bob, &coin()), 432);
        assert_eq!(balance(&snap, &w.bob, &bond()), 569);

        let settlements: Vec<_> = snap
            .effective_transactions()
            .iter()
            .filter(|e| matches!(e, EffectiveTx::Settlement { .. }))
            .collect();
        assert_eq!(settlements.len(), 2);

        // Replaying the event is a no-op.
        assert!(matches!(
            resolve_event(&mut snap, &events[0], NOW).unwrap(),
            Resolution::Ignored(_)
        ));
    }

    #[test]
    fn test_dvp_rejects_unbalanced_contract() {
        let w = world();
        let mut snap = w.state.snapshot();
        let mut dvp = swap(&w);
        dvp.parties[1].receive[0].amount = 400.into();
        let err = create_contract(&mut snap, &ctx(&w, &w.alice, 0), &ContractData::Dvp(dvp)).unwrap_err();
        assert_eq!(err.kind(), Some(RejectionKind::Structural));
    }

    #[test]
    fn test_dvp_overflowing_fixed_totals_are_rejected() {
        let w = world();
        let mut snap = w.state.snapshot();
        let mut dvp = swap(&w);
        dvp.parties[0].pay = vec![DvpPayItem::new(coin(), i128::MAX); 2];
        let before = snap.digest().unwrap();
        let err = create_contract(&mut snap, &ctx(&w, &w.alice, 0), &ContractData::Dvp(dvp)).unwrap_err();
        assert_eq!(err.kind(), Some(RejectionKind::Structural));
        assert_eq!(snap.digest().unwrap(), before);
    }

    #[test]
    fn test_dvp_overflowing_evaluated_totals_stay_pending() {
        let w = world();
        let mut snap = w.state.snapshot();
        let mut issued = DvpPayItem::new(coin(), i128::MAX);
        issued.issuance = true;
        let dvp = DvpContract {
            parties: vec![
                DvpParty {
                    address: w.issuer.address.clone(),
                    pay: vec![issued.clone(), issued],
                    ..Default::default()
                },
                DvpParty {
                    address: w.alice.address.clone(),
                    receive: vec![DvpReceiveItem::new(coin(), ledger_types::Amount::Expr("Fee".into()))],
                    ..Default::default()
                },
            ],
            parameters: [(
                "Fee".to_string(),
                DvpParameter {
                    value: Some(1),
                    calculation_only: true,
                    ..Default::default()
                },
            )]
            .into(),
            start: NOW,
            expiry: NOW + 3_600,
            ..Default::default()
        };
        let address = create_contract(&mut snap, &ctx(&w, &w.issuer, 0), &ContractData::Dvp(dvp)).unwrap();
        let entry = snap.contract(&address).unwrap();
        assert_eq!(entry.status, ContractStatus::Pending);
        assert!(entry.status_note.contains("overflow"));
        assert!(snap.take_events().is_empty());
    }

    #[test]
    fn test_dvp_bad_signature_leaves_contract_untouched() {
        let w = world();
        let mut snap = w.state.snapshot();
        let address = create_contract(&mut snap, &ctx(&w, &w.alice, 0), &ContractData::Dvp(swap(&w))).unwrap();
        // Bob's key signing for Alice's party.
        let mut commit = sign_party(&address, "1", &w.bob, &coin(), "432");
        commit.party.as_mut().unwrap().public_key = w.bob.public_key.clone();
        let err = commit_contract(&mut snap, &ctx(&w, &w.alice, 1), &CommitData::Dvp(commit))
            .unwrap_err();
        assert_eq!(err.kind(), Some(RejectionKind::Signature));
        let dvp = match &snap.contract(&address).unwrap().data {
            ContractData::Dvp(d) => d.clone(),
            _ => unreachable!(),
        };
        assert!(dvp.parties[0].signature.is_none());
    }

    #[test]
    fn test_dvp_parameter_expression_amounts() {
        let w = world();
        let oracle = TestAccount::from_seed(9);
        let mut snap = w.state.snapshot();
        let mut dvp = swap(&w);
        dvp.parties[0].pay[0].amount = ledger_types::Amount::Expr("Price*2".into());
        dvp.parties[1].receive[0].amount = ledger_types::Amount::Expr("Price*2".into());
        dvp.parameters.insert(
            "Price".into(),
            DvpParameter {
                address: oracle.address.clone(),
                ..Default::default()
            },
        );
        let address = create_contract(&mut snap, &ctx(&w, &w.alice, 0), &ContractData::Dvp(dvp)).unwrap();
        commit_contract(
            &mut snap,
            &ctx(&w, &w.alice, 1),
            &CommitData::Dvp(sign_party(&address, "1", &w.alice, &coin(), "Price*2")),
        )
        .unwrap();
        commit_contract(
            &mut snap,
            &ctx(&w, &w.bob, 0),
            &CommitData::Dvp(sign_party(&address, "2", &w.bob, &bond(), "431")),
        )
        .unwrap();
        // Price still unset.
        assert_eq!(snap.contract(&address).unwrap().status, ContractStatus::Pending);

        let value = ParameterValue {
            name: "Price".into(),
            value: 216,
            public_key: oracle.public_key.clone(),
            signature: oracle.sign(&signing::parameter_message("Price", 216).unwrap()),
        };
        commit_contract(
            &mut snap,
            &ctx(&w, &oracle, 0),
            &CommitData::Dvp(DvpCommit {
                contracts: vec![address.clone()],
                parameters: vec![value],
                ..Default::default()
            }),
        )
        .unwrap();
        let events = snap.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            resolve_event(&mut snap, &events[0], NOW).unwrap(),
            Resolution::Settled { .. }
        ));
        assert_eq!(balance(&snap, &w.bob, &coin()), 432);
    }

    #[test]
    fn test_dvp_encumbered_payment_needs_no_signature() {
        let w = world();
        let mut snap = w.state.snapshot();
        let mut dvp = swap(&w);
        dvp.parties[0].must_sign = false;
        dvp.parties[0].pay[0].encumbrance = Some("escrow".into());
        snap.encumbrances_mut(&w.alice.address).unwrap().push(
            &coin(),
            EncumbranceDetail {
                reference: "escrow".into(),
                amount: 500,
                cumulative: false,
                created_at: 0,
                administrators: vec![],
                beneficiaries: vec![EncumbranceParty::open(&w.alice.address)],
            },
            false,
        );
        let address = create_contract(&mut snap, &ctx(&w, &w.alice, 0), &ContractData::Dvp(dvp)).unwrap();
        commit_contract(
            &mut snap,
            &ctx(&w, &w.bob, 0),
            &CommitData::Dvp(sign_party(&address, "2", &w.bob, &bond(), "431")),
        )
        .unwrap();
        let events = snap.take_events();
        assert_eq!(events.len(), 1);
        resolve_event(&mut snap, &events[0], NOW).unwrap();
        assert_eq!(balance(&snap, &w.alice, &coin()), 568);
        let left = snap
            .encumbrances(&w.alice.address)
            .and_then(|e| e.find(&coin(), "escrow"))
            .map(|d| d.amount);
        assert_eq!(left, Some(68));
    }

    #[test]
    fn test_dvp_insufficient_funds_defers() {
        let w = world();
        let mut snap = w.state.snapshot();
        let mut dvp = swap(&w);
        dvp.parties[0].pay[0].amount = 2_000.into();
        dvp.parties[1].receive[0].amount = 2_000.into();
        let address = create_contract(&mut snap, &ctx(&w, &w.alice, 0), &ContractData::Dvp(dvp)).unwrap();
        commit_contract(
            &mut snap,
            &ctx(&w, &w.alice, 1),
            &CommitData::Dvp(sign_party(&address, "1", &w.alice, &coin(), "2000")),
        )
        .unwrap();
        commit_contract(
            &mut snap,
            &ctx(&w, &w.bob, 0),
            &CommitData::Dvp(sign_party(&address, "2", &w.bob, &bond(), "431")),
        )
        .unwrap();
        let events = snap.take_events();
        let resolution = resolve_event(&mut snap, &events[0], NOW).unwrap();
        assert!(matches!(resolution, Resolution::Deferred(_)));
        let entry = snap.contract(&address).unwrap();
        assert_eq!(entry.status, ContractStatus::AwaitingEvent);
        assert_eq!(entry.next_time_event, Some(NOW + 1));
        assert_eq!(balance(&snap, &w.alice, &coin()), 1_000);
        assert_eq!(balance(&snap, &w.bob, &bond()), 1_000);
    }

    #[test]
    fn test_dvp_expires_on_time_event() {
        let w = world();
        let mut snap = w.state.snapshot();
        let address = create_contract(&mut snap, &ctx(&w, &w.alice, 0), &ContractData::Dvp(swap(&w))).unwrap();
        assert!(due_time_events(&snap, NOW + 3_600).is_empty());
        let due = due_time_events(&snap, NOW + 3_601);
        assert_eq!(due.len(), 1);
        assert_eq!(resolve_event(&mut snap, &due[0], NOW + 3_601).unwrap(), Resolution::Expired);
        assert!(snap.contract(&address).is_none());
    }

    #[test]
    fn test_time_event_for_missing_contract_is_ignored() {
        let w = world();
        let mut snap = w.state.snapshot();
        let event = ContractEvent::time("0x00000000000000000000000000000000000000aa", NOW);
        assert!(matches!(
            resolve_event(&mut snap, &event, NOW).unwrap(),
            Resolution::Ignored(_)
        ));
    }

    // ===== EXCHANGE TESTS =====

    fn exchange() -> ExchangeContract {
        ExchangeContract {
            inputs: vec![ExchangeInput {
                asset: coin(),
                block_size: 10,
                address: None,
            }],
            outputs: vec![ExchangeOutput {
                asset: bond(),
                block_size: 5,
                ..Default::default()
            }],
            min_blocks: 2,
            max_blocks: 3,
            start: NOW,
            expiry: NOW + 100,
            metadata: String::new(),
        }
    }

    fn exchange_commit(contract: &str, amount: Balance) -> CommitData {
        CommitData::Exchange(ExchangeCommit {
            contract: contract.into(),
            inputs: vec![ExchangeCommitInput {
                asset: coin(),
                amount,
            }],
            destination: None,
        })
    }

    #[test]
    fn test_exchange_block_limits() {
        let w = world();
        let mut snap = w.state.snapshot();
        let address = create_contract(
            &mut snap,
            &ctx(&w, &w.issuer, 0),
            &ContractData::Exchange(exchange()),
        )
        .unwrap();

        let err = commit_contract(&mut snap, &ctx(&w, &w.alice, 0), &exchange_commit(&address, 40))
            .unwrap_err();
        assert_eq!(err.kind(), Some(RejectionKind::Precondition));
        assert_eq!(balance(&snap, &w.alice, &coin()), 1_000);

        commit_contract(&mut snap, &ctx(&w, &w.alice, 0), &exchange_commit(&address, 20)).unwrap();
        assert_eq!(balance(&snap, &w.alice, &coin()), 980);
        assert_eq!(balance(&snap, &w.alice, &bond()), 10);
        assert_eq!(balance(&snap, &w.issuer, &coin()), 20);
        assert_eq!(snap.contract(&address).unwrap().status, ContractStatus::Pending);
    }

    #[test]
    fn test_exchange_completes_after_expiry() {
        let w = world();
        let mut snap = w.state.snapshot();
        let address = create_contract(
            &mut snap,
            &ctx(&w, &w.issuer, 0),
            &ContractData::Exchange(exchange()),
        )
        .unwrap();
        let due = due_time_events(&snap, NOW + 101);
        assert_eq!(resolve_event(&mut snap, &due[0], NOW + 101).unwrap(), Resolution::Expired);
        let entry = snap.contract(&address).unwrap();
        assert_eq!(entry.status, ContractStatus::Completed);
        assert_eq!(entry.completed_at, Some(NOW + 101));
        assert!(due_time_events(&snap, NOW + 1_000).is_empty());
    }

    #[test]
    fn test_exchange_third_party_output_needs_signature() {
        let w = world();
        let mut snap = w.state.snapshot();
        let mut x = exchange();
        x.outputs[0].address = Some(w.bob.address.clone());
        let err = create_contract(&mut snap, &ctx(&w, &w.issuer, 0), &ContractData::Exchange(x.clone()))
            .unwrap_err();
        assert_eq!(err.kind(), Some(RejectionKind::Signature));

        let address = codec::contract_address(20, &w.issuer.address, 0).unwrap();
        x.outputs[0].public_key = Some(w.bob.public_key.clone());
        x.outputs[0].signature = Some(
            w.bob
                .sign(&signing::exchange_output_message(&address, &bond(), 5).unwrap()),
        );
        create_contract(&mut snap, &ctx(&w, &w.issuer, 0), &ContractData::Exchange(x)).unwrap();
        commit_contract(&mut snap, &ctx(&w, &w.alice, 0), &exchange_commit(&address, 30)).unwrap();
        assert_eq!(balance(&snap, &w.bob, &bond()), 985);
        assert_eq!(balance(&snap, &w.alice, &bond()), 15);
    }

    // ===== NOMINATE TESTS =====

    fn nominate() -> NominateContract {
        NominateContract {
            namespace: "NS".into(),
            input_class: "COIN".into(),
            output_class: "BOND".into(),
            input_block: 4,
            output_block: 1,
            expiry: NOW + 100,
            metadata: String::new(),
        }
    }

    #[test]
    fn test_nominate_converts_whole_blocks() {
        let w = world();
        let mut snap = w.state.snapshot();
        let address = create_contract(
            &mut snap,
            &ctx(&w, &w.issuer, 0),
            &ContractData::Nominate(nominate()),
        )
        .unwrap();
        let commit = CommitData::Nominate(NominateCommit {
            contract: address.clone(),
            inputs: vec![NominateInput {
                amount: 10,
                ..Default::default()
            }],
        });
        commit_contract(&mut snap, &ctx(&w, &w.alice, 0), &commit).unwrap();
        assert_eq!(balance(&snap, &w.alice, &coin()), 992);
        assert_eq!(balance(&snap, &w.alice, &bond()), 2);
        // Issuer mints the output.
        assert_eq!(balance(&snap, &w.issuer, &bond()), -2);
    }

    #[test]
    fn test_nominate_third_party_input_needs_delegation() {
        let w = world();
        let mut snap = w.state.snapshot();
        let address = create_contract(
            &mut snap,
            &ctx(&w, &w.issuer, 0),
            &ContractData::Nominate(nominate()),
        )
        .unwrap();
        let mut input = NominateInput {
            amount: 8,
            address: Some(w.alice.address.clone()),
            ..Default::default()
        };
        let commit = CommitData::Nominate(NominateCommit {
            contract: address.clone(),
            inputs: vec![input.clone()],
        });
        let err = commit_contract(&mut snap, &ctx(&w, &w.bob, 4), &commit).unwrap_err();
        assert_eq!(err.kind(), Some(RejectionKind::Signature));

        input.public_key = Some(w.alice.public_key.clone());
        input.signature = Some(w.alice.sign(
            &signing::nominate_input_message(&address, &w.bob.address, 4).unwrap(),
        ));
        let commit = CommitData::Nominate(NominateCommit {
            contract: address,
            inputs: vec![input],
        });
        commit_contract(&mut snap, &ctx(&w, &w.bob, 4), &commit).unwrap();
        assert_eq!(balance(&snap, &w.alice, &coin()), 992);
        assert_eq!(balance(&snap, &w.alice, &bond()), 2);
    }

    // ===== CANCEL TESTS =====

    #[test]
    fn test_cancel_by_party_and_not_by_stranger() {
        let w = world();
        let stranger = TestAccount::from_seed(7);
        let mut snap = w.state.snapshot();
        let address = create_contract(&mut snap, &ctx(&w, &w.alice, 0), &ContractData::Dvp(swap(&w))).unwrap();
        let message = signing::cancel_message(&address).unwrap();

        let by_stranger = CancelContract {
            contract: address.clone(),
            public_key: stranger.public_key.clone(),
            signature: stranger.sign(&message),
        };
        let err = cancel_contract(&mut snap, &ctx(&w, &stranger, 0), &by_stranger).unwrap_err();
        assert_eq!(err.kind(), Some(RejectionKind::Precondition));

        let by_bob = CancelContract {
            contract: address.clone(),
            public_key: w.bob.public_key.clone(),
            signature: w.bob.sign(&message),
        };
        cancel_contract(&mut snap, &ctx(&w, &w.bob, 0), &by_bob).unwrap();
        let entry = snap.contract(&address).unwrap();
        assert_eq!(entry.status, ContractStatus::Cancelled);
        assert_eq!(entry.cancelled_at, Some(NOW));

        let err = commit_contract(
            &mut snap,
            &ctx(&w, &w.alice, 1),
            &CommitData::Dvp(sign_party(&address, "1", &w.alice, &coin(), "432")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), Some(RejectionKind::ContractState));
    }

    #[test]
    fn test_duplicate_contract_address_rejected() {
        let w = world();
        let mut snap = w.state.snapshot();
        create_contract(&mut snap, &ctx(&w, &w.issuer, 0), &ContractData::Exchange(exchange())).unwrap();
        let err = create_contract(&mut snap, &ctx(&w, &w.issuer, 0), &ContractData::Exchange(exchange()))
            .unwrap_err();
        assert_eq!(err.kind(), Some(RejectionKind::Precondition));
    }
}
