//! # Ledger Engine Benchmarks
//!
//! | Area | What is measured |
//! |------|------------------|
//! | le-01 Signature | secp256k1 verify of a detached signature |
//! | le-06 Dispatch | one block of independent transfers, end to end |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use le_01_signature::test_helpers::TestAccount;
use le_01_signature::{Secp256k1Verifier, SignatureVerifier};
use le_02_ledger_state::{AddressEntry, LedgerState, NamespaceEntry, StateConfig};
use le_06_tx_dispatch::TxProcessor;
use ledger_types::{AssetId, AssetTransfer, Transaction, TxPayload};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

const NOW: i64 = 1_700_000_000;

// ============================================================================
// LE-01: Signature Verification
// ============================================================================

fn bench_signature_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("le-01-signature");
    group.measurement_time(Duration::from_secs(10));

    let verifier = Secp256k1Verifier::new();
    let account = TestAccount::new();
    let message: Vec<u8> = (0..64).map(|_| rand::thread_rng().gen()).collect();
    let signature = account.sign(&message);

    group.bench_function("verify_single", |b| {
        b.iter(|| black_box(verifier.verify(&message, &account.public_key, &signature)))
    });
    group.bench_function("address_of", |b| {
        b.iter(|| black_box(verifier.address_of(&account.public_key)))
    });
    group.finish();
}

// ============================================================================
// LE-06: Block Dispatch
// ============================================================================

fn seeded(senders: &[TestAccount], sink: &TestAccount) -> LedgerState {
    let asset = AssetId::new("NS", "COIN");
    let mut state = LedgerState::new(StateConfig::default());
    let genesis = state.genesis();
    genesis
        .insert(NamespaceEntry::new("NS", &sink.address).with_class("COIN"))
        .expect("genesis namespace");
    genesis.insert(AddressEntry::new(&sink.address)).expect("genesis sink");
    for sender in senders {
        genesis
            .insert(AddressEntry::new(&sender.address).with_balance(&asset, 1_000_000))
            .expect("genesis sender");
    }
    state
}

fn bench_block_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("le-06-dispatch");
    group.measurement_time(Duration::from_secs(10));

    let processor = TxProcessor::new(Arc::new(Secp256k1Verifier::new()));
    let sink = TestAccount::new();

    for size in [10usize, 100, 500] {
        let senders: Vec<TestAccount> = (0..size).map(|_| TestAccount::new()).collect();
        let txs: Vec<Transaction> = senders
            .iter()
            .map(|s| {
                Transaction::new(
                    20,
                    0,
                    NOW,
                    s.address.clone(),
                    s.public_key.clone(),
                    TxPayload::TransferAsset(AssetTransfer {
                        asset: AssetId::new("NS", "COIN"),
                        to: sink.address.clone(),
                        amount: 1,
                        metadata: String::new(),
                    }),
                )
            })
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("apply_batch", size), &txs, |b, txs| {
            b.iter_batched(
                || seeded(&senders, &sink),
                |mut state| {
                    black_box(
                        processor
                            .apply_batch(&mut state, txs, NOW)
                            .expect("block applies"),
                    )
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_signature_verification, bench_block_dispatch);
criterion_main!(benches);
