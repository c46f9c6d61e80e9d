//! Criterion benchmarks for xec-core hot paths.
//!
//! Covers: cashaddr encode/decode, input signing, and transaction
//! wire encoding.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use xec_core::address::Address;
use xec_core::constants::Network;
use xec_core::crypto::{KeyPair, sign_input, signing_hash};
use xec_core::script::Script;
use xec_core::types::{OutPoint, Transaction, TxId, TxInput, TxOutput};

fn sample_transaction(inputs: usize) -> Transaction {
    Transaction {
        version: 2,
        inputs: (0..inputs)
            .map(|i| {
                TxInput::unsigned(OutPoint {
                    txid: TxId([i as u8; 32]),
                    vout: i as u32,
                })
            })
            .collect(),
        outputs: vec![
            TxOutput {
                value: 10_000,
                script: Script::p2pkh(&[0xCC; 20]),
            },
            TxOutput {
                value: 2_500,
                script: Script::p2pkh(&[0xDD; 20]),
            },
        ],
        lock_time: 0,
    }
}

fn bench_cashaddr(c: &mut Criterion) {
    let addr = Address::p2pkh([0x42; 20], Network::Mainnet);
    let encoded = addr.encode();

    c.bench_function("cashaddr_encode", |b| b.iter(|| black_box(&addr).encode()));

    c.bench_function("cashaddr_decode", |b| {
        b.iter(|| Address::decode(black_box(&encoded)))
    });
}

fn bench_signing(c: &mut Criterion) {
    let mut secret = [0u8; 32];
    secret[31] = 42;
    let keypair = match KeyPair::from_secret_bytes(secret) {
        Ok(kp) => kp,
        Err(e) => panic!("bench key: {e}"),
    };
    let prev_script = Script::p2pkh(&keypair.pubkey_hash());
    let tx = sample_transaction(10);

    c.bench_function("bip143_sighash_10_inputs", |b| {
        b.iter(|| signing_hash(black_box(&tx), 5, 1_000, &prev_script))
    });

    c.bench_function("sign_input", |b| {
        b.iter_batched(
            || tx.clone(),
            |mut t| sign_input(&mut t, 0, &keypair, 1_000, &prev_script),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_transaction_wire(c: &mut Criterion) {
    let tx = sample_transaction(10);
    let encoded = tx.serialize();

    c.bench_function("transaction_serialize", |b| {
        b.iter(|| black_box(&tx).serialize())
    });

    c.bench_function("transaction_deserialize", |b| {
        b.iter(|| Transaction::deserialize(black_box(&encoded)))
    });

    c.bench_function("transaction_txid", |b| b.iter(|| black_box(&tx).txid()));
}

criterion_group!(benches, bench_cashaddr, bench_signing, bench_transaction_wire);
criterion_main!(benches);
