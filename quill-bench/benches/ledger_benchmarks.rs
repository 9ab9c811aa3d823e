//! Ledger benchmarks for quill.
//!
//! Benchmarks:
//! - Mempool admission (validation plus signature check)
//! - Mining batches of pending entries into a block
//! - Whole-chain integrity verification
//! - Token view replay
//! - Snapshot save/load

use quill_bench::{mint_entry, onboarding_entry, populated_ledger};

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};

use chrono::Duration;
use quill_chain::{BlockMiner, ChainStore, Mempool, MempoolConfig, MinerConfig, TokenLedger};
use quill_core::{now_millis, Block, EntryCodec, SecretKey};
use quill_storage::{PersistenceGateway, RetryPolicy};
use quill_verify::IntegrityVerifier;

/// A genesis block old enough that freshly signed entries pass the codec.
fn genesis_minute_ago() -> Block {
    Block::genesis(now_millis() - Duration::minutes(1))
}

fn mempool_for(genesis: &Block, max_size: usize) -> Mempool {
    Mempool::new(MempoolConfig { max_size }, EntryCodec::new(genesis.timestamp))
}

fn bench_mempool_add(c: &mut Criterion) {
    let key = SecretKey::generate();
    let genesis = genesis_minute_ago();

    c.bench_function("mempool/add", |b| {
        let mut mempool = mempool_for(&genesis, usize::MAX);
        let mut counter = 0u64;
        b.iter_batched(
            || {
                counter += 1;
                onboarding_entry(&key, counter)
            },
            |entry| mempool.add(black_box(entry)).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_mine(c: &mut Criterion) {
    let key = SecretKey::generate();
    let genesis = genesis_minute_ago();
    let miner = BlockMiner::new(MinerConfig::default());
    let batch_sizes = [0u64, 10, 100, 1000];

    let mut group = c.benchmark_group("miner/mine");

    for size in batch_sizes {
        let entries: Vec<_> = (0..size).map(|n| mint_entry(&key, n)).collect();
        group.throughput(Throughput::Elements(size.max(1)));

        group.bench_with_input(BenchmarkId::new("entries", size), &entries, |b, entries| {
            b.iter_batched(
                || {
                    let mut mempool = mempool_for(&genesis, usize::MAX);
                    mempool.restore(entries.clone()).unwrap();
                    let chain = ChainStore::new(genesis.clone()).unwrap();
                    (mempool, chain, TokenLedger::new())
                },
                |(mut mempool, mut chain, mut tokens)| {
                    miner.mine(&mut mempool, &mut chain, &mut tokens).unwrap()
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_verify_chain(c: &mut Criterion) {
    let lengths = [10u64, 100, 500];

    let mut group = c.benchmark_group("verify/chain");
    group.sample_size(20);

    for blocks in lengths {
        let chain = populated_ledger(blocks, 10).export_chain();
        group.throughput(Throughput::Elements(blocks));

        group.bench_with_input(BenchmarkId::new("blocks", blocks), &chain, |b, chain| {
            b.iter(|| {
                let report = IntegrityVerifier::verify(black_box(chain));
                assert!(report.valid);
                report
            })
        });
    }

    group.finish();
}

fn bench_token_replay(c: &mut Criterion) {
    let chain = populated_ledger(200, 10).export_chain();

    c.bench_function("tokens/replay_200_blocks", |b| {
        b.iter(|| TokenLedger::rebuild_from_chain(black_box(&chain)))
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let gateway = PersistenceGateway::new(dir.path().join("ledger.json"), RetryPolicy::none());
    let snapshot = populated_ledger(100, 10).snapshot();

    let mut group = c.benchmark_group("snapshot");
    group.sample_size(20);

    group.bench_function("save_100_blocks", |b| {
        b.iter(|| gateway.save(black_box(&snapshot)).unwrap())
    });

    gateway.save(&snapshot).unwrap();
    group.bench_function("load_100_blocks", |b| {
        b.iter(|| gateway.load().unwrap())
    });

    group.finish();
}

fn bench_service_round(c: &mut Criterion) {
    let ledger = populated_ledger(0, 0);
    let mut counter = 0u64;

    c.bench_function("service/record_and_mine", |b| {
        b.iter(|| {
            counter += 1;
            ledger
                .record_transaction(format!("tx-{counter}"), "A", "B", counter)
                .unwrap();
            ledger.force_mine_block().unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_mempool_add,
    bench_mine,
    bench_verify_chain,
    bench_token_replay,
    bench_snapshot,
    bench_service_round,
);
criterion_main!(benches);
