//! # Federation Coordinator Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | fl-01 Ledger | Read-modify-write commit |
//! | fl-01 Ledger | Range scan over one round |
//! | fl-04 Intake | Anomaly scoring |
//! | fl-03/04 | Full round (N submissions, one aggregation) |

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use fl_01_ledger::{InMemoryLedger, LedgerStore, LedgerTransaction};
use fl_04_update_intake::anomaly_score;
use fl_tests::fixtures::Federation;
use rand::Rng;
use shared_types::{prefix_range, KeyPrefix, UpdateMetrics};

fn bench_ledger_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fl-01-ledger");
    let ledger = InMemoryLedger::new();
    let key = KeyPrefix::session_key("FL-bench");

    group.bench_function("read_modify_write", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            let mut tx = LedgerTransaction::begin(&ledger);
            black_box(tx.get(&key).unwrap());
            counter += 1;
            tx.put(key.clone(), counter.to_le_bytes().to_vec());
            tx.commit().unwrap()
        })
    });

    for orgs in [3u32, 100, 1_000] {
        let ledger = InMemoryLedger::new();
        let mut tx = LedgerTransaction::begin(&ledger);
        for org in 0..orgs {
            tx.put(KeyPrefix::update_key("FL-1", 1, &format!("org{org}")), vec![0; 256]);
            tx.put(KeyPrefix::update_key("FL-1", 2, &format!("org{org}")), vec![0; 256]);
        }
        tx.commit().unwrap();
        let (low, high) = prefix_range(&KeyPrefix::round_updates_prefix("FL-1", 1));

        group.throughput(Throughput::Elements(u64::from(orgs)));
        group.bench_with_input(BenchmarkId::new("round_scan", orgs), &orgs, |b, _| {
            b.iter(|| ledger.range_scan(&low, &high).count())
        });
    }
    group.finish();
}

fn bench_anomaly_score(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let metrics: Vec<UpdateMetrics> = (0..1_000)
        .map(|_| UpdateMetrics::new(Some(rng.gen_range(0.0..1.0)), Some(rng.gen_range(0.0..12.0))))
        .collect();

    let mut group = c.benchmark_group("fl-04-update-intake");
    group.throughput(Throughput::Elements(metrics.len() as u64));
    group.bench_function("anomaly_score_1000", |b| {
        b.iter(|| metrics.iter().map(anomaly_score).sum::<f64>())
    });
    group.finish();
}

fn bench_full_round(c: &mut Criterion) {
    const ORGS: [&str; 3] = ["org1", "org2", "org3"];

    c.bench_function("fl-04-full-round", |b| {
        b.iter_batched(
            || {
                let fed = Federation::new();
                let session_id = fed.started_session(&ORGS, 3, 2, 1.0);
                (fed, session_id)
            },
            |(fed, session_id)| {
                for org in ORGS {
                    fed.submit(org, &session_id, 1, 0.8, 0.5, 1.0).unwrap();
                }
                fed
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_ledger_commit, bench_anomaly_score, bench_full_round);
criterion_main!(benches);
