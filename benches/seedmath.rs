use criterion::{criterion_group, criterion_main, Criterion};
use num_bigint::BigUint;
use seedstate_core::seed::math;
use seedstate_core::{
    MemoryInstanceStore, MemoryLedger, OperationKind, Provenance, SeedEngine, StaticRegistry,
    TopologyDescriptor,
};
use std::sync::Arc;

fn bench_math(c: &mut Criterion) {
    // 2^10 * 3^6 * 104729 * 1299709: small primes plus two that force the
    // trial division loop to run long.
    let seed = BigUint::from(1024u32)
        * BigUint::from(729u32)
        * BigUint::from(104_729u32)
        * BigUint::from(1_299_709u32);

    c.bench_function("factorize_mixed_seed", |b| b.iter(|| math::factorize(&seed)));

    let delta = BigUint::from(1_299_709u32);
    c.bench_function("multiply_divide_round_trip", |b| {
        b.iter(|| {
            let grown = math::multiply(&seed, &delta).unwrap();
            math::divide(&grown, &delta).unwrap()
        })
    });

    let primes: Vec<BigUint> = [2u32, 3, 5, 7, 11, 13].iter().map(|&p| BigUint::from(p)).collect();
    c.bench_function("compose_delta_6_primes", |b| {
        b.iter(|| math::compose_delta(&primes))
    });
}

fn bench_engine(c: &mut Criterion) {
    let registry = Arc::new(StaticRegistry::new());
    registry.register(TopologyDescriptor::chain("bench-app", &["a", "b"]));
    let ledger = Arc::new(MemoryLedger::new());
    let engine = SeedEngine::new(
        Arc::new(MemoryInstanceStore::new()),
        ledger.clone(),
        registry,
    );
    let instance = engine.activate("bench-app").unwrap();
    let delta = BigUint::from(6u32);

    // Multiply-then-divide keeps the seed bounded across iterations.
    c.bench_function("apply_multiply_divide_pair", |b| {
        b.iter(|| {
            engine
                .apply(&instance.instance_id, &delta, OperationKind::Multiply, Provenance::default())
                .unwrap();
            engine
                .apply(&instance.instance_id, &delta, OperationKind::Divide, Provenance::default())
                .unwrap()
        })
    });

    let replayed = engine.activate("bench-app").unwrap();
    let two = BigUint::from(2u32);
    for i in 0..1000 {
        let kind = if i % 2 == 0 {
            OperationKind::Multiply
        } else {
            OperationKind::Divide
        };
        engine
            .apply(&replayed.instance_id, &two, kind, Provenance::default())
            .unwrap();
    }
    c.bench_function("ledger_replay_1000_rows", |b| {
        b.iter(|| ledger.replay(&replayed.instance_id).unwrap())
    });
}

criterion_group!(benches, bench_math, bench_engine);
criterion_main!(benches);
