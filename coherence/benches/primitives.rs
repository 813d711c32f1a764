use bench_config::{BenchConfig, RoleAssignment, TestId};
use coherence::{AtomicOps, LineBuffer, Probe, RaceState, Slot};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

const LINES: usize = 1 << 12;

fn bench_setup(stride: usize, repetitions: usize) -> (BenchConfig, LineBuffer, RaceState) {
    let roles = RoleAssignment::build(None, None, TestId::Cas, 1).unwrap();
    let mut config = BenchConfig::new(roles);
    config.stride = stride;
    config.repetitions = repetitions;
    config.cache_lines = LINES;

    let buffer = LineBuffer::allocate(LINES).unwrap();
    let race = RaceState::new(1, repetitions);
    (config, buffer, race)
}

fn criterion_uncontended(c: &mut Criterion) {
    const REPS: usize = 1024;

    let mut group = c.benchmark_group("uncontended primitives, single thread");
    for stride in [1usize, 8] {
        let (config, buffer, race) = bench_setup(stride, REPS);
        let mut ops = AtomicOps::new(&buffer, &race, &config, 0, 17);
        let mut rep = 0;

        group.bench_function(BenchmarkId::new("load", stride), |b| {
            b.iter(|| {
                rep = (rep + 1) % REPS;
                black_box(ops.load(rep))
            })
        });
        group.bench_function(BenchmarkId::new("store", stride), |b| {
            b.iter(|| {
                rep = (rep + 1) % REPS;
                ops.store(rep, Slot::Primary)
            })
        });
        group.bench_function(BenchmarkId::new("cas", stride), |b| {
            b.iter(|| {
                rep = (rep + 1) % REPS;
                black_box(ops.cas(rep))
            })
        });
        group.bench_function(BenchmarkId::new("fai", stride), |b| {
            b.iter(|| {
                rep = (rep + 1) % REPS;
                black_box(ops.fai(rep))
            })
        });
    }
    group.finish();
}

fn criterion_probes(c: &mut Criterion) {
    let (config, buffer, race) = bench_setup(1, 1);
    let mut ops = AtomicOps::new(&buffer, &race, &config, 0, 17);

    let mut group = c.benchmark_group("timed empty regions");
    for (name, probe) in [
        ("lfence", Probe::LoadFence),
        ("sfence", Probe::StoreFence),
        ("mfence", Probe::FullFence),
        ("pause", Probe::Pause),
        ("empty", Probe::Empty),
    ] {
        group.bench_function(BenchmarkId::new(name, 0), |b| b.iter(|| ops.probe(0, probe)));
    }
    group.finish();
}

fn criterion_pointer_chase(c: &mut Criterion) {
    let (config, buffer, race) = bench_setup(1, 1);
    buffer.build_chase_ring(7);
    let mut ops = AtomicOps::new(&buffer, &race, &config, 0, 17);

    c.bench_function("pointer chase over 256 KiB", |b| {
        b.iter(|| black_box(ops.chase(0)))
    });
}

criterion_group!(
    benches,
    criterion_uncontended,
    criterion_probes,
    criterion_pointer_chase
);
criterion_main!(benches);
