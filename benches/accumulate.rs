use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use deltabank::algebra::Word256;
use deltabank::core::{Distribution, EngineConfig, ParallelAccumulator};

fn make_delta(seed: u64) -> Word256 {
    Word256::from_limbs([seed, seed.rotate_left(13), seed.rotate_left(29), !seed])
}

fn engine(banks: usize, distribution: Distribution) -> ParallelAccumulator<4> {
    ParallelAccumulator::new(
        EngineConfig::default()
            .with_banks(banks)
            .with_distribution(distribution),
    )
    .unwrap()
}

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate");
    group.throughput(Throughput::Elements(1));

    for distribution in [Distribution::RoundRobin, Distribution::Hashed] {
        let acc = engine(16, distribution);
        let mut seed = 0u64;
        group.bench_function(BenchmarkId::new("w256", format!("{distribution:?}")), |b| {
            b.iter(|| {
                seed = seed.wrapping_add(1);
                acc.accumulate(black_box(make_delta(seed)));
            })
        });
    }
    group.finish();
}

fn bench_rollback(c: &mut Criterion) {
    let acc = engine(16, Distribution::RoundRobin);

    c.bench_function("accumulate_then_rollback_1", |b| {
        let mut seed = 0u64;
        b.iter(|| {
            seed = seed.wrapping_add(1);
            acc.accumulate(make_delta(seed));
            black_box(acc.rollback(black_box(1)))
        })
    });
}

fn bench_contended_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate_contended");
    const PER_THREAD: u64 = 10_000;

    for threads in [1u64, 2, 4, 8] {
        group.throughput(Throughput::Elements(threads * PER_THREAD));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let acc = engine(16, Distribution::RoundRobin);
            b.iter(|| {
                std::thread::scope(|s| {
                    for t in 0..threads {
                        let acc = &acc;
                        s.spawn(move || {
                            for i in 0..PER_THREAD {
                                acc.accumulate(make_delta(t << 32 | i));
                            }
                        });
                    }
                });
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_accumulate, bench_rollback, bench_contended_accumulate);
criterion_main!(benches);
