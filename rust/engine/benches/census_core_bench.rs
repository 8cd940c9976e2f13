// rust/engine/benches/census_core_bench.rs
#![forbid(unsafe_code)]

/**
 * Census core micro-benchmarks.
 *
 * Focus:
 * - Exact counting of a full-material class (`count_diagrams`)
 * - Placement drawing (`MonteCarloSampler::draw`)
 * - Structural oracle verdict latency on sampled placements
 * - One sampled class end to end on a single thread
 */
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use census_engine::board::{MaterialClass, RawPlacement, count_diagrams};
use census_engine::estimate::{
    MonteCarloSampler, RetryPolicy, RunConfig, RunContext, SideToMove, StoppingRule,
};
use census_engine::oracle::{ConstantOracle, LegalityOracle, StructuralOracle};

fn full_material() -> MaterialClass {
    MaterialClass::new([8, 2, 2, 2, 1], [8, 2, 2, 2, 1]).unwrap()
}

fn middlegame() -> MaterialClass {
    MaterialClass::new([6, 1, 2, 1, 1], [5, 2, 1, 2, 0]).unwrap()
}

fn bench_count(c: &mut Criterion) {
    let class = full_material();
    c.bench_function("count.full_material", |b| {
        b.iter(|| count_diagrams(black_box(&class)).unwrap())
    });
}

fn bench_draw(c: &mut Criterion) {
    let oracle = ConstantOracle::legal();
    let mut sampler = MonteCarloSampler::new(
        full_material(),
        &oracle,
        SideToMove::Uniform,
        RetryPolicy::default(),
        20260228,
    );
    c.bench_function("sampler.draw.full_material", |b| {
        b.iter(|| black_box(sampler.draw()))
    });
}

fn bench_structural(c: &mut Criterion) {
    let oracle = StructuralOracle::default();
    let dummy = ConstantOracle::legal();
    let mut sampler = MonteCarloSampler::new(
        middlegame(),
        &dummy,
        SideToMove::Uniform,
        RetryPolicy::default(),
        7,
    );
    let placements: Vec<RawPlacement> = (0..256).map(|_| sampler.draw()).collect();

    c.bench_function("oracle.structural.judge", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % placements.len();
            black_box(oracle.judge(&placements[i]).unwrap())
        })
    });
}

fn bench_class(c: &mut Criterion) {
    let oracle = StructuralOracle::default();
    let class = middlegame();
    c.bench_function("run.sampled_class.fixed_10k", |b| {
        b.iter_batched(
            || {
                let cfg = RunConfig {
                    stopping: StoppingRule::Fixed { trials: 10_000 },
                    threads: 1,
                    ..RunConfig::default()
                };
                RunContext::new(cfg, &oracle).unwrap()
            },
            |mut ctx| black_box(ctx.estimate_class(0, &class).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_count, bench_draw, bench_structural, bench_class);
criterion_main!(benches);
