// rust/engine/tests/run_pipeline_contracts.rs
#![forbid(unsafe_code)]

/**
 * End-to-end contracts for multi-class runs.
 *
 * Purpose:
 * - Drive the enumerator, the per-class driver, checkpoints and the
 *   aggregator together on small material ceilings.
 *
 * Invariants covered:
 * - Same seed and settings give identical results for any thread count.
 * - Interrupt + resume from a checkpoint equals an uninterrupted run.
 * - Range-sharded checkpoints merge into the same global estimate.
 * - A checkpoint from a different configuration is refused.
 * - A damaged tail (torn row, or a final row missing its newline) is
 *   repaired before new rows are appended.
 * - The global estimate does not depend on class order.
 * - Bare kings are enumerated exhaustively: 3612 of 4032 legal per side.
 */
use std::path::PathBuf;

use census_engine::board::{ClassEnumerator, MaterialClass, MaterialLimits};
use census_engine::error::CensusError;
use census_engine::estimate::{
    Aggregator, CheckpointWriter, ClassEstimate, EstimateMethod, IntervalMethod, NoopObserver,
    RunConfig, RunContext, RunOutcome, StoppingRule, aggregate, load_checkpoint,
    merge_checkpoints,
};
use census_engine::oracle::{LegalityOracle, StructuralOracle};
use num_bigint::BigUint;
use proptest::prelude::*;
use rand::prelude::*;

const MAX_PIECES: usize = 3;

fn scratch(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "census_engine_{}_{name}.jsonl",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

fn config(threads: usize) -> RunConfig {
    RunConfig {
        stopping: StoppingRule::Fixed { trials: 600 },
        seed: 4242,
        shards: 3,
        threads,
        ..RunConfig::default()
    }
}

fn classes(range: std::ops::Range<usize>) -> Vec<(u64, MaterialClass)> {
    let e = ClassEnumerator::new(MaterialLimits::with_max_pieces(MAX_PIECES)).unwrap();
    e.iter()
        .enumerate()
        .skip(range.start)
        .take(range.end - range.start)
        .map(|(i, c)| (i as u64, c))
        .collect()
}

fn run_range(
    cfg: RunConfig,
    oracle: &dyn LegalityOracle,
    range: std::ops::Range<usize>,
    checkpoint: Option<&PathBuf>,
    class_limit: Option<usize>,
) -> RunOutcome {
    let header = cfg.header(&oracle.name(), MAX_PIECES);
    let mut ctx = RunContext::new(cfg, oracle).unwrap();
    match checkpoint {
        Some(path) => {
            let (mut w, done) = CheckpointWriter::open(path, &header).unwrap();
            ctx.run(classes(range), done, Some(&mut w), &mut NoopObserver, class_limit)
                .unwrap()
        }
        None => ctx
            .run(classes(range), Vec::new(), None, &mut NoopObserver, class_limit)
            .unwrap(),
    }
}

#[test]
fn bare_kings_are_exhaustive_and_exact() {
    let oracle = StructuralOracle::default();
    let mut ctx = RunContext::new(config(1), &oracle).unwrap();
    let est = ctx.estimate_class(0, &MaterialClass::kings_only()).unwrap();

    assert_eq!(est.method, EstimateMethod::Exhaustive);
    assert_eq!(est.interval, IntervalMethod::Exact);
    // Both sides to move: 2 * 4032 pairs, 2 * (4032 - 420 adjacent) legal.
    assert_eq!(est.trials, 8_064);
    assert_eq!(est.legal, 7_224);
    assert_eq!(est.variance, 0.0);
    assert_eq!(est.lower, est.upper);

    let g = aggregate(&[est], ctx.z()).unwrap();
    assert_eq!(g.total, BigUint::from(3_612u32));
}

#[test]
fn results_do_not_depend_on_thread_count() {
    let oracle = StructuralOracle::default();
    let one = run_range(config(1), &oracle, 0..11, None, None);
    let four = run_range(config(4), &oracle, 0..11, None, None);

    assert_eq!(one.estimates.len(), 11);
    assert_eq!(one.estimates, four.estimates);
}

#[test]
fn resume_matches_uninterrupted_run() {
    let oracle = StructuralOracle::default();
    let path = scratch("resume");

    let first = run_range(config(2), &oracle, 0..11, Some(&path), Some(4));
    assert!(first.interrupted);
    assert_eq!(first.computed, 4);
    assert_eq!(load_checkpoint(&path).unwrap().estimates.len(), 4);

    let second = run_range(config(2), &oracle, 0..11, Some(&path), None);
    assert!(!second.interrupted);
    assert_eq!(second.resumed, 4);
    assert_eq!(second.computed, 7);

    let straight = run_range(config(2), &oracle, 0..11, None, None);
    assert_eq!(second.estimates, straight.estimates);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn sharded_checkpoints_merge_to_the_full_estimate() {
    let oracle = StructuralOracle::default();
    let a = scratch("merge_a");
    let b = scratch("merge_b");

    run_range(config(1), &oracle, 0..5, Some(&a), None);
    run_range(config(3), &oracle, 5..11, Some(&b), None);
    let merged = merge_checkpoints(&[a.clone(), b.clone()]).unwrap();

    let straight = run_range(config(2), &oracle, 0..11, None, None);
    assert_eq!(merged.estimates, straight.estimates);

    let z = 1.959_963_984_540_054;
    assert_eq!(
        aggregate(&merged.estimates, z).unwrap(),
        aggregate(&straight.estimates, z).unwrap()
    );

    // Merging a shard with itself is harmless; identical rows collapse.
    let twice = merge_checkpoints(&[a.clone(), a.clone()]).unwrap();
    assert_eq!(twice.estimates.len(), 5);

    let _ = std::fs::remove_file(&a);
    let _ = std::fs::remove_file(&b);
}

#[test]
fn checkpoint_from_another_configuration_is_refused() {
    let oracle = StructuralOracle::default();
    let path = scratch("fingerprint");
    run_range(config(1), &oracle, 0..2, Some(&path), None);

    let mut other = config(1);
    other.seed += 1;
    let header = other.header(&oracle.name(), MAX_PIECES);
    match CheckpointWriter::open(&path, &header) {
        Err(CensusError::Checkpoint(msg)) => assert!(msg.contains("seed"), "{msg}"),
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("mismatched checkpoint was accepted"),
    }

    let _ = std::fs::remove_file(&path);
}

#[test]
fn torn_final_line_is_dropped_on_resume() {
    let oracle = StructuralOracle::default();
    let path = scratch("torn");
    run_range(config(1), &oracle, 0..3, Some(&path), None);

    let mut text = std::fs::read_to_string(&path).unwrap();
    text.push_str("{\"index\":3,\"cla");
    std::fs::write(&path, text).unwrap();

    let cp = load_checkpoint(&path).unwrap();
    assert!(cp.torn_tail);
    assert_eq!(cp.estimates.len(), 3);

    let resumed = run_range(config(1), &oracle, 0..5, Some(&path), None);
    assert_eq!(resumed.resumed, 3);
    assert_eq!(resumed.computed, 2);
    let reread = load_checkpoint(&path).unwrap();
    assert!(!reread.torn_tail);
    assert_eq!(reread.estimates.len(), 5);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn final_row_without_newline_is_not_fused_on_resume() {
    let oracle = StructuralOracle::default();
    let path = scratch("no_newline");
    run_range(config(1), &oracle, 0..3, Some(&path), None);

    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, text.trim_end_matches('\n')).unwrap();
    let cp = load_checkpoint(&path).unwrap();
    assert!(!cp.torn_tail);
    assert_eq!(cp.estimates.len(), 3);

    let resumed = run_range(config(1), &oracle, 0..5, Some(&path), None);
    assert_eq!(resumed.resumed, 3);
    assert_eq!(resumed.computed, 2);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.ends_with('\n'));
    assert_eq!(text.lines().count(), 6);
    let reread = load_checkpoint(&path).unwrap();
    assert!(!reread.torn_tail);
    assert_eq!(reread.estimates.len(), 5);

    let _ = std::fs::remove_file(&path);
}

fn synthetic_estimates() -> Vec<ClassEstimate> {
    let oracle = StructuralOracle::default();
    run_range(config(1), &oracle, 0..11, None, None).estimates
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn aggregation_ignores_class_order(seed in any::<u64>()) {
        let estimates = synthetic_estimates();
        let mut shuffled = estimates.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

        // Feed the accumulator directly so no sorting hides the order.
        let z = 1.96;
        let mut forward = Aggregator::new();
        for e in &estimates {
            forward.add(e).unwrap();
        }
        let mut mixed = Aggregator::new();
        for e in &shuffled {
            mixed.add(e).unwrap();
        }
        prop_assert_eq!(forward.finish(z), mixed.finish(z));
        prop_assert_eq!(aggregate(&shuffled, z).unwrap(), forward.finish(z));
    }
}
