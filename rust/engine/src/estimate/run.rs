// rust/engine/src/estimate/run.rs
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use num_bigint::BigUint;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::board::{
    BOARD_SQUARES, DiagramCache, MaterialClass, Piece, PieceKind, RawPlacement, Side, Square,
};
use crate::error::CensusError;
use crate::oracle::LegalityOracle;

use super::checkpoint::{CHECKPOINT_FORMAT, CheckpointWriter, RunHeader};
use super::ratio::{StopDecision, StoppingRule, z_for_confidence};
use super::record::{ClassEstimate, EstimateMethod};
use super::sampler::{MonteCarloSampler, RetryPolicy, ShardTally, SideToMove, judge_with_retry};
use super::seed::derive_seed;

pub const DEFAULT_SEED: u64 = 12345;
pub const DEFAULT_EXACT_THRESHOLD: u64 = 100_000;

#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub stopping: StoppingRule,
    pub seed: u64,
    /// Two-sided confidence level in (0, 1).
    pub confidence: f64,
    /// Classes with at most this many diagrams are enumerated exhaustively.
    pub exact_threshold: u64,
    pub side_to_move: SideToMove,
    /// Independent RNG streams per class. Part of the run fingerprint.
    pub shards: u32,
    /// Samples per adaptive round, spread across shards.
    pub round_size: u64,
    /// Worker threads; 0 uses rayon's global pool. Never affects results.
    pub threads: usize,
    pub retry: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stopping: StoppingRule::Adaptive {
                target_rel_error: 0.10,
                min_trials: StoppingRule::DEFAULT_MIN_TRIALS,
                max_trials: 128_000,
                abs_half_width: None,
            },
            seed: DEFAULT_SEED,
            confidence: 0.95,
            exact_threshold: DEFAULT_EXACT_THRESHOLD,
            side_to_move: SideToMove::Uniform,
            shards: 8,
            round_size: 1_000,
            threads: 0,
            retry: RetryPolicy::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), CensusError> {
        self.stopping.validate()?;
        z_for_confidence(self.confidence)?;
        if self.shards == 0 {
            return Err(CensusError::Configuration(
                "shards must be at least 1".to_string(),
            ));
        }
        if self.round_size == 0 {
            return Err(CensusError::Configuration(
                "round size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn z(&self) -> Result<f64, CensusError> {
        z_for_confidence(self.confidence)
    }

    pub fn header(&self, oracle: &str, max_pieces: usize) -> RunHeader {
        RunHeader {
            format: CHECKPOINT_FORMAT,
            seed: self.seed,
            confidence: self.confidence,
            stopping: self.stopping,
            side_to_move: self.side_to_move,
            exact_threshold: self.exact_threshold,
            oracle: oracle.to_string(),
            max_pieces,
            shards: self.shards,
            round_size: self.round_size,
        }
    }
}

/// Cooperative stop request, checked between classes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callbacks for a census run. Everything defaults to a no-op.
pub trait CensusObserver {
    fn on_class_start(&mut self, _index: u64, _class: &MaterialClass, _diagrams: &BigUint) {}
    fn on_class_done(&mut self, _est: &ClassEstimate, _elapsed: Duration) {}
    fn on_class_resumed(&mut self, _est: &ClassEstimate) {}
    fn on_class_skipped(&mut self, _index: u64, _class: &MaterialClass, _why: &CensusError) {}
}

pub struct NoopObserver;

impl CensusObserver for NoopObserver {}

#[derive(Clone, Debug, Default)]
pub struct RunOutcome {
    /// Resumed and newly computed estimates, by class index.
    pub estimates: Vec<ClassEstimate>,
    pub computed: usize,
    pub resumed: usize,
    pub skipped: Vec<(u64, MaterialClass)>,
    /// Stopped by cancellation or the class limit with classes still pending.
    pub interrupted: bool,
}

/// Everything a run needs besides the class list: settings, the oracle, the
/// count cache and the worker pool.
pub struct RunContext<'o> {
    cfg: RunConfig,
    z: f64,
    oracle: &'o dyn LegalityOracle,
    cache: DiagramCache,
    pool: Option<rayon::ThreadPool>,
    cancel: CancelToken,
}

impl<'o> RunContext<'o> {
    pub fn new(cfg: RunConfig, oracle: &'o dyn LegalityOracle) -> Result<Self, CensusError> {
        cfg.validate()?;
        let z = cfg.z()?;
        let pool = if cfg.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(cfg.threads)
                .build()
                .map_err(|e| CensusError::Configuration(format!("thread pool: {e}")))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            cfg,
            z,
            oracle,
            cache: DiagramCache::new(),
            pool,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Estimates one class: exhaustive when its diagram count is at most the
    /// exact threshold, sampled otherwise.
    pub fn estimate_class(
        &mut self,
        index: u64,
        class: &MaterialClass,
    ) -> Result<ClassEstimate, CensusError> {
        let diagrams = self.cache.get(class)?;
        self.estimate_counted(index, class, diagrams)
    }

    fn estimate_counted(
        &self,
        index: u64,
        class: &MaterialClass,
        diagrams: BigUint,
    ) -> Result<ClassEstimate, CensusError> {
        if diagrams <= BigUint::from(self.cfg.exact_threshold) {
            let tally = self.exhaustive(class);
            return Ok(ClassEstimate::from_tally(
                index,
                *class,
                diagrams,
                EstimateMethod::Exhaustive,
                &tally,
                self.z,
                false,
            ));
        }

        let (tally, decision) = self.sampled(index, class);
        let insufficient = decision != StopDecision::Converged;
        let est = ClassEstimate::from_tally(
            index,
            *class,
            diagrams,
            EstimateMethod::Sampled,
            &tally,
            self.z,
            insufficient,
        );
        if insufficient {
            warn!(
                "class {class}: stopped at {} trials without reaching the target precision \
                 (ratio {:.6}, interval [{:.6}, {:.6}])",
                est.trials, est.ratio, est.lower, est.upper
            );
        }
        Ok(est)
    }

    /// Rounds of sampling across shards until the stopping rule settles.
    fn sampled(&self, index: u64, class: &MaterialClass) -> (ShardTally, StopDecision) {
        let shards = self.cfg.shards as u64;
        let mut samplers: Vec<MonteCarloSampler<'_>> = (0..shards)
            .map(|s| {
                MonteCarloSampler::new(
                    *class,
                    self.oracle,
                    self.cfg.side_to_move,
                    self.cfg.retry,
                    derive_seed(self.cfg.seed, index, s),
                )
            })
            .collect();

        let budget = self.cfg.stopping.budget();
        let mut total = ShardTally::default();
        let mut round_no = 0u64;

        loop {
            let remaining = budget.saturating_sub(total.estimator.trials());
            let round = match self.cfg.stopping {
                StoppingRule::Fixed { .. } => remaining,
                StoppingRule::Adaptive { .. } => self.cfg.round_size.min(remaining),
            };
            let quotas = split_quota(round, shards);

            let tallies: Vec<ShardTally> = in_pool(self.pool.as_ref(), || {
                samplers
                    .par_iter_mut()
                    .zip(quotas.par_iter())
                    .map(|(sampler, &quota)| sampler.run(quota))
                    .collect()
            });

            let mut judged = 0;
            for t in &tallies {
                judged += t.estimator.trials();
                total.absorb(t);
            }
            round_no += 1;
            debug!(
                "class {class}: round {round_no} judged {judged}/{round}, total {} legal {} faults {}",
                total.estimator.trials(),
                total.estimator.legal(),
                total.faults
            );

            match self.cfg.stopping.decide(&total.estimator, self.z) {
                StopDecision::Continue if round > 0 && judged == 0 => {
                    warn!("class {class}: a whole round of samples faulted; giving up on the class");
                    return (total, StopDecision::Capped);
                }
                StopDecision::Continue if round == 0 => return (total, StopDecision::Capped),
                StopDecision::Continue => {}
                decision => return (total, decision),
            }
        }
    }

    /// Every placement of the class, under every side to move the policy allows.
    fn exhaustive(&self, class: &MaterialClass) -> ShardTally {
        let groups: Vec<(Piece, usize)> = class.groups().collect();
        let sides = self.cfg.side_to_move.sides();
        let oracle = self.oracle;
        let retry = self.cfg.retry;

        let per_square: Vec<ShardTally> = in_pool(self.pool.as_ref(), || {
            (0..BOARD_SQUARES as Square)
                .into_par_iter()
                .map(|wk| {
                    let mut tally = ShardTally::default();
                    let mut p = RawPlacement::empty(Side::White);
                    p.put(wk, Piece::new(Side::White, PieceKind::King));
                    for bk in 0..BOARD_SQUARES as Square {
                        if bk == wk {
                            continue;
                        }
                        p.put(bk, Piece::new(Side::Black, PieceKind::King));
                        place_groups(&mut p, &groups, &mut |placed: &RawPlacement| {
                            for &side in sides {
                                let mut q = *placed;
                                q.side_to_move = side;
                                match judge_with_retry(oracle, &q, &retry) {
                                    (Ok(v), _) => tally.estimator.record(v),
                                    (Err(fault), attempts) => {
                                        tally.faults += 1;
                                        warn!(
                                            "class {class}: discarded placement {} after {attempts} attempt(s): {fault}",
                                            q.fen()
                                        );
                                    }
                                }
                            }
                        });
                        p.remove(bk);
                    }
                    tally
                })
                .collect()
        });

        let mut total = ShardTally::default();
        for t in &per_square {
            total.absorb(t);
        }
        total
    }

    /// Runs `classes` in order, skipping indices present in `resumed`.
    ///
    /// Each finished class is appended to `checkpoint` before the next starts.
    /// Stops early when the cancel token fires or `class_limit` new classes
    /// have been computed.
    pub fn run(
        &mut self,
        classes: impl IntoIterator<Item = (u64, MaterialClass)>,
        resumed: Vec<ClassEstimate>,
        mut checkpoint: Option<&mut CheckpointWriter>,
        observer: &mut dyn CensusObserver,
        class_limit: Option<usize>,
    ) -> Result<RunOutcome, CensusError> {
        let mut done: FxHashMap<u64, ClassEstimate> =
            resumed.into_iter().map(|e| (e.index, e)).collect();
        let mut out = RunOutcome::default();

        for (index, class) in classes {
            if let Some(prev) = done.remove(&index) {
                if prev.class != class {
                    return Err(CensusError::Checkpoint(format!(
                        "checkpoint has {} at index {index}, enumeration has {class}",
                        prev.class
                    )));
                }
                observer.on_class_resumed(&prev);
                out.resumed += 1;
                out.estimates.push(prev);
                continue;
            }

            if self.cancel.is_cancelled() || class_limit.is_some_and(|l| out.computed >= l) {
                out.interrupted = true;
                break;
            }

            let diagrams = match self.cache.get(&class) {
                Ok(d) => d,
                Err(e @ CensusError::InfeasibleClass { .. }) => {
                    warn!("skipping class {index} ({class}): {e}");
                    observer.on_class_skipped(index, &class, &e);
                    out.skipped.push((index, class));
                    continue;
                }
                Err(e) => return Err(e),
            };

            observer.on_class_start(index, &class, &diagrams);
            let t0 = Instant::now();
            let est = self.estimate_counted(index, &class, diagrams)?;
            let elapsed = t0.elapsed();

            if let Some(cp) = checkpoint.as_deref_mut() {
                cp.append(&est)?;
            }
            info!(
                "class {index} {class}: ratio {:.6} [{:.6}, {:.6}] from {} trials ({:?}, {:.2?})",
                est.ratio, est.lower, est.upper, est.trials, est.method, elapsed
            );
            observer.on_class_done(&est, elapsed);
            out.computed += 1;
            out.estimates.push(est);
        }

        if !done.is_empty() {
            debug!(
                "{} checkpointed class(es) lie outside this invocation's range",
                done.len()
            );
            out.estimates.extend(done.into_values());
        }
        out.estimates.sort_by_key(|e| e.index);
        Ok(out)
    }
}

/// Splits `n` samples over `shards` as evenly as possible, earlier shards
/// taking the remainder.
pub fn split_quota(n: u64, shards: u64) -> Vec<u64> {
    let base = n / shards;
    let extra = n % shards;
    (0..shards).map(|s| base + u64::from(s < extra)).collect()
}

fn in_pool<R, F>(pool: Option<&rayon::ThreadPool>, f: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match pool {
        Some(pool) => pool.install(f),
        None => f(),
    }
}

/// Visits every way to put the remaining groups on empty squares. Pieces of
/// one group take strictly increasing squares, so each diagram is visited once.
fn place_groups(
    p: &mut RawPlacement,
    groups: &[(Piece, usize)],
    visit: &mut dyn FnMut(&RawPlacement),
) {
    match groups.split_first() {
        None => visit(p),
        Some((&(piece, k), rest)) => choose_squares(p, piece, k, 0, rest, visit),
    }
}

fn choose_squares(
    p: &mut RawPlacement,
    piece: Piece,
    left: usize,
    from: usize,
    rest: &[(Piece, usize)],
    visit: &mut dyn FnMut(&RawPlacement),
) {
    if left == 0 {
        place_groups(p, rest, visit);
        return;
    }
    for sq in from..BOARD_SQUARES {
        let sq = sq as Square;
        if p.piece_at(sq).is_some() {
            continue;
        }
        p.put(sq, piece);
        choose_squares(p, piece, left - 1, sq as usize + 1, rest, visit);
        p.remove(sq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::count_diagrams;
    use crate::oracle::ConstantOracle;

    #[test]
    fn quotas_cover_the_round() {
        assert_eq!(split_quota(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(split_quota(3, 8).iter().sum::<u64>(), 3);
        assert_eq!(split_quota(0, 2), vec![0, 0]);
    }

    #[test]
    fn exhaustive_visits_every_diagram_once_per_side() {
        let oracle = ConstantOracle::legal();
        let cfg = RunConfig {
            exact_threshold: u64::MAX,
            threads: 1,
            ..RunConfig::default()
        };
        let ctx = RunContext::new(cfg, &oracle).unwrap();
        let class = MaterialClass::new([0, 1, 0, 0, 0], [1, 0, 0, 0, 0]).unwrap();
        let tally = ctx.exhaustive(&class);
        let expected = count_diagrams(&class).unwrap() * 2u32;
        assert_eq!(BigUint::from(tally.estimator.trials()), expected);
    }

    #[test]
    fn fixed_rule_draws_exactly_the_budget() {
        let oracle = ConstantOracle::illegal();
        let cfg = RunConfig {
            stopping: StoppingRule::Fixed { trials: 1_003 },
            exact_threshold: 0,
            shards: 4,
            threads: 2,
            ..RunConfig::default()
        };
        let mut ctx = RunContext::new(cfg, &oracle).unwrap();
        let class = MaterialClass::new([1, 0, 0, 0, 0], [0; 5]).unwrap();
        let est = ctx.estimate_class(3, &class).unwrap();
        assert_eq!(est.trials, 1_003);
        assert_eq!(est.legal, 0);
        assert!(!est.insufficient_trials);
        assert_eq!(est.method, EstimateMethod::Sampled);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let oracle = ConstantOracle::legal();
        let cfg = RunConfig {
            shards: 0,
            ..RunConfig::default()
        };
        assert!(matches!(
            RunContext::new(cfg, &oracle),
            Err(CensusError::Configuration(_))
        ));
    }

    #[test]
    fn cancellation_stops_before_the_next_class() {
        let oracle = ConstantOracle::legal();
        let cfg = RunConfig {
            stopping: StoppingRule::Fixed { trials: 10 },
            ..RunConfig::default()
        };
        let mut ctx = RunContext::new(cfg, &oracle).unwrap();
        ctx.cancel_token().cancel();
        let classes = vec![(0, MaterialClass::kings_only())];
        let out = ctx
            .run(classes, Vec::new(), None, &mut NoopObserver, None)
            .unwrap();
        assert!(out.interrupted);
        assert!(out.estimates.is_empty());
    }
}
