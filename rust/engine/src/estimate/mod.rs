// rust/engine/src/estimate/mod.rs
#![forbid(unsafe_code)]

mod aggregate;
mod checkpoint;
mod ratio;
mod record;
mod run;
mod sampler;
mod seed;

/**
 * Curated estimation public API.
 *
 * Sampling, ratio statistics, the per-class driver, persistence and the
 * cross-class aggregate. Submodules stay private.
 */
pub use aggregate::{Aggregator, FRAC_BITS, GlobalEstimate, aggregate};
pub use checkpoint::{
    CHECKPOINT_FORMAT, Checkpoint, CheckpointWriter, RunHeader, dedup_estimates, load_checkpoint,
    merge_checkpoints,
};
pub use ratio::{
    Interval, IntervalMethod, RatioEstimator, StopDecision, StoppingRule, inverse_normal_cdf,
    wilson_interval, z_for_confidence,
};
pub use record::{ClassEstimate, EstimateMethod};
pub use run::{
    CancelToken, CensusObserver, DEFAULT_EXACT_THRESHOLD, DEFAULT_SEED, NoopObserver, RunConfig,
    RunContext, RunOutcome, split_quota,
};
pub use sampler::{MonteCarloSampler, RetryPolicy, ShardTally, SideToMove, judge_with_retry};
pub use seed::{derive_seed, splitmix64};
