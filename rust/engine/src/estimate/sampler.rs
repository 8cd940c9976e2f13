// rust/engine/src/estimate/sampler.rs
#![forbid(unsafe_code)]

use std::time::Duration;

use log::warn;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::board::{BOARD_SQUARES, MaterialClass, RawPlacement, Side, Square};
use crate::oracle::{LegalityOracle, OracleFault, Verdict};

use super::ratio::RatioEstimator;

/// How the side to move is attached to each placement.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideToMove {
    /// Fair coin per placement.
    #[default]
    Uniform,
    White,
    Black,
}

impl SideToMove {
    pub fn from_cli(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "uniform" | "random" | "both" => Some(SideToMove::Uniform),
            "white" | "w" => Some(SideToMove::White),
            "black" | "b" => Some(SideToMove::Black),
            _ => None,
        }
    }

    /// Sides an exhaustive pass must visit for every placement.
    pub fn sides(self) -> &'static [Side] {
        match self {
            SideToMove::Uniform => &Side::BOTH,
            SideToMove::White => &[Side::White],
            SideToMove::Black => &[Side::Black],
        }
    }
}

/// Retry schedule for transient oracle faults. Bounding a single call is the
/// job of [`TimeoutOracle`](crate::oracle::TimeoutOracle).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first transient fault.
    pub max_retries: u32,
    /// Sleep before retry `i` is `backoff * 2^i` (saturating); zero disables sleeping.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(1),
        }
    }
}

impl RetryPolicy {
    /// Sleep before the retry that follows attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff.checked_mul(factor).unwrap_or(Duration::MAX)
    }
}

/// Per-shard counters; combined by plain addition.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ShardTally {
    pub estimator: RatioEstimator,
    /// Samples discarded after oracle faults; in neither trials nor legal.
    pub faults: u64,
}

impl ShardTally {
    pub fn absorb(&mut self, other: &ShardTally) {
        self.estimator.absorb(&other.estimator);
        self.faults += other.faults;
    }
}

/// Queries the oracle, retrying transient faults with exponential backoff.
///
/// Returns the last fault once retries are exhausted or the fault is not
/// transient. The number of attempts made is returned alongside.
pub fn judge_with_retry(
    oracle: &dyn LegalityOracle,
    placement: &RawPlacement,
    retry: &RetryPolicy,
) -> (Result<Verdict, OracleFault>, u32) {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match oracle.judge(placement) {
            Ok(v) => return (Ok(v), attempt),
            Err(fault) if fault.is_transient() && attempt <= retry.max_retries => {
                if !retry.backoff.is_zero() {
                    std::thread::sleep(retry.delay(attempt));
                }
            }
            Err(fault) => return (Err(fault), attempt),
        }
    }
}

/// Draws uniform placements for one class and tallies oracle verdicts.
///
/// Each draw is a partial Fisher-Yates shuffle of a 64-square buffer: the
/// first K entries become the white king, the black king and then the groups
/// in the same order the diagram counter uses. Every ordered K-subset is
/// equally likely, and every diagram has the same number (the product of the
/// group factorials) of ordered preimages, so diagrams are drawn uniformly
/// from exactly the universe the counter counts.
pub struct MonteCarloSampler<'a> {
    class: MaterialClass,
    oracle: &'a dyn LegalityOracle,
    side_to_move: SideToMove,
    retry: RetryPolicy,
    rng: StdRng,
    squares: [Square; BOARD_SQUARES],
    k: usize,
}

impl<'a> MonteCarloSampler<'a> {
    pub fn new(
        class: MaterialClass,
        oracle: &'a dyn LegalityOracle,
        side_to_move: SideToMove,
        retry: RetryPolicy,
        seed: u64,
    ) -> Self {
        let mut squares = [0 as Square; BOARD_SQUARES];
        for (i, sq) in squares.iter_mut().enumerate() {
            *sq = i as Square;
        }
        Self {
            class,
            oracle,
            side_to_move,
            retry,
            rng: StdRng::seed_from_u64(seed),
            squares,
            k: class.total_pieces(),
        }
    }

    pub fn class(&self) -> &MaterialClass {
        &self.class
    }

    /// One uniformly random placement (collision-free by construction).
    pub fn draw(&mut self) -> RawPlacement {
        let side = match self.side_to_move {
            SideToMove::Uniform => {
                if self.rng.gen_bool(0.5) {
                    Side::White
                } else {
                    Side::Black
                }
            }
            SideToMove::White => Side::White,
            SideToMove::Black => Side::Black,
        };
        let (chosen, _rest) = self.squares.partial_shuffle(&mut self.rng, self.k);
        RawPlacement::from_squares(&self.class, chosen, side)
    }

    /// Draws `n` placements and judges each. Faulted samples are logged and
    /// counted in `faults` only.
    pub fn run(&mut self, n: u64) -> ShardTally {
        let mut tally = ShardTally::default();
        for _ in 0..n {
            let placement = self.draw();
            match judge_with_retry(self.oracle, &placement, &self.retry) {
                (Ok(verdict), _) => tally.estimator.record(verdict),
                (Err(fault), attempts) => {
                    tally.faults += 1;
                    warn!(
                        "class {}: discarded sample {} after {} attempt(s): {}",
                        self.class,
                        placement.fen(),
                        attempts,
                        fault
                    );
                }
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ConstantOracle;

    #[test]
    fn fixed_side_policy_is_respected() {
        let oracle = ConstantOracle::legal();
        let class = MaterialClass::new([1, 0, 0, 0, 0], [0; 5]).unwrap();
        let mut s = MonteCarloSampler::new(
            class,
            &oracle,
            SideToMove::Black,
            RetryPolicy::default(),
            7,
        );
        for _ in 0..50 {
            assert_eq!(s.draw().side_to_move, Side::Black);
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let oracle = ConstantOracle::legal();
        let class = MaterialClass::new([2, 1, 0, 0, 0], [0, 0, 1, 0, 0]).unwrap();
        let mut a = MonteCarloSampler::new(class, &oracle, SideToMove::Uniform, RetryPolicy::default(), 99);
        let mut b = MonteCarloSampler::new(class, &oracle, SideToMove::Uniform, RetryPolicy::default(), 99);
        for _ in 0..100 {
            assert_eq!(a.draw(), b.draw());
        }
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let r = RetryPolicy {
            max_retries: 40,
            backoff: Duration::from_millis(3),
        };
        assert_eq!(r.delay(1), Duration::from_millis(3));
        assert_eq!(r.delay(3), Duration::from_millis(12));

        let huge = RetryPolicy {
            max_retries: 40,
            backoff: Duration::from_millis(u64::MAX),
        };
        assert_eq!(huge.delay(1), Duration::from_millis(u64::MAX));
        assert_eq!(huge.delay(30), Duration::MAX);
    }

    #[test]
    fn side_parsing() {
        assert_eq!(SideToMove::from_cli("Uniform"), Some(SideToMove::Uniform));
        assert_eq!(SideToMove::from_cli("b"), Some(SideToMove::Black));
        assert_eq!(SideToMove::from_cli("nobody"), None);
    }
}
