// rust/engine/src/estimate/ratio.rs
#![forbid(unsafe_code)]

/*
Legality-ratio estimation

Counters
--------
`trials` (n) counts judged samples, `legal` (s) the Legal verdicts among them.
Discarded samples (oracle faults) never reach this module.

Point estimate and variance
---------------------------
p = s / n, Var(p) = p (1 - p) / n under the binomial model.

Interval
--------
- 0 < s < n: normal approximation with continuity correction,
  p -/+ (z sqrt(Var) + 1 / 2n), clamped to [0, 1].
- s == 0 or s == n: Wilson score interval,
  center = (p + z^2/2n) / (1 + z^2/n)
  half   = z sqrt(p(1-p)/n + z^2/4n^2) / (1 + z^2/n)
  which keeps a non-zero width at the extremes.
- n == 0: the vacuous interval [0, 1].
*/

use serde::{Deserialize, Serialize};

use crate::error::CensusError;
use crate::oracle::Verdict;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMethod {
    NormalContinuity,
    Wilson,
    /// Exhaustive pass: the ratio is exact.
    Exact,
    /// No trials yet.
    Vacuous,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    pub method: IntervalMethod,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn half_width(&self) -> f64 {
        0.5 * self.width()
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

/// Running (trials, legal) counters for one class or one shard.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RatioEstimator {
    trials: u64,
    legal: u64,
}

impl RatioEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts(trials: u64, legal: u64) -> Self {
        debug_assert!(legal <= trials);
        Self { trials, legal }
    }

    #[inline]
    pub fn record(&mut self, verdict: Verdict) {
        self.trials += 1;
        if verdict.is_legal() {
            self.legal += 1;
        }
    }

    /// Adds another estimator's counters (shard combination).
    pub fn absorb(&mut self, other: &RatioEstimator) {
        self.trials += other.trials;
        self.legal += other.legal;
    }

    pub fn trials(&self) -> u64 {
        self.trials
    }

    pub fn legal(&self) -> u64 {
        self.legal
    }

    pub fn ratio(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        self.legal as f64 / self.trials as f64
    }

    pub fn variance(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        let p = self.ratio();
        p * (1.0 - p) / self.trials as f64
    }

    pub fn interval(&self, z: f64) -> Interval {
        let n = self.trials;
        if n == 0 {
            return Interval {
                lower: 0.0,
                upper: 1.0,
                method: IntervalMethod::Vacuous,
            };
        }
        if self.legal == 0 || self.legal == n {
            return wilson_interval(self.ratio(), n, z);
        }

        let p = self.ratio();
        let half = z * self.variance().sqrt() + 0.5 / n as f64;
        Interval {
            lower: (p - half).max(0.0),
            upper: (p + half).min(1.0),
            method: IntervalMethod::NormalContinuity,
        }
    }
}

pub fn wilson_interval(p: f64, n: u64, z: f64) -> Interval {
    let n = n as f64;
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let half = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denom;
    Interval {
        lower: (center - half).max(0.0),
        upper: (center + half).min(1.0),
        method: IntervalMethod::Wilson,
    }
}

/// Two-sided standard-normal quantile for a confidence level in (0, 1).
pub fn z_for_confidence(level: f64) -> Result<f64, CensusError> {
    if !(level > 0.0 && level < 1.0) {
        return Err(CensusError::Configuration(format!(
            "confidence level {level} must lie strictly between 0 and 1"
        )));
    }
    Ok(inverse_normal_cdf(1.0 - (1.0 - level) / 2.0))
}

/// Acklam's rational approximation of the standard-normal quantile
/// (relative error below 1.2e-9 on (0, 1)).
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_690e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// When to stop drawing samples for a class.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum StoppingRule {
    /// Exactly `trials` judged samples.
    Fixed { trials: u64 },
    /// Stop once the interval half-width relative to p drops to
    /// `target_rel_error`, or the absolute half-width drops to
    /// `abs_half_width` when set. Checked only from `min_trials` on;
    /// `max_trials` is a hard cap.
    Adaptive {
        target_rel_error: f64,
        min_trials: u64,
        max_trials: u64,
        abs_half_width: Option<f64>,
    },
}

impl StoppingRule {
    pub const DEFAULT_MIN_TRIALS: u64 = 100;

    pub fn validate(&self) -> Result<(), CensusError> {
        match *self {
            StoppingRule::Fixed { trials } => {
                if trials == 0 {
                    return Err(CensusError::Configuration(
                        "fixed trial budget must be positive".to_string(),
                    ));
                }
            }
            StoppingRule::Adaptive {
                target_rel_error,
                min_trials,
                max_trials,
                abs_half_width,
            } => {
                if !(target_rel_error > 0.0 && target_rel_error.is_finite()) {
                    return Err(CensusError::Configuration(format!(
                        "target relative error {target_rel_error} must be positive"
                    )));
                }
                if min_trials == 0 || max_trials < min_trials {
                    return Err(CensusError::Configuration(format!(
                        "adaptive bounds inconsistent: min_trials={min_trials} max_trials={max_trials}"
                    )));
                }
                if let Some(a) = abs_half_width {
                    if !(a > 0.0) {
                        return Err(CensusError::Configuration(format!(
                            "absolute half-width {a} must be positive"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Upper bound on judged samples for one class.
    pub fn budget(&self) -> u64 {
        match *self {
            StoppingRule::Fixed { trials } => trials,
            StoppingRule::Adaptive { max_trials, .. } => max_trials,
        }
    }

    pub fn decide(&self, est: &RatioEstimator, z: f64) -> StopDecision {
        let n = est.trials();
        match *self {
            StoppingRule::Fixed { trials } => {
                if n >= trials {
                    StopDecision::Converged
                } else {
                    StopDecision::Continue
                }
            }
            StoppingRule::Adaptive {
                target_rel_error,
                min_trials,
                max_trials,
                abs_half_width,
            } => {
                if n < min_trials {
                    return StopDecision::Continue;
                }
                let half = est.interval(z).half_width();
                let p = est.ratio();
                if p > 0.0 && half / p <= target_rel_error {
                    return StopDecision::Converged;
                }
                if abs_half_width.is_some_and(|a| half <= a) {
                    return StopDecision::Converged;
                }
                if n >= max_trials {
                    return StopDecision::Capped;
                }
                StopDecision::Continue
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopDecision {
    Continue,
    Converged,
    /// Hard cap reached before the target precision.
    Capped,
}
