// rust/engine/src/estimate/aggregate.rs
#![forbid(unsafe_code)]

/*
Cross-class aggregation

total     = sum_i N_i * p_i
Var(total) = sum_i N_i^2 * Var(p_i)          (classes independent)

N_i is an exact big integer, far beyond f64's 53-bit mantissa, so the
products are never formed in floating point. With p_i = s_i / n_i every term
is an exact rational:

  N_i * s_i / n_i                      (estimate)
  N_i^2 * s_i * (n_i - s_i) / n_i^3    (variance; zero for exhaustive classes)

A class with no judged samples (every sample faulted) has an unknown p_i in
[0, 1]. It adds nothing to the point estimate or the variance, but its N_i is
added to the upper bound and to the reported relative error.

Each is evaluated as a fixed-point BigUint scaled by 2^FRAC_BITS (truncating
the last bit) and the terms are summed as integers. Integer addition is
associative, so the totals are bit-identical for every class order; only the
final conversion to f64 rounds.
*/

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::CensusError;

use super::record::{ClassEstimate, EstimateMethod, decimal};

pub const FRAC_BITS: u64 = 64;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalEstimate {
    /// Estimated number of legal diagrams, rounded down.
    #[serde(with = "decimal")]
    pub total: BigUint,
    /// Same quantity as f64 (relative precision ~1e-16).
    pub total_f64: f64,
    pub variance: f64,
    pub std_error: f64,
    pub lower: f64,
    /// total + z * std_error + unjudged_diagrams.
    pub upper: f64,
    /// (z * std_error + unjudged_diagrams) / total * 100.
    pub relative_error_pct: f64,
    /// Sum of raw diagram counts over the classes aggregated.
    #[serde(with = "decimal")]
    pub raw_diagrams: BigUint,
    /// total / raw_diagrams.
    pub legal_fraction: f64,
    pub classes: usize,
    pub exhaustive_classes: usize,
    pub capped_classes: usize,
    /// Classes that ended with zero judged samples.
    pub empty_classes: usize,
    /// Diagrams of the empty classes; none of them was judged.
    #[serde(with = "decimal")]
    pub unjudged_diagrams: BigUint,
    pub trials: u64,
    pub faults: u64,
}

/// Fixed-point accumulator for the global sum.
#[derive(Default)]
pub struct Aggregator {
    total_fx: BigUint,
    var_fx: BigUint,
    raw: BigUint,
    unjudged: BigUint,
    seen: FxHashSet<u64>,
    classes: usize,
    exhaustive: usize,
    capped: usize,
    empty: usize,
    trials: u64,
    faults: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, est: &ClassEstimate) -> Result<(), CensusError> {
        if !self.seen.insert(est.index) {
            return Err(CensusError::DuplicateClass {
                index: est.index,
                class: est.class.descriptor(),
            });
        }
        if est.legal > est.trials {
            return Err(CensusError::Arithmetic(format!(
                "class {}: {} legal out of {} trials",
                est.class, est.legal, est.trials
            )));
        }

        self.classes += 1;
        self.trials += est.trials;
        self.faults += est.faults;
        self.raw += &est.diagrams;
        if est.method == EstimateMethod::Exhaustive {
            self.exhaustive += 1;
        }
        if est.insufficient_trials {
            self.capped += 1;
        }
        if est.trials == 0 {
            self.empty += 1;
            self.unjudged += &est.diagrams;
            return Ok(());
        }

        let n = BigUint::from(est.trials);
        let s = BigUint::from(est.legal);

        self.total_fx += ((&est.diagrams * &s) << FRAC_BITS) / &n;

        if est.method == EstimateMethod::Sampled {
            let fails = BigUint::from(est.trials - est.legal);
            let num = &est.diagrams * &est.diagrams * &s * &fails;
            let den = &n * &n * &n;
            self.var_fx += (num << FRAC_BITS) / den;
        }
        Ok(())
    }

    pub fn finish(&self, z: f64) -> GlobalEstimate {
        let scale = 2f64.powi(FRAC_BITS as i32);
        let total_f64 = big_to_f64(&self.total_fx) / scale;
        let variance = big_to_f64(&self.var_fx) / scale;
        let std_error = variance.sqrt();
        let raw_f64 = big_to_f64(&self.raw);
        let unjudged_f64 = big_to_f64(&self.unjudged);
        let spread = z * std_error + unjudged_f64;

        let relative_error_pct = if total_f64 > 0.0 {
            spread / total_f64 * 100.0
        } else if spread == 0.0 {
            0.0
        } else {
            f64::INFINITY
        };

        GlobalEstimate {
            total: &self.total_fx >> FRAC_BITS,
            total_f64,
            variance,
            std_error,
            lower: (total_f64 - z * std_error).max(0.0),
            upper: total_f64 + spread,
            relative_error_pct,
            raw_diagrams: self.raw.clone(),
            legal_fraction: if raw_f64 > 0.0 { total_f64 / raw_f64 } else { 0.0 },
            classes: self.classes,
            exhaustive_classes: self.exhaustive,
            capped_classes: self.capped,
            empty_classes: self.empty,
            unjudged_diagrams: self.unjudged.clone(),
            trials: self.trials,
            faults: self.faults,
        }
    }
}

/// Aggregates a set of class estimates, largest diagram counts first.
///
/// The integer accumulation makes the order irrelevant to the result; the
/// fixed order keeps logs and error messages reproducible.
pub fn aggregate(estimates: &[ClassEstimate], z: f64) -> Result<GlobalEstimate, CensusError> {
    let mut order: Vec<&ClassEstimate> = estimates.iter().collect();
    order.sort_by(|a, b| b.diagrams.cmp(&a.diagrams).then(a.index.cmp(&b.index)));

    let mut agg = Aggregator::new();
    for est in order {
        agg.add(est)?;
    }
    Ok(agg.finish(z))
}

fn big_to_f64(n: &BigUint) -> f64 {
    if n.is_zero() {
        return 0.0;
    }
    n.to_f64().unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{MaterialClass, count_diagrams};
    use crate::estimate::ratio::IntervalMethod;

    fn est(index: u64, class: MaterialClass, trials: u64, legal: u64) -> ClassEstimate {
        let e = crate::estimate::ratio::RatioEstimator::from_counts(trials, legal);
        ClassEstimate {
            index,
            class,
            diagrams: count_diagrams(&class).unwrap(),
            method: EstimateMethod::Sampled,
            trials,
            legal,
            faults: 0,
            ratio: e.ratio(),
            variance: e.variance(),
            lower: 0.0,
            upper: 1.0,
            interval: IntervalMethod::NormalContinuity,
            insufficient_trials: false,
        }
    }

    #[test]
    fn single_class_total_is_count_times_ratio() {
        let c = MaterialClass::kings_only();
        let g = aggregate(&[est(0, c, 4, 3)], 1.96).unwrap();
        assert_eq!(g.total, BigUint::from(3024u32));
        assert_eq!(g.total_f64, 3024.0);
        // Var = 4032^2 * (3/4)(1/4) / 4
        let expected_var = 4032.0f64 * 4032.0 * 0.1875 / 4.0;
        assert!((g.variance - expected_var).abs() / expected_var < 1e-12);
    }

    #[test]
    fn duplicate_indices_are_rejected() {
        let c = MaterialClass::kings_only();
        let err = aggregate(&[est(0, c, 4, 3), est(0, c, 4, 3)], 1.96).unwrap_err();
        assert!(matches!(err, CensusError::DuplicateClass { index: 0, .. }));
    }

    #[test]
    fn exhaustive_classes_add_no_variance() {
        let c = MaterialClass::kings_only();
        let mut e = est(0, c, 8064, 7224);
        e.method = EstimateMethod::Exhaustive;
        let g = aggregate(&[e], 1.96).unwrap();
        assert_eq!(g.variance, 0.0);
        assert_eq!(g.relative_error_pct, 0.0);
        assert_eq!(g.total, BigUint::from(3612u32));
        assert_eq!(g.exhaustive_classes, 1);
    }

    #[test]
    fn empty_class_widens_the_upper_bound() {
        let kings = MaterialClass::kings_only();
        let kpk = MaterialClass::new([1, 0, 0, 0, 0], [0; 5]).unwrap();
        let mut judged = est(0, kings, 100, 100);
        judged.method = EstimateMethod::Exhaustive;
        let mut empty = est(1, kpk, 0, 0);
        empty.faults = 50;
        empty.insufficient_trials = true;

        let g = aggregate(&[judged, empty], 1.96).unwrap();
        assert_eq!(g.total, BigUint::from(4032u32));
        assert_eq!(g.variance, 0.0);
        assert_eq!(g.empty_classes, 1);
        assert_eq!(g.unjudged_diagrams, BigUint::from(64u32 * 63 * 62));
        assert_eq!(g.lower, 4032.0);
        assert_eq!(g.upper, 4032.0 + 249_984.0);
        assert!(g.relative_error_pct > 6000.0, "{}", g.relative_error_pct);
    }

    #[test]
    fn only_empty_classes_have_unbounded_relative_error() {
        let kpk = MaterialClass::new([1, 0, 0, 0, 0], [0; 5]).unwrap();
        let g = aggregate(&[est(0, kpk, 0, 0)], 1.96).unwrap();
        assert_eq!(g.total_f64, 0.0);
        assert_eq!(g.upper, 249_984.0);
        assert_eq!(g.relative_error_pct, f64::INFINITY);
    }
}
