// rust/engine/src/estimate/record.rs
#![forbid(unsafe_code)]

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::board::MaterialClass;

use super::ratio::{IntervalMethod, RatioEstimator};
use super::sampler::ShardTally;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    Sampled,
    Exhaustive,
}

/// Final result for one material class; one row of the results table.
///
/// For exhaustive classes `trials` counts every (placement, side to move)
/// pair evaluated and the ratio is exact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassEstimate {
    /// Position of the class in enumeration order.
    pub index: u64,
    pub class: MaterialClass,
    #[serde(with = "decimal")]
    pub diagrams: BigUint,
    pub method: EstimateMethod,
    pub trials: u64,
    pub legal: u64,
    pub faults: u64,
    pub ratio: f64,
    pub variance: f64,
    pub lower: f64,
    pub upper: f64,
    pub interval: IntervalMethod,
    /// Adaptive rule hit its hard cap before reaching the target precision.
    pub insufficient_trials: bool,
}

impl ClassEstimate {
    pub fn from_tally(
        index: u64,
        class: MaterialClass,
        diagrams: BigUint,
        method: EstimateMethod,
        tally: &ShardTally,
        z: f64,
        insufficient_trials: bool,
    ) -> Self {
        let est = tally.estimator;
        let (variance, lower, upper, interval) = match method {
            EstimateMethod::Exhaustive => (0.0, est.ratio(), est.ratio(), IntervalMethod::Exact),
            EstimateMethod::Sampled => {
                let ci = est.interval(z);
                (est.variance(), ci.lower, ci.upper, ci.method)
            }
        };
        Self {
            index,
            class,
            diagrams,
            method,
            trials: est.trials(),
            legal: est.legal(),
            faults: tally.faults,
            ratio: est.ratio(),
            variance,
            lower,
            upper,
            interval,
            insufficient_trials,
        }
    }

    pub fn estimator(&self) -> RatioEstimator {
        RatioEstimator::from_counts(self.trials, self.legal)
    }
}

/// `BigUint` as a decimal string; JSON numbers cannot carry 40-digit integers.
pub(crate) mod decimal {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(n: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&n.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(d)?;
        BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| de::Error::custom(format!("not a decimal integer: {s}")))
    }
}
