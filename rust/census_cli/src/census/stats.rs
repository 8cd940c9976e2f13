// src/census/stats.rs
#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use census_engine::estimate::{ClassEstimate, EstimateMethod};

/// Running counters for one CLI invocation (classes computed here, not resumed).
#[derive(Clone, Debug)]
pub struct CensusStats {
    pub classes_done: u64,
    pub classes_resumed: u64,
    pub classes_skipped: u64,
    pub exhaustive: u64,
    pub capped: u64,

    pub trials: u64,
    pub legal: u64,
    pub faults: u64,

    /// Slowest single class so far.
    pub slowest: Option<(String, Duration)>,

    t0: Instant,
}

impl CensusStats {
    pub fn new() -> Self {
        Self {
            classes_done: 0,
            classes_resumed: 0,
            classes_skipped: 0,
            exhaustive: 0,
            capped: 0,
            trials: 0,
            legal: 0,
            faults: 0,
            slowest: None,
            t0: Instant::now(),
        }
    }

    pub fn on_class_done(&mut self, est: &ClassEstimate, elapsed: Duration) {
        self.classes_done += 1;
        self.trials += est.trials;
        self.legal += est.legal;
        self.faults += est.faults;
        if est.method == EstimateMethod::Exhaustive {
            self.exhaustive += 1;
        }
        if est.insufficient_trials {
            self.capped += 1;
        }
        if self.slowest.as_ref().is_none_or(|(_, d)| elapsed > *d) {
            self.slowest = Some((est.class.descriptor(), elapsed));
        }
    }

    pub fn on_class_resumed(&mut self) {
        self.classes_resumed += 1;
    }

    pub fn on_class_skipped(&mut self) {
        self.classes_skipped += 1;
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.t0.elapsed().as_secs_f64()
    }

    pub fn trials_per_sec(&self) -> f64 {
        let dt = self.elapsed_secs();
        if dt > 0.0 {
            self.trials as f64 / dt
        } else {
            0.0
        }
    }

    /// Pooled legal share over every trial judged in this invocation.
    pub fn pooled_ratio(&self) -> f64 {
        if self.trials > 0 {
            self.legal as f64 / self.trials as f64
        } else {
            0.0
        }
    }

    pub fn live_msg(&self, current: &str) -> String {
        format!(
            "{current} trials/s={:.0} done={} resumed={} capped={} faults={} pooled={:.4}",
            self.trials_per_sec(),
            self.classes_done,
            self.classes_resumed,
            self.capped,
            self.faults,
            self.pooled_ratio(),
        )
    }
}
