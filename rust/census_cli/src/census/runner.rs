// src/census/runner.rs
#![forbid(unsafe_code)]

use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use num_bigint::BigUint;

use census_engine::board::MaterialClass;
use census_engine::error::CensusError;
use census_engine::estimate::{
    CensusObserver, CheckpointWriter, ClassEstimate, RunContext, RunOutcome,
};

use super::sinks::ClassSink;
use super::stats::CensusStats;

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Classes in this invocation's range (progress bar length).
    pub total_classes: u64,

    /// Stop after computing this many new classes.
    pub class_limit: Option<usize>,

    // ---------------- output ----------------
    /// 0 = final summary only
    /// 1 = progress bar
    /// 2 = progress bar + one table row per class (via sink)
    pub verbosity: u8,
}

pub struct Runner {
    cfg: RunnerConfig,
    sink: Box<dyn ClassSink>,
}

/// Bridges engine callbacks to the progress bar, the stats and the sink.
struct Progress<'a> {
    pb: Option<ProgressBar>,
    stats: CensusStats,
    sink: &'a mut dyn ClassSink,
    verbosity: u8,
}

impl CensusObserver for Progress<'_> {
    fn on_class_start(&mut self, index: u64, class: &MaterialClass, diagrams: &BigUint) {
        if let Some(ref pb) = self.pb {
            let current = format!("#{index} {class} ({} bits)", diagrams.bits());
            pb.set_message(self.stats.live_msg(&current));
        }
    }

    fn on_class_done(&mut self, est: &ClassEstimate, elapsed: Duration) {
        self.stats.on_class_done(est, elapsed);
        if self.verbosity >= 2 {
            self.sink.on_class(est, self.pb.as_ref());
        }
        if let Some(ref pb) = self.pb {
            pb.inc(1);
        }
    }

    fn on_class_resumed(&mut self, _est: &ClassEstimate) {
        self.stats.on_class_resumed();
        if let Some(ref pb) = self.pb {
            pb.inc(1);
        }
    }

    fn on_class_skipped(&mut self, _index: u64, _class: &MaterialClass, _why: &CensusError) {
        self.stats.on_class_skipped();
        if let Some(ref pb) = self.pb {
            pb.inc(1);
        }
    }
}

impl Runner {
    pub fn new(cfg: RunnerConfig, sink: Box<dyn ClassSink>) -> Self {
        Self { cfg, sink }
    }

    pub fn run(
        &mut self,
        ctx: &mut RunContext<'_>,
        classes: impl IntoIterator<Item = (u64, MaterialClass)>,
        resumed: Vec<ClassEstimate>,
        checkpoint: Option<&mut CheckpointWriter>,
    ) -> Result<(RunOutcome, CensusStats)> {
        // Progress bar is UI only; the run does not depend on it.
        let pb = if self.cfg.verbosity >= 1 {
            let pb = ProgressBar::new(self.cfg.total_classes);
            pb.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {pos:>7}/{len:<7}  {percent:>3}%  {elapsed_precise}  {msg}",
                )
                .unwrap()
                .progress_chars("=>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut progress = Progress {
            pb,
            stats: CensusStats::new(),
            sink: self.sink.as_mut(),
            verbosity: self.cfg.verbosity,
        };

        let outcome = ctx.run(
            classes,
            resumed,
            checkpoint,
            &mut progress,
            self.cfg.class_limit,
        );

        if let Some(pb) = progress.pb.take() {
            match &outcome {
                Ok(o) if o.interrupted => pb.abandon_with_message("stopped early; resume with the same checkpoint"),
                Ok(_) => pb.finish_with_message("done"),
                Err(_) => pb.abandon_with_message("failed"),
            }
        }

        Ok((outcome?, progress.stats))
    }
}
