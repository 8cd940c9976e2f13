// src/census/mod.rs
#![forbid(unsafe_code)]

pub mod runner;
pub mod sinks;
pub mod stats;

pub use runner::{Runner, RunnerConfig};
pub use sinks::{ClassSink, NoopSink, OutputFormat, TableSink, summary_line, write_results};
pub use stats::CensusStats;
