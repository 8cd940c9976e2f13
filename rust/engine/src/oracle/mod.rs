// rust/engine/src/oracle/mod.rs
#![forbid(unsafe_code)]

mod base;
mod structural;
mod synthetic;
mod timeout;

/**
 * Curated oracle public API.
 *
 * The trait is the one capability seam of the pipeline; implementations stay private
 * behind their constructors.
 */
pub use base::{FaultKind, LegalityOracle, OracleFault, Verdict};
pub use structural::{StructuralOracle, StructuralRules};
pub use synthetic::{CoinOracle, ConstantOracle};
pub use timeout::TimeoutOracle;
