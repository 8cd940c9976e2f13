// rust/engine/src/lib.rs
#![forbid(unsafe_code)]

pub mod board;
pub mod error;
pub mod estimate;
pub mod oracle;

// Re-export the items the command-line front end reaches for most:
pub use board::{ClassEnumerator, DiagramCache, MaterialClass, MaterialLimits, count_diagrams};
pub use error::CensusError;
pub use estimate::{
    ClassEstimate, GlobalEstimate, RunConfig, RunContext, StoppingRule, aggregate,
};
pub use oracle::{LegalityOracle, Verdict};
