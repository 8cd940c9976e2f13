// rust/engine/src/error.rs
#![forbid(unsafe_code)]

use std::fmt;

use crate::oracle::OracleFault;

/// Failures surfaced by the census pipeline.
///
/// Configuration errors abort a run before any class is touched; the
/// class-level variants are isolated to the class that raised them.
#[derive(Debug)]
pub enum CensusError {
    /// Invalid run parameters or inconsistent enumeration bounds.
    Configuration(String),

    /// A class needs more squares than the board has.
    InfeasibleClass {
        class: String,
        required: usize,
        available: usize,
    },

    /// A legality check failed for good (retries exhausted or non-transient).
    Oracle(OracleFault),

    /// A counting path left arbitrary precision.
    Arithmetic(String),

    /// The same class index reached the aggregator twice.
    DuplicateClass { index: u64, class: String },

    /// Persisted results could not be read, written or reconciled.
    Checkpoint(String),

    Io(std::io::Error),
}

impl fmt::Display for CensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CensusError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            CensusError::InfeasibleClass {
                class,
                required,
                available,
            } => write!(
                f,
                "infeasible class {class}: needs {required} squares, only {available} free"
            ),
            CensusError::Oracle(fault) => write!(f, "oracle fault: {fault}"),
            CensusError::Arithmetic(msg) => write!(f, "arithmetic error: {msg}"),
            CensusError::DuplicateClass { index, class } => {
                write!(f, "class {class} (index {index}) appears more than once")
            }
            CensusError::Checkpoint(msg) => write!(f, "checkpoint error: {msg}"),
            CensusError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for CensusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CensusError::Io(e) => Some(e),
            CensusError::Oracle(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CensusError {
    fn from(e: std::io::Error) -> Self {
        CensusError::Io(e)
    }
}

impl From<OracleFault> for CensusError {
    fn from(fault: OracleFault) -> Self {
        CensusError::Oracle(fault)
    }
}

impl From<serde_json::Error> for CensusError {
    fn from(e: serde_json::Error) -> Self {
        CensusError::Checkpoint(e.to_string())
    }
}
