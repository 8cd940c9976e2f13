// rust/engine/src/oracle/base.rs
#![forbid(unsafe_code)]

use std::fmt;

use crate::board::RawPlacement;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Legal,
    Illegal,
}

impl Verdict {
    #[inline]
    pub fn is_legal(self) -> bool {
        self == Verdict::Legal
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultKind {
    /// The oracle rejected the input itself; retrying cannot help.
    Malformed,
    /// Internal failure inside the oracle.
    Internal,
    /// No verdict before the deadline (see `TimeoutOracle`).
    Timeout,
}

/// A legality check that did not complete. Distinct from [`Verdict::Illegal`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OracleFault {
    pub kind: FaultKind,
    pub message: String,
}

impl OracleFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.kind, FaultKind::Internal | FaultKind::Timeout)
    }
}

impl fmt::Display for OracleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for OracleFault {}

/// Judges one concrete placement.
///
/// Shared by every sampling shard of a class, hence `Send + Sync`; object-safe
/// so the CLI can pick an implementation at runtime as `Box<dyn LegalityOracle>`.
pub trait LegalityOracle: Send + Sync {
    fn judge(&self, placement: &RawPlacement) -> Result<Verdict, OracleFault>;

    /// Short name for logs and run fingerprints.
    fn name(&self) -> String;
}
