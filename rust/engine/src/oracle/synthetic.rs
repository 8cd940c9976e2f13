// rust/engine/src/oracle/synthetic.rs
#![forbid(unsafe_code)]

use crate::board::RawPlacement;
use crate::estimate::splitmix64;

use super::base::{LegalityOracle, OracleFault, Verdict};

/// Returns the same verdict for every placement.
#[derive(Clone, Copy, Debug)]
pub struct ConstantOracle {
    verdict: Verdict,
}

impl ConstantOracle {
    pub fn legal() -> Self {
        Self {
            verdict: Verdict::Legal,
        }
    }

    pub fn illegal() -> Self {
        Self {
            verdict: Verdict::Illegal,
        }
    }
}

impl LegalityOracle for ConstantOracle {
    fn judge(&self, _placement: &RawPlacement) -> Result<Verdict, OracleFault> {
        Ok(self.verdict)
    }

    fn name(&self) -> String {
        format!("constant({:?})", self.verdict)
    }
}

/// Biased coin keyed on the placement: legal with probability `q`.
///
/// The verdict is a pure function of (placement, salt), so repeated queries
/// agree and the oracle needs no mutable state across shards. Over a large
/// class the legal fraction is `q` up to hashing noise.
#[derive(Clone, Copy, Debug)]
pub struct CoinOracle {
    q: f64,
    salt: u64,
}

impl CoinOracle {
    pub fn new(q: f64, salt: u64) -> Self {
        Self {
            q: q.clamp(0.0, 1.0),
            salt,
        }
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    fn unit(&self, p: &RawPlacement) -> f64 {
        let mut h = self.salt;
        for (sq, piece) in p.occupied() {
            let code = ((piece.side.idx() as u64) << 3) | piece.kind as u64;
            h = splitmix64(h ^ (((sq as u64) << 8) | code));
        }
        h = splitmix64(h ^ p.side_to_move.idx() as u64);
        (h >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl LegalityOracle for CoinOracle {
    fn judge(&self, p: &RawPlacement) -> Result<Verdict, OracleFault> {
        Ok(if self.unit(p) < self.q {
            Verdict::Legal
        } else {
            Verdict::Illegal
        })
    }

    fn name(&self) -> String {
        format!("coin(q={},salt={})", self.q, self.salt)
    }
}
