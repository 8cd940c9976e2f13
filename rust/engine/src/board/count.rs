// rust/engine/src/board/count.rs
#![forbid(unsafe_code)]

use num_bigint::BigUint;
use num_traits::One;
use rustc_hash::FxHashMap;

use crate::board::constants::BOARD_SQUARES;
use crate::board::material::MaterialClass;
use crate::error::CensusError;

/// Exact number of raw diagrams for a class.
///
/// Kings are placed first as an ordered pair (64 * 63); every other group of
/// `k` interchangeable pieces then takes `C(free, k)` of the remaining squares,
/// in the fixed group order. Legality is not considered here.
pub fn count_diagrams(class: &MaterialClass) -> Result<BigUint, CensusError> {
    let required = class.total_pieces();
    if required > BOARD_SQUARES {
        return Err(CensusError::InfeasibleClass {
            class: class.descriptor(),
            required,
            available: BOARD_SQUARES,
        });
    }

    let mut free = BOARD_SQUARES;
    let mut total = falling_factorial(free, 2);
    free -= 2;

    for (_piece, k) in class.groups() {
        if k > free {
            return Err(CensusError::InfeasibleClass {
                class: class.descriptor(),
                required,
                available: BOARD_SQUARES,
            });
        }
        total *= binomial(free, k);
        free -= k;
    }
    Ok(total)
}

/// `n * (n - 1) * ... * (n - k + 1)`; 1 for `k == 0`.
pub fn falling_factorial(n: usize, k: usize) -> BigUint {
    if k > n {
        return BigUint::default();
    }
    (n - k + 1..=n).fold(BigUint::one(), |acc, i| acc * BigUint::from(i))
}

/// `C(n, k)` computed as falling factorial over `k!`; exact.
pub fn binomial(n: usize, k: usize) -> BigUint {
    if k > n {
        return BigUint::default();
    }
    falling_factorial(n, k) / factorial(k)
}

pub fn factorial(n: usize) -> BigUint {
    (1..=n).fold(BigUint::one(), |acc, i| acc * BigUint::from(i))
}

/// Per-run memo of diagram counts; each class is counted at most once.
#[derive(Default)]
pub struct DiagramCache {
    counts: FxHashMap<MaterialClass, BigUint>,
}

impl DiagramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, class: &MaterialClass) -> Result<BigUint, CensusError> {
        if let Some(n) = self.counts.get(class) {
            return Ok(n.clone());
        }
        let n = count_diagrams(class)?;
        self.counts.insert(*class, n.clone());
        Ok(n)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
