// rust/engine/src/board/enumerate.rs
#![forbid(unsafe_code)]

/*
Material-class enumeration

Order
-----
Classes are emitted by total piece count ascending (kings included). Within one
total, the white side size ascends; within one (white, black) size split, both
sides follow the lexicographic order of their (P, N, B, R, Q) count vectors,
white outer. Re-enumeration with the same limits is deterministic, so a class index
is a stable key for seeding and checkpoints.

Pruning
-------
Per-side configurations are generated by nested bounded loops; a branch is cut
as soon as its running sum exceeds what the piece ceiling leaves for one side.
*/

use crate::board::constants::{
    BOARD_SQUARES, MAX_BISHOPS, MAX_KNIGHTS, MAX_PAWNS, MAX_PIECES, MAX_QUEENS, MAX_ROOKS,
};
use crate::board::material::MaterialClass;
use crate::error::CensusError;

/// Per-side upper bounds plus a global piece ceiling (kings included).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MaterialLimits {
    pub pawns: u8,
    pub knights: u8,
    pub bishops: u8,
    pub rooks: u8,
    pub queens: u8,
    pub max_pieces: usize,
}

impl Default for MaterialLimits {
    fn default() -> Self {
        Self {
            pawns: MAX_PAWNS,
            knights: MAX_KNIGHTS,
            bishops: MAX_BISHOPS,
            rooks: MAX_ROOKS,
            queens: MAX_QUEENS,
            max_pieces: MAX_PIECES,
        }
    }
}

impl MaterialLimits {
    pub fn with_max_pieces(max_pieces: usize) -> Self {
        Self {
            max_pieces,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CensusError> {
        let caps = [
            ("pawns", self.pawns, MAX_PAWNS),
            ("knights", self.knights, MAX_KNIGHTS),
            ("bishops", self.bishops, MAX_BISHOPS),
            ("rooks", self.rooks, MAX_ROOKS),
            ("queens", self.queens, MAX_QUEENS),
        ];
        for (name, value, cap) in caps {
            if value > cap {
                return Err(CensusError::Configuration(format!(
                    "{name} limit {value} exceeds {cap} (promotions are excluded)"
                )));
            }
        }
        if self.max_pieces < 2 {
            return Err(CensusError::Configuration(format!(
                "max_pieces {} cannot hold both kings",
                self.max_pieces
            )));
        }
        if self.max_pieces > MAX_PIECES || self.max_pieces > BOARD_SQUARES {
            return Err(CensusError::Configuration(format!(
                "max_pieces {} exceeds {MAX_PIECES}",
                self.max_pieces
            )));
        }
        Ok(())
    }

    fn per_kind(&self) -> [u8; 5] {
        [self.pawns, self.knights, self.bishops, self.rooks, self.queens]
    }
}

/// Restartable source of every feasible [`MaterialClass`] under some limits.
#[derive(Clone, Debug)]
pub struct ClassEnumerator {
    limits: MaterialLimits,
    /// `by_men[m]` holds every one-side configuration with exactly `m` men.
    by_men: Vec<Vec<[u8; 5]>>,
}

impl ClassEnumerator {
    pub fn new(limits: MaterialLimits) -> Result<Self, CensusError> {
        limits.validate()?;

        let side_budget = limits.max_pieces - 2;
        let mut by_men: Vec<Vec<[u8; 5]>> = vec![Vec::new(); side_budget + 1];
        let mut cur = [0u8; 5];
        collect_side_configs(&limits.per_kind(), 0, 0, side_budget, &mut cur, &mut by_men);

        Ok(Self { limits, by_men })
    }

    pub fn limits(&self) -> MaterialLimits {
        self.limits
    }

    /// Fresh pass over all classes, in the documented order.
    pub fn iter(&self) -> MaterialClasses<'_> {
        MaterialClasses {
            by_men: &self.by_men,
            men_total: 0,
            white_men: 0,
            wi: 0,
            bi: 0,
        }
    }

    /// Number of classes; computed from bucket sizes without materializing them.
    pub fn len(&self) -> usize {
        let mut n = 0;
        for men_total in 0..self.by_men.len() {
            for white_men in 0..=men_total {
                n += self.by_men[white_men].len() * self.by_men[men_total - white_men].len();
            }
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn collect_side_configs(
    caps: &[u8; 5],
    kind: usize,
    sum: usize,
    budget: usize,
    cur: &mut [u8; 5],
    out: &mut [Vec<[u8; 5]>],
) {
    if kind == caps.len() {
        out[sum].push(*cur);
        return;
    }
    for n in 0..=caps[kind] {
        let s = sum + n as usize;
        if s > budget {
            break;
        }
        cur[kind] = n;
        collect_side_configs(caps, kind + 1, s, budget, cur, out);
    }
    cur[kind] = 0;
}

/// Lazy class sequence produced by [`ClassEnumerator::iter`].
pub struct MaterialClasses<'a> {
    by_men: &'a [Vec<[u8; 5]>],
    men_total: usize,
    white_men: usize,
    wi: usize,
    bi: usize,
}

impl Iterator for MaterialClasses<'_> {
    type Item = MaterialClass;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.men_total >= self.by_men.len() {
                return None;
            }
            if self.white_men > self.men_total {
                self.men_total += 1;
                self.white_men = 0;
                self.wi = 0;
                self.bi = 0;
                continue;
            }

            let whites = &self.by_men[self.white_men];
            let blacks = &self.by_men[self.men_total - self.white_men];
            if self.wi >= whites.len() || blacks.is_empty() {
                self.white_men += 1;
                self.wi = 0;
                self.bi = 0;
                continue;
            }

            let class = MaterialClass::from_counts_unchecked(whites[self.wi], blacks[self.bi]);
            self.bi += 1;
            if self.bi >= blacks.len() {
                self.bi = 0;
                self.wi += 1;
            }
            return Some(class);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_yield_full_product() {
        let e = ClassEnumerator::new(MaterialLimits::default()).unwrap();
        // 9 * 3 * 3 * 3 * 2 configurations per side, every pair fits in 32.
        assert_eq!(e.len(), 486 * 486);
        assert_eq!(e.iter().count(), e.len());
    }

    #[test]
    fn order_is_by_total_then_fixed_type_order() {
        let e = ClassEnumerator::new(MaterialLimits::with_max_pieces(3)).unwrap();
        let got: Vec<String> = e.iter().map(|c| c.descriptor()).collect();
        assert_eq!(
            got,
            vec![
                "KvK", "KvKQ", "KvKR", "KvKB", "KvKN", "KvKP", "KQvK", "KRvK", "KBvK", "KNvK",
                "KPvK",
            ]
        );
    }

    #[test]
    fn totals_are_non_decreasing_and_bounded() {
        let e = ClassEnumerator::new(MaterialLimits::with_max_pieces(7)).unwrap();
        let mut last = 0;
        for c in e.iter() {
            assert!(c.total_pieces() >= last);
            assert!(c.total_pieces() <= 7);
            last = c.total_pieces();
        }
    }

    #[test]
    fn inconsistent_limits_are_configuration_errors() {
        let too_many_queens = MaterialLimits {
            queens: 3,
            ..MaterialLimits::default()
        };
        assert!(matches!(
            ClassEnumerator::new(too_many_queens),
            Err(CensusError::Configuration(_))
        ));
        assert!(ClassEnumerator::new(MaterialLimits::with_max_pieces(1)).is_err());
        assert!(ClassEnumerator::new(MaterialLimits::with_max_pieces(33)).is_err());
    }
}
