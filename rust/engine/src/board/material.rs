// rust/engine/src/board/material.rs
#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::board::constants::{
    BOARD_SQUARES, MAX_BISHOPS, MAX_KNIGHTS, MAX_PAWNS, MAX_PIECES, MAX_QUEENS, MAX_ROOKS,
};
use crate::error::CensusError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::White, Side::Black];

    #[inline]
    pub fn idx(self) -> usize {
        match self {
            Side::White => 0,
            Side::Black => 1,
        }
    }

    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Enumerated (non-king) kinds in the fixed processing order shared by the
    /// enumerator, the diagram counter and the sampler.
    pub const COUNTED: [PieceKind; 5] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ];

    /// Index into `COUNTED`; `None` for the king.
    #[inline]
    pub fn counted_idx(self) -> Option<usize> {
        match self {
            PieceKind::Pawn => Some(0),
            PieceKind::Knight => Some(1),
            PieceKind::Bishop => Some(2),
            PieceKind::Rook => Some(3),
            PieceKind::Queen => Some(4),
            PieceKind::King => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'P' => Some(PieceKind::Pawn),
            'N' => Some(PieceKind::Knight),
            'B' => Some(PieceKind::Bishop),
            'R' => Some(PieceKind::Rook),
            'Q' => Some(PieceKind::Queen),
            'K' => Some(PieceKind::King),
            _ => None,
        }
    }

    /// Per-side ceiling reachable without promotion.
    pub fn no_promotion_max(self) -> u8 {
        match self {
            PieceKind::Pawn => MAX_PAWNS,
            PieceKind::Knight => MAX_KNIGHTS,
            PieceKind::Bishop => MAX_BISHOPS,
            PieceKind::Rook => MAX_ROOKS,
            PieceKind::Queen => MAX_QUEENS,
            PieceKind::King => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Piece {
    pub side: Side,
    pub kind: PieceKind,
}

impl Piece {
    pub fn new(side: Side, kind: PieceKind) -> Self {
        Self { side, kind }
    }

    /// FEN letter: uppercase for white, lowercase for black.
    pub fn fen_char(self) -> char {
        let c = self.kind.letter();
        match self.side {
            Side::White => c,
            Side::Black => c.to_ascii_lowercase(),
        }
    }
}

/// Piece counts per side for pawn, knight, bishop, rook, queen.
///
/// Kings are implicit: every class has exactly one king per side.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct MaterialClass {
    counts: [[u8; 5]; 2],
}

impl MaterialClass {
    /// Bare kings.
    pub fn kings_only() -> Self {
        Self::default()
    }

    /// Builds a class from per-side counts in `PieceKind::COUNTED` order,
    /// rejecting anything outside the no-promotion universe.
    pub fn new(white: [u8; 5], black: [u8; 5]) -> Result<Self, CensusError> {
        let class = Self {
            counts: [white, black],
        };
        class.validate()?;
        Ok(class)
    }

    pub(crate) fn from_counts_unchecked(white: [u8; 5], black: [u8; 5]) -> Self {
        Self {
            counts: [white, black],
        }
    }

    fn validate(&self) -> Result<(), CensusError> {
        for side in Side::BOTH {
            for kind in PieceKind::COUNTED {
                let n = self.count(side, kind);
                if n > kind.no_promotion_max() {
                    return Err(CensusError::Configuration(format!(
                        "{side:?} has {n} x {kind:?}, above the no-promotion maximum {}",
                        kind.no_promotion_max()
                    )));
                }
            }
        }
        let total = self.total_pieces();
        if total > MAX_PIECES || total > BOARD_SQUARES {
            return Err(CensusError::Configuration(format!(
                "class {self} needs {total} pieces (max {MAX_PIECES})"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn count(&self, side: Side, kind: PieceKind) -> u8 {
        match kind.counted_idx() {
            Some(i) => self.counts[side.idx()][i],
            None => 1,
        }
    }

    pub fn side_counts(&self, side: Side) -> [u8; 5] {
        self.counts[side.idx()]
    }

    /// Men of one side, king excluded.
    pub fn side_men(&self, side: Side) -> usize {
        self.counts[side.idx()].iter().map(|&c| c as usize).sum()
    }

    /// Every piece on the board, both kings included.
    pub fn total_pieces(&self) -> usize {
        2 + self.side_men(Side::White) + self.side_men(Side::Black)
    }

    /// Non-king groups in the fixed processing order: white P N B R Q, then
    /// black P N B R Q. Empty groups are skipped.
    pub fn groups(&self) -> impl Iterator<Item = (Piece, usize)> + '_ {
        Side::BOTH.into_iter().flat_map(move |side| {
            PieceKind::COUNTED.into_iter().filter_map(move |kind| {
                let n = self.count(side, kind) as usize;
                (n > 0).then_some((Piece::new(side, kind), n))
            })
        })
    }

    /// Tablebase-style descriptor such as `KQRvKPP`.
    pub fn descriptor(&self) -> String {
        let mut s = String::with_capacity(self.total_pieces() + 1);
        for side in Side::BOTH {
            if side == Side::Black {
                s.push('v');
            }
            s.push('K');
            // Strongest first, the way endgame names are usually written.
            for kind in PieceKind::COUNTED.iter().rev() {
                for _ in 0..self.count(side, *kind) {
                    s.push(kind.letter());
                }
            }
        }
        s
    }

    /// Parses a descriptor produced by [`MaterialClass::descriptor`].
    pub fn parse_descriptor(s: &str) -> Result<Self, CensusError> {
        let bad = |why: &str| CensusError::Configuration(format!("bad descriptor '{s}': {why}"));

        let (white, black) = s.split_once('v').ok_or_else(|| bad("missing 'v'"))?;
        let mut counts = [[0u8; 5]; 2];
        for (side, part) in [(Side::White, white), (Side::Black, black)] {
            let rest = part.strip_prefix('K').ok_or_else(|| bad("side must start with K"))?;
            for c in rest.chars() {
                let kind = PieceKind::from_letter(c).ok_or_else(|| bad("unknown piece letter"))?;
                let i = kind.counted_idx().ok_or_else(|| bad("more than one king"))?;
                counts[side.idx()][i] = counts[side.idx()][i].saturating_add(1);
            }
        }
        Self::new(counts[0], counts[1])
    }
}

impl fmt::Display for MaterialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

/// Serialized as its descriptor so persisted rows stay readable.
impl Serialize for MaterialClass {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.descriptor())
    }
}

impl<'de> Deserialize<'de> for MaterialClass {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        MaterialClass::parse_descriptor(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_roundtrip() {
        let c = MaterialClass::new([2, 1, 0, 2, 1], [8, 0, 2, 0, 0]).unwrap();
        assert_eq!(c.descriptor(), "KQRRNPPvKBBPPPPPPPP");
        assert_eq!(MaterialClass::parse_descriptor(&c.descriptor()).unwrap(), c);
        assert_eq!(MaterialClass::kings_only().descriptor(), "KvK");
    }

    #[test]
    fn rejects_promoted_material() {
        assert!(MaterialClass::new([0, 0, 0, 0, 2], [0; 5]).is_err());
        assert!(MaterialClass::new([9, 0, 0, 0, 0], [0; 5]).is_err());
        assert!(MaterialClass::parse_descriptor("KKvK").is_err());
    }

    #[test]
    fn groups_follow_fixed_order() {
        let c = MaterialClass::new([1, 0, 0, 2, 0], [0, 2, 0, 0, 1]).unwrap();
        let groups: Vec<(char, usize)> = c.groups().map(|(p, n)| (p.fen_char(), n)).collect();
        assert_eq!(groups, vec![('P', 1), ('R', 2), ('n', 2), ('q', 1)]);
        assert_eq!(c.total_pieces(), 8);
    }
}
