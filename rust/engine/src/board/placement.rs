// rust/engine/src/board/placement.rs
#![forbid(unsafe_code)]

use std::fmt;

use crate::board::constants::{BOARD_SQUARES, FILES, RANKS, Square, square_at};
use crate::board::material::{MaterialClass, Piece, PieceKind, Side};

/// One concrete diagram of a class plus the side to move.
///
/// Built per sample and dropped once the oracle has judged it.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct RawPlacement {
    board: [Option<Piece>; BOARD_SQUARES],
    pub side_to_move: Side,
}

impl RawPlacement {
    pub fn empty(side_to_move: Side) -> Self {
        Self {
            board: [None; BOARD_SQUARES],
            side_to_move,
        }
    }

    /// Assigns `squares` to the class in the fixed order: white king, black
    /// king, then every group as listed by [`MaterialClass::groups`].
    ///
    /// `squares` must be distinct and hold exactly `class.total_pieces()` entries.
    pub fn from_squares(class: &MaterialClass, squares: &[Square], side_to_move: Side) -> Self {
        debug_assert_eq!(squares.len(), class.total_pieces());

        let mut p = Self::empty(side_to_move);
        p.put(squares[0], Piece::new(Side::White, PieceKind::King));
        p.put(squares[1], Piece::new(Side::Black, PieceKind::King));

        let mut i = 2;
        for (piece, n) in class.groups() {
            for &sq in &squares[i..i + n] {
                p.put(sq, piece);
            }
            i += n;
        }
        p
    }

    #[inline]
    pub fn put(&mut self, sq: Square, piece: Piece) {
        debug_assert!(self.board[sq as usize].is_none(), "square {sq} already occupied");
        self.board[sq as usize] = Some(piece);
    }

    #[inline]
    pub fn remove(&mut self, sq: Square) -> Option<Piece> {
        self.board[sq as usize].take()
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.board[sq as usize]
    }

    pub fn occupied(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.board
            .iter()
            .enumerate()
            .filter_map(|(sq, p)| p.map(|p| (sq as Square, p)))
    }

    pub fn piece_count(&self) -> usize {
        self.board.iter().filter(|p| p.is_some()).count()
    }

    pub fn king_square(&self, side: Side) -> Option<Square> {
        self.occupied()
            .find(|(_, p)| p.side == side && p.kind == PieceKind::King)
            .map(|(sq, _)| sq)
    }

    /// Piece placement field of a FEN plus the side to move, e.g.
    /// `8/8/8/8/8/8/8/K6k w`. Used to make discarded samples reproducible from logs.
    pub fn fen(&self) -> String {
        let mut s = String::with_capacity(72);
        for rank in (0..RANKS).rev() {
            let mut empty = 0;
            for file in 0..FILES {
                match self.piece_at(square_at(file, rank)) {
                    Some(p) => {
                        if empty > 0 {
                            s.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        s.push(p.fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                s.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                s.push('/');
            }
        }
        s.push(' ');
        s.push(match self.side_to_move {
            Side::White => 'w',
            Side::Black => 'b',
        });
        s
    }
}

impl fmt::Debug for RawPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPlacement({})", self.fen())
    }
}
