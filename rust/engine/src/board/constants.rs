// rust/engine/src/board/constants.rs
#![forbid(unsafe_code)]

pub const FILES: usize = 8;
pub const RANKS: usize = 8;
pub const BOARD_SQUARES: usize = FILES * RANKS;

/// Both kings plus at most 15 other men per side.
pub const MAX_PIECES: usize = 32;

/// Per-side ceilings without promotion (pawns, knights, bishops, rooks, queens).
pub const MAX_PAWNS: u8 = 8;
pub const MAX_KNIGHTS: u8 = 2;
pub const MAX_BISHOPS: u8 = 2;
pub const MAX_ROOKS: u8 = 2;
pub const MAX_QUEENS: u8 = 1;

/// Squares are numbered a1 = 0, b1 = 1, ..., h8 = 63.
pub type Square = u8;

#[inline]
pub fn file_of(sq: Square) -> usize {
    (sq as usize) & 7
}

#[inline]
pub fn rank_of(sq: Square) -> usize {
    (sq as usize) >> 3
}

#[inline]
pub fn square_at(file: usize, rank: usize) -> Square {
    debug_assert!(file < FILES);
    debug_assert!(rank < RANKS);
    (rank * FILES + file) as Square
}

/// Light squares are those where file + rank is odd (a1 is dark).
#[inline]
pub fn is_light_square(sq: Square) -> bool {
    (file_of(sq) + rank_of(sq)) % 2 == 1
}

pub fn square_name(sq: Square) -> String {
    let file = (b'a' + file_of(sq) as u8) as char;
    let rank = (b'1' + rank_of(sq) as u8) as char;
    format!("{file}{rank}")
}
