// rust/engine/src/board/mod.rs
#![forbid(unsafe_code)]

mod attacks;
mod constants;
mod count;
mod enumerate;
mod material;
mod placement;

/**
 * Curated board public API.
 *
 * Internal implementation modules remain private; only stable items are re-exported here.
 */
pub use attacks::{aligned, attackers_of, checkers, occupancy, piece_attacks};
pub use constants::{
    BOARD_SQUARES, FILES, MAX_BISHOPS, MAX_KNIGHTS, MAX_PAWNS, MAX_PIECES, MAX_QUEENS, MAX_ROOKS,
    RANKS, Square, file_of, is_light_square, rank_of, square_at, square_name,
};
pub use count::{DiagramCache, binomial, count_diagrams, factorial, falling_factorial};
pub use enumerate::{ClassEnumerator, MaterialClasses, MaterialLimits};
pub use material::{MaterialClass, Piece, PieceKind, Side};
pub use placement::RawPlacement;
