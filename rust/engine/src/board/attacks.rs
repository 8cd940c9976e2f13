// rust/engine/src/board/attacks.rs
#![forbid(unsafe_code)]

use crate::board::constants::{Square, file_of, rank_of, square_at};
use crate::board::material::{Piece, PieceKind, Side};
use crate::board::placement::RawPlacement;

/// Occupancy bitboard, bit `sq` set iff the square holds a piece.
pub fn occupancy(p: &RawPlacement) -> u64 {
    p.occupied().fold(0u64, |bb, (sq, _)| bb | (1u64 << sq))
}

/// True iff `piece` standing on `from` attacks `target`, with `occ` as blockers.
pub fn piece_attacks(piece: Piece, from: Square, target: Square, occ: u64) -> bool {
    if from == target {
        return false;
    }
    let dx = file_of(target) as i32 - file_of(from) as i32;
    let dy = rank_of(target) as i32 - rank_of(from) as i32;

    match piece.kind {
        PieceKind::King => dx.abs() <= 1 && dy.abs() <= 1,
        PieceKind::Knight => {
            let (ax, ay) = (dx.abs(), dy.abs());
            (ax == 1 && ay == 2) || (ax == 2 && ay == 1)
        }
        PieceKind::Pawn => {
            let forward = match piece.side {
                Side::White => 1,
                Side::Black => -1,
            };
            dx.abs() == 1 && dy == forward
        }
        PieceKind::Rook => (dx == 0 || dy == 0) && ray_clear(from, dx, dy, occ),
        PieceKind::Bishop => dx.abs() == dy.abs() && ray_clear(from, dx, dy, occ),
        PieceKind::Queen => {
            (dx == 0 || dy == 0 || dx.abs() == dy.abs()) && ray_clear(from, dx, dy, occ)
        }
    }
}

/// Walks from `from` towards `from + (dx, dy)` and reports whether every square
/// strictly in between is empty. Caller guarantees the offset is a line.
fn ray_clear(from: Square, dx: i32, dy: i32, occ: u64) -> bool {
    let (sx, sy) = (dx.signum(), dy.signum());
    let steps = dx.abs().max(dy.abs());
    let (mut f, mut r) = (file_of(from) as i32, rank_of(from) as i32);
    for _ in 1..steps {
        f += sx;
        r += sy;
        let sq = square_at(f as usize, r as usize);
        if occ & (1u64 << sq) != 0 {
            return false;
        }
    }
    true
}

/// Squares of `attacker`'s pieces that attack `target`.
pub fn attackers_of(p: &RawPlacement, target: Square, attacker: Side) -> Vec<Square> {
    let occ = occupancy(p);
    p.occupied()
        .filter(|(_, piece)| piece.side == attacker)
        .filter(|&(sq, piece)| piece_attacks(piece, sq, target, occ))
        .map(|(sq, _)| sq)
        .collect()
}

/// Enemy pieces giving check to `side`'s king; empty when the king is missing.
pub fn checkers(p: &RawPlacement, side: Side) -> Vec<Square> {
    match p.king_square(side) {
        Some(k) => attackers_of(p, k, side.opponent()),
        None => Vec::new(),
    }
}

/// True iff `a`, `b` and `c` lie on one rank, file or diagonal.
pub fn aligned(a: Square, b: Square, c: Square) -> bool {
    let (ax, ay) = (file_of(a) as i32, rank_of(a) as i32);
    let (bx, by) = (file_of(b) as i32, rank_of(b) as i32);
    let (cx, cy) = (file_of(c) as i32, rank_of(c) as i32);

    let on_line = |dx: i32, dy: i32| dx == 0 || dy == 0 || dx.abs() == dy.abs();
    if !on_line(bx - ax, by - ay) || !on_line(cx - ax, cy - ay) {
        return false;
    }
    // Collinear iff the cross product vanishes.
    (bx - ax) * (cy - ay) - (by - ay) * (cx - ax) == 0
}
