// rust/engine/src/oracle/structural.rs
#![forbid(unsafe_code)]

/*
Structural legality oracle

Rejects a placement when any of these holds:
- a side does not have exactly one king, more than 8 pawns or more than 16 men
- a pawn stands on the first or last rank (unless `allow_backrank_pawns`)
- the side NOT to move is in check (this also covers adjacent kings)
- the side to move has more than two checkers, or two checkers lying on one
  line through its king (no single move can produce that)
- one side has more than `max_pawns_per_file` pawns on a file
- one side has two or more bishops, all on squares of one colour
  (only reachable through promotion, which this universe excludes)

These are necessary conditions only: passing them does not prove that the
diagram is reachable from the initial position.
*/

use crate::board::{
    FILES, MAX_PAWNS, PieceKind, RANKS, RawPlacement, Side, aligned, checkers, file_of,
    is_light_square, rank_of,
};

use super::base::{LegalityOracle, OracleFault, Verdict};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StructuralRules {
    pub allow_backrank_pawns: bool,
    pub max_pawns_per_file: u8,
    pub check_bishop_colours: bool,
}

impl Default for StructuralRules {
    fn default() -> Self {
        Self {
            allow_backrank_pawns: false,
            max_pawns_per_file: 6,
            check_bishop_colours: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StructuralOracle {
    rules: StructuralRules,
}

impl StructuralOracle {
    pub fn new(rules: StructuralRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> StructuralRules {
        self.rules
    }

    fn material_ok(&self, p: &RawPlacement) -> bool {
        let mut kings = [0u8; 2];
        let mut pawns = [0u8; 2];
        let mut men = [0u8; 2];
        for (_, piece) in p.occupied() {
            let s = piece.side.idx();
            men[s] += 1;
            match piece.kind {
                PieceKind::King => kings[s] += 1,
                PieceKind::Pawn => pawns[s] += 1,
                _ => {}
            }
        }
        kings == [1, 1] && pawns.iter().all(|&n| n <= MAX_PAWNS) && men.iter().all(|&n| n <= 16)
    }

    fn pawns_ok(&self, p: &RawPlacement) -> bool {
        let mut per_file = [[0u8; FILES]; 2];
        for (sq, piece) in p.occupied() {
            if piece.kind != PieceKind::Pawn {
                continue;
            }
            let rank = rank_of(sq);
            if !self.rules.allow_backrank_pawns && (rank == 0 || rank == RANKS - 1) {
                return false;
            }
            per_file[piece.side.idx()][file_of(sq)] += 1;
        }
        per_file
            .iter()
            .flatten()
            .all(|&n| n <= self.rules.max_pawns_per_file)
    }

    fn bishops_ok(&self, p: &RawPlacement) -> bool {
        if !self.rules.check_bishop_colours {
            return true;
        }
        for side in Side::BOTH {
            let mut light = 0;
            let mut dark = 0;
            for (sq, piece) in p.occupied() {
                if piece.side == side && piece.kind == PieceKind::Bishop {
                    if is_light_square(sq) {
                        light += 1;
                    } else {
                        dark += 1;
                    }
                }
            }
            if light + dark >= 2 && (light == 0 || dark == 0) {
                return false;
            }
        }
        true
    }

    fn checks_ok(&self, p: &RawPlacement) -> bool {
        let mover = p.side_to_move;

        if !checkers(p, mover.opponent()).is_empty() {
            return false;
        }

        let chk = checkers(p, mover);
        match chk.len() {
            0 | 1 => true,
            2 => match p.king_square(mover) {
                Some(k) => !aligned(chk[0], chk[1], k),
                None => false,
            },
            _ => false,
        }
    }
}

impl LegalityOracle for StructuralOracle {
    fn judge(&self, p: &RawPlacement) -> Result<Verdict, OracleFault> {
        let ok = self.material_ok(p) && self.pawns_ok(p) && self.bishops_ok(p) && self.checks_ok(p);
        Ok(if ok { Verdict::Legal } else { Verdict::Illegal })
    }

    fn name(&self) -> String {
        format!(
            "structural(backrank_pawns={},max_pawns_per_file={},bishop_colours={})",
            self.rules.allow_backrank_pawns,
            self.rules.max_pawns_per_file,
            self.rules.check_bishop_colours
        )
    }
}
