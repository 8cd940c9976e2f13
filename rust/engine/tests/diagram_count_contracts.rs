// rust/engine/tests/diagram_count_contracts.rs
#![forbid(unsafe_code)]

/**
 * Contract tests for exact diagram counting.
 *
 * Purpose:
 * - Pin hand-computed counts for small and maximal material.
 * - Cross-check the counter against brute-force enumeration of placements
 *   for every class with at most four pieces.
 * - Check the closed form 64!/(64-K)! / prod(k_i!) on generated classes.
 *
 * Invariants covered:
 * - Two kings give 64 * 63 = 4032 diagrams.
 * - Identical pieces of one side are indistinguishable (divide by k!).
 * - Counts are exact big integers, never rounded.
 */
use census_engine::board::{
    BOARD_SQUARES, ClassEnumerator, DiagramCache, MaterialClass, MaterialLimits, count_diagrams,
    factorial, falling_factorial,
};
use num_bigint::BigUint;
use proptest::prelude::*;

fn class(white: [u8; 5], black: [u8; 5]) -> MaterialClass {
    MaterialClass::new(white, black).unwrap()
}

/// Walks every tuple of squares for the class (kings first, then groups in
/// order), keeping only tuples with distinct squares whose pieces inside each
/// group stand on increasing squares. Each diagram has exactly one such tuple.
/// The last piece is not walked: its admissible squares are counted from the
/// occupancy mask.
fn brute_force(class: &MaterialClass) -> u64 {
    let mut group_of: Vec<usize> = vec![usize::MAX, usize::MAX - 1];
    for (g, (_, n)) in class.groups().enumerate() {
        group_of.extend(std::iter::repeat_n(g, n));
    }
    let k = group_of.len();
    let mut squares = vec![0usize; k];
    let mut count = 0u64;
    walk(0, &mut squares, 0, &group_of, &mut count);
    count
}

fn walk(depth: usize, squares: &mut [usize], occ: u64, group_of: &[usize], count: &mut u64) {
    let lo = if depth > 0 && group_of[depth] == group_of[depth - 1] {
        squares[depth - 1] + 1
    } else {
        0
    };
    if lo >= BOARD_SQUARES {
        return;
    }
    let free = !occ & (u64::MAX << lo);
    if depth + 1 == squares.len() {
        *count += u64::from(free.count_ones());
        return;
    }
    for sq in lo..BOARD_SQUARES {
        if free & (1u64 << sq) != 0 {
            squares[depth] = sq;
            walk(depth + 1, squares, occ | (1u64 << sq), group_of, count);
        }
    }
}

#[test]
fn two_kings_give_4032() {
    let n = count_diagrams(&MaterialClass::kings_only()).unwrap();
    assert_eq!(n, BigUint::from(4032u32));
}

#[test]
fn three_distinct_pieces_give_249984() {
    let n = count_diagrams(&class([0, 0, 0, 0, 1], [0; 5])).unwrap();
    assert_eq!(n, BigUint::from(64u32 * 63 * 62));
}

#[test]
fn identical_pieces_divide_out() {
    // KQvKQ: no identical pieces.
    let kq_kq = count_diagrams(&class([0, 0, 0, 0, 1], [0, 0, 0, 0, 1])).unwrap();
    assert_eq!(kq_kq, falling_factorial(64, 4));

    // KRRvK: P(64, 4) / 2!
    let krr_k = count_diagrams(&class([0, 0, 0, 2, 0], [0; 5])).unwrap();
    assert_eq!(krr_k, falling_factorial(64, 4) / factorial(2));

    // KRRvKNN: P(64, 6) / (2! 2!)
    let krr_knn = count_diagrams(&class([0, 0, 0, 2, 0], [0, 2, 0, 0, 0])).unwrap();
    assert_eq!(krr_knn, falling_factorial(64, 6) / (factorial(2) * factorial(2)));
}

#[test]
fn maximal_material_is_exact() {
    let full = class([8, 2, 2, 2, 1], [8, 2, 2, 2, 1]);
    let n = count_diagrams(&full).unwrap();
    let expected = falling_factorial(64, 32)
        / (factorial(8) * factorial(8) * factorial(2).pow(6u32));
    assert_eq!(n, expected);
    // About 4.6e42, far beyond u128.
    assert!(n.bits() > 128);
}

#[test]
fn ten_distinct_pieces_match_permutations() {
    // K Q R B N P plus a black king and three distinct black men: no repeats.
    let n = count_diagrams(&class([1, 1, 1, 1, 1], [1, 1, 1, 0, 0])).unwrap();
    assert_eq!(n, falling_factorial(64, 10));
}

#[test]
fn every_class_up_to_four_pieces_matches_brute_force() {
    let enumerator = ClassEnumerator::new(MaterialLimits::with_max_pieces(4)).unwrap();
    let mut four_piece = 0;
    for c in enumerator.iter() {
        let n = count_diagrams(&c).unwrap();
        assert_eq!(n, BigUint::from(brute_force(&c)), "class {c}");
        if c.total_pieces() == 4 {
            four_piece += 1;
        }
    }
    // Two men from {P, N, B, R, Q} split across the sides, at most one queen each.
    assert_eq!(four_piece, 53);
}

#[test]
fn cache_returns_the_same_count() {
    let mut cache = DiagramCache::new();
    let c = class([3, 1, 0, 0, 0], [2, 0, 1, 0, 0]);
    let a = cache.get(&c).unwrap();
    let b = cache.get(&c).unwrap();
    assert_eq!(a, b);
    assert_eq!(cache.len(), 1);
}

fn counts_strategy() -> impl Strategy<Value = [u8; 5]> {
    (0u8..=8, 0u8..=2, 0u8..=2, 0u8..=2, 0u8..=1).prop_map(|(p, n, b, r, q)| [p, n, b, r, q])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn count_matches_closed_form(white in counts_strategy(), black in counts_strategy()) {
        let c = MaterialClass::new(white, black).unwrap();
        let k = c.total_pieces();
        let mut divisor = BigUint::from(1u32);
        for &n in white.iter().chain(black.iter()) {
            divisor *= factorial(n as usize);
        }
        let expected = falling_factorial(64, k) / divisor;
        prop_assert_eq!(count_diagrams(&c).unwrap(), expected);
    }
}
