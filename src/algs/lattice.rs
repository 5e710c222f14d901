//! Index arithmetic between refinement levels.
//!
//! Level `L - d` has half the resolution of level `L - d + 1`, so moving an
//! index `d` levels coarser is an arithmetic right shift. Shifts of 63 or
//! more saturate instead of overflowing.

/// Index `v` on a lattice `diff` levels coarser (floor division by `2^diff`).
#[inline]
pub fn coarsen(v: i64, diff: usize) -> i64 {
    if diff >= 63 {
        if v < 0 { -1 } else { 0 }
    } else {
        v >> diff
    }
}

/// `true` when `v` survives a round trip to the coarser lattice unchanged.
#[inline]
pub fn is_aligned(v: i64, diff: usize) -> bool {
    if diff >= 63 {
        v == 0
    } else {
        v & ((1i64 << diff) - 1) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarsening_floors_negative_indices() {
        assert_eq!(coarsen(7, 1), 3);
        assert_eq!(coarsen(-1, 1), -1);
        assert_eq!(coarsen(-3, 2), -1);
        assert_eq!(coarsen(-5, 2), -2);
        assert_eq!(coarsen(5, 0), 5);
        assert_eq!(coarsen(-1, 128), -1);
        assert_eq!(coarsen(1 << 40, 200), 0);
    }

    #[test]
    fn alignment_matches_shift_round_trip() {
        for v in -17i64..17 {
            for d in 0..5 {
                assert_eq!(is_aligned(v, d), (v >> d) << d == v, "v={v} d={d}");
            }
        }
        assert!(is_aligned(0, 128));
        assert!(!is_aligned(-1, 128));
    }
}
