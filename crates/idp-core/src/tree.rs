//! Implicit occupancy-tree index arithmetic.
//!
//! The slab's flat node array doubles as a complete binary tree with no
//! stored pointers: three pure integer functions of an index `n` define the
//! structure. Each index `n` is the aggregation root for a contiguous run of
//! slots `[n, n + subtree_span(n))`, and the per-node occupancy counts over
//! those runs are what make smallest-free-id search O(log capacity).
//!
//! # Structure
//!
//! - [`subtree_span`]`(n)` — size of the run rooted at `n`; always a power
//!   of two (the lowest set bit of `n + 1`).
//! - [`right_ancestor`]`(n)` — the root of the run that begins exactly where
//!   `n`'s run ends. Iterating it from any `n` climbs a strictly increasing
//!   chain of strictly wider runs that tiles `[n, capacity)` — the search
//!   path "to the right".
//! - [`left_ancestor`]`(n)` — the nearest smaller index whose run contains
//!   `n`'s run, or `None` at the chain root. Iterating it from `n` visits
//!   exactly the aggregation roots whose count covers slot `n` — the update
//!   path for reservation deltas.
//!
//! For a capacity of the form `2^k - 1`, the runs reachable from index 0 via
//! [`right_ancestor`] are `{0}`, `[1, 3)`, `[3, 7)`, …, `[2^(k-1) - 1, 2^k - 1)`:
//! a non-overlapping tiling of the whole array. Growing the array to a
//! larger `2^m - 1` never changes the run of an existing index — it only
//! adds new indices — which is what makes capacity growth prefix-stable.
//!
//! All three are branch-free bit tricks; none inspects the array. Callers
//! must keep `n + 1` within `usize` range (indices here are bounded well
//! below that by the slab's id ceiling).

/// Number of slots in the run rooted at `n`, including `n` itself.
///
/// Equals the lowest set bit of `n + 1`, i.e. `1 << (n + 1).trailing_zeros()`.
#[must_use]
#[inline]
pub fn subtree_span(n: usize) -> usize {
    n ^ (n | (n + 1))
}

/// The root of the run that begins exactly where `n`'s run ends.
///
/// Identically `n + subtree_span(n)`; the bitwise form is the one the
/// search loop iterates.
#[must_use]
#[inline]
pub fn right_ancestor(n: usize) -> usize {
    n | (n + 1)
}

/// The nearest smaller index whose run contains `n`'s run.
///
/// Returns `None` when `n` is the root of its ancestor chain (the C-style
/// `-1` terminator expressed as an option).
#[must_use]
#[inline]
pub fn left_ancestor(n: usize) -> Option<usize> {
    (n & (n + 1)).checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn span_is_lowest_set_bit_of_successor() {
        for n in 0_usize..4096 {
            assert_eq!(subtree_span(n), 1_usize << (n + 1).trailing_zeros(), "n={n}");
        }
    }

    #[test]
    fn span_small_values() {
        // Index:  0  1  2  3  4  5  6  7 ...
        let expected = [1, 2, 1, 4, 1, 2, 1, 8, 1, 2, 1, 4, 1, 2, 1, 16];
        for (n, &want) in expected.iter().enumerate() {
            assert_eq!(subtree_span(n), want, "n={n}");
        }
    }

    #[test]
    fn right_ancestor_chain_from_zero_is_the_spine() {
        // 0 -> 1 -> 3 -> 7 -> 15 -> ... each spine index roots the upper
        // half of the next 2^k - 1 capacity.
        let mut n = 0_usize;
        for k in 1_u32..20 {
            assert_eq!(n, (1_usize << (k - 1)) - 1);
            n = right_ancestor(n);
        }
    }

    #[test]
    fn right_ancestor_abuts_and_widens() {
        for n in 0_usize..4096 {
            let up = right_ancestor(n);
            assert_eq!(up, n + subtree_span(n), "runs must abut, n={n}");
            assert!(subtree_span(up) > subtree_span(n), "runs must widen, n={n}");
        }
    }

    #[test]
    fn left_ancestor_run_contains_n() {
        for n in 0_usize..4096 {
            if let Some(down) = left_ancestor(n) {
                assert!(down < n);
                // down's run must cover n's entire run.
                assert!(
                    n + subtree_span(n) <= down + subtree_span(down),
                    "n={n} down={down}"
                );
            }
        }
    }

    #[test]
    fn left_ancestor_terminates_at_spine() {
        for k in 0_u32..20 {
            let spine = (1_usize << k) - 1;
            assert_eq!(left_ancestor(spine), None, "spine={spine}");
        }
        assert_eq!(left_ancestor(2), Some(1));
        assert_eq!(left_ancestor(4), Some(3));
        assert_eq!(left_ancestor(5), Some(3));
        assert_eq!(left_ancestor(6), Some(5));
        assert_eq!(left_ancestor(8), Some(7));
    }

    #[test]
    fn left_ancestor_chain_is_exactly_the_covering_roots() {
        // For every slot n, the left_ancestor chain from n must visit
        // exactly the indices m whose run [m, m + span) contains n.
        let cap = 255_usize;
        for n in 0..cap {
            let mut chain = vec![n];
            let mut at = n;
            while let Some(down) = left_ancestor(at) {
                chain.push(down);
                at = down;
            }
            for m in 0..cap {
                let covers = m <= n && n < m + subtree_span(m);
                assert_eq!(
                    chain.contains(&m),
                    covers,
                    "n={n} m={m} span={}",
                    subtree_span(m)
                );
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// From any start index, the right_ancestor chain tiles [n, cap)
        /// with no gap and no overlap, ending exactly at capacity.
        #[test]
        fn right_ancestor_chain_tiles_to_capacity(n in 0_usize..8191) {
            let cap = 8191_usize; // 2^13 - 1
            let mut at = n;
            let mut covered = n;
            while at < cap {
                prop_assert_eq!(at, covered, "runs must abut");
                covered = at + subtree_span(at);
                at = right_ancestor(at);
            }
            prop_assert_eq!(covered, cap, "tiling must end exactly at capacity");
        }

        /// Runs never cross a 2^k - 1 capacity boundary: growth only adds
        /// indices, it never changes the run of an existing one.
        #[test]
        fn runs_are_prefix_stable(n in 0_usize..4095) {
            let span = subtree_span(n);
            // Smallest 2^k - 1 capacity containing n.
            let mut cap = 1_usize;
            while cap <= n {
                cap = 2 * cap + 1;
            }
            prop_assert!(n + span <= cap, "run [{}, {}) crosses capacity {}", n, n + span, cap);
        }
    }
}
