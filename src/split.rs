//! Point-placement splitters and distinct sampling.
//!
//! The splitters answer "how many of the `M` globally placed points land in
//! my cells, and how many land before them?" without coordination: the cell
//! array is halved recursively and each internal node draws the left half's
//! share from a binomial keyed by the node's 1-based heap index (left child
//! `2i`, right child `2i + 1`). Every process derives identical splits, and
//! the running left-sums double as exact point-id offsets, which is how the
//! geometric samplers assign contiguous vertex ranges. The tree is never
//! materialized.
//!
//! [`sample_distinct`] is the leaf-level companion: exact without-replacement
//! draws from an implicit universe in bounded memory.

use crate::hash::hash1;
use crate::variates::{binomial, HashRng};

/// Deterministic multinomial split of `items` points over `cells`
/// equal-probability cells.
#[derive(Debug, Clone, Copy)]
pub struct VolumeSplitter {
    seed: u64,
    cells: u64,
    items: u64,
}

impl VolumeSplitter {
    #[must_use]
    pub fn new(seed: u64, cells: u64, items: u64) -> Self {
        debug_assert!(cells > 0);
        Self { seed, cells, items }
    }

    /// Points in `cell` and points in all cells before it. `cell == cells`
    /// is allowed and returns `(0, items)`.
    #[must_use]
    pub fn count_and_offset(&self, cell: u64) -> (u64, u64) {
        debug_assert!(cell <= self.cells);
        if cell == self.cells {
            return (0, self.items);
        }
        let mut lo = 0;
        let mut hi = self.cells;
        let mut node = 1u64;
        let mut count = self.items;
        let mut before = 0u64;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            let left = binomial(
                hash1(self.seed, node),
                count,
                (mid - lo) as f64 / (hi - lo) as f64,
            );
            if cell < mid {
                hi = mid;
                count = left;
                node = 2 * node;
            } else {
                lo = mid;
                before += left;
                count -= left;
                node = 2 * node + 1;
            }
        }
        (count, before)
    }
}

/// Deterministic multinomial split of `items` points over cells with
/// arbitrary probability masses, given as a prefix-sum table of weights.
///
/// Same tree and keying as [`VolumeSplitter`], with the split probability
/// taken from the weight prefix. Used where cell masses are unequal (the
/// hyperbolic annulus bands).
#[derive(Debug, Clone, Copy)]
pub struct WeightedSplitter<'a> {
    seed: u64,
    prefix: &'a [f64],
    items: u64,
}

impl<'a> WeightedSplitter<'a> {
    /// `prefix[c]` is the total mass of cells `[0, c)`; masses need not be
    /// normalized.
    #[must_use]
    pub fn new(seed: u64, prefix: &'a [f64], items: u64) -> Self {
        debug_assert!(prefix.len() >= 2);
        Self { seed, prefix, items }
    }

    #[must_use]
    pub fn num_cells(&self) -> u64 {
        (self.prefix.len() - 1) as u64
    }

    /// Points in `cell` and points in all cells before it. `cell ==
    /// num_cells()` is allowed and returns `(0, items)`.
    #[must_use]
    pub fn count_and_offset(&self, cell: u64) -> (u64, u64) {
        debug_assert!(cell <= self.num_cells());
        if cell == self.num_cells() {
            return (0, self.items);
        }
        let mass = |lo: u64, hi: u64| self.prefix[hi as usize] - self.prefix[lo as usize];
        let mut lo = 0;
        let mut hi = self.num_cells();
        let mut node = 1u64;
        let mut count = self.items;
        let mut before = 0u64;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            let total = mass(lo, hi);
            let p = if total > 0.0 { mass(lo, mid) / total } else { 0.0 };
            let left = binomial(hash1(self.seed, node), count, p);
            if cell < mid {
                hi = mid;
                count = left;
                node = 2 * node;
            } else {
                lo = mid;
                before += left;
                count -= left;
                node = 2 * node + 1;
            }
        }
        (count, before)
    }
}

/// Sample `count` distinct values from `[0, universe)` with Floyd's
/// algorithm. The returned order is the insertion order of the algorithm,
/// which is deterministic for a given RNG state.
#[must_use]
pub fn sample_distinct(rng: &mut HashRng, universe: u64, count: u64) -> Vec<u64> {
    debug_assert!(count <= universe);
    let mut chosen = Vec::with_capacity(count as usize);
    let mut seen = std::collections::HashSet::with_capacity(count as usize);
    for j in universe - count..universe {
        let t = rng.below(j + 1);
        let pick = if seen.insert(t) { t } else { j };
        if pick != t {
            seen.insert(pick);
        }
        chosen.push(pick);
    }
    chosen
}
