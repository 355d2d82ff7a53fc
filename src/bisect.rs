//! Recursive bisection of adjacency-matrix edge universes.
//!
//! The G(n,m) and G(n,p) samplers share one decomposition: the edge universe
//! (the full `n × n` matrix for directed graphs, the strict upper triangle
//! for undirected ones) is split recursively into quadrants until a block
//! falls below a fixed cell budget. The tree's shape depends only on `n` and
//! the universe shape — never on the chunk count or the process count — so
//! every process derives the identical tree and the output is invariant under
//! both.
//!
//! A node is identified by its path integer (`root = 1`, child `j` of node
//! `i` is `4·i + j`), which doubles as the hash coordinate of its
//! hypergeometric splits and of its leaf sampling stream. Sub-trees whose
//! row and column ranges miss the caller's interest window are pruned after
//! the split draws, which is what makes expansion proportional to the local
//! share instead of the whole universe.

use crate::hash::hash2;
use crate::variates::hypergeometric;

/// Cell budget below which a block is enumerated instead of split further.
pub(crate) const LEAF_CELLS: u64 = 1 << 12;

/// Hash discriminant for a leaf's sampling stream (split draws use `0..=2`).
pub(crate) const LEAF_STREAM: u64 = 3;

/// A block of the edge universe.
///
/// `Tri` is the set of pairs `(u, v)` with `lo <= u < v < hi` (plus the
/// diagonal when self-loops are on); `Rect` is a full index rectangle. For
/// directed universes without self-loops the rectangle's columns are
/// *compressed*: column `c` stands for target `c + (c >= u)`, so every row
/// has exactly `n - 1` cells and blocks stay hole-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Region {
    Tri { lo: u64, hi: u64 },
    Rect { r0: u64, r1: u64, c0: u64, c1: u64 },
}

impl Region {
    /// Row (source-vertex) span of the block.
    pub(crate) fn rows(&self) -> (u64, u64) {
        match *self {
            Region::Tri { lo, hi } => (lo, hi),
            Region::Rect { r0, r1, .. } => (r0, r1),
        }
    }

    /// Column span of the block, in column-index space.
    pub(crate) fn cols(&self) -> (u64, u64) {
        match *self {
            Region::Tri { lo, hi } => (lo, hi),
            Region::Rect { c0, c1, .. } => (c0, c1),
        }
    }
}

/// Edge universe of an Erdős–Rényi-style sampler.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Universe {
    pub n: u64,
    pub self_loops: bool,
    pub directed: bool,
}

impl Universe {
    pub(crate) fn root(&self) -> Region {
        if self.directed {
            Region::Rect {
                r0: 0,
                r1: self.n,
                c0: 0,
                c1: self.cols_per_row(),
            }
        } else {
            Region::Tri { lo: 0, hi: self.n }
        }
    }

    fn cols_per_row(&self) -> u64 {
        debug_assert!(self.directed);
        self.n.saturating_sub(u64::from(!self.self_loops))
    }

    /// Total number of potential edges, if it fits the sampler's 63-bit
    /// budget.
    pub(crate) fn total(&self) -> Option<u64> {
        let total = if self.directed {
            self.n.checked_mul(self.cols_per_row())?
        } else {
            let pairs = if self.n % 2 == 0 {
                (self.n / 2).checked_mul(self.n.saturating_sub(1))?
            } else {
                self.n.checked_mul(self.n.saturating_sub(1) / 2)?
            };
            pairs.checked_add(if self.self_loops { self.n } else { 0 })?
        };
        // Hypergeometric populations are limited to 2^63 - 1.
        (total <= i64::MAX as u64).then_some(total)
    }

    pub(crate) fn size(&self, region: Region) -> u64 {
        match region {
            Region::Tri { lo, hi } => {
                let s = hi - lo;
                let pairs = if s % 2 == 0 { (s / 2) * (s - 1) } else { s * ((s - 1) / 2) };
                pairs + if self.self_loops { s } else { 0 }
            }
            Region::Rect { r0, r1, c0, c1 } => (r1 - r0) * (c1 - c0),
        }
    }

    /// Children of a non-leaf block, in fixed order.
    fn children(&self, region: Region) -> ([Region; 4], usize) {
        let pad = Region::Rect { r0: 0, r1: 0, c0: 0, c1: 0 };
        match region {
            Region::Tri { lo, hi } => {
                let mid = lo + (hi - lo) / 2;
                (
                    [
                        Region::Tri { lo, hi: mid },
                        Region::Rect { r0: lo, r1: mid, c0: mid, c1: hi },
                        Region::Tri { lo: mid, hi },
                        pad,
                    ],
                    3,
                )
            }
            Region::Rect { r0, r1, c0, c1 } => {
                let rows = r1 - r0;
                let cols = c1 - c0;
                if rows > 1 && cols > 1 {
                    let rm = r0 + rows / 2;
                    let cm = c0 + cols / 2;
                    (
                        [
                            Region::Rect { r0, r1: rm, c0, c1: cm },
                            Region::Rect { r0, r1: rm, c0: cm, c1 },
                            Region::Rect { r0: rm, r1, c0, c1: cm },
                            Region::Rect { r0: rm, r1, c0: cm, c1 },
                        ],
                        4,
                    )
                } else if rows > 1 {
                    let rm = r0 + rows / 2;
                    (
                        [
                            Region::Rect { r0, r1: rm, c0, c1 },
                            Region::Rect { r0: rm, r1, c0, c1 },
                            pad,
                            pad,
                        ],
                        2,
                    )
                } else {
                    let cm = c0 + cols / 2;
                    (
                        [
                            Region::Rect { r0, r1, c0, c1: cm },
                            Region::Rect { r0, r1, c0: cm, c1 },
                            pad,
                            pad,
                        ],
                        2,
                    )
                }
            }
        }
    }

    /// The `idx`-th cell of a block, as an `(u, v)` vertex pair.
    pub(crate) fn cell(&self, region: Region, idx: u64) -> (u64, u64) {
        debug_assert!(idx < self.size(region));
        match region {
            Region::Rect { r0, c0, c1, .. } => {
                let cols = c1 - c0;
                let u = r0 + idx / cols;
                let c = c0 + idx % cols;
                let v = if self.directed && !self.self_loops {
                    c + u64::from(c >= u)
                } else {
                    c
                };
                (u, v)
            }
            Region::Tri { lo, hi } => {
                let s = hi - lo;
                // Cells in rows before local row x (row x holds s-1-x cells,
                // one more each when the diagonal is included).
                let before = |x: u64| {
                    let below_diag = x * x.saturating_sub(1) / 2;
                    if self.self_loops {
                        x * s - below_diag
                    } else {
                        x * (s - 1) - below_diag
                    }
                };
                let mut lo_x = 0;
                let mut hi_x = s;
                while hi_x - lo_x > 1 {
                    let mid = lo_x + (hi_x - lo_x) / 2;
                    if before(mid) <= idx {
                        lo_x = mid;
                    } else {
                        hi_x = mid;
                    }
                }
                let x = lo_x;
                let rest = idx - before(x);
                let y = if self.self_loops { x + rest } else { x + 1 + rest };
                (lo + x, lo + y)
            }
        }
    }

    /// Walk the bisection tree, calling `leaf` for every leaf block that
    /// passes `interest`, with the block's sampled item count.
    ///
    /// With `items = Some(m)`, internal nodes split their count over children
    /// by sequential hypergeometric draws keyed `(base, node, draw)`; leaves
    /// receive exact counts that globally sum to `m`. With `items = None` the
    /// walk only resolves structure (G(n,p) leaves own their Bernoulli
    /// streams and need no counts).
    pub(crate) fn visit_leaves<I, F>(&self, base: u64, items: Option<u64>, interest: &I, leaf: &mut F)
    where
        I: Fn(Region) -> bool,
        F: FnMut(u64, Region, u64),
    {
        if self.n == 0 {
            return;
        }
        self.visit(1, self.root(), items.unwrap_or(0), base, items.is_some(), interest, leaf);
    }

    #[allow(clippy::too_many_arguments)]
    fn visit<I, F>(
        &self,
        node: u64,
        region: Region,
        count: u64,
        base: u64,
        counted: bool,
        interest: &I,
        leaf: &mut F,
    ) where
        I: Fn(Region) -> bool,
        F: FnMut(u64, Region, u64),
    {
        if !interest(region) {
            return;
        }
        let size = self.size(region);
        if size <= LEAF_CELLS {
            leaf(node, region, count);
            return;
        }
        let (children, len) = self.children(region);
        debug_assert!(node <= u64::MAX / 8, "bisection path exceeds 64 bits");
        let mut remaining_items = count;
        let mut remaining_size = size;
        for (j, child) in children[..len].iter().enumerate() {
            let child_size = self.size(*child);
            let child_items = if !counted {
                0
            } else if j + 1 == len {
                remaining_items
            } else {
                let draw = hypergeometric(
                    hash2(base, node, j as u64),
                    remaining_size,
                    child_size,
                    remaining_items,
                );
                remaining_items -= draw;
                remaining_size -= child_size;
                draw
            };
            self.visit(4 * node + j as u64, *child, child_items, base, counted, interest, leaf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_leaves(uni: &Universe, base: u64, items: Option<u64>) -> Vec<(u64, Region, u64)> {
        let mut leaves = Vec::new();
        uni.visit_leaves(base, items, &|_| true, &mut |node, region, count| {
            leaves.push((node, region, count));
        });
        leaves
    }

    #[test]
    fn totals() {
        let d = Universe { n: 8, self_loops: false, directed: true };
        assert_eq!(d.total(), Some(56));
        let dl = Universe { n: 8, self_loops: true, directed: true };
        assert_eq!(dl.total(), Some(64));
        let u = Universe { n: 8, self_loops: false, directed: false };
        assert_eq!(u.total(), Some(28));
        let ul = Universe { n: 8, self_loops: true, directed: false };
        assert_eq!(ul.total(), Some(36));
        let huge = Universe { n: u64::MAX, self_loops: false, directed: true };
        assert_eq!(huge.total(), None);
    }

    #[test]
    fn leaves_tile_the_universe() {
        for (directed, self_loops) in [(true, false), (true, true), (false, false), (false, true)] {
            let uni = Universe { n: 200, self_loops, directed };
            let leaves = collect_leaves(&uni, 1, None);
            let covered: u64 = leaves.iter().map(|&(_, r, _)| uni.size(r)).sum();
            assert_eq!(covered, uni.total().unwrap(), "directed={directed} loops={self_loops}");

            // Every cell of every leaf maps to a valid, in-region pair.
            let mut all = std::collections::HashSet::new();
            for &(_, region, _) in &leaves {
                for idx in 0..uni.size(region) {
                    let (u, v) = uni.cell(region, idx);
                    assert!(u < 200 && v < 200);
                    if !self_loops {
                        assert_ne!(u, v);
                    }
                    if !uni.directed {
                        assert!(u <= v);
                    }
                    assert!(all.insert((u, v)), "duplicate cell ({u}, {v})");
                }
            }
        }
    }

    #[test]
    fn node_ids_are_unique() {
        let uni = Universe { n: 500, self_loops: false, directed: false };
        let leaves = collect_leaves(&uni, 1, None);
        let ids: std::collections::HashSet<u64> = leaves.iter().map(|&(n, _, _)| n).collect();
        assert_eq!(ids.len(), leaves.len());
    }

    #[test]
    fn counted_split_conserves_items() {
        let uni = Universe { n: 300, self_loops: false, directed: false };
        let m = 4321;
        let leaves = collect_leaves(&uni, 77, Some(m));
        let total: u64 = leaves.iter().map(|&(_, _, c)| c).sum();
        assert_eq!(total, m);
        for &(_, region, count) in &leaves {
            assert!(count <= uni.size(region));
        }
    }

    #[test]
    fn pruned_walk_agrees_with_full_walk() {
        let uni = Universe { n: 300, self_loops: false, directed: false };
        let m = 999;
        let full = collect_leaves(&uni, 5, Some(m));
        // Restrict interest to blocks touching rows [100, 150).
        let window = (100u64, 150u64);
        let mut pruned = Vec::new();
        uni.visit_leaves(
            5,
            Some(m),
            &|r| {
                let (lo, hi) = r.rows();
                lo < window.1 && window.0 < hi
            },
            &mut |node, region, count| pruned.push((node, region, count)),
        );
        for entry in &pruned {
            assert!(full.contains(entry), "pruned walk diverged at {entry:?}");
        }
    }

    #[test]
    fn directed_cell_mapping_skips_diagonal() {
        let uni = Universe { n: 6, self_loops: false, directed: true };
        let root = uni.root();
        let mut seen = std::collections::HashSet::new();
        for idx in 0..uni.size(root) {
            let (u, v) = uni.cell(root, idx);
            assert_ne!(u, v);
            assert!(seen.insert((u, v)));
        }
        assert_eq!(seen.len(), 30);
    }

    #[test]
    fn triangle_cell_mapping_is_bijective() {
        for self_loops in [false, true] {
            let uni = Universe { n: 40, self_loops, directed: false };
            let root = Region::Tri { lo: 7, hi: 29 };
            let mut seen = std::collections::HashSet::new();
            for idx in 0..uni.size(root) {
                let (u, v) = uni.cell(root, idx);
                assert!((7..29).contains(&u) && (7..29).contains(&v));
                if self_loops {
                    assert!(u <= v);
                } else {
                    assert!(u < v);
                }
                assert!(seen.insert((u, v)));
            }
            assert_eq!(seen.len() as u64, uni.size(root));
        }
    }
}
