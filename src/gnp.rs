//! Erdős–Rényi G(n,p): every potential edge independently with probability
//! `p`.
//!
//! Uses the same universe bisection as G(n,m), but leaves need no counts:
//! each leaf block enumerates its Bernoulli subset with one geometric skip
//! stream keyed by the leaf's path. Cross-rank blocks are enumerated by both
//! owning sides from the identical stream, so undirected mirrors never
//! require communication.

use crate::bisect::{Universe, LEAF_STREAM};
use crate::chunks::{vertex_range, ChunkDistribution};
use crate::hash::hash2;
use crate::variates::skip_sample;
use crate::{Edge, Error, Result, VId, VertexRange};

const SALT: u64 = 0x676e_7021; // "gnp!"

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GnpConfig {
    pub n: u64,
    pub p: f64,
    pub self_loops: bool,
    pub seed: u64,
    /// Number of chunks the vertex space is cut into (ownership granularity).
    pub chunks: u64,
}

fn validate(cfg: &GnpConfig, rank: u64, size: u64, directed: bool) -> Result<(VertexRange, Universe)> {
    if size == 0 || rank >= size {
        return Err(Error::InvalidParameter(format!(
            "rank {rank} out of range for {size} processes"
        )));
    }
    if !cfg.p.is_finite() || !(0.0..=1.0).contains(&cfg.p) {
        return Err(Error::InvalidParameter(format!(
            "edge probability {} outside [0, 1]",
            cfg.p
        )));
    }
    let dist = ChunkDistribution::new(cfg.n, cfg.chunks)?;
    let uni = Universe { n: cfg.n, self_loops: cfg.self_loops, directed };
    uni.total()
        .ok_or_else(|| Error::Overflow(format!("edge universe for n = {} vertices", cfg.n)))?;
    Ok((vertex_range(&dist, size, rank), uni))
}

/// Directed G(n,p). Emits each edge once, on the rank owning its source.
pub fn directed_streaming<F>(cfg: &GnpConfig, rank: u64, size: u64, mut emit: F) -> Result<VertexRange>
where
    F: FnMut(VId, VId),
{
    let (my, uni) = validate(cfg, rank, size, true)?;
    tracing::debug!(n = cfg.n, p = cfg.p, rank, size, "sampling directed G(n,p)");
    let base = hash2(cfg.seed, SALT, 0);
    uni.visit_leaves(
        base,
        None,
        &|region| {
            let (lo, hi) = region.rows();
            lo < my.1 && my.0 < hi
        },
        &mut |node, region, _| {
            skip_sample(hash2(base, node, LEAF_STREAM), uni.size(region), cfg.p, |idx| {
                let (u, v) = uni.cell(region, idx);
                if (my.0..my.1).contains(&u) {
                    emit(u, v);
                }
            });
        },
    );
    Ok(my)
}

/// Undirected G(n,p); emission rule as in [`crate::gnm::undirected_streaming`].
pub fn undirected_streaming<F>(
    cfg: &GnpConfig,
    rank: u64,
    size: u64,
    mut emit: F,
) -> Result<VertexRange>
where
    F: FnMut(VId, VId),
{
    let (my, uni) = validate(cfg, rank, size, false)?;
    tracing::debug!(n = cfg.n, p = cfg.p, rank, size, "sampling undirected G(n,p)");
    let base = hash2(cfg.seed, SALT, 1);
    uni.visit_leaves(
        base,
        None,
        &|region| {
            let (rlo, rhi) = region.rows();
            let (clo, chi) = region.cols();
            (rlo < my.1 && my.0 < rhi) || (clo < my.1 && my.0 < chi)
        },
        &mut |node, region, _| {
            skip_sample(hash2(base, node, LEAF_STREAM), uni.size(region), cfg.p, |idx| {
                let (u, v) = uni.cell(region, idx);
                let u_local = (my.0..my.1).contains(&u);
                let v_local = (my.0..my.1).contains(&v);
                if u_local {
                    emit(u, v);
                }
                if v_local && !u_local {
                    emit(v, u);
                }
            });
        },
    );
    Ok(my)
}

/// Rayon-sharded variant of [`directed`].
///
/// Invariant: output is byte-identical to the sequential path for a fixed
/// config, independent of thread count — leaves carry their own hash
/// coordinates and are concatenated in leaf order.
#[cfg(feature = "parallel")]
pub fn directed_parallel(cfg: &GnpConfig, rank: u64, size: u64) -> Result<(Vec<Edge>, VertexRange)> {
    use rayon::prelude::*;

    let (my, uni) = validate(cfg, rank, size, true)?;
    tracing::debug!(n = cfg.n, p = cfg.p, rank, size, "sampling directed G(n,p) on rayon");
    let base = hash2(cfg.seed, SALT, 0);
    let mut leaves = Vec::new();
    uni.visit_leaves(
        base,
        None,
        &|region| {
            let (lo, hi) = region.rows();
            lo < my.1 && my.0 < hi
        },
        &mut |node, region, _| leaves.push((node, region)),
    );
    let per_leaf: Vec<Vec<Edge>> = leaves
        .par_iter()
        .map(|&(node, region)| {
            let mut out = Vec::new();
            skip_sample(hash2(base, node, LEAF_STREAM), uni.size(region), cfg.p, |idx| {
                let (u, v) = uni.cell(region, idx);
                if (my.0..my.1).contains(&u) {
                    out.push((u, v));
                }
            });
            out
        })
        .collect();
    Ok((per_leaf.concat(), my))
}

/// Buffered variant of [`directed_streaming`].
pub fn directed(cfg: &GnpConfig, rank: u64, size: u64) -> Result<(Vec<Edge>, VertexRange)> {
    let mut edges = Vec::new();
    let range = directed_streaming(cfg, rank, size, |u, v| edges.push((u, v)))?;
    Ok((edges, range))
}

/// Buffered variant of [`undirected_streaming`].
pub fn undirected(cfg: &GnpConfig, rank: u64, size: u64) -> Result<(Vec<Edge>, VertexRange)> {
    let mut edges = Vec::new();
    let range = undirected_streaming(cfg, rank, size, |u, v| edges.push((u, v)))?;
    Ok((edges, range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cfg(n: u64, p: f64) -> GnpConfig {
        GnpConfig { n, p, self_loops: false, seed: 1, chunks: 1 }
    }

    #[test]
    fn zero_and_one_probability() {
        let (none, _) = directed(&cfg(20, 0.0), 0, 1).unwrap();
        assert!(none.is_empty());

        let (all, _) = undirected(&cfg(8, 1.0), 0, 1).unwrap();
        assert_eq!(all.len(), 28);
        assert!(all.iter().all(|&(u, v)| u < v));
    }

    #[test]
    fn rejects_bad_probability() {
        assert!(directed(&cfg(10, -0.1), 0, 1).is_err());
        assert!(directed(&cfg(10, 1.5), 0, 1).is_err());
        assert!(directed(&cfg(10, f64::NAN), 0, 1).is_err());
    }

    #[test]
    fn no_self_loops_unless_enabled() {
        let (edges, _) = directed(&cfg(40, 0.5), 0, 1).unwrap();
        assert!(edges.iter().all(|&(u, v)| u != v));

        let config = GnpConfig { self_loops: true, ..cfg(40, 1.0) };
        let (edges, _) = directed(&config, 0, 1).unwrap();
        assert_eq!(edges.len(), 1600);
    }

    #[test]
    fn directed_union_matches_reference_scenario() {
        // n = 8, p = 0.5 must agree between 1 and 4 processes.
        let (reference, _) = directed(&cfg(8, 0.5), 0, 1).unwrap();
        let mut reference = reference;
        reference.sort_unstable();

        let config = GnpConfig { chunks: 4, ..cfg(8, 0.5) };
        let mut union = Vec::new();
        for rank in 0..4 {
            let (edges, _) = directed(&config, rank, 4).unwrap();
            union.extend(edges);
        }
        union.sort_unstable();
        assert_eq!(union, reference);
    }

    #[test]
    fn undirected_union_is_process_count_invariant() {
        let (reference, _) = undirected(&cfg(120, 0.07), 0, 1).unwrap();
        let reference: HashSet<Edge> = reference.into_iter().collect();
        for p in [2u64, 3] {
            let config = GnpConfig { chunks: p, ..cfg(120, 0.07) };
            let mut canonical = HashSet::new();
            for rank in 0..p {
                let (edges, _) = undirected(&config, rank, p).unwrap();
                for (u, v) in edges {
                    canonical.insert((u.min(v), u.max(v)));
                }
            }
            assert_eq!(canonical, reference, "p = {p}");
        }
    }

    #[test]
    fn output_is_chunk_count_invariant() {
        let (reference, _) = directed(&cfg(90, 0.2), 0, 1).unwrap();
        for k in [3u64, 10, 64] {
            let config = GnpConfig { chunks: k, ..cfg(90, 0.2) };
            let (edges, _) = directed(&config, 0, 1).unwrap();
            assert_eq!(edges, reference, "k = {k}");
        }
    }

    #[test]
    fn density_tracks_p() {
        let mut total = 0usize;
        for seed in 0..30u64 {
            let config = GnpConfig { seed, ..cfg(100, 0.1) };
            total += directed(&config, 0, 1).unwrap().0.len();
        }
        let mean = total as f64 / 30.0;
        let expected = 100.0 * 99.0 * 0.1;
        // 3 sigma of B(9900, 0.1) averaged over 30 seeds.
        let sigma = (9900.0f64 * 0.1 * 0.9).sqrt() / (30.0f64).sqrt();
        assert!((mean - expected).abs() < 3.0 * sigma, "mean {mean}, expected {expected}");
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_sequential() {
        let config = cfg(400, 0.03);
        assert_eq!(directed_parallel(&config, 0, 1).unwrap(), directed(&config, 0, 1).unwrap());
        let config = GnpConfig { chunks: 3, ..cfg(200, 0.1) };
        assert_eq!(directed_parallel(&config, 1, 3).unwrap(), directed(&config, 1, 3).unwrap());
    }

    #[test]
    fn undirected_mirrors_cross_rank_edges() {
        let config = GnpConfig { chunks: 3, ..cfg(60, 0.15) };
        let locals: Vec<_> = (0..3).map(|r| undirected(&config, r, 3).unwrap()).collect();
        for (edges, range) in &locals {
            for &(u, v) in edges {
                if !(range.0..range.1).contains(&v) {
                    let owner = locals
                        .iter()
                        .find(|(_, r)| (r.0..r.1).contains(&v))
                        .expect("v must be owned somewhere");
                    assert!(owner.0.contains(&(v, u)), "missing mirror of ({u}, {v})");
                }
            }
        }
    }
}
