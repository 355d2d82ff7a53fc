//! Erdős–Rényi G(n,m): exactly `m` distinct edges, uniform over the edge
//! universe.
//!
//! The bisection tree splits `m` over leaf blocks with hypergeometric draws;
//! a leaf then draws its exact share without replacement (Floyd) from a
//! stream keyed by the leaf's path. Every process expands only the leaves
//! touching its vertex range, so the union over any process count equals the
//! single-process output.
//!
//! Determinism contract:
//! - For fixed `(seed, n, m, self_loops)` the global edge set is independent
//!   of the chunk count and the process count.
//! - A rank's local output depends only on its vertex range.

use crate::bisect::{Universe, LEAF_STREAM};
use crate::chunks::{vertex_range, ChunkDistribution};
use crate::hash::hash2;
use crate::split::sample_distinct;
use crate::variates::HashRng;
use crate::{Edge, Error, Result, VId, VertexRange};

const SALT: u64 = 0x676e_6d21; // "gnm!"

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GnmConfig {
    pub n: u64,
    pub m: u64,
    pub self_loops: bool,
    pub seed: u64,
    /// Number of chunks the vertex space is cut into (ownership granularity).
    pub chunks: u64,
}

fn local_range(cfg: &GnmConfig, rank: u64, size: u64) -> Result<VertexRange> {
    if size == 0 || rank >= size {
        return Err(Error::InvalidParameter(format!(
            "rank {rank} out of range for {size} processes"
        )));
    }
    let dist = ChunkDistribution::new(cfg.n, cfg.chunks)?;
    Ok(vertex_range(&dist, size, rank))
}

fn checked_universe(cfg: &GnmConfig, directed: bool) -> Result<Universe> {
    let uni = Universe { n: cfg.n, self_loops: cfg.self_loops, directed };
    let total = uni
        .total()
        .ok_or_else(|| Error::Overflow(format!("edge universe for n = {} vertices", cfg.n)))?;
    if cfg.m > total {
        return Err(Error::InvalidParameter(format!(
            "m = {} exceeds the {total} possible edges",
            cfg.m
        )));
    }
    Ok(uni)
}

/// Directed G(n,m). Emits each edge once, on the rank owning its source.
pub fn directed_streaming<F>(cfg: &GnmConfig, rank: u64, size: u64, mut emit: F) -> Result<VertexRange>
where
    F: FnMut(VId, VId),
{
    let my = local_range(cfg, rank, size)?;
    let uni = checked_universe(cfg, true)?;
    tracing::debug!(n = cfg.n, m = cfg.m, rank, size, "sampling directed G(n,m)");
    let base = hash2(cfg.seed, SALT, 0);
    uni.visit_leaves(
        base,
        Some(cfg.m),
        &|region| {
            let (lo, hi) = region.rows();
            lo < my.1 && my.0 < hi
        },
        &mut |node, region, count| {
            if count == 0 {
                return;
            }
            let mut rng = HashRng::new(hash2(base, node, LEAF_STREAM));
            for idx in sample_distinct(&mut rng, uni.size(region), count) {
                let (u, v) = uni.cell(region, idx);
                if (my.0..my.1).contains(&u) {
                    emit(u, v);
                }
            }
        },
    );
    Ok(my)
}

/// Undirected G(n,m).
///
/// Each sampled pair `(u, v)` with `u <= v` is emitted as `(u, v)` by the
/// owner of `u`; if `v` lives on a different rank, that rank emits the
/// mirror `(v, u)` from the same leaf stream, so no copy ever crosses a
/// process boundary.
pub fn undirected_streaming<F>(
    cfg: &GnmConfig,
    rank: u64,
    size: u64,
    mut emit: F,
) -> Result<VertexRange>
where
    F: FnMut(VId, VId),
{
    let my = local_range(cfg, rank, size)?;
    let uni = checked_universe(cfg, false)?;
    tracing::debug!(n = cfg.n, m = cfg.m, rank, size, "sampling undirected G(n,m)");
    let base = hash2(cfg.seed, SALT, 1);
    uni.visit_leaves(
        base,
        Some(cfg.m),
        &|region| {
            let (rlo, rhi) = region.rows();
            let (clo, chi) = region.cols();
            (rlo < my.1 && my.0 < rhi) || (clo < my.1 && my.0 < chi)
        },
        &mut |node, region, count| {
            if count == 0 {
                return;
            }
            let mut rng = HashRng::new(hash2(base, node, LEAF_STREAM));
            for idx in sample_distinct(&mut rng, uni.size(region), count) {
                let (u, v) = uni.cell(region, idx);
                let u_local = (my.0..my.1).contains(&u);
                let v_local = (my.0..my.1).contains(&v);
                if u_local {
                    emit(u, v);
                }
                if v_local && !u_local {
                    emit(v, u);
                }
            }
        },
    );
    Ok(my)
}

/// Buffered variant of [`directed_streaming`].
pub fn directed(cfg: &GnmConfig, rank: u64, size: u64) -> Result<(Vec<Edge>, VertexRange)> {
    let mut edges = Vec::new();
    let range = directed_streaming(cfg, rank, size, |u, v| edges.push((u, v)))?;
    Ok((edges, range))
}

/// Buffered variant of [`undirected_streaming`].
pub fn undirected(cfg: &GnmConfig, rank: u64, size: u64) -> Result<(Vec<Edge>, VertexRange)> {
    let mut edges = Vec::new();
    let range = undirected_streaming(cfg, rank, size, |u, v| edges.push((u, v)))?;
    Ok((edges, range))
}
