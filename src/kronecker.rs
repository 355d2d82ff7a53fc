//! Kronecker / R-MAT edge placement.
//!
//! Each of the `m` edges walks `log2(n)` recursion levels, picking one of
//! four quadrants per level with probabilities `(a, b, c, d)`. The walk for
//! edge `e` is keyed by `(edge, attempt, level)`, so edge indices — which
//! are block-partitioned over processes — can be generated anywhere.
//!
//! Disallowed self-loops are resampled with a bumped attempt counter, which
//! keeps the emitted edge count at exactly `m` per walk. Simple-graph mode
//! drops duplicate walks locally; duplicates that land on different ranks
//! are kept, as the rank that could spot them never sees both copies.

use crate::chunks::{vertex_range, ChunkDistribution};
use crate::hash::{hash2, hash3};
use crate::variates::HashRng;
use crate::{Edge, Error, Result, VId, VertexRange};

const SALT: u64 = 0x726d_6174; // "rmat"

/// Graph500 Kronecker initiator.
pub const KRONECKER_INITIATOR: (f64, f64, f64) = (0.57, 0.19, 0.19);

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RmatConfig {
    /// Vertex count; must be a power of two.
    pub n: u64,
    pub m: u64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub directed: bool,
    pub self_loops: bool,
    /// Keep duplicate walks instead of deduplicating locally.
    pub multigraph: bool,
    pub seed: u64,
    pub chunks: u64,
}

fn validate(cfg: &RmatConfig, rank: u64, size: u64) -> Result<()> {
    if size == 0 || rank >= size {
        return Err(Error::InvalidParameter(format!(
            "rank {rank} out of range for {size} processes"
        )));
    }
    if cfg.n == 0 || !cfg.n.is_power_of_two() {
        return Err(Error::InvalidParameter(format!(
            "vertex count {} is not a power of two",
            cfg.n
        )));
    }
    let probs = [cfg.a, cfg.b, cfg.c];
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0) || probs.iter().sum::<f64>() > 1.0 + 1e-9 {
        return Err(Error::InvalidParameter(format!(
            "quadrant probabilities ({}, {}, {}) are not a sub-distribution",
            cfg.a, cfg.b, cfg.c
        )));
    }
    if cfg.m > 0 && cfg.n < 2 && !cfg.self_loops {
        return Err(Error::InvalidParameter(
            "a single vertex admits no loop-free edges".into(),
        ));
    }
    Ok(())
}

/// Quadrant walk for one `(edge, attempt)` pair.
fn place(cfg: &RmatConfig, base: u64, edge: u64, attempt: u64, levels: u32) -> Edge {
    let mut u = 0u64;
    let mut v = 0u64;
    for level in 0..u64::from(levels) {
        let x = HashRng::new(hash3(base, edge, attempt, level)).unit();
        let (row, col) = if x < cfg.a {
            (0, 0)
        } else if x < cfg.a + cfg.b {
            (0, 1)
        } else if x < cfg.a + cfg.b + cfg.c {
            (1, 0)
        } else {
            (1, 1)
        };
        u = u << 1 | row;
        v = v << 1 | col;
    }
    (u, v)
}

/// Emit the walks for the local block of edge indices.
pub fn streaming<F>(cfg: &RmatConfig, rank: u64, size: u64, mut emit: F) -> Result<VertexRange>
where
    F: FnMut(VId, VId),
{
    validate(cfg, rank, size)?;
    tracing::debug!(n = cfg.n, m = cfg.m, rank, size, "sampling recursive-matrix graph");
    let base = hash2(cfg.seed, SALT, 0);
    let levels = cfg.n.trailing_zeros();

    let edge_dist = ChunkDistribution::new(cfg.m, size)?;
    let my_edges = edge_dist.offset(rank)..edge_dist.offset(rank + 1);

    let mut seen = (!cfg.multigraph).then(std::collections::HashSet::new);
    for e in my_edges {
        let mut attempt = 0;
        let (u, v) = loop {
            let (u, v) = place(cfg, base, e, attempt, levels);
            if cfg.self_loops || u != v {
                break (u, v);
            }
            attempt += 1;
        };
        let (u, v) = if cfg.directed { (u, v) } else { (u.min(v), u.max(v)) };
        if let Some(seen) = seen.as_mut() {
            if !seen.insert((u, v)) {
                continue;
            }
        }
        emit(u, v);
    }

    let dist = ChunkDistribution::new(cfg.n, cfg.chunks)?;
    Ok(vertex_range(&dist, size, rank))
}

/// Buffered variant of [`streaming`].
pub fn generate(cfg: &RmatConfig, rank: u64, size: u64) -> Result<(Vec<Edge>, VertexRange)> {
    let mut edges = Vec::new();
    let range = streaming(cfg, rank, size, |u, v| edges.push((u, v)))?;
    Ok((edges, range))
}
