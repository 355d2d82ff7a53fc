//! 2D/3D vertex grids with Bernoulli edges.
//!
//! Every lattice vertex probes its 4- or 6-neighborhood; the pair's trial is
//! keyed by `(min(u, v), max(u, v))` so both probing sides agree on the
//! outcome without talking to each other. A both-local pair is emitted once
//! (by its smaller endpoint), a cross-rank pair once per side, oriented
//! outward from the local endpoint.

use crate::chunks::{chunk_range, GridTopology};
use crate::hash::hash2;
use crate::variates::bernoulli;
use crate::{Edge, Error, Result, VId, VertexRange};

const SALT: u64 = 0x6772_6421; // "grd!"

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridConfig<const D: usize> {
    /// Lattice extent per axis.
    pub dims: [u64; D],
    /// Bernoulli probability of each lattice edge.
    pub p: f64,
    /// Wrap neighbors modulo the axis extents.
    pub periodic: bool,
    pub seed: u64,
    /// Number of chunks; must be a perfect square (2D) or cube (3D).
    pub chunks: u64,
}

/// Nearest-square extents for a target vertex count.
#[must_use]
pub fn near_square(n: u64) -> [u64; 2] {
    let side = (n as f64).sqrt().ceil() as u64;
    [side.max(1), side.max(1)]
}

/// Nearest-cube extents for a target vertex count.
#[must_use]
pub fn near_cube(n: u64) -> [u64; 3] {
    let side = (n as f64).cbrt().ceil() as u64;
    [side.max(1), side.max(1), side.max(1)]
}

fn validate<const D: usize>(
    cfg: &GridConfig<D>,
    rank: u64,
    size: u64,
) -> Result<(GridTopology<D>, std::ops::Range<u64>)> {
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
    let topo = GridTopology::new(cfg.dims, cfg.chunks)?;
    let chunks = chunk_range(topo.num_chunks(), size, rank);
    Ok((topo, chunks))
}

/// Lattice sampler over the configured grid.
pub fn streaming<const D: usize, F>(
    cfg: &GridConfig<D>,
    rank: u64,
    size: u64,
    mut emit: F,
) -> Result<VertexRange>
where
    F: FnMut(VId, VId),
{
    let (topo, chunks) = validate(cfg, rank, size)?;
    tracing::debug!(
        vertices = topo.total_vertices(),
        p = cfg.p,
        periodic = cfg.periodic,
        rank,
        size,
        "sampling lattice graph"
    );
    let my = (topo.vertex_offset(chunks.start), topo.vertex_offset(chunks.end));
    let base = hash2(cfg.seed, SALT, D as u64);

    for chunk in chunks {
        let coords0 = topo.decode(chunk);
        for local_idx in 0..topo.chunk_size(chunk) {
            let local = topo.local_coords(chunk, local_idx);
            let coords: [u64; D] =
                std::array::from_fn(|a| topo.axis_offset(a, coords0[a]) + local[a]);
            let u = topo.vertex_offset(chunk) + local_idx;

            for axis in 0..D {
                for step in [-1i64, 1] {
                    let mut nb = coords;
                    let extent = cfg.dims[axis];
                    let moved = coords[axis] as i64 + step;
                    if cfg.periodic {
                        nb[axis] = moved.rem_euclid(extent as i64) as u64;
                    } else if (0..extent as i64).contains(&moved) {
                        nb[axis] = moved as u64;
                    } else {
                        continue;
                    }
                    let v = topo.blocked_index(nb);
                    let trial = bernoulli(hash2(base, u.min(v), u.max(v)), cfg.p);
                    if !trial {
                        continue;
                    }
                    let v_local = (my.0..my.1).contains(&v);
                    if !v_local || u < v {
                        emit(u, v);
                    }
                }
            }
        }
    }
    Ok(my)
}

/// Buffered variant of [`streaming`].
pub fn generate<const D: usize>(
    cfg: &GridConfig<D>,
    rank: u64,
    size: u64,
) -> Result<(Vec<Edge>, VertexRange)> {
    let mut edges = Vec::new();
    let range = streaming(cfg, rank, size, |u, v| edges.push((u, v)))?;
    Ok((edges, range))
}

/// Normalized lattice positions of the local vertices, in vertex-id order.
pub fn coordinates<const D: usize>(
    cfg: &GridConfig<D>,
    rank: u64,
    size: u64,
) -> Result<Vec<[f64; D]>> {
    let (topo, chunks) = validate(cfg, rank, size)?;
    let mut coords = Vec::new();
    for chunk in chunks {
        let chunk_coords = topo.decode(chunk);
        for local_idx in 0..topo.chunk_size(chunk) {
            let local = topo.local_coords(chunk, local_idx);
            coords.push(std::array::from_fn(|a| {
                (topo.axis_offset(a, chunk_coords[a]) + local[a]) as f64 / cfg.dims[a] as f64
            }));
        }
    }
    Ok(coords)
}
