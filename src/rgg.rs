//! Random geometric graphs in the unit square / cube.
//!
//! Points are uniform in `[0, 1)^D`; a pair is connected iff its (optionally
//! toroidal) Euclidean distance is at most `r`. The domain is cut into a
//! lattice of cells with side `>= r`, so all neighbors of a point live in
//! the 3^D cell block around it. Per-cell point counts come from the
//! binomial cell splitter and in-cell positions from a per-cell stream, so
//! any process can rebuild any cell — its own or a ghost — from hashes
//! alone. Ghost-layer memory grows with the chunk surface, never with `n`.
//!
//! Vertex ids follow chunk-blocked cell order, which keeps every rank's
//! vertex range contiguous.

use std::collections::HashMap;

use crate::chunks::{chunk_range, GridTopology};
use crate::hash::hash2;
use crate::split::VolumeSplitter;
use crate::variates::HashRng;
use crate::{Edge, Error, Result, VId, VertexRange};

const SALT: u64 = 0x7267_6721; // "rgg!"

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RggConfig<const D: usize> {
    pub n: u64,
    /// Connection radius; must satisfy `0 < r <= 1 / chunks_per_dim`.
    pub r: f64,
    pub periodic: bool,
    pub seed: u64,
    /// Number of chunks; must be a perfect square (2D) or cube (3D).
    pub chunks: u64,
}

struct Layout<const D: usize> {
    topo: GridTopology<D>,
    cell_side: f64,
    splitter: VolumeSplitter,
    base: u64,
}

/// Points of one cell: the id of its first point and all positions.
struct CellPoints<const D: usize> {
    first_id: VId,
    pos: Vec<[f64; D]>,
}

fn build<const D: usize>(cfg: &RggConfig<D>) -> Result<Layout<D>> {
    if !(D == 2 || D == 3) {
        return Err(Error::InvalidParameter("geometric models are 2D or 3D".into()));
    }
    let per_dim = (cfg.chunks as f64).powf(1.0 / D as f64).round() as u64;
    if per_dim == 0 || per_dim.pow(D as u32) != cfg.chunks {
        return Err(Error::NotDecomposable { k: cfg.chunks, dims: D });
    }
    let chunk_width = 1.0 / per_dim as f64;
    if !cfg.r.is_finite() || cfg.r <= 0.0 || cfg.r > chunk_width {
        return Err(Error::InvalidParameter(format!(
            "radius {} outside (0, {chunk_width}] for {} chunks",
            cfg.r, cfg.chunks
        )));
    }
    let cells_per_chunk = (chunk_width / cfg.r).floor().max(1.0) as u64;
    let dims = [per_dim * cells_per_chunk; D];
    let topo = GridTopology::new(dims, cfg.chunks)?;
    let base = hash2(cfg.seed, SALT, D as u64);
    let splitter = VolumeSplitter::new(base, topo.total_vertices(), cfg.n);
    Ok(Layout {
        topo,
        cell_side: 1.0 / dims[0] as f64,
        splitter,
        base,
    })
}

impl<const D: usize> Layout<D> {
    fn cell_points(&self, coords: [u64; D]) -> CellPoints<D> {
        let blocked = self.topo.blocked_index(coords);
        let (count, before) = self.splitter.count_and_offset(blocked);
        let mut rng = HashRng::new(hash2(self.base, blocked, 1));
        let pos = (0..count)
            .map(|_| std::array::from_fn(|a| (coords[a] as f64 + rng.unit()) * self.cell_side))
            .collect();
        CellPoints { first_id: before, pos }
    }

    /// Cells adjacent to `coords` (excluding it), deduplicated under
    /// periodic wrapping.
    fn neighbor_cells(&self, coords: [u64; D], periodic: bool) -> Vec<[u64; D]> {
        let dims = self.topo.dims();
        let mut cells: Vec<[u64; D]> = Vec::new();
        let mut offsets = [-1i64; D];
        loop {
            if offsets.iter().any(|&o| o != 0) {
                let mut nb = [0u64; D];
                let mut valid = true;
                for a in 0..D {
                    let moved = coords[a] as i64 + offsets[a];
                    if periodic {
                        nb[a] = moved.rem_euclid(dims[a] as i64) as u64;
                    } else if (0..dims[a] as i64).contains(&moved) {
                        nb[a] = moved as u64;
                    } else {
                        valid = false;
                        break;
                    }
                }
                if valid && nb != coords && !cells.contains(&nb) {
                    cells.push(nb);
                }
            }
            // Advance the mixed-radix {-1, 0, 1}^D counter.
            let mut axis = 0;
            loop {
                if axis == D {
                    return cells;
                }
                if offsets[axis] < 1 {
                    offsets[axis] += 1;
                    break;
                }
                offsets[axis] = -1;
                axis += 1;
            }
        }
    }
}

fn distance2<const D: usize>(a: &[f64; D], b: &[f64; D], periodic: bool) -> f64 {
    (0..D)
        .map(|i| {
            let mut d = (a[i] - b[i]).abs();
            if periodic {
                d = d.min(1.0 - d);
            }
            d * d
        })
        .sum()
}

/// Geometric sampler over the configured domain.
pub fn streaming<const D: usize, F>(
    cfg: &RggConfig<D>,
    rank: u64,
    size: u64,
    mut emit: F,
) -> Result<VertexRange>
where
    F: FnMut(VId, VId),
{
    if size == 0 || rank >= size {
        return Err(Error::InvalidParameter(format!(
            "rank {rank} out of range for {size} processes"
        )));
    }
    let layout = build(cfg)?;
    tracing::debug!(
        n = cfg.n,
        r = cfg.r,
        dimensions = D,
        rank,
        size,
        "sampling random geometric graph"
    );
    let chunks = chunk_range(layout.topo.num_chunks(), size, rank);
    let my = (
        layout.splitter.count_and_offset(layout.topo.vertex_offset(chunks.start)).1,
        layout.splitter.count_and_offset(layout.topo.vertex_offset(chunks.end)).1,
    );
    let r2 = cfg.r * cfg.r;

    // Ghost cells are rebuilt on demand; cache them for the boundary scan.
    let mut cache: HashMap<[u64; D], CellPoints<D>> = HashMap::new();

    for chunk in chunks.clone() {
        let chunk_coords = layout.topo.decode(chunk);
        for local in 0..layout.topo.chunk_size(chunk) {
            let local_coords = layout.topo.local_coords(chunk, local);
            let coords: [u64; D] = std::array::from_fn(|a| {
                layout.topo.axis_offset(a, chunk_coords[a]) + local_coords[a]
            });
            let own = cache
                .remove(&coords)
                .unwrap_or_else(|| layout.cell_points(coords));

            // Pairs within the cell, emitted once from the smaller id.
            for j1 in 0..own.pos.len() {
                for j2 in j1 + 1..own.pos.len() {
                    if distance2(&own.pos[j1], &own.pos[j2], cfg.periodic) <= r2 {
                        emit(own.first_id + j1 as u64, own.first_id + j2 as u64);
                    }
                }
            }

            // Pairs against the 3^D - 1 surrounding cells.
            for nb in layout.neighbor_cells(coords, cfg.periodic) {
                let other = cache
                    .entry(nb)
                    .or_insert_with(|| layout.cell_points(nb));
                for (j1, p1) in own.pos.iter().enumerate() {
                    let u = own.first_id + j1 as u64;
                    for (j2, p2) in other.pos.iter().enumerate() {
                        let v = other.first_id + j2 as u64;
                        let v_local = (my.0..my.1).contains(&v);
                        if (!v_local || u < v) && distance2(p1, p2, cfg.periodic) <= r2 {
                            emit(u, v);
                        }
                    }
                }
            }
            cache.insert(coords, own);
        }
    }
    Ok(my)
}

/// Buffered variant of [`streaming`].
pub fn generate<const D: usize>(
    cfg: &RggConfig<D>,
    rank: u64,
    size: u64,
) -> Result<(Vec<Edge>, VertexRange)> {
    let mut edges = Vec::new();
    let range = streaming(cfg, rank, size, |u, v| edges.push((u, v)))?;
    Ok((edges, range))
}

/// Positions of the local vertices, in vertex-id order.
pub fn coordinates<const D: usize>(
    cfg: &RggConfig<D>,
    rank: u64,
    size: u64,
) -> Result<Vec<[f64; D]>> {
    if size == 0 || rank >= size {
        return Err(Error::InvalidParameter(format!(
            "rank {rank} out of range for {size} processes"
        )));
    }
    let layout = build(cfg)?;
    let chunks = chunk_range(layout.topo.num_chunks(), size, rank);
    let mut coords = Vec::new();
    for chunk in chunks {
        let chunk_coords = layout.topo.decode(chunk);
        for local in 0..layout.topo.chunk_size(chunk) {
            let local_coords = layout.topo.local_coords(chunk, local);
            let cell: [u64; D] = std::array::from_fn(|a| {
                layout.topo.axis_offset(a, chunk_coords[a]) + local_coords[a]
            });
            coords.extend(layout.cell_points(cell).pos);
        }
    }
    Ok(coords)
}

/// Probability that two uniform points of the unit domain lie within `r`.
fn kernel<const D: usize>(r: f64, periodic: bool) -> f64 {
    use std::f64::consts::PI;
    match (D, periodic) {
        (2, true) => PI * r.powi(2),
        (2, false) => PI * r.powi(2) - 8.0 / 3.0 * r.powi(3) + 0.5 * r.powi(4),
        (3, true) => 4.0 / 3.0 * PI * r.powi(3),
        (3, false) => {
            4.0 / 3.0 * PI * r.powi(3) - 1.5 * PI * r.powi(4) + 8.0 / 5.0 * r.powi(5)
                - r.powi(6) / 6.0
        }
        _ => unreachable!("geometric models are 2D or 3D"),
    }
}

/// Radius at which the expected edge count of an `n`-point graph is `m`
/// (boundary-corrected kernel, inverted by bisection).
pub fn radius_for_edges<const D: usize>(n: u64, m: u64, periodic: bool) -> Result<f64> {
    if n < 2 {
        return Err(Error::InvalidParameter("need at least two vertices".into()));
    }
    let pairs = n as f64 * (n - 1) as f64 / 2.0;
    let hi = if periodic { 0.5 } else { 1.0 };
    if m as f64 > pairs * kernel::<D>(hi, periodic) {
        return Err(Error::InvalidParameter(format!(
            "m = {m} not reachable with n = {n} points"
        )));
    }
    let target = m as f64 / pairs;
    let (mut lo, mut hi) = (0.0f64, hi);
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if kernel::<D>(mid, periodic) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}

/// Vertex count at which an `r`-radius graph is expected to have `m` edges.
pub fn vertices_for_edges<const D: usize>(m: u64, r: f64, periodic: bool) -> Result<u64> {
    if !r.is_finite() || r <= 0.0 || r > 1.0 {
        return Err(Error::InvalidParameter(format!("radius {r} outside (0, 1]")));
    }
    let kappa = kernel::<D>(r.min(if periodic { 0.5 } else { 1.0 }), periodic);
    let n = 0.5 * (1.0 + (1.0 + 8.0 * m as f64 / kappa).sqrt());
    Ok(n.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cfg2(n: u64, r: f64) -> RggConfig<2> {
        RggConfig { n, r, periodic: false, seed: 1, chunks: 1 }
    }

    fn canonical(edges: &[Edge]) -> HashSet<Edge> {
        edges.iter().map(|&(u, v)| (u.min(v), u.max(v))).collect()
    }

    #[test]
    fn all_vertices_get_ids_and_positions() {
        let config = cfg2(500, 0.05);
        let coords = coordinates(&config, 0, 1).unwrap();
        assert_eq!(coords.len(), 500);
        assert!(coords.iter().all(|c| c.iter().all(|&x| (0.0..1.0).contains(&x))));
    }

    #[test]
    fn edges_respect_the_radius() {
        // No emitted pair may exceed the connection radius.
        let config = cfg2(100, 0.1);
        let coords = coordinates(&config, 0, 1).unwrap();
        let (edges, range) = generate(&config, 0, 1).unwrap();
        assert_eq!(range, (0, 100));
        for (u, v) in edges {
            let d2 = distance2(&coords[u as usize], &coords[v as usize], false);
            assert!(d2.sqrt() <= 0.1 + 1e-12, "({u}, {v}) at distance {}", d2.sqrt());
        }
    }

    #[test]
    fn no_qualifying_pair_is_missed() {
        let config = cfg2(80, 0.11);
        let coords = coordinates(&config, 0, 1).unwrap();
        let edges = canonical(&generate(&config, 0, 1).unwrap().0);
        for u in 0..80u64 {
            for v in u + 1..80 {
                let within =
                    distance2(&coords[u as usize], &coords[v as usize], false).sqrt() <= 0.11;
                assert_eq!(edges.contains(&(u, v)), within, "pair ({u}, {v})");
            }
        }
    }

    #[test]
    fn union_is_process_count_invariant() {
        // Same chunk grid, 1 vs 2 vs 4 processes.
        let config = RggConfig { chunks: 4, ..cfg2(100, 0.1) };
        let reference = canonical(&generate(&config, 0, 1).unwrap().0);
        for p in [2u64, 4] {
            let mut union = Vec::new();
            let mut covered = 0;
            for rank in 0..p {
                let (edges, range) = generate(&config, rank, p).unwrap();
                assert_eq!(range.0, covered);
                covered = range.1;
                union.extend(edges);
            }
            assert_eq!(covered, 100);
            assert_eq!(canonical(&union), reference, "p = {p}");
        }
    }

    #[test]
    fn cross_rank_edges_are_mirrored() {
        let config = RggConfig { chunks: 4, ..cfg2(200, 0.09) };
        let locals: Vec<_> = (0..4).map(|r| generate(&config, r, 4).unwrap()).collect();
        for (edges, range) in &locals {
            for &(u, v) in edges {
                if !(range.0..range.1).contains(&v) {
                    let owner = locals.iter().find(|(_, r)| (r.0..r.1).contains(&v)).unwrap();
                    assert!(owner.0.contains(&(v, u)), "missing mirror of ({u}, {v})");
                }
            }
        }
    }

    #[test]
    fn periodic_wraps_across_the_boundary() {
        // Two points near opposite edges of the unit square are neighbors
        // only on the torus; with enough points and a generous radius some
        // wrapped edge must appear.
        let open = RggConfig { ..cfg2(300, 0.12) };
        let torus = RggConfig { periodic: true, ..cfg2(300, 0.12) };
        let coords = coordinates(&torus, 0, 1).unwrap();
        let torus_edges = canonical(&generate(&torus, 0, 1).unwrap().0);
        assert!(!torus_edges.is_empty());
        for &(u, v) in &torus_edges {
            let d2 = distance2(&coords[u as usize], &coords[v as usize], true);
            assert!(d2.sqrt() <= 0.12 + 1e-12);
        }
        // The torus admits strictly more pairs than the open square.
        let open_edges = canonical(&generate(&open, 0, 1).unwrap().0);
        assert!(torus_edges.len() >= open_edges.len());
    }

    #[test]
    fn rejects_bad_radius_and_chunks() {
        assert!(generate(&cfg2(10, 0.0), 0, 1).is_err());
        assert!(generate(&cfg2(10, -0.5), 0, 1).is_err());
        let config = RggConfig { chunks: 4, r: 0.6, ..cfg2(10, 0.6) };
        assert!(generate(&config, 0, 1).is_err());
        let config = RggConfig { chunks: 3, ..cfg2(10, 0.1) };
        assert!(generate(&config, 0, 1).is_err());
    }

    #[test]
    fn radius_calibration_brackets_the_target() {
        let r = radius_for_edges::<2>(1000, 5000, false).unwrap();
        let pairs = 1000.0 * 999.0 / 2.0;
        let expected = pairs * kernel::<2>(r, false);
        assert!((expected - 5000.0).abs() < 1.0, "expected {expected}");
    }

    #[test]
    fn vertex_calibration_inverts_the_kernel() {
        let n = vertices_for_edges::<2>(5000, 0.05, false).unwrap();
        let pairs = n as f64 * (n - 1) as f64 / 2.0;
        let expected = pairs * kernel::<2>(0.05, false);
        assert!((expected - 5000.0).abs() / 5000.0 < 0.05, "n = {n} gives {expected}");
    }

    #[test]
    fn calibrated_edge_count_is_statistically_plausible() {
        let mut total = 0usize;
        for seed in 0..20u64 {
            let r = radius_for_edges::<2>(400, 1500, false).unwrap();
            let config = RggConfig { seed, ..cfg2(400, r) };
            total += generate(&config, 0, 1).unwrap().0.len();
        }
        let mean = total as f64 / 20.0;
        assert!((mean - 1500.0).abs() < 150.0, "mean {mean}");
    }

    #[test]
    fn deterministic_across_runs() {
        let config = RggConfig { chunks: 4, ..cfg2(250, 0.07) };
        assert_eq!(generate(&config, 1, 2).unwrap(), generate(&config, 1, 2).unwrap());
    }

    #[test]
    fn three_dimensional_radius_bound_holds() {
        let config: RggConfig<3> = RggConfig { n: 200, r: 0.2, periodic: false, seed: 1, chunks: 1 };
        let coords = coordinates(&config, 0, 1).unwrap();
        let (edges, _) = generate(&config, 0, 1).unwrap();
        assert!(!edges.is_empty());
        for (u, v) in edges {
            let d2 = distance2(&coords[u as usize], &coords[v as usize], false);
            assert!(d2.sqrt() <= 0.2 + 1e-12);
        }
    }
}
