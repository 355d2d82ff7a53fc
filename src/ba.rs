//! Barabási–Albert preferential attachment.
//!
//! Deterministic Batagelj–Brandes formulation: the degree sequence is an
//! implicit array in which position `2e` holds the source of edge `e` and
//! position `2e + 1` its target. A target draw that lands on an even
//! position resolves to a vertex id directly; an odd position re-resolves
//! the draw of the referenced edge. Since references only point backward,
//! every vertex's parents are computable from hashes alone, which is what
//! lets each rank generate its vertices without coordination.
//!
//! Undirected mode cannot place the parent-side copy of a cross-rank edge
//! locally (parents cannot enumerate their children), so [`generate`] routes
//! those mirrors through one all-to-all after local generation.

use crate::chunks::{owner_of_chunk, vertex_range, ChunkDistribution};
use crate::comm::{exchange_edges, Communicator};
use crate::hash::hash2;
use crate::variates::uniform;
use crate::{Edge, Error, Result, VId, VertexRange};

const SALT: u64 = 0x6261_2121; // "ba!!"

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaConfig {
    pub n: u64,
    /// Attachment edges per vertex.
    pub d: u64,
    /// Exact global edge target. When set, attachment counts vary by at most
    /// one around `m / n` so the total comes out to exactly `m`.
    pub target_m: Option<u64>,
    pub directed: bool,
    pub self_loops: bool,
    pub seed: u64,
    pub chunks: u64,
}

/// Resolved attachment plan: vertices in `[start, n)` issue draws; vertex
/// `v` issues `q + (v - start < r)` of its `slot` reserved positions.
#[derive(Debug, Clone, Copy)]
struct Plan {
    n: u64,
    start: u64,
    slot: u64,
    q: u64,
    r: u64,
}

impl Plan {
    fn degree_of(&self, v: u64) -> u64 {
        debug_assert!(v >= self.start);
        self.q + u64::from(v - self.start < self.r)
    }
}

fn plan(cfg: &BaConfig) -> Result<Plan> {
    if cfg.n == 0 {
        return Ok(Plan { n: 0, start: 0, slot: 1, q: 0, r: 0 });
    }
    let plan = match cfg.target_m {
        None => {
            if cfg.d == 0 {
                return Err(Error::InvalidParameter("attachment degree must be >= 1".into()));
            }
            let start = if cfg.self_loops { 0 } else { cfg.d };
            if start >= cfg.n {
                return Err(Error::InvalidParameter(format!(
                    "n = {} leaves no vertex free to attach with d = {}",
                    cfg.n, cfg.d
                )));
            }
            Plan { n: cfg.n, start, slot: cfg.d, q: cfg.d, r: 0 }
        }
        Some(m) => {
            let start = if cfg.self_loops { 0 } else { (m / cfg.n).max(1) };
            if start >= cfg.n {
                return Err(Error::InvalidParameter(format!(
                    "n = {} too small for m = {m} attachment edges",
                    cfg.n
                )));
            }
            let eligible = cfg.n - start;
            let q = m / eligible;
            let r = m % eligible;
            Plan { n: cfg.n, start, slot: (q + u64::from(r > 0)).max(1), q, r }
        }
    };
    if plan.slot.checked_mul(plan.n).and_then(|x| x.checked_mul(2)).is_none() {
        return Err(Error::Overflow(format!(
            "implicit attachment array for n = {}, d = {}",
            plan.n, plan.slot
        )));
    }
    Ok(plan)
}

/// Resolve the `i`-th parent of vertex `v`.
fn parent(plan: &Plan, self_loops: bool, base: u64, v: VId, i: u64) -> VId {
    let (mut v, mut i) = (v, i);
    loop {
        let range = if self_loops {
            2 * (plan.slot * v + i) + 1
        } else {
            2 * plan.slot * v
        };
        let pos = uniform(hash2(base, v, i), range);
        if pos % 2 == 0 {
            return pos / (2 * plan.slot);
        }
        let edge = pos / 2;
        let source = edge / plan.slot;
        let draw = edge % plan.slot;
        // Positions that were never overwritten keep their initial value,
        // the owning vertex id.
        if (!self_loops && source < plan.start) || draw >= plan.degree_of(source) {
            return source;
        }
        (v, i) = (source, draw);
    }
}

/// Source-side attachment edges `(v, parent)` of the local vertex range.
/// Undirected cross-rank mirrors are handled by [`generate`].
pub fn streaming<F>(cfg: &BaConfig, rank: u64, size: u64, mut emit: F) -> Result<VertexRange>
where
    F: FnMut(VId, VId),
{
    if size == 0 || rank >= size {
        return Err(Error::InvalidParameter(format!(
            "rank {rank} out of range for {size} processes"
        )));
    }
    let plan = plan(cfg)?;
    let dist = ChunkDistribution::new(cfg.n, cfg.chunks)?;
    let my = vertex_range(&dist, size, rank);
    tracing::debug!(
        n = cfg.n,
        d = plan.slot,
        target_m = cfg.target_m,
        rank,
        size,
        "sampling preferential attachment"
    );
    let base = hash2(cfg.seed, SALT, 0);
    for v in my.0.max(plan.start)..my.1 {
        for i in 0..plan.degree_of(v) {
            emit(v, parent(&plan, cfg.self_loops, base, v, i));
        }
    }
    Ok(my)
}

/// Full generation pass bound to a process group. For undirected graphs the
/// mirror copy of every cross-rank edge is routed to the parent's owner.
pub fn generate<C: Communicator>(cfg: &BaConfig, comm: &C) -> Result<(Vec<Edge>, VertexRange)> {
    let rank = comm.rank() as u64;
    let size = comm.size() as u64;
    let mut edges = Vec::new();

    if cfg.directed || size == 1 {
        let range = streaming(cfg, rank, size, |u, v| edges.push((u, v)))?;
        return Ok((edges, range));
    }

    let dist = ChunkDistribution::new(cfg.n, cfg.chunks)?;
    let my = vertex_range(&dist, size, rank);
    let mut outgoing: Vec<Vec<Edge>> = vec![Vec::new(); comm.size()];
    let range = streaming(cfg, rank, size, |v, p| {
        edges.push((v, p));
        if !(my.0..my.1).contains(&p) {
            let owner = owner_of_chunk(cfg.chunks, size, dist.chunk_of(p));
            outgoing[owner as usize].push((p, v));
        }
    })?;
    edges.extend(exchange_edges(comm, outgoing));
    Ok((edges, range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::MemoryFabric;
    use std::collections::HashMap;

    fn cfg(n: u64, d: u64) -> BaConfig {
        BaConfig {
            n,
            d,
            target_m: None,
            directed: false,
            self_loops: false,
            seed: 1,
            chunks: 1,
        }
    }

    #[test]
    fn attachment_degrees_scenario() {
        // With d = 2, every vertex past the bootstrap set attaches twice.
        let (edges, range) = generate(&cfg(16, 2), &crate::comm::NoComm).unwrap();
        assert_eq!(range, (0, 16));
        let mut out_degree = HashMap::new();
        for &(v, p) in &edges {
            *out_degree.entry(v).or_insert(0u64) += 1;
            assert!(p < v, "parent {p} not earlier than {v}");
        }
        for v in 0..2u64 {
            assert!(!out_degree.contains_key(&v));
        }
        for v in 2..16u64 {
            assert_eq!(out_degree[&v], 2, "vertex {v}");
        }
        assert_eq!(edges.len(), 2 * 14);
    }

    #[test]
    fn self_loop_mode_attaches_every_vertex() {
        let config = BaConfig { self_loops: true, ..cfg(12, 3) };
        let (edges, _) = generate(&config, &crate::comm::NoComm).unwrap();
        assert_eq!(edges.len(), 36);
        assert!(edges.iter().all(|&(v, p)| p <= v));
    }

    #[test]
    fn no_self_loops_without_flag() {
        let (edges, _) = generate(&cfg(64, 3), &crate::comm::NoComm).unwrap();
        assert!(edges.iter().all(|&(v, p)| v != p));
    }

    #[test]
    fn exact_edge_target() {
        for m in [5u64, 19, 73, 100] {
            let config = BaConfig { target_m: Some(m), ..cfg(20, 0) };
            let (edges, _) = generate(&config, &crate::comm::NoComm).unwrap();
            assert_eq!(edges.len() as u64, m, "m = {m}");
        }
    }

    #[test]
    fn rejects_degenerate_parameters() {
        assert!(generate(&cfg(10, 0), &crate::comm::NoComm).is_err());
        assert!(generate(&cfg(3, 3), &crate::comm::NoComm).is_err());
    }

    #[test]
    fn local_outputs_are_process_count_invariant() {
        let (reference, _) = generate(&BaConfig { directed: true, ..cfg(40, 2) }, &crate::comm::NoComm).unwrap();
        for p in [2u64, 4] {
            let config = BaConfig { directed: true, chunks: p, ..cfg(40, 2) };
            let mut union = Vec::new();
            for rank in 0..p {
                let mut local = Vec::new();
                streaming(&config, rank, p, |u, v| local.push((u, v))).unwrap();
                union.extend(local);
            }
            union.sort_unstable();
            let mut want = reference.clone();
            want.sort_unstable();
            assert_eq!(union, want, "p = {p}");
        }
    }

    #[test]
    fn undirected_mirrors_arrive_via_exchange() {
        let results = MemoryFabric::run(3, |comm| {
            let config = BaConfig { chunks: 3, ..cfg(30, 2) };
            generate(&config, &comm).unwrap()
        });
        // Every cross-rank source edge must have its mirror at the parent's
        // owner.
        for (edges, range) in &results {
            for &(v, p) in edges {
                if v >= range.0 && v < range.1 && !(range.0..range.1).contains(&p) {
                    let owner = results.iter().find(|(_, r)| (r.0..r.1).contains(&p)).unwrap();
                    assert!(owner.0.contains(&(p, v)), "missing mirror of ({v}, {p})");
                }
            }
        }
    }
}
