//! Distributed statistics and validation over local edge lists.
//!
//! Everything here is a post-pass: generation never communicates, these
//! reductions do. All ranks must call each routine together — the fabric
//! blocks until the whole group arrives, exactly like the MPI collectives
//! this is modeled on.

use std::collections::HashSet;

use crate::comm::{exchange_edges, owner_of, Communicator};
use crate::csr::vertex_distribution;
use crate::{Edge, VertexRange};

/// Per-rank load summary of a value (vertex or edge counts).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadSummary {
    pub min: u64,
    pub mean: f64,
    pub max: u64,
    pub sd: f64,
}

fn summarize(values: &[u64]) -> LoadSummary {
    let min = values.iter().copied().min().unwrap_or(0);
    let max = values.iter().copied().max().unwrap_or(0);
    let mean = values.iter().sum::<u64>() as f64 / values.len() as f64;
    let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / values.len() as f64;
    LoadSummary { min, mean, max, sd: var.sqrt() }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicStatistics {
    pub global_nodes: u64,
    pub global_edges: u64,
    pub nodes_per_rank: LoadSummary,
    pub edges_per_rank: LoadSummary,
    /// `max / mean` of per-rank edge counts.
    pub edge_imbalance: f64,
}

/// Global vertex/edge counts and per-rank balance. Collective.
pub fn basic<C: Communicator>(
    edges: &[Edge],
    vertex_range: VertexRange,
    comm: &C,
) -> BasicStatistics {
    let node_counts = comm.allgather(vertex_range.1 - vertex_range.0);
    let edge_counts = comm.allgather(edges.len() as u64);
    let nodes_per_rank = summarize(&node_counts);
    let edges_per_rank = summarize(&edge_counts);
    let edge_imbalance = if edges_per_rank.mean > 0.0 {
        edges_per_rank.max as f64 / edges_per_rank.mean
    } else {
        1.0
    };
    BasicStatistics {
        global_nodes: node_counts.iter().sum(),
        global_edges: edge_counts.iter().sum(),
        nodes_per_rank,
        edges_per_rank,
        edge_imbalance,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DegreeStatistics {
    pub min: u64,
    pub mean: f64,
    pub max: u64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvancedStatistics {
    pub density: f64,
    pub degrees: DegreeStatistics,
    /// Vertex counts per power-of-two out-degree bin: bin 0 holds degree 0,
    /// bin `i` holds degrees in `[2^(i-1), 2^i)`.
    pub degree_bins: Vec<u64>,
    /// Fraction of edges with an endpoint outside the owning range.
    pub edge_locality: f64,
    /// Distinct remote endpoints referenced anywhere.
    pub ghost_nodes: u64,
    pub ghost_fraction: f64,
}

/// Walk the locally sorted edge list and feed each source's out-degree to
/// `yield_degree`; vertices of the range with no edges count as degree 0.
fn scan_degrees<F: FnMut(u64)>(edges: &[Edge], vertex_range: VertexRange, mut yield_degree: F) {
    debug_assert!(edges.windows(2).all(|w| w[0] <= w[1]));
    let mut expected = vertex_range.0;
    let mut run: Option<(u64, u64)> = None;
    for &(from, _) in edges {
        match run {
            Some((source, degree)) if source == from => run = Some((source, degree + 1)),
            Some((source, degree)) => {
                yield_degree(degree);
                // Sources skipped between runs have degree 0.
                for _ in source + 1..from {
                    yield_degree(0);
                }
                expected = from + 1;
                run = Some((from, 1));
            }
            None => {
                for _ in vertex_range.0..from {
                    yield_degree(0);
                }
                expected = from + 1;
                run = Some((from, 1));
            }
        }
    }
    if let Some((_, degree)) = run {
        yield_degree(degree);
    }
    for _ in expected.max(vertex_range.0)..vertex_range.1 {
        yield_degree(0);
    }
}

/// Degree, locality, and ghost statistics. Sorts the local edge list if
/// needed. Collective.
pub fn advanced<C: Communicator>(
    edges: &mut Vec<Edge>,
    vertex_range: VertexRange,
    comm: &C,
) -> AdvancedStatistics {
    if !edges.is_sorted() {
        edges.sort_unstable();
    }

    let mut bins = vec![0u64; 65];
    let mut min = u64::MAX;
    let mut max = 0u64;
    scan_degrees(edges, vertex_range, |degree| {
        min = min.min(degree);
        max = max.max(degree);
        let bin = if degree == 0 { 0 } else { degree.ilog2() as usize + 1 };
        bins[bin] += 1;
    });

    let local = (vertex_range.0, vertex_range.1);
    let is_remote = |v: u64| v < local.0 || v >= local.1;
    let cut = edges.iter().filter(|&&(u, v)| is_remote(u) || is_remote(v)).count() as u64;
    let ghosts: HashSet<u64> = edges
        .iter()
        .flat_map(|&(u, v)| [u, v])
        .filter(|&v| is_remote(v))
        .collect();

    let global_nodes = comm.allreduce_sum(vertex_range.1 - vertex_range.0);
    let global_edges = comm.allreduce_sum(edges.len() as u64);
    let global_cut = comm.allreduce_sum(cut);
    let global_ghosts = comm.allreduce_sum(ghosts.len() as u64);
    let degree_bins = comm.allreduce_sum_counts(&bins);

    AdvancedStatistics {
        density: if global_nodes > 1 {
            global_edges as f64 / (global_nodes as f64 * (global_nodes - 1) as f64)
        } else {
            0.0
        },
        degrees: DegreeStatistics {
            min: comm.allreduce_min(min),
            mean: if global_nodes > 0 { global_edges as f64 / global_nodes as f64 } else { 0.0 },
            max: comm.allreduce_max(max),
        },
        degree_bins,
        edge_locality: if global_edges > 0 { global_cut as f64 / global_edges as f64 } else { 0.0 },
        ghost_nodes: global_ghosts,
        ghost_fraction: if global_nodes + global_ghosts > 0 {
            global_ghosts as f64 / (global_nodes + global_ghosts) as f64
        } else {
            0.0
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymmetryReport {
    /// Boundary edges received from other ranks whose local mirror is
    /// absent, as `(local_endpoint, remote_endpoint)`.
    pub missing: Vec<Edge>,
    /// Total mismatches across the group.
    pub global_missing: u64,
}

impl SymmetryReport {
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.global_missing == 0
    }
}

/// Route every boundary edge `(u, v)` (`u` local, `v` remote) to the owner
/// of `v` and verify the mirror `(v, u)` exists there. Mismatches are
/// reported, never repaired. Collective.
pub fn verify_undirected<C: Communicator>(
    edges: &[Edge],
    vertex_range: VertexRange,
    comm: &C,
) -> SymmetryReport {
    let distribution = vertex_distribution(vertex_range, comm);
    let mut outgoing: Vec<Vec<Edge>> = vec![Vec::new(); comm.size()];
    for &(u, v) in edges {
        if (vertex_range.0..vertex_range.1).contains(&u)
            && !(vertex_range.0..vertex_range.1).contains(&v)
        {
            outgoing[owner_of(&distribution, v)].push((u, v));
        }
    }

    let local: HashSet<Edge> = edges.iter().copied().collect();
    let mut missing = Vec::new();
    for (u, v) in exchange_edges(comm, outgoing) {
        // `v` is ours; its copy of the edge must be oriented outward.
        if !local.contains(&(v, u)) {
            missing.push((v, u));
        }
    }
    missing.sort_unstable();

    let global_missing = comm.allreduce_sum(missing.len() as u64);
    if global_missing > 0 && comm.rank() == 0 {
        tracing::warn!(global_missing, "undirected symmetry check failed");
    }
    SymmetryReport { missing, global_missing }
}
