//! Post-pass helpers: local CSR assembly and the global vertex distribution.

use crate::comm::Communicator;
use crate::{Edge, VId, VertexRange};

/// Compressed sparse rows over the local vertex range: `xadj` has one slot
/// per local vertex plus the terminator, `adjncy` holds the targets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Csr {
    pub xadj: Vec<u64>,
    pub adjncy: Vec<VId>,
}

/// Build a CSR indexed by local vertex id. Sorts the edge list first if it
/// is not already sorted. Every source must lie inside `vertex_range`.
#[must_use]
pub fn build_csr(edges: &mut Vec<Edge>, vertex_range: VertexRange) -> Csr {
    if !edges.is_sorted() {
        edges.sort_unstable();
    }
    let local_n = (vertex_range.1 - vertex_range.0) as usize;
    let mut xadj = vec![0u64; local_n + 1];
    let mut adjncy = Vec::with_capacity(edges.len());

    let mut cur_vertex = 0usize;
    for &(from, to) in edges.iter() {
        debug_assert!((vertex_range.0..vertex_range.1).contains(&from));
        let local = (from - vertex_range.0) as usize;
        while cur_vertex < local {
            cur_vertex += 1;
            xadj[cur_vertex] = adjncy.len() as u64;
        }
        adjncy.push(to);
    }
    while cur_vertex < local_n {
        cur_vertex += 1;
        xadj[cur_vertex] = adjncy.len() as u64;
    }
    Csr { xadj, adjncy }
}

/// Allgather of every rank's range end: `distribution[r]..distribution[r+1]`
/// is the vertex range of rank `r`, with `distribution[0] == 0`.
pub fn vertex_distribution<C: Communicator>(vertex_range: VertexRange, comm: &C) -> Vec<VId> {
    let mut distribution = vec![0];
    distribution.extend(comm.allgather(vertex_range.1));
    distribution
}
