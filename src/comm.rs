//! Process-group abstraction.
//!
//! Generation itself is communication-free; the collectives here exist only
//! for the statistics pass, the undirected verification pass, the writer, and
//! the mirror-edge exchange of models that cannot place both copies locally.
//!
//! All processes of a group must enter each collective together; partial
//! participation is a programming error and, as with any SPMD runtime, shows
//! up as a hang rather than an error value.

use std::sync::{Arc, Condvar, Mutex};

use crate::{Edge, VId};

/// Collective operations over an SPMD process group.
///
/// The single primitive is [`Communicator::exchange_matrix`] (an
/// all-to-all-v of word vectors); every other collective is derived from it.
/// Implementations only need rank, size, and that one routine.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// All-to-all exchange. `rows[j]` is the word vector destined for rank
    /// `j` (`rows.len() == size`). Returns one row per source rank, in rank
    /// order: `result[i]` is what rank `i` sent to the caller.
    fn exchange_matrix(&self, rows: Vec<Vec<u64>>) -> Vec<Vec<u64>>;

    /// Every rank receives every rank's words, in rank order.
    fn allgather_words(&self, words: &[u64]) -> Vec<Vec<u64>> {
        self.exchange_matrix(vec![words.to_vec(); self.size()])
    }

    /// Every rank receives the vector of all ranks' values.
    fn allgather(&self, value: u64) -> Vec<u64> {
        self.allgather_words(&[value])
            .into_iter()
            .map(|w| w[0])
            .collect()
    }

    fn allreduce_sum(&self, value: u64) -> u64 {
        self.allgather(value).into_iter().sum()
    }

    fn allreduce_min(&self, value: u64) -> u64 {
        self.allgather(value).into_iter().min().unwrap_or(0)
    }

    fn allreduce_max(&self, value: u64) -> u64 {
        self.allgather(value).into_iter().max().unwrap_or(0)
    }

    /// Value held by `root`, on every rank.
    fn bcast(&self, value: u64, root: usize) -> u64 {
        self.allgather(value)[root]
    }

    /// Elementwise sum of equal-length count vectors, on every rank.
    fn allreduce_sum_counts(&self, counts: &[u64]) -> Vec<u64> {
        let mut sums = vec![0u64; counts.len()];
        for row in self.allgather_words(counts) {
            for (s, v) in sums.iter_mut().zip(row) {
                *s += v;
            }
        }
        sums
    }

    /// Gather word vectors on `root`; `None` elsewhere.
    fn gather_words(&self, words: &[u64], root: usize) -> Option<Vec<Vec<u64>>> {
        let mut rows = vec![Vec::new(); self.size()];
        rows[root] = words.to_vec();
        let received = self.exchange_matrix(rows);
        (self.rank() == root).then_some(received)
    }
}

/// Route edges to explicit destination ranks; returns the edges routed to the
/// caller, grouped by source rank order.
pub fn exchange_edges<C: Communicator>(comm: &C, outgoing: Vec<Vec<Edge>>) -> Vec<Edge> {
    debug_assert_eq!(outgoing.len(), comm.size());
    let rows = outgoing
        .into_iter()
        .map(|edges| {
            let mut words = Vec::with_capacity(edges.len() * 2);
            for (u, v) in edges {
                words.push(u);
                words.push(v);
            }
            words
        })
        .collect();
    let mut edges = Vec::new();
    for row in comm.exchange_matrix(rows) {
        edges.extend(row.chunks_exact(2).map(|w| (w[0], w[1])));
    }
    edges
}

/// Gather all edges on `root` (writer and single-file output path).
pub fn gather_edges<C: Communicator>(
    comm: &C,
    edges: &[Edge],
    root: usize,
) -> Option<Vec<Edge>> {
    let mut words = Vec::with_capacity(edges.len() * 2);
    for &(u, v) in edges {
        words.push(u);
        words.push(v);
    }
    comm.gather_words(&words, root).map(|rows| {
        let mut all: Vec<Edge> = Vec::new();
        for row in rows {
            all.extend(row.chunks_exact(2).map(|w| (w[0], w[1])));
        }
        all
    })
}

/// Rank owning vertex `v` given the global vertex distribution (an array of
/// `p + 1` range starts, see [`crate::csr::vertex_distribution`]).
#[must_use]
pub fn owner_of(distribution: &[VId], v: VId) -> usize {
    debug_assert!(v < *distribution.last().unwrap());
    match distribution.binary_search(&v) {
        Ok(i) => i,
        Err(i) => i - 1,
    }
}

/// The trivial single-process group.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn exchange_matrix(&self, mut rows: Vec<Vec<u64>>) -> Vec<Vec<u64>> {
        debug_assert_eq!(rows.len(), 1);
        vec![std::mem::take(&mut rows[0])]
    }
}

struct FabricState {
    epoch: u64,
    arrived: usize,
    deposits: Vec<Vec<Vec<u64>>>,
    published: Option<Arc<Vec<Vec<Vec<u64>>>>>,
    readers_left: usize,
}

struct FabricShared {
    size: usize,
    state: Mutex<FabricState>,
    cv: Condvar,
}

/// In-process fabric backing a group of [`MemoryComm`] ranks, one per thread.
///
/// Exists for tests and for exercising multi-rank behavior without an MPI
/// launcher. Collectives rendezvous on a shared slot table; the last arriver
/// publishes, the last reader recycles.
pub struct MemoryFabric {
    shared: Arc<FabricShared>,
}

impl MemoryFabric {
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size >= 1);
        tracing::debug!(size, "creating in-memory process group");
        Self {
            shared: Arc::new(FabricShared {
                size,
                state: Mutex::new(FabricState {
                    epoch: 0,
                    arrived: 0,
                    deposits: vec![Vec::new(); size],
                    published: None,
                    readers_left: 0,
                }),
                cv: Condvar::new(),
            }),
        }
    }

    /// Communicator bound to `rank`. Each rank must live on its own thread.
    #[must_use]
    pub fn comm(&self, rank: usize) -> MemoryComm {
        assert!(rank < self.shared.size);
        MemoryComm {
            rank,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run `f` once per rank on `size` scoped threads and collect the
    /// results in rank order. Panics in any rank propagate.
    pub fn run<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(MemoryComm) -> T + Sync,
    {
        let fabric = Self::new(size);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let comm = fabric.comm(rank);
                    scope.spawn(|| f(comm))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }
}

/// One rank of a [`MemoryFabric`].
#[derive(Clone)]
pub struct MemoryComm {
    rank: usize,
    shared: Arc<FabricShared>,
}

impl Communicator for MemoryComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn exchange_matrix(&self, rows: Vec<Vec<u64>>) -> Vec<Vec<u64>> {
        assert_eq!(rows.len(), self.shared.size);
        let shared = &*self.shared;
        let mut st = shared.state.lock().unwrap();

        // Wait out stragglers still reading the previous collective.
        while st.published.is_some() {
            st = shared.cv.wait(st).unwrap();
        }

        st.deposits[self.rank] = rows;
        st.arrived += 1;
        let my_epoch = st.epoch;

        if st.arrived == shared.size {
            let matrix: Vec<Vec<Vec<u64>>> = st.deposits.iter_mut().map(std::mem::take).collect();
            st.published = Some(Arc::new(matrix));
            st.readers_left = shared.size;
            st.arrived = 0;
            st.epoch += 1;
            shared.cv.notify_all();
        } else {
            while st.epoch == my_epoch {
                st = shared.cv.wait(st).unwrap();
            }
        }

        let matrix = Arc::clone(st.published.as_ref().unwrap());
        let result = matrix
            .iter()
            .map(|sender_rows| sender_rows[self.rank].clone())
            .collect();
        st.readers_left -= 1;
        if st.readers_left == 0 {
            st.published = None;
            shared.cv.notify_all();
        }
        result
    }
}
